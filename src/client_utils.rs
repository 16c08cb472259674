use crate::tracker::{GVK, GVR};
use crate::{Error, Result};
use serde_json::Value;

/// Pluralize a Kind name to its resource plural form, following the same
/// rules as kube-rs discovery:
/// - Words ending in s, x, z, ch, sh get -es suffix
/// - Words ending in consonant+y get -ies suffix
/// - All other words get -s suffix
pub fn pluralize(kind: &str) -> String {
    let word = kind.to_ascii_lowercase();

    if word.ends_with('s')
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        if !stem.is_empty() && !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }

    format!("{word}s")
}

/// Inverse of [`pluralize`] for list responses: `engines` -> `Engine`.
pub fn singular_kind(resource: &str) -> String {
    let singular = if let Some(base) = resource.strip_suffix("ies") {
        format!("{}y", base)
    } else if resource.ends_with("ses")
        || resource.ends_with("xes")
        || resource.ends_with("zes")
        || resource.ends_with("ches")
        || resource.ends_with("shes")
    {
        resource[..resource.len() - 2].to_string()
    } else if let Some(base) = resource.strip_suffix('s') {
        base.to_string()
    } else {
        resource.to_string()
    };

    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => singular,
    }
}

pub fn gvk_to_gvr(gvk: &GVK) -> GVR {
    GVR::new(gvk.group.clone(), gvk.version.clone(), pluralize(&gvk.kind))
}

pub fn extract_gvk(value: &Value) -> Result<GVK> {
    let api_version = value
        .get("apiVersion")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Invalid("Missing apiVersion".to_string()))?;

    let kind = value
        .get("kind")
        .and_then(|v| v.as_str())
        .ok_or_else(|| Error::Invalid("Missing kind".to_string()))?;

    let (group, version) = match api_version.split_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), api_version.to_string()),
    };

    Ok(GVK::new(group, version, kind))
}
