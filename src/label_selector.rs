//! Label selector parsing and matching
//!
//! The fake client evaluates label selectors locally because the object tracker
//! only stores objects. Selector strings follow the API server grammar and are
//! compiled into a `kube::core::Selector`:
//! - Equality: `key=value` or `key==value`
//! - Inequality: `key!=value`
//! - Set-based: `key in (value1,value2)` or `key notin (value1,value2)`
//! - Existence: `key` or `!key`
//! - Requirements joined by commas are ANDed: `key1=value1,key2 in (v2,v3)`

use kube::core::{Expression, Selector, SelectorExt};
use std::collections::{BTreeMap, BTreeSet};

/// Split a selector string by commas, but not inside parentheses
fn split_requirements(selector: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let mut depth = 0;

    for (i, ch) in selector.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                result.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if start < selector.len() {
        result.push(&selector[start..]);
    }

    result
}

fn parse_set(requirement: &str, rest: &str) -> Result<BTreeSet<String>, String> {
    let rest = rest.trim();
    let inner = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(|| format!("Invalid set syntax: {}", requirement))?;
    Ok(inner.split(',').map(|v| v.trim().to_string()).collect())
}

fn parse_key(requirement: &str, key: &str) -> Result<String, String> {
    let key = key.trim();
    if key.is_empty() || key.starts_with('!') || key.contains(char::is_whitespace) {
        return Err(format!("Invalid label key in requirement: {}", requirement));
    }
    Ok(key.to_string())
}

fn parse_requirement(requirement: &str) -> Result<Expression, String> {
    if let Some((key, rest)) = requirement.split_once(" notin ") {
        return Ok(Expression::NotIn(
            parse_key(requirement, key)?,
            parse_set(requirement, rest)?,
        ));
    }
    if let Some((key, rest)) = requirement.split_once(" in ") {
        return Ok(Expression::In(
            parse_key(requirement, key)?,
            parse_set(requirement, rest)?,
        ));
    }
    if let Some(key) = requirement.strip_prefix('!') {
        if !key.contains('=') {
            return Ok(Expression::DoesNotExist(parse_key(requirement, key)?));
        }
    }
    // NotIn/In with a single value are the set forms of != and =
    if let Some((key, value)) = requirement.split_once("!=") {
        let values = BTreeSet::from([value.trim().to_string()]);
        return Ok(Expression::NotIn(parse_key(requirement, key)?, values));
    }
    if let Some((key, value)) = requirement
        .split_once("==")
        .or_else(|| requirement.split_once('='))
    {
        let values = BTreeSet::from([value.trim().to_string()]);
        return Ok(Expression::In(parse_key(requirement, key)?, values));
    }
    Ok(Expression::Exists(parse_key(requirement, requirement)?))
}

/// Parse a label selector string into a Selector
///
/// An empty or blank selector matches everything.
///
/// ```
/// use longhorn_engine_client::label_selector::parse_label_selector;
///
/// assert!(parse_label_selector("longhornvolume=vol-1").is_ok());
/// assert!(parse_label_selector("env in (production,staging)").is_ok());
/// assert!(parse_label_selector("env in production").is_err());
/// ```
pub fn parse_label_selector(selector: &str) -> Result<Selector, String> {
    let expressions = split_requirements(selector)
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(parse_requirement)
        .collect::<Result<Vec<_>, _>>()?;

    if expressions.is_empty() {
        Ok(Selector::default())
    } else {
        Ok(Selector::from_iter(expressions))
    }
}

pub fn selector_matches(selector: &Selector, labels: &BTreeMap<String, String>) -> bool {
    selector.matches(labels)
}

/// Match labels against a label selector string
///
/// Returns `Err` with a message if the selector string is invalid.
///
/// ```
/// use std::collections::BTreeMap;
/// use longhorn_engine_client::label_selector::matches_label_selector;
///
/// let labels = BTreeMap::from([
///     ("longhornvolume".to_string(), "vol-1".to_string()),
///     ("env".to_string(), "test".to_string()),
/// ]);
///
/// assert!(matches_label_selector(&labels, "longhornvolume=vol-1").unwrap());
/// assert!(matches_label_selector(&labels, "env in (test,dev)").unwrap());
/// assert!(!matches_label_selector(&labels, "env=prod").unwrap());
/// ```
pub fn matches_label_selector(
    labels: &BTreeMap<String, String>,
    selector: &str,
) -> Result<bool, String> {
    let selector = parse_label_selector(selector)?;
    Ok(selector_matches(&selector, labels))
}
