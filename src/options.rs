//! Request options shared by the real and fake Engine clients

use crate::{Error, Result};
use kube::api::{ListParams, Patch, PatchParams, WatchParams};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use kube::api::{DeleteParams as DeleteOptions, GetParams as GetOptions};

/// Field manager used for server-side apply patches.
pub const FIELD_MANAGER: &str = "longhorn-engine-client";

/// Query filter for list, watch and delete-collection requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Label selector, e.g. `longhornvolume=vol-1,env in (test,dev)`
    pub label_selector: Option<String>,
    /// Field selector, passed through untouched
    pub field_selector: Option<String>,
    /// Set by `watch`; turns the list request into a watch request
    pub watch: bool,
    pub resource_version: Option<String>,
    pub timeout_seconds: Option<u32>,
    pub limit: Option<u32>,
}

impl ListOptions {
    pub fn labels(mut self, selector: impl Into<String>) -> Self {
        self.label_selector = Some(selector.into());
        self
    }

    pub fn fields(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }

    pub fn at(mut self, resource_version: impl Into<String>) -> Self {
        self.resource_version = Some(resource_version.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// The label selector, treating an empty string as "match everything".
    pub fn label_selector(&self) -> Option<&str> {
        self.label_selector
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }

    pub fn to_list_params(&self) -> ListParams {
        let mut params = ListParams::default();
        params.label_selector = self.label_selector.clone();
        params.field_selector = self.field_selector.clone();
        params.resource_version = self.resource_version.clone();
        params.timeout = self.timeout_seconds;
        params.limit = self.limit;
        params
    }

    pub fn to_watch_params(&self) -> WatchParams {
        let mut params = WatchParams::default();
        params.label_selector = self.label_selector.clone();
        params.field_selector = self.field_selector.clone();
        params.timeout = self.timeout_seconds;
        params
    }
}

/// Patch strategies understood by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::enum_variant_names)]
pub enum PatchType {
    /// RFC 6902 JSON Patch
    Json,
    /// RFC 7386 JSON Merge Patch
    Merge,
    /// Kubernetes Strategic Merge Patch
    StrategicMerge,
    /// Server-Side Apply
    Apply,
}

impl PatchType {
    pub fn content_type(self) -> &'static str {
        match self {
            PatchType::Json => "application/json-patch+json",
            PatchType::Merge => "application/merge-patch+json",
            PatchType::StrategicMerge => "application/strategic-merge-patch+json",
            PatchType::Apply => "application/apply-patch+yaml",
        }
    }

    /// Determine the patch type from a request's Content-Type header.
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.contains("application/json-patch+json") => PatchType::Json,
            Some(ct) if ct.contains("application/merge-patch+json") => PatchType::Merge,
            Some(ct) if ct.contains("application/apply-patch+yaml") => PatchType::Apply,
            // Strategic merge is the API server default
            _ => PatchType::StrategicMerge,
        }
    }

    /// Parameters kube requires to send this patch type.
    pub fn params(self) -> PatchParams {
        match self {
            PatchType::Apply => PatchParams::apply(FIELD_MANAGER),
            _ => PatchParams::default(),
        }
    }

    /// Decode a raw patch body into the typed form kube sends on the wire.
    pub fn decode(self, data: &[u8]) -> Result<Patch<Value>> {
        Ok(match self {
            PatchType::Json => Patch::Json(parse_json_patch(data)?),
            PatchType::Merge => Patch::Merge(parse_document(data)?),
            PatchType::StrategicMerge => Patch::Strategic(parse_document(data)?),
            PatchType::Apply => Patch::Apply(parse_apply_document(data)?),
        })
    }

    /// Apply a raw patch body to `target` in place.
    ///
    /// Strategic merge and apply patches are treated as JSON merge patches since
    /// the schema-aware merge keys are not known here.
    pub fn apply_to(self, target: &mut Value, data: &[u8]) -> Result<()> {
        match self {
            PatchType::Json => {
                let patch = parse_json_patch(data)?;
                json_patch::patch(target, &patch).map_err(|e| Error::Invalid(e.to_string()))?;
            }
            PatchType::Merge | PatchType::StrategicMerge => {
                json_patch::merge(target, &parse_document(data)?);
            }
            PatchType::Apply => {
                json_patch::merge(target, &parse_apply_document(data)?);
            }
        }
        Ok(())
    }
}

fn parse_json_patch(data: &[u8]) -> Result<json_patch::Patch> {
    serde_json::from_slice(data).map_err(|e| Error::Invalid(format!("malformed json patch: {}", e)))
}

fn parse_document(data: &[u8]) -> Result<Value> {
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| Error::Invalid(format!("malformed patch body: {}", e)))?;
    if !value.is_object() {
        return Err(Error::Invalid("patch body must be a JSON object".to_string()));
    }
    Ok(value)
}

// Apply configurations may be YAML; JSON is a subset.
fn parse_apply_document(data: &[u8]) -> Result<Value> {
    let value: Value = serde_yaml::from_slice(data)
        .map_err(|e| Error::Invalid(format!("malformed apply configuration: {}", e)))?;
    if !value.is_object() {
        return Err(Error::Invalid(
            "apply configuration must be an object".to_string(),
        ));
    }
    Ok(value)
}
