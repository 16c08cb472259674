//! Records of invocations made against fake clients

use crate::options::{ListOptions, PatchType};
use crate::tracker::{GVK, GVR};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Delete,
    DeleteCollection,
    Patch,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Watch => "watch",
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Delete => "delete",
            Verb::DeleteCollection => "delete-collection",
            Verb::Patch => "patch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action carries besides its verb and target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionPayload {
    /// get, delete
    Name(String),
    /// list, watch, delete-collection
    List { kind: GVK, options: ListOptions },
    /// create, update
    Object(Value),
    /// patch
    Patch {
        name: String,
        patch_type: PatchType,
        data: Vec<u8>,
    },
}

/// One recorded call. Actions are appended to the session history in call
/// order and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub verb: Verb,
    pub resource: GVR,
    pub namespace: String,
    /// Sub-resource path, e.g. `status`
    pub subresource: Option<String>,
    pub payload: ActionPayload,
}

impl Action {
    fn new(verb: Verb, resource: GVR, namespace: &str, payload: ActionPayload) -> Self {
        Self {
            verb,
            resource,
            namespace: namespace.to_string(),
            subresource: None,
            payload,
        }
    }

    pub fn get(resource: GVR, namespace: &str, name: &str) -> Self {
        Self::new(
            Verb::Get,
            resource,
            namespace,
            ActionPayload::Name(name.to_string()),
        )
    }

    pub fn list(resource: GVR, kind: GVK, namespace: &str, options: ListOptions) -> Self {
        Self::new(
            Verb::List,
            resource,
            namespace,
            ActionPayload::List { kind, options },
        )
    }

    pub fn watch(resource: GVR, kind: GVK, namespace: &str, options: ListOptions) -> Self {
        Self::new(
            Verb::Watch,
            resource,
            namespace,
            ActionPayload::List { kind, options },
        )
    }

    pub fn create(resource: GVR, namespace: &str, object: Value) -> Self {
        Self::new(
            Verb::Create,
            resource,
            namespace,
            ActionPayload::Object(object),
        )
    }

    pub fn update(resource: GVR, namespace: &str, object: Value) -> Self {
        Self::new(
            Verb::Update,
            resource,
            namespace,
            ActionPayload::Object(object),
        )
    }

    pub fn update_subresource(
        resource: GVR,
        subresource: &str,
        namespace: &str,
        object: Value,
    ) -> Self {
        Self::update(resource, namespace, object).with_subresource(subresource)
    }

    pub fn delete(resource: GVR, namespace: &str, name: &str) -> Self {
        Self::new(
            Verb::Delete,
            resource,
            namespace,
            ActionPayload::Name(name.to_string()),
        )
    }

    pub fn delete_collection(
        resource: GVR,
        kind: GVK,
        namespace: &str,
        options: ListOptions,
    ) -> Self {
        Self::new(
            Verb::DeleteCollection,
            resource,
            namespace,
            ActionPayload::List { kind, options },
        )
    }

    pub fn patch(
        resource: GVR,
        namespace: &str,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        subresources: &[&str],
    ) -> Self {
        let action = Self::new(
            Verb::Patch,
            resource,
            namespace,
            ActionPayload::Patch {
                name: name.to_string(),
                patch_type,
                data: data.to_vec(),
            },
        );
        if subresources.is_empty() {
            action
        } else {
            action.with_subresource(&subresources.join("/"))
        }
    }

    fn with_subresource(mut self, subresource: &str) -> Self {
        self.subresource = Some(subresource.to_string());
        self
    }

    /// Whether this action has the given verb and resource plural.
    pub fn matches(&self, verb: &str, resource: &str) -> bool {
        self.verb.as_str().eq_ignore_ascii_case(verb) && self.resource.resource == resource
    }

    /// Name addressed by the action, if it addresses a single object.
    pub fn name(&self) -> Option<&str> {
        match &self.payload {
            ActionPayload::Name(name) | ActionPayload::Patch { name, .. } => Some(name),
            ActionPayload::Object(object) => object
                .get("metadata")
                .and_then(|m| m.get("name"))
                .and_then(|n| n.as_str()),
            ActionPayload::List { .. } => None,
        }
    }

    pub fn object(&self) -> Option<&Value> {
        match &self.payload {
            ActionPayload::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn list_options(&self) -> Option<&ListOptions> {
        match &self.payload {
            ActionPayload::List { options, .. } => Some(options),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.resource.resource)?;
        if let Some(sub) = &self.subresource {
            write!(f, "/{}", sub)?;
        }
        if !self.namespace.is_empty() {
            write!(f, " in {}", self.namespace)?;
        }
        if let Some(name) = self.name() {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}
