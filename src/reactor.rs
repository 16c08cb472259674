//! Reactors customize how the fake answers recorded actions
//!
//! A reaction returns `Ok(Some(value))` to answer the action itself,
//! `Ok(None)` to pass it on down the chain, or `Err(e)` to fail it.
//!
//! ```
//! use longhorn_engine_client::{Clientset, Error};
//!
//! let clientset = Clientset::new();
//! clientset.fake().prepend_reactor("create", "engines", |ctx| {
//!     if ctx.action.name() == Some("forbidden-engine") {
//!         return Err(Error::Forbidden("engines is forbidden".into()));
//!     }
//!     Ok(None)
//! });
//! ```

use crate::action::{Action, ActionPayload, Verb};
use crate::client_utils::extract_gvk;
use crate::tracker::{ObjectTracker, GVK};
use crate::watcher::RawEventStream;
use crate::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;

/// Context passed to object reactions
pub struct ReactionContext<'a> {
    /// The action being answered; already recorded
    pub action: &'a Action,
    /// Store backing the session, for reactions that read or seed state
    pub tracker: &'a ObjectTracker,
}

/// Context passed to watch reactions
pub struct WatchReactionContext<'a> {
    pub action: &'a Action,
    pub tracker: &'a ObjectTracker,
}

pub type ReactionFunc = Arc<dyn Fn(ReactionContext) -> Result<Option<Value>> + Send + Sync>;

pub type WatchReactionFunc =
    Arc<dyn Fn(WatchReactionContext) -> Result<Option<RawEventStream>> + Send + Sync>;

/// A reaction bound to a verb and resource; `*` matches anything.
#[derive(Clone)]
pub struct Reactor {
    pub(crate) verb: String,
    pub(crate) resource: String,
    pub(crate) reaction: ReactionFunc,
}

impl Reactor {
    pub fn new<F>(verb: impl Into<String>, resource: impl Into<String>, reaction: F) -> Self
    where
        F: Fn(ReactionContext) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Self {
            verb: verb.into(),
            resource: resource.into(),
            reaction: Arc::new(reaction),
        }
    }

    pub fn handles(&self, action: &Action) -> bool {
        (self.verb == "*" || action.verb.as_str().eq_ignore_ascii_case(&self.verb))
            && (self.resource == "*" || action.resource.resource == self.resource)
    }
}

#[derive(Clone)]
pub struct WatchReactor {
    pub(crate) resource: String,
    pub(crate) reaction: WatchReactionFunc,
}

impl WatchReactor {
    pub fn new<F>(resource: impl Into<String>, reaction: F) -> Self
    where
        F: Fn(WatchReactionContext) -> Result<Option<RawEventStream>> + Send + Sync + 'static,
    {
        Self {
            resource: resource.into(),
            reaction: Arc::new(reaction),
        }
    }

    pub fn handles(&self, action: &Action) -> bool {
        action.verb == Verb::Watch
            && (self.resource == "*" || action.resource.resource == self.resource)
    }
}

/// Default reaction: apply the action to the tracker.
pub fn object_reaction(tracker: &ObjectTracker, action: &Action) -> Result<Value> {
    let namespace = action.namespace.as_str();
    let scope = (!namespace.is_empty()).then_some(namespace);
    let is_status = match action.subresource.as_deref() {
        None => false,
        Some("status") => true,
        Some(other) => {
            return Err(Error::NotFound {
                kind: format!("{}/{}", action.resource.resource, other),
                name: action.name().unwrap_or_default().to_string(),
                namespace: namespace.to_string(),
            })
        }
    };

    match (action.verb, &action.payload) {
        (Verb::Get, ActionPayload::Name(name)) => tracker.get(&action.resource, namespace, name),
        (Verb::List, ActionPayload::List { kind, .. }) => {
            let items = tracker.list(&action.resource, scope)?;
            Ok(list_object(tracker, kind, items))
        }
        (Verb::Create, ActionPayload::Object(object)) => {
            let gvk = extract_gvk(object)?;
            tracker.create(&action.resource, &gvk, object.clone(), namespace)
        }
        (Verb::Update, ActionPayload::Object(object)) => {
            let gvk = extract_gvk(object)?;
            tracker.update(&action.resource, &gvk, object.clone(), namespace, is_status)
        }
        (Verb::Delete, ActionPayload::Name(name)) => {
            tracker.delete(&action.resource, namespace, name)
        }
        (Verb::DeleteCollection, ActionPayload::List { kind, options }) => {
            let deleted =
                tracker.delete_collection(&action.resource, scope, options.label_selector())?;
            Ok(list_object(tracker, kind, deleted))
        }
        (
            Verb::Patch,
            ActionPayload::Patch {
                name,
                patch_type,
                data,
            },
        ) => tracker.patch(
            &action.resource,
            namespace,
            name,
            *patch_type,
            data,
            is_status,
        ),
        _ => Err(Error::Internal(format!(
            "no reaction implemented for {}",
            action
        ))),
    }
}

/// Wrap items into a list object of `kind`.
pub fn list_object(tracker: &ObjectTracker, kind: &GVK, items: Vec<Value>) -> Value {
    json!({
        "apiVersion": kind.api_version(),
        "kind": kind.kind,
        "metadata": {
            "resourceVersion": tracker.current_resource_version()
        },
        "items": items
    })
}
