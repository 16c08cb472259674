//! In-memory Engine client for tests

use crate::action::Action;
use crate::builder::ClientsetBuilder;
use crate::client::{EngineInterface, EnginesGetter, EventStream};
use crate::engine::{engines_list_kind, engines_resource, Engine, EngineList};
use crate::fake::Fake;
use crate::label_selector::{parse_label_selector, selector_matches};
use crate::mock_service::MockService;
use crate::options::{DeleteOptions, GetOptions, ListOptions, PatchType};
use crate::tracker::ObjectTracker;
use crate::watcher::{RawEvent, RawEventStream, SelectorFilter};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::future;
use futures::stream::StreamExt;
use kube::api::WatchEvent;
use kube::core::Selector;
use kube::{Resource, ResourceExt};
use serde_json::Value;
use std::sync::Arc;

/// Engine client that records every call as an [`Action`] and serves it from
/// the shared [`Fake`].
///
/// List and watch filter by label selector locally, after the reaction chain
/// has produced its result, so reactors always see the unfiltered request.
pub struct FakeEngines {
    fake: Arc<Fake>,
    namespace: String,
}

impl FakeEngines {
    pub fn new(fake: Arc<Fake>, namespace: &str) -> Self {
        Self {
            fake,
            namespace: namespace.to_string(),
        }
    }

    fn invoke_for_engine(&self, action: Action) -> Result<Engine> {
        let value = self.fake.invokes(action)?;
        Ok(serde_json::from_value(value)?)
    }
}

fn to_object(engine: &Engine) -> Result<Value> {
    let mut value = serde_json::to_value(engine)?;
    value["apiVersion"] = Value::String(Engine::api_version(&()).into_owned());
    value["kind"] = Value::String(Engine::kind(&()).into_owned());
    Ok(value)
}

fn selector_for(options: &ListOptions) -> Result<Option<Selector>> {
    options
        .label_selector()
        .map(parse_label_selector)
        .transpose()
        .map_err(Error::Invalid)
}

#[async_trait]
impl EngineInterface for FakeEngines {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create(&self, engine: &Engine) -> Result<Engine> {
        let action = Action::create(engines_resource(), &self.namespace, to_object(engine)?);
        self.invoke_for_engine(action)
    }

    async fn update(&self, engine: &Engine) -> Result<Engine> {
        let action = Action::update(engines_resource(), &self.namespace, to_object(engine)?);
        self.invoke_for_engine(action)
    }

    async fn update_status(&self, engine: &Engine) -> Result<Engine> {
        let action = Action::update_subresource(
            engines_resource(),
            "status",
            &self.namespace,
            to_object(engine)?,
        );
        self.invoke_for_engine(action)
    }

    async fn delete(&self, name: &str, _options: &DeleteOptions) -> Result<()> {
        self.fake
            .invokes(Action::delete(engines_resource(), &self.namespace, name))
            .map(|_| ())
    }

    async fn delete_collection(
        &self,
        _options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<()> {
        let action = Action::delete_collection(
            engines_resource(),
            engines_list_kind(),
            &self.namespace,
            list_options.clone(),
        );
        self.fake.invokes(action).map(|_| ())
    }

    async fn get(&self, name: &str, _options: &GetOptions) -> Result<Engine> {
        self.invoke_for_engine(Action::get(engines_resource(), &self.namespace, name))
    }

    async fn list(&self, options: &ListOptions) -> Result<EngineList> {
        let action = Action::list(
            engines_resource(),
            engines_list_kind(),
            &self.namespace,
            options.clone(),
        );
        let value = self.fake.invokes(action)?;

        let selector = selector_for(options)?;
        let mut list: EngineList = serde_json::from_value(value)?;
        if let Some(selector) = selector {
            list.items
                .retain(|engine| selector_matches(&selector, engine.labels()));
        }
        Ok(list)
    }

    async fn watch(&self, mut options: ListOptions) -> Result<EventStream> {
        options.watch = true;
        let selector = selector_for(&options);
        // Match state of existing objects, so relabeling them is reported
        let existing = match &selector {
            Ok(Some(_)) => {
                let scope = (!self.namespace.is_empty()).then_some(self.namespace.as_str());
                self.fake.tracker().list(&engines_resource(), scope)?
            }
            _ => Vec::new(),
        };

        let action = Action::watch(
            engines_resource(),
            engines_list_kind(),
            &self.namespace,
            options,
        );
        let events = self.fake.invokes_watch(action)?;

        let mut filter = SelectorFilter::new(selector?);
        filter.seed(&existing);
        Ok(typed_events(events, filter))
    }

    async fn patch(
        &self,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        subresources: &[&str],
    ) -> Result<Engine> {
        let action = Action::patch(
            engines_resource(),
            &self.namespace,
            name,
            patch_type,
            data,
            subresources,
        );
        self.invoke_for_engine(action)
    }
}

/// Decode raw tracker events into Engines, narrowed by `filter`.
fn typed_events(events: RawEventStream, mut filter: SelectorFilter) -> EventStream {
    events
        .filter_map(move |event| future::ready(filter.apply(event).map(decode_event)))
        .boxed()
}

fn decode_event(event: RawEvent) -> Result<WatchEvent<Engine>> {
    Ok(match event {
        WatchEvent::Added(object) => WatchEvent::Added(serde_json::from_value(object)?),
        WatchEvent::Modified(object) => WatchEvent::Modified(serde_json::from_value(object)?),
        WatchEvent::Deleted(object) => WatchEvent::Deleted(serde_json::from_value(object)?),
        WatchEvent::Bookmark(bookmark) => WatchEvent::Bookmark(bookmark),
        WatchEvent::Error(status) => WatchEvent::Error(status),
    })
}

/// Fake of the `longhorn.rancher.io/v1alpha1` group client.
#[derive(Clone)]
pub struct FakeLonghornV1alpha1 {
    fake: Arc<Fake>,
}

impl EnginesGetter for FakeLonghornV1alpha1 {
    fn engines(&self, namespace: &str) -> Box<dyn EngineInterface> {
        Box::new(FakeEngines::new(self.fake.clone(), namespace))
    }
}

/// A test session: one object tracker, one action history and one reactor
/// chain, shared by every client handed out.
///
/// # Example
///
/// ```rust
/// use longhorn_engine_client::{
///     Clientset, Engine, EngineInterface, EngineSpec, EnginesGetter, GetOptions,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let clientset = Clientset::new();
/// let engines = clientset.longhorn_v1alpha1().engines("longhorn-system");
///
/// let engine = Engine::new("vol-1-e-0", EngineSpec::default());
/// engines.create(&engine).await?;
///
/// let fetched = engines.get("vol-1-e-0", &GetOptions::default()).await?;
/// assert_eq!(fetched.metadata.name.as_deref(), Some("vol-1-e-0"));
/// assert_eq!(clientset.actions().len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Clientset {
    fake: Arc<Fake>,
}

impl Clientset {
    /// An empty session. Updates replace whole objects, status included; use
    /// [`ClientsetBuilder::with_status_subresource`] for subresource semantics.
    pub fn new() -> Self {
        Self::from_fake(Fake::new(Arc::new(ObjectTracker::new())))
    }

    pub fn builder() -> ClientsetBuilder {
        ClientsetBuilder::new()
    }

    pub(crate) fn from_fake(fake: Fake) -> Self {
        Self {
            fake: Arc::new(fake),
        }
    }

    pub fn longhorn_v1alpha1(&self) -> FakeLonghornV1alpha1 {
        FakeLonghornV1alpha1 {
            fake: self.fake.clone(),
        }
    }

    /// The recorder, for registering reactors.
    pub fn fake(&self) -> &Fake {
        &self.fake
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        self.fake.tracker()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.fake.actions()
    }

    /// A `kube::Client` served from this session's tracker.
    ///
    /// Requests made through it bypass the action history and the reactors;
    /// they see and change the same objects as the fake clients. Must be
    /// called from within a Tokio runtime.
    pub fn kube_client(&self) -> kube::Client {
        MockService::new(self.tracker().clone()).into_client("default")
    }
}

impl Default for Clientset {
    fn default() -> Self {
        Self::new()
    }
}
