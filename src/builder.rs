//! Builder for fake clientsets with seeded objects and reactors

use crate::client_utils::{extract_gvk, gvk_to_gvr};
use crate::fake::Fake;
use crate::fake_client::Clientset;
use crate::reactor::{ReactionContext, Reactor, WatchReactionContext, WatchReactor};
use crate::tracker::{ObjectTracker, GVK};
use crate::watcher::RawEventStream;
use crate::{Error, Result};
use kube::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Namespace given to fixture objects that do not name one.
pub const DEFAULT_FIXTURE_NAMESPACE: &str = "default";

/// Builder for [`Clientset`]
///
/// Seeds the tracker before any action is recorded, so the action history of
/// the built clientset starts empty.
///
/// # Example
///
/// ```rust
/// use longhorn_engine_client::{
///     ClientsetBuilder, Engine, EngineInterface, EngineSpec, EnginesGetter, ListOptions,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut engine = Engine::new("vol-1-e-0", EngineSpec::default());
/// engine.metadata.namespace = Some("longhorn-system".to_string());
///
/// let clientset = ClientsetBuilder::new().with_object(engine).build()?;
/// let engines = clientset.longhorn_v1alpha1().engines("longhorn-system");
///
/// let list = engines.list(&ListOptions::default()).await?;
/// assert_eq!(list.items.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ClientsetBuilder {
    initial_objects: Vec<Value>,
    with_status_subresource: Vec<GVK>,
    fixture_dir: Option<PathBuf>,
    reactors: Vec<Reactor>,
    watch_reactors: Vec<WatchReactor>,
}

impl ClientsetBuilder {
    pub fn new() -> Self {
        Self {
            initial_objects: Vec::new(),
            with_status_subresource: Vec::new(),
            fixture_dir: None,
            reactors: Vec::new(),
            watch_reactors: Vec::new(),
        }
    }

    /// Seed a typed object. Objects that fail to serialize are skipped.
    pub fn with_object<K>(mut self, obj: K) -> Self
    where
        K: Resource + Serialize,
    {
        match serde_json::to_value(&obj) {
            Ok(value) => self.initial_objects.push(value),
            Err(e) => debug!("Skipping object that failed to serialize: {}", e),
        }
        self
    }

    pub fn with_objects<K>(mut self, objects: Vec<K>) -> Self
    where
        K: Resource + Serialize,
    {
        for obj in objects {
            self = self.with_object(obj);
        }
        self
    }

    /// Serve `status` of `K` as a subresource.
    ///
    /// Create and update then leave the stored status alone, and only
    /// `update_status` or a patch on `status` change it. Without this, updates
    /// replace the whole object.
    ///
    /// ```rust
    /// use longhorn_engine_client::{ClientsetBuilder, Engine};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let clientset = ClientsetBuilder::new()
    ///     .with_status_subresource::<Engine>()
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_status_subresource<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()>,
    {
        self.with_status_subresource.push(GVK::new(
            K::group(&()),
            K::version(&()),
            K::kind(&()),
        ));
        self
    }

    /// Seed raw objects; each must carry apiVersion and kind.
    pub fn with_runtime_objects(mut self, objects: Vec<Value>) -> Self {
        self.initial_objects.extend(objects);
        self
    }

    /// Append a reactor to the chain of the built clientset.
    ///
    /// Reactors run in registration order, ahead of the tracker.
    pub fn with_reactor<F>(mut self, verb: &str, resource: &str, reaction: F) -> Self
    where
        F: Fn(ReactionContext) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        self.reactors.push(Reactor::new(verb, resource, reaction));
        self
    }

    pub fn with_watch_reactor<F>(mut self, resource: &str, reaction: F) -> Self
    where
        F: Fn(WatchReactionContext) -> Result<Option<RawEventStream>> + Send + Sync + 'static,
    {
        self.watch_reactors.push(WatchReactor::new(resource, reaction));
        self
    }

    /// Base directory for relative paths given to [`load_fixture`](Self::load_fixture).
    pub fn with_fixture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixture_dir = Some(dir.into());
        self
    }

    /// Load objects from a single- or multi-document YAML file.
    ///
    /// Objects without `metadata.namespace` land in `default`.
    ///
    /// ```rust,no_run
    /// use longhorn_engine_client::ClientsetBuilder;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let clientset = ClientsetBuilder::new()
    ///     .with_fixture_dir("fixtures")
    ///     .load_fixture("engines.yaml")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn load_fixture(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let fixture_path = match &self.fixture_dir {
            Some(dir) => dir.join(path),
            None => path.as_ref().to_path_buf(),
        };

        let content = std::fs::read_to_string(&fixture_path).map_err(|e| {
            Error::Internal(format!(
                "Failed to read fixture file {:?}: {}",
                fixture_path, e
            ))
        })?;

        for document in serde_yaml::Deserializer::from_str(&content) {
            let mut value = Value::deserialize(document).map_err(|e| {
                Error::Invalid(format!("Failed to parse YAML in {:?}: {}", fixture_path, e))
            })?;
            // `---` separators around a file produce empty documents
            if value.is_null() {
                continue;
            }

            if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
                metadata
                    .entry("namespace")
                    .or_insert_with(|| Value::String(DEFAULT_FIXTURE_NAMESPACE.to_string()));
            }

            self.initial_objects.push(value);
        }

        Ok(self)
    }

    pub fn load_fixtures<P>(mut self, paths: impl IntoIterator<Item = P>) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        for path in paths {
            self = self.load_fixture(path)?;
        }
        Ok(self)
    }

    /// Build the clientset, adding every seeded object to the tracker.
    ///
    /// Seeding does not emit recorded actions. An object that cannot be added
    /// fails the build.
    pub fn build(self) -> Result<Clientset> {
        let tracker = ObjectTracker::new();
        for gvk in self.with_status_subresource {
            tracker.add_status_subresource(gvk);
        }

        for obj in self.initial_objects {
            let gvk = extract_gvk(&obj)?;
            let gvr = gvk_to_gvr(&gvk);
            let namespace = obj
                .get("metadata")
                .and_then(|m| m.get("namespace"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            tracker
                .add(&gvr, &gvk, obj, &namespace)
                .map_err(|e| Error::Internal(format!("Failed to add initial object: {}", e)))?;
        }

        let fake = Fake::with_reactors(Arc::new(tracker), self.reactors, self.watch_reactors);
        Ok(Clientset::from_fake(fake))
    }
}

impl Default for ClientsetBuilder {
    fn default() -> Self {
        Self::new()
    }
}
