//! Typed client for the Engine custom resource

use crate::engine::{Engine, EngineList, KIND};
use crate::options::{DeleteOptions, GetOptions, ListOptions, PatchType};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use kube::api::{PostParams, WatchEvent};
use kube::core::Request;
use kube::Resource;
use std::time::Duration;
use tracing::debug;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Typed watch events; dropping the stream ends the watch.
pub type EventStream = BoxStream<'static, Result<WatchEvent<Engine>>>;

/// Operations on Engine resources within one namespace.
///
/// Implemented by [`Engines`], which talks to an API server, and by
/// [`FakeEngines`](crate::FakeEngines), which records actions against an
/// in-memory tracker. Both report failures with the same [`Error`] variants.
#[async_trait]
pub trait EngineInterface: Send + Sync {
    /// Namespace every operation is bound to.
    fn namespace(&self) -> &str;

    async fn create(&self, engine: &Engine) -> Result<Engine>;

    /// Replace the whole object, keyed by `metadata.name`.
    async fn update(&self, engine: &Engine) -> Result<Engine>;

    /// Replace the status subresource.
    async fn update_status(&self, engine: &Engine) -> Result<Engine>;

    async fn delete(&self, name: &str, options: &DeleteOptions) -> Result<()>;

    async fn delete_collection(
        &self,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<()>;

    async fn get(&self, name: &str, options: &GetOptions) -> Result<Engine>;

    async fn list(&self, options: &ListOptions) -> Result<EngineList>;

    async fn watch(&self, options: ListOptions) -> Result<EventStream>;

    /// Apply a partial update. `subresources` (e.g. `["status"]`) narrow the
    /// target to a sub-resource of the object.
    async fn patch(
        &self,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        subresources: &[&str],
    ) -> Result<Engine>;
}

/// Factory for namespace-scoped Engine clients.
pub trait EnginesGetter {
    fn engines(&self, namespace: &str) -> Box<dyn EngineInterface>;
}

/// Engine client backed by a `kube::Client`.
///
/// Every operation builds exactly one request; an empty namespace addresses
/// all namespaces for list, watch and delete-collection.
#[derive(Clone)]
pub struct Engines {
    client: kube::Client,
    namespace: String,
    url_path: String,
}

impl Engines {
    pub fn new(client: kube::Client, namespace: &str) -> Self {
        let scope = (!namespace.is_empty()).then_some(namespace);
        Self {
            client,
            namespace: namespace.to_string(),
            url_path: Engine::url_path(&(), scope),
        }
    }

    fn request(&self) -> Request {
        Request::new(self.url_path.clone())
    }

    fn classify<'a>(&'a self, name: &'a str) -> impl Fn(kube::Error) -> Error + 'a {
        move |err| Error::from_kube(err, KIND, &self.namespace, name)
    }
}

fn require_name(engine: &Engine) -> Result<&str> {
    engine
        .metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Invalid("resource name may not be empty".to_string()))
}

#[async_trait]
impl EngineInterface for Engines {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create(&self, engine: &Engine) -> Result<Engine> {
        let name = engine.metadata.name.as_deref().unwrap_or_default();
        let req = self
            .request()
            .create(&PostParams::default(), serde_json::to_vec(engine)?)?;
        debug!("POST engine {}/{}", self.namespace, name);
        self.client.request(req).await.map_err(self.classify(name))
    }

    async fn update(&self, engine: &Engine) -> Result<Engine> {
        let name = require_name(engine)?;
        let req = self
            .request()
            .replace(name, &PostParams::default(), serde_json::to_vec(engine)?)?;
        debug!("PUT engine {}/{}", self.namespace, name);
        self.client.request(req).await.map_err(self.classify(name))
    }

    async fn update_status(&self, engine: &Engine) -> Result<Engine> {
        let name = require_name(engine)?;
        let req = self.request().replace_subresource(
            "status",
            name,
            &PostParams::default(),
            serde_json::to_vec(engine)?,
        )?;
        debug!("PUT engine {}/{}/status", self.namespace, name);
        self.client.request(req).await.map_err(self.classify(name))
    }

    async fn delete(&self, name: &str, options: &DeleteOptions) -> Result<()> {
        let req = self.request().delete(name, options)?;
        debug!("DELETE engine {}/{}", self.namespace, name);
        self.client
            .request_status::<Engine>(req)
            .await
            .map(|_| ())
            .map_err(self.classify(name))
    }

    async fn delete_collection(
        &self,
        options: &DeleteOptions,
        list_options: &ListOptions,
    ) -> Result<()> {
        let req = self
            .request()
            .delete_collection(options, &list_options.to_list_params())?;
        debug!(
            "DELETE engines in {} matching {:?}",
            self.namespace, list_options.label_selector
        );
        self.client
            .request_status::<EngineList>(req)
            .await
            .map(|_| ())
            .map_err(self.classify(""))
    }

    async fn get(&self, name: &str, options: &GetOptions) -> Result<Engine> {
        let req = self.request().get(name, options)?;
        debug!("GET engine {}/{}", self.namespace, name);
        self.client.request(req).await.map_err(self.classify(name))
    }

    async fn list(&self, options: &ListOptions) -> Result<EngineList> {
        let req = self.request().list(&options.to_list_params())?;
        debug!(
            "LIST engines in {} matching {:?}",
            self.namespace, options.label_selector
        );
        self.client.request(req).await.map_err(self.classify(""))
    }

    async fn watch(&self, mut options: ListOptions) -> Result<EventStream> {
        options.watch = true;
        let version = options.resource_version.as_deref().unwrap_or("0");
        let req = self.request().watch(&options.to_watch_params(), version)?;
        debug!(
            "WATCH engines in {} from resourceVersion {}",
            self.namespace, version
        );
        let events = self
            .client
            .request_events::<Engine>(req)
            .await
            .map_err(self.classify(""))?;

        let namespace = self.namespace.clone();
        Ok(events
            .map(move |event| event.map_err(|err| Error::from_kube(err, KIND, &namespace, "")))
            .boxed())
    }

    async fn patch(
        &self,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        subresources: &[&str],
    ) -> Result<Engine> {
        let patch = patch_type.decode(data)?;
        let params = patch_type.params();
        let req = if subresources.is_empty() {
            self.request().patch(name, &params, &patch)?
        } else {
            self.request()
                .patch_subresource(&subresources.join("/"), name, &params, &patch)?
        };
        debug!(
            "PATCH engine {}/{} ({:?}, subresources {:?})",
            self.namespace, name, patch_type, subresources
        );
        self.client.request(req).await.map_err(self.classify(name))
    }
}

/// Client for the `longhorn.rancher.io/v1alpha1` API group.
#[derive(Clone)]
pub struct LonghornV1alpha1Client {
    client: kube::Client,
}

impl LonghornV1alpha1Client {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Build a client from the inferred kubeconfig or in-cluster environment.
    pub async fn try_default() -> Result<Self> {
        let mut config = kube::Config::infer()
            .await
            .map_err(|e| Error::Connection(format!("failed to infer kube config: {}", e)))?;
        config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
        config.read_timeout = Some(DEFAULT_READ_TIMEOUT);
        Self::from_config(config)
    }

    pub fn from_config(config: kube::Config) -> Result<Self> {
        let client = kube::Client::try_from(config)
            .map_err(|e| Error::Connection(format!("failed to build kube client: {}", e)))?;
        Ok(Self::new(client))
    }

    pub fn kube_client(&self) -> &kube::Client {
        &self.client
    }
}

impl EnginesGetter for LonghornV1alpha1Client {
    fn engines(&self, namespace: &str) -> Box<dyn EngineInterface> {
        Box::new(Engines::new(self.client.clone(), namespace))
    }
}
