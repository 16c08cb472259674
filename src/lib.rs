//! Typed client for the Longhorn `Engine` custom resource, with an in-memory
//! fake for testing controllers that use it.
//!
//! [`Engines`] sends requests to a Kubernetes API server through
//! `kube::Client`. [`FakeEngines`] implements the same [`EngineInterface`]
//! against an in-memory [`ObjectTracker`], records every call as an
//! [`Action`] and lets tests inject behavior through reactors.
//!
//! # Examples
//!
//! ## Against a cluster
//!
//! ```rust,no_run
//! use longhorn_engine_client::{EngineInterface, EnginesGetter, ListOptions, LonghornV1alpha1Client};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = LonghornV1alpha1Client::try_default().await?;
//! let engines = client.engines("longhorn-system");
//!
//! let attached = engines
//!     .list(&ListOptions::default().labels("longhornvolume=vol-1"))
//!     .await?;
//! for engine in attached.items {
//!     println!("{:?}", engine.metadata.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## In tests
//!
//! ```rust
//! use longhorn_engine_client::{
//!     Clientset, DeleteOptions, Engine, EngineInterface, EngineSpec, EnginesGetter, Verb,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clientset = Clientset::new();
//! let engines = clientset.longhorn_v1alpha1().engines("longhorn-system");
//!
//! engines.create(&Engine::new("vol-1-e-0", EngineSpec::default())).await?;
//! engines.delete("vol-1-e-0", &DeleteOptions::default()).await?;
//!
//! let verbs: Vec<Verb> = clientset.actions().iter().map(|a| a.verb).collect();
//! assert_eq!(verbs, vec![Verb::Create, Verb::Delete]);
//! # Ok(())
//! # }
//! ```

mod action;
mod builder;
mod client;
mod client_utils;
mod engine;
mod error;
mod fake;
mod fake_client;
pub mod label_selector;
mod mock_service;
mod options;
pub mod reactor;
mod tracker;
mod utils;
mod watcher;

#[cfg(test)]
mod client_test;
#[cfg(test)]
mod client_utils_test;
#[cfg(test)]
mod error_test;
#[cfg(test)]
mod label_selector_test;

pub use action::{Action, ActionPayload, Verb};
pub use builder::{ClientsetBuilder, DEFAULT_FIXTURE_NAMESPACE};
pub use client::{EngineInterface, Engines, EnginesGetter, EventStream, LonghornV1alpha1Client};
pub use engine::{
    engines_kind, engines_list_kind, engines_resource, Engine, EngineList, EngineSpec,
    EngineStatus, GROUP, KIND, PLURAL, VERSION,
};
pub use error::{Error, Result};
pub use fake::Fake;
pub use fake_client::{Clientset, FakeEngines, FakeLonghornV1alpha1};
pub use mock_service::{MockBody, MockService};
pub use options::{DeleteOptions, GetOptions, ListOptions, PatchType, FIELD_MANAGER};
pub use reactor::{ReactionContext, Reactor, WatchReactionContext, WatchReactor};
pub use tracker::{ObjectTracker, GVK, GVR};
pub use watcher::{FakeWatcher, RawEvent, RawEventStream};
