//! The `longhorn.rancher.io/v1alpha1` Engine custom resource

use crate::tracker::{GVK, GVR};
use kube::core::ObjectList;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GROUP: &str = "longhorn.rancher.io";
pub const VERSION: &str = "v1alpha1";
pub const KIND: &str = "Engine";
pub const LIST_KIND: &str = "EngineList";
pub const PLURAL: &str = "engines";

/// Desired state of a Longhorn volume engine.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "longhorn.rancher.io",
    version = "v1alpha1",
    kind = "Engine",
    plural = "engines",
    namespaced,
    status = "EngineStatus",
    derive = "PartialEq",
    derive = "Default"
)]
#[serde(rename_all = "camelCase")]
pub struct EngineSpec {
    #[serde(default)]
    pub volume_name: String,
    #[serde(default)]
    pub volume_size: String,
    #[serde(default, rename = "nodeID")]
    pub node_id: String,
    #[serde(default)]
    pub engine_image: String,
    #[serde(default)]
    pub desire_state: String,
    #[serde(default)]
    pub replica_address_map: BTreeMap<String, String>,
}

/// Observed state reported by the engine controller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub current_image: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub replica_mode_map: BTreeMap<String, String>,
}

pub type EngineList = ObjectList<Engine>;

/// Resource coordinates used for tracker storage and action records.
pub fn engines_resource() -> GVR {
    GVR::new(GROUP, VERSION, PLURAL)
}

pub fn engines_kind() -> GVK {
    GVK::new(GROUP, VERSION, KIND)
}

pub fn engines_list_kind() -> GVK {
    GVK::new(GROUP, VERSION, LIST_KIND)
}
