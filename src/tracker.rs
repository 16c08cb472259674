use crate::client_utils::extract_gvk;
use crate::label_selector;
use crate::options::PatchType;
use crate::utils::{
    check_namespace, ensure_metadata, extract_metadata, has_finalizers,
    lock, now, object_labels, read, should_be_deleted, write,
};
use crate::watcher::{FakeWatcher, RawEventStream};
use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::WatchEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tracing::{debug, trace};

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GVR {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GVR {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GVK {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GVK {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub data: Value,
    pub gvk: GVK,
    pub metadata: ObjectMeta,
}

// Ordered maps so enumeration follows (namespace, name) and is stable between calls.
type ObjectsByName = BTreeMap<String, StoredObject>;
type ObjectsByNamespace = BTreeMap<String, ObjectsByName>;
type ObjectStorage = HashMap<GVR, ObjectsByNamespace>;

/// In-memory object store shared by every fake client of a test session.
///
/// All writes take the storage write lock for their whole read-modify-write
/// cycle and broadcast their watch event before releasing it, so watchers see
/// events in the same order the store applied them.
pub struct ObjectTracker {
    objects: RwLock<ObjectStorage>,
    with_status_subresource: RwLock<HashSet<GVK>>,
    // Keyed by (resource, namespace); an empty namespace watches all namespaces
    watchers: Mutex<HashMap<(GVR, String), FakeWatcher>>,
    resource_version: AtomicU64,
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            with_status_subresource: RwLock::new(HashSet::new()),
            watchers: Mutex::new(HashMap::new()),
            resource_version: AtomicU64::new(0),
        }
    }

    pub fn add_status_subresource(&self, gvk: GVK) {
        write(&self.with_status_subresource).insert(gvk);
    }

    pub fn has_status_subresource(&self, gvk: &GVK) -> bool {
        read(&self.with_status_subresource).contains(gvk)
    }

    fn next_resource_version(&self) -> String {
        (self.resource_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    /// Resource version of the most recent write.
    pub fn current_resource_version(&self) -> String {
        self.resource_version.load(Ordering::SeqCst).to_string()
    }

    /// Seed an object, replacing any existing one with the same name.
    ///
    /// Unlike `create`, an existing resourceVersion is kept.
    pub fn add(&self, gvr: &GVR, gvk: &GVK, mut object: Value, namespace: &str) -> Result<Value> {
        trace!("Adding object: {:?} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = require_name(&meta)?;
        check_namespace(&meta, namespace)?;

        if meta.deletion_timestamp.is_some() && !has_finalizers(&meta) {
            return Err(Error::Invalid(format!(
                "refusing to add object {} with metadata.deletionTimestamp but no finalizers",
                name
            )));
        }

        if meta.resource_version.as_ref().is_none_or(|rv| rv.is_empty()) {
            meta.resource_version = Some(self.next_resource_version());
        }
        ensure_metadata(&mut meta, namespace)?;
        object["metadata"] = serde_json::to_value(&meta)?;

        let mut objects = write(&self.objects);
        let ns_objects = objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default();
        let replaced = ns_objects
            .insert(name.clone(), stored(&object, gvk, meta))
            .is_some();

        let event = if replaced {
            WatchEvent::Modified(object.clone())
        } else {
            WatchEvent::Added(object.clone())
        };
        self.notify(gvr, namespace, event);

        debug!("Added object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn create(&self, gvr: &GVR, gvk: &GVK, mut object: Value, namespace: &str) -> Result<Value> {
        trace!("Creating object: {:?} in namespace: {}", gvr, namespace);

        let mut meta = extract_metadata(&object)?;
        let name = require_name(&meta)?;
        check_namespace(&meta, namespace)?;

        if meta
            .resource_version
            .as_ref()
            .is_some_and(|rv| !rv.is_empty())
        {
            return Err(Error::Invalid(
                "resourceVersion can not be set for Create requests".to_string(),
            ));
        }

        let mut objects = write(&self.objects);
        let ns_objects = objects
            .entry(gvr.clone())
            .or_default()
            .entry(namespace.to_string())
            .or_default();

        if ns_objects.contains_key(&name) {
            return Err(Error::AlreadyExists {
                kind: gvk.kind.clone(),
                name,
                namespace: namespace.to_string(),
            });
        }

        meta.resource_version = Some(self.next_resource_version());
        meta.deletion_timestamp = None;
        ensure_metadata(&mut meta, namespace)?;
        object["metadata"] = serde_json::to_value(&meta)?;
        // Status is only written through the subresource
        if self.has_status_subresource(gvk) {
            if let Some(obj) = object.as_object_mut() {
                obj.remove("status");
            }
        }

        ns_objects.insert(name.clone(), stored(&object, gvk, meta));
        self.notify(gvr, namespace, WatchEvent::Added(object.clone()));

        debug!("Created object: {}/{}", namespace, name);
        Ok(object)
    }

    pub fn get(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Getting object: {:?} {}/{}", gvr, namespace, name);

        let objects = read(&self.objects);
        objects
            .get(gvr)
            .and_then(|by_ns| by_ns.get(namespace))
            .and_then(|by_name| by_name.get(name))
            .map(|stored| stored.data.clone())
            .ok_or_else(|| not_found(gvr, namespace, name))
    }

    /// Replace an object. With `is_status` only the status is taken from
    /// `object` when the kind has a status subresource; otherwise the stored
    /// status is preserved. Kinds without a status subresource are replaced
    /// whole either way.
    pub fn update(
        &self,
        gvr: &GVR,
        gvk: &GVK,
        object: Value,
        namespace: &str,
        is_status: bool,
    ) -> Result<Value> {
        trace!("Updating object: {:?} in namespace: {}", gvr, namespace);

        let mut objects = write(&self.objects);
        self.update_locked(&mut objects, gvr, gvk, object, namespace, is_status)
    }

    fn update_locked(
        &self,
        objects: &mut ObjectStorage,
        gvr: &GVR,
        gvk: &GVK,
        mut object: Value,
        namespace: &str,
        is_status: bool,
    ) -> Result<Value> {
        let meta = extract_metadata(&object)?;
        let name = require_name(&meta)?;
        check_namespace(&meta, namespace)?;

        let ns_objects = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .ok_or_else(|| not_found(gvr, namespace, &name))?;
        let existing = ns_objects
            .get(&name)
            .ok_or_else(|| not_found(gvr, namespace, &name))?;
        let existing_meta = extract_metadata(&existing.data)?;

        if let (Some(provided_rv), Some(current_rv)) =
            (&meta.resource_version, &existing_meta.resource_version)
        {
            if !provided_rv.is_empty() && provided_rv != current_rv {
                return Err(Error::Conflict(format!(
                    "Operation cannot be fulfilled on {} \"{}\": the object has been modified; resource version mismatch: expected {}, got {}",
                    gvr.resource, name, current_rv, provided_rv
                )));
            }
        }

        if self.has_status_subresource(gvk) {
            let keep = if is_status { "spec" } else { "status" };
            match existing.data.get(keep) {
                Some(value) => object[keep] = value.clone(),
                None => {
                    if let Some(obj) = object.as_object_mut() {
                        obj.remove(keep);
                    }
                }
            }
        }

        let mut new_meta = meta;
        if new_meta.deletion_timestamp != existing_meta.deletion_timestamp {
            return Err(Error::Invalid(
                "metadata.deletionTimestamp field is immutable".to_string(),
            ));
        }
        new_meta.resource_version = Some(self.next_resource_version());
        new_meta.uid = existing_meta.uid;
        new_meta.creation_timestamp = existing_meta.creation_timestamp;
        new_meta.namespace = existing_meta.namespace;
        object["metadata"] = serde_json::to_value(&new_meta)?;

        if should_be_deleted(&new_meta) {
            ns_objects.remove(&name);
            self.notify(gvr, namespace, WatchEvent::Deleted(object.clone()));
            debug!("Finalized and removed object: {}/{}", namespace, name);
            return Ok(object);
        }

        ns_objects.insert(name.clone(), stored(&object, gvk, new_meta));
        self.notify(gvr, namespace, WatchEvent::Modified(object.clone()));

        debug!("Updated object: {}/{}", namespace, name);
        Ok(object)
    }

    /// Apply a raw patch to the stored object and write the result back.
    ///
    /// Read, patch and write happen under one lock, so only a resourceVersion
    /// set by the patch body itself can conflict.
    pub fn patch(
        &self,
        gvr: &GVR,
        namespace: &str,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        is_status: bool,
    ) -> Result<Value> {
        trace!("Patching object: {:?} {}/{} ({:?})", gvr, namespace, name, patch_type);

        let mut objects = write(&self.objects);
        let mut patched = objects
            .get(gvr)
            .and_then(|by_ns| by_ns.get(namespace))
            .and_then(|by_name| by_name.get(name))
            .map(|stored| stored.data.clone())
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        patch_type.apply_to(&mut patched, data)?;

        let patched_name = patched
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str);
        if patched_name != Some(name) {
            return Err(Error::Invalid(
                "metadata.name field is immutable".to_string(),
            ));
        }

        let gvk = extract_gvk(&patched)?;
        self.update_locked(&mut objects, gvr, &gvk, patched, namespace, is_status)
    }

    /// Delete an object. Objects holding finalizers are only marked with a
    /// deletion timestamp; they disappear once an update clears the finalizers.
    pub fn delete(&self, gvr: &GVR, namespace: &str, name: &str) -> Result<Value> {
        trace!("Deleting object: {:?} {}/{}", gvr, namespace, name);

        let mut objects = write(&self.objects);
        let ns_objects = objects
            .get_mut(gvr)
            .and_then(|by_ns| by_ns.get_mut(namespace))
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        let entry = ns_objects
            .get_mut(name)
            .ok_or_else(|| not_found(gvr, namespace, name))?;

        if has_finalizers(&entry.metadata) {
            if entry.metadata.deletion_timestamp.is_none() {
                entry.metadata.deletion_timestamp = Some(now()?);
                entry.metadata.resource_version = Some(self.next_resource_version());
                entry.data["metadata"] = serde_json::to_value(&entry.metadata)?;
                let marked = entry.data.clone();
                self.notify(gvr, namespace, WatchEvent::Modified(marked.clone()));
                debug!("Marked object for deletion: {}/{}", namespace, name);
                return Ok(marked);
            }
            return Ok(entry.data.clone());
        }

        let removed = ns_objects
            .remove(name)
            .ok_or_else(|| not_found(gvr, namespace, name))?;
        self.notify(gvr, namespace, WatchEvent::Deleted(removed.data.clone()));

        debug!("Deleted object: {}/{}", namespace, name);
        Ok(removed.data)
    }

    /// Delete every object in `namespace` (all namespaces when `None`) whose
    /// labels match `label_selector`.
    ///
    /// Deletion continues past individual failures; the first failure is
    /// returned after the sweep and successful deletions are not rolled back.
    pub fn delete_collection(
        &self,
        gvr: &GVR,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        trace!("Deleting collection: {:?} in namespace: {:?}", gvr, namespace);

        let candidates = filter_by_labels(self.list(gvr, namespace)?, label_selector)?;
        delete_each(candidates, |ns, name| self.delete(gvr, ns, name))
    }

    pub fn list(&self, gvr: &GVR, namespace: Option<&str>) -> Result<Vec<Value>> {
        trace!("Listing objects: {:?} in namespace: {:?}", gvr, namespace);

        let objects = read(&self.objects);
        Ok(snapshot(&objects, gvr, namespace))
    }

    /// Kind of the objects stored under `gvr`, if any have been stored.
    pub fn kind_of(&self, gvr: &GVR) -> Option<GVK> {
        let objects = read(&self.objects);
        objects
            .get(gvr)?
            .values()
            .flat_map(|by_name| by_name.values())
            .map(|s| s.gvk.clone())
            .next()
    }

    /// Subscribe to changes of `gvr` in `namespace` (all namespaces when `None`).
    pub fn watch(&self, gvr: &GVR, namespace: Option<&str>) -> RawEventStream {
        trace!("Watching objects: {:?} in namespace: {:?}", gvr, namespace);

        let key = (gvr.clone(), namespace.unwrap_or_default().to_string());
        lock(&self.watchers).entry(key).or_default().subscribe()
    }

    /// Snapshot the current objects and subscribe in one step, so no write
    /// lands between the snapshot and the first event.
    pub fn list_and_watch(
        &self,
        gvr: &GVR,
        namespace: Option<&str>,
    ) -> (Vec<Value>, RawEventStream) {
        let objects = read(&self.objects);
        let items = snapshot(&objects, gvr, namespace);
        let events = self.watch(gvr, namespace);
        (items, events)
    }

    fn notify(&self, gvr: &GVR, namespace: &str, event: WatchEvent<Value>) {
        let watchers = lock(&self.watchers);
        if let Some(watcher) = watchers.get(&(gvr.clone(), namespace.to_string())) {
            watcher.send(event.clone());
        }
        if !namespace.is_empty() {
            if let Some(watcher) = watchers.get(&(gvr.clone(), String::new())) {
                watcher.send(event);
            }
        }
    }
}

impl Default for ObjectTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep objects whose labels satisfy `selector`; no selector keeps everything.
pub fn filter_by_labels(objects: Vec<Value>, selector: Option<&str>) -> Result<Vec<Value>> {
    let Some(selector) = selector.filter(|s| !s.trim().is_empty()) else {
        return Ok(objects);
    };
    let parsed = label_selector::parse_label_selector(selector).map_err(Error::Invalid)?;
    Ok(objects
        .into_iter()
        .filter(|obj| label_selector::selector_matches(&parsed, &object_labels(obj)))
        .collect())
}

/// Run `delete` for every object, continuing past failures.
///
/// Returns the deleted objects, or the first failure once every object has
/// been attempted. Earlier successes stay deleted.
pub(crate) fn delete_each<F>(objects: Vec<Value>, mut delete: F) -> Result<Vec<Value>>
where
    F: FnMut(&str, &str) -> Result<Value>,
{
    let mut deleted = Vec::new();
    let mut first_error = None;
    for object in objects {
        let meta = extract_metadata(&object)?;
        let name = meta.name.unwrap_or_default();
        let ns = meta.namespace.unwrap_or_default();
        match delete(&ns, &name) {
            Ok(value) => deleted.push(value),
            Err(e) => {
                debug!("Failed to delete {}/{} from collection: {}", ns, name, e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(deleted),
    }
}

fn snapshot(objects: &ObjectStorage, gvr: &GVR, namespace: Option<&str>) -> Vec<Value> {
    let Some(gvr_objects) = objects.get(gvr) else {
        return Vec::new();
    };
    match namespace {
        Some(ns) => gvr_objects
            .get(ns)
            .map(|by_name| by_name.values().map(|s| s.data.clone()).collect())
            .unwrap_or_default(),
        None => gvr_objects
            .values()
            .flat_map(|by_name| by_name.values().map(|s| s.data.clone()))
            .collect(),
    }
}

fn stored(object: &Value, gvk: &GVK, metadata: ObjectMeta) -> StoredObject {
    StoredObject {
        data: object.clone(),
        gvk: gvk.clone(),
        metadata,
    }
}

fn require_name(meta: &ObjectMeta) -> Result<String> {
    meta.name
        .clone()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::Invalid("Object name is required".to_string()))
}

fn not_found(gvr: &GVR, namespace: &str, name: &str) -> Error {
    Error::NotFound {
        kind: gvr.resource.clone(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}
