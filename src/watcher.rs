//! Controllable watch event source for fakes

use crate::label_selector::selector_matches;
use crate::utils::{lock, object_labels};
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::{self, BoxStream, StreamExt};
use kube::api::WatchEvent;
use kube::core::{ErrorResponse, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// An untyped watch event as stored by the tracker.
pub type RawEvent = WatchEvent<Value>;

/// Stream of untyped watch events; ends when the producer stops.
pub type RawEventStream = BoxStream<'static, RawEvent>;

#[derive(Default)]
struct WatcherState {
    subscribers: Vec<UnboundedSender<RawEvent>>,
    stopped: bool,
}

/// Fan-out event producer with any number of subscribers.
///
/// Each call to [`FakeWatcher::subscribe`] returns an independent stream that
/// sees every event sent afterwards. Dropping a stream unsubscribes it; the
/// sender is pruned on the next send.
///
/// ```
/// use futures::StreamExt;
/// use kube::api::WatchEvent;
/// use longhorn_engine_client::FakeWatcher;
///
/// # #[tokio::main]
/// # async fn main() {
/// let watcher = FakeWatcher::new();
/// let mut events = watcher.subscribe();
/// watcher.add(serde_json::json!({"metadata": {"name": "e1"}}));
/// watcher.stop();
///
/// assert!(matches!(events.next().await, Some(WatchEvent::Added(_))));
/// assert!(events.next().await.is_none());
/// # }
/// ```
#[derive(Clone, Default)]
pub struct FakeWatcher {
    state: Arc<Mutex<WatcherState>>,
}

impl FakeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> RawEventStream {
        let mut state = lock(&self.state);
        if state.stopped {
            return stream::empty().boxed();
        }
        let (tx, rx) = unbounded();
        state.subscribers.push(tx);
        rx.boxed()
    }

    pub fn add(&self, object: Value) {
        self.send(WatchEvent::Added(object));
    }

    pub fn modify(&self, object: Value) {
        self.send(WatchEvent::Modified(object));
    }

    pub fn delete(&self, object: Value) {
        self.send(WatchEvent::Deleted(object));
    }

    pub fn error(&self, status: ErrorResponse) {
        self.send(WatchEvent::Error(status));
    }

    pub fn send(&self, event: RawEvent) {
        let mut state = lock(&self.state);
        if state.stopped {
            return;
        }
        state
            .subscribers
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
        trace!("Delivered watch event to {} subscribers", state.subscribers.len());
    }

    /// End every subscribed stream. Later subscriptions are empty.
    pub fn stop(&self) {
        let mut state = lock(&self.state);
        state.stopped = true;
        state.subscribers.clear();
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.state).stopped
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        let mut state = lock(&self.state);
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }
}

/// Narrows raw events to the objects a label selector admits.
///
/// An object whose labels stop matching is reported as DELETED and one that
/// starts matching as ADDED. Match state is learned from [`seed`](Self::seed)
/// and from the events themselves; an object seen for the first time in a
/// MODIFIED event is assumed unchanged in its match state.
pub(crate) struct SelectorFilter {
    selector: Option<Selector>,
    matched: HashMap<(String, String), bool>,
}

impl SelectorFilter {
    pub(crate) fn new(selector: Option<Selector>) -> Self {
        Self {
            selector,
            matched: HashMap::new(),
        }
    }

    /// Record whether each of `objects` matches, without emitting anything.
    pub(crate) fn seed<'a>(&mut self, objects: impl IntoIterator<Item = &'a Value>) {
        let Some(selector) = &self.selector else {
            return;
        };
        for object in objects {
            let matches = selector_matches(selector, &object_labels(object));
            self.matched.insert(object_key(object), matches);
        }
    }

    pub(crate) fn apply(&mut self, event: RawEvent) -> Option<RawEvent> {
        let Some(selector) = &self.selector else {
            return Some(event);
        };

        match event {
            WatchEvent::Added(object) => {
                let now = selector_matches(selector, &object_labels(&object));
                self.matched.insert(object_key(&object), now);
                now.then_some(WatchEvent::Added(object))
            }
            WatchEvent::Modified(object) => {
                let now = selector_matches(selector, &object_labels(&object));
                let before = self.matched.insert(object_key(&object), now).unwrap_or(now);
                match (before, now) {
                    (true, true) => Some(WatchEvent::Modified(object)),
                    (false, true) => Some(WatchEvent::Added(object)),
                    (true, false) => Some(WatchEvent::Deleted(object)),
                    (false, false) => None,
                }
            }
            WatchEvent::Deleted(object) => {
                let now = selector_matches(selector, &object_labels(&object));
                let before = self.matched.remove(&object_key(&object)).unwrap_or(now);
                before.then_some(WatchEvent::Deleted(object))
            }
            other => Some(other),
        }
    }
}

fn object_key(object: &Value) -> (String, String) {
    let field = |name: &str| {
        object["metadata"][name]
            .as_str()
            .unwrap_or_default()
            .to_string()
    };
    (field("namespace"), field("name"))
}
