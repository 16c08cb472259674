//! Action recorder and reactor chain shared by all fake clients of a session

use crate::action::Action;
use crate::reactor::{
    object_reaction, ReactionContext, Reactor, WatchReactionContext, WatchReactor,
};
use crate::tracker::ObjectTracker;
use crate::utils::lock;
use crate::watcher::RawEventStream;
use crate::Result;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Default)]
struct FakeState {
    actions: Vec<Action>,
    reactors: Vec<Reactor>,
    watch_reactors: Vec<WatchReactor>,
}

/// Records every invocation and answers it from the reactor chain, falling
/// back to the object tracker.
///
/// One lock covers the action history and the reactor chains and is held for
/// the whole invocation, including the reaction. Reactions therefore must not
/// call back into the same `Fake`; they get the tracker through their context
/// instead.
pub struct Fake {
    tracker: Arc<ObjectTracker>,
    state: Mutex<FakeState>,
}

impl Fake {
    pub fn new(tracker: Arc<ObjectTracker>) -> Self {
        Self {
            tracker,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn with_reactors(
        tracker: Arc<ObjectTracker>,
        reactors: Vec<Reactor>,
        watch_reactors: Vec<WatchReactor>,
    ) -> Self {
        Self {
            tracker,
            state: Mutex::new(FakeState {
                actions: Vec::new(),
                reactors,
                watch_reactors,
            }),
        }
    }

    pub fn tracker(&self) -> &Arc<ObjectTracker> {
        &self.tracker
    }

    /// Snapshot of the recorded actions in call order.
    pub fn actions(&self) -> Vec<Action> {
        lock(&self.state).actions.clone()
    }

    /// Run `reaction` before every reactor registered so far.
    pub fn prepend_reactor<F>(&self, verb: &str, resource: &str, reaction: F)
    where
        F: Fn(ReactionContext) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        lock(&self.state)
            .reactors
            .insert(0, Reactor::new(verb, resource, reaction));
    }

    /// Run `reaction` after every reactor registered so far, still ahead of
    /// the tracker.
    pub fn add_reactor<F>(&self, verb: &str, resource: &str, reaction: F)
    where
        F: Fn(ReactionContext) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        lock(&self.state)
            .reactors
            .push(Reactor::new(verb, resource, reaction));
    }

    pub fn prepend_watch_reactor<F>(&self, resource: &str, reaction: F)
    where
        F: Fn(WatchReactionContext) -> Result<Option<RawEventStream>> + Send + Sync + 'static,
    {
        lock(&self.state)
            .watch_reactors
            .insert(0, WatchReactor::new(resource, reaction));
    }

    /// Record `action` and produce its result.
    pub fn invokes(&self, action: Action) -> Result<Value> {
        let mut state = lock(&self.state);
        debug!("Recorded action: {}", action);
        state.actions.push(action.clone());

        for reactor in state.reactors.iter().filter(|r| r.handles(&action)) {
            let ctx = ReactionContext {
                action: &action,
                tracker: &self.tracker,
            };
            if let Some(value) = (reactor.reaction)(ctx)? {
                return Ok(value);
            }
        }

        object_reaction(&self.tracker, &action)
    }

    /// Record a watch `action` and open its event stream.
    pub fn invokes_watch(&self, action: Action) -> Result<RawEventStream> {
        let mut state = lock(&self.state);
        debug!("Recorded action: {}", action);
        state.actions.push(action.clone());

        for reactor in state.watch_reactors.iter().filter(|r| r.handles(&action)) {
            let ctx = WatchReactionContext {
                action: &action,
                tracker: &self.tracker,
            };
            if let Some(events) = (reactor.reaction)(ctx)? {
                return Ok(events);
            }
        }

        let namespace = action.namespace.as_str();
        let scope = (!namespace.is_empty()).then_some(namespace);
        Ok(self.tracker.watch(&action.resource, scope))
    }
}
