//! Shared view cache.
//!
//! Wraps the engine state and its subscribers. All writes happen under one
//! write guard; snapshots of affected views are rendered afterwards and
//! handed to subscribers once the guard is gone.

use std::collections::HashSet;

use tracing::debug;

use super::events::{ChangeCause, ChangeHandler, SubscriptionId, Subscribers};
use super::journal::PatchJournal;
use super::keys::ViewKey;
use super::lock::StateCell;
use super::snapshot::ViewSnapshot;
use super::state::CacheState;

const SOURCE: &str = "cache::view_cache";

pub struct ViewCache {
    state: StateCell<CacheState>,
    subscribers: Subscribers,
}

impl ViewCache {
    pub fn new() -> Self {
        Self {
            state: StateCell::new(CacheState::new(), SOURCE),
            subscribers: Subscribers::new(),
        }
    }

    /// Register `handler` for `key`, creating the accumulator if needed.
    /// Returns the subscription and the view as it stands now.
    pub fn subscribe(
        &self,
        key: ViewKey,
        handler: ChangeHandler,
    ) -> (SubscriptionId, ViewSnapshot) {
        let snapshot = {
            let mut guard = self.state.write("subscribe");
            let state = &mut *guard;
            state.views.ensure(&key);
            state.views.reindex(&key);
            let entry = state.views.ensure(&key);
            ViewSnapshot::render(&key, entry, &state.store)
        };
        let id = self.subscribers.subscribe(key.clone(), handler);
        debug!(subscription = %id, view = %key, "View subscribed");
        (id, snapshot)
    }

    /// Remove a subscription. Views that are not retained lose their
    /// accumulator with their last subscriber.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Some((key, remaining)) = self.subscribers.unsubscribe(id) else {
            return false;
        };
        if remaining == 0 && !key.retain_when_unused() {
            self.state.write("unsubscribe").views.discard(&key);
            debug!(view = %key, "Unused view discarded");
        }
        true
    }

    pub fn subscriber_count(&self, key: &ViewKey) -> usize {
        self.subscribers.count(key)
    }

    pub fn snapshot(&self, key: &ViewKey) -> Option<ViewSnapshot> {
        render(&self.state.read("snapshot"), key)
    }

    pub fn read<R>(&self, op: &'static str, f: impl FnOnce(&CacheState) -> R) -> R {
        f(&self.state.read(op))
    }

    /// Run `f` under the write guard and notify every view it reports.
    pub fn update<R>(
        &self,
        op: &'static str,
        cause: ChangeCause,
        f: impl FnOnce(&mut CacheState) -> (R, HashSet<ViewKey>),
    ) -> R {
        let (result, touched) = f(&mut self.state.write(op));
        self.publish(cause, touched);
        result
    }

    /// Apply a group of journaled patches atomically and notify the views
    /// they touched. The journal is returned for a later rollback.
    pub fn transact<R>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut CacheState, &mut PatchJournal) -> R,
    ) -> (R, PatchJournal) {
        let mut journal = PatchJournal::new();
        let result = f(&mut self.state.write(op), &mut journal);
        self.publish(ChangeCause::Patched, journal.touched().clone());
        (result, journal)
    }

    /// Undo a journal atomically and notify the views it touched.
    pub fn rollback(&self, journal: PatchJournal) {
        let touched = journal.rollback(&mut self.state.write("rollback"));
        self.publish(ChangeCause::RolledBack, touched);
    }

    fn publish(&self, cause: ChangeCause, keys: HashSet<ViewKey>) {
        let snapshots: Vec<ViewSnapshot> = {
            let state = self.state.read("publish");
            keys.iter()
                .filter(|key| self.subscribers.count(key) > 0)
                .filter_map(|key| render(&state, key))
                .collect()
        };
        for snapshot in &snapshots {
            self.subscribers.deliver(cause, snapshot);
        }
    }
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new()
    }
}

fn render(state: &CacheState, key: &ViewKey) -> Option<ViewSnapshot> {
    state
        .views
        .get(key)
        .map(|entry| ViewSnapshot::render(key, entry, &state.store))
}
