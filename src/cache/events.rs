//! View change notifications.
//!
//! Subscribers register a handler per view key. After every state change the
//! engine renders a fresh snapshot of each affected view and delivers it with
//! a change event. Handlers run after the state lock has been released.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use super::keys::ViewKey;
use super::lock::mutex_lock;
use super::snapshot::ViewSnapshot;

const SOURCE: &str = "cache::events";

/// Monotonic epoch ordering deliveries within this process.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeCause {
    /// A fetched page was merged.
    Merged,
    /// A fetch failed and the error is now sticky on the view.
    Failed,
    /// A mutation patched the view.
    Patched,
    /// A failed mutation was undone.
    RolledBack,
    /// The view was cleared for a refetch.
    Reset,
}

impl ChangeCause {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeCause::Merged => "merged",
            ChangeCause::Failed => "failed",
            ChangeCause::Patched => "patched",
            ChangeCause::RolledBack => "rolled_back",
            ChangeCause::Reset => "reset",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub epoch: Epoch,
    pub key: ViewKey,
    pub cause: ChangeCause,
}

pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent, &ViewSnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Default)]
struct Registrations {
    by_key: HashMap<ViewKey, Vec<(SubscriptionId, ChangeHandler)>>,
    by_id: HashMap<SubscriptionId, ViewKey>,
}

pub struct Subscribers {
    registrations: Mutex<Registrations>,
    next_id: AtomicU64,
    epoch_counter: AtomicU64,
}

impl Subscribers {
    pub fn new() -> Self {
        Self {
            registrations: Mutex::new(Registrations::default()),
            next_id: AtomicU64::new(1),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self, key: ViewKey, handler: ChangeHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut registrations = mutex_lock(&self.registrations, SOURCE, "subscribe");
        registrations
            .by_key
            .entry(key.clone())
            .or_default()
            .push((id, handler));
        registrations.by_id.insert(id, key);
        id
    }

    /// Remove a subscription. Returns its view and how many subscribers that
    /// view has left, or `None` for an unknown id.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Option<(ViewKey, usize)> {
        let mut registrations = mutex_lock(&self.registrations, SOURCE, "unsubscribe");
        let key = registrations.by_id.remove(&id)?;
        let remaining = match registrations.by_key.get_mut(&key) {
            Some(handlers) => {
                handlers.retain(|(existing, _)| *existing != id);
                handlers.len()
            }
            None => 0,
        };
        if remaining == 0 {
            registrations.by_key.remove(&key);
        }
        Some((key, remaining))
    }

    pub fn count(&self, key: &ViewKey) -> usize {
        mutex_lock(&self.registrations, SOURCE, "count")
            .by_key
            .get(key)
            .map_or(0, Vec::len)
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Invoke every handler registered for the snapshot's view.
    pub fn deliver(&self, cause: ChangeCause, snapshot: &ViewSnapshot) {
        let handlers: Vec<ChangeHandler> = mutex_lock(&self.registrations, SOURCE, "deliver")
            .by_key
            .get(&snapshot.key)
            .map(|handlers| handlers.iter().map(|(_, handler)| handler.clone()).collect())
            .unwrap_or_default();
        if handlers.is_empty() {
            return;
        }

        let event = ChangeEvent {
            epoch: self.next_epoch(),
            key: snapshot.key.clone(),
            cause,
        };
        debug!(
            event_epoch = event.epoch,
            view = %event.key,
            cause = cause.as_str(),
            subscribers = handlers.len(),
            "View change delivered"
        );
        for handler in handlers {
            handler(&event, snapshot);
        }
    }
}

impl Default for Subscribers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::cache::snapshot::SnapshotContent;

    fn snapshot(key: ViewKey) -> ViewSnapshot {
        ViewSnapshot {
            key,
            content: SnapshotContent::Posts(Vec::new()),
            loaded: true,
            has_more: false,
            total: None,
            stale: false,
            error: None,
        }
    }

    #[test]
    fn delivers_only_to_matching_view() {
        let subscribers = Subscribers::new();
        let home_calls = Arc::new(AtomicUsize::new(0));
        let favorite_calls = Arc::new(AtomicUsize::new(0));

        let counter = home_calls.clone();
        subscribers.subscribe(
            ViewKey::HomeFeed,
            Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let counter = favorite_calls.clone();
        subscribers.subscribe(
            ViewKey::Favorites,
            Arc::new(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        subscribers.deliver(ChangeCause::Patched, &snapshot(ViewKey::HomeFeed));
        assert_eq!(home_calls.load(Ordering::SeqCst), 1);
        assert_eq!(favorite_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_reports_remaining() {
        let subscribers = Subscribers::new();
        let first = subscribers.subscribe(ViewKey::Favorites, Arc::new(|_, _| {}));
        let second = subscribers.subscribe(ViewKey::Favorites, Arc::new(|_, _| {}));
        assert_eq!(subscribers.count(&ViewKey::Favorites), 2);

        assert_eq!(
            subscribers.unsubscribe(first),
            Some((ViewKey::Favorites, 1))
        );
        assert_eq!(
            subscribers.unsubscribe(second),
            Some((ViewKey::Favorites, 0))
        );
        assert_eq!(subscribers.unsubscribe(second), None);
    }

    #[test]
    fn epochs_increase_across_deliveries() {
        let subscribers = Subscribers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subscribers.subscribe(
            ViewKey::HomeFeed,
            Arc::new(move |event, _| {
                if let Ok(mut epochs) = sink.lock() {
                    epochs.push(event.epoch);
                }
            }),
        );

        subscribers.deliver(ChangeCause::Merged, &snapshot(ViewKey::HomeFeed));
        subscribers.deliver(ChangeCause::Patched, &snapshot(ViewKey::HomeFeed));

        let epochs = seen.lock().map(|epochs| epochs.clone()).unwrap_or_default();
        assert_eq!(epochs.len(), 2);
        assert!(epochs[0] < epochs[1]);
    }

    #[test]
    fn subscribers_recover_from_poisoned_lock() {
        let subscribers = Arc::new(Subscribers::new());
        let clone = subscribers.clone();
        let _ = std::thread::spawn(move || {
            let _guard = clone.registrations.lock().unwrap();
            panic!("poison");
        })
        .join();

        subscribers.subscribe(ViewKey::HomeFeed, Arc::new(|_, _| {}));
        assert_eq!(subscribers.count(&ViewKey::HomeFeed), 1);
    }
}
