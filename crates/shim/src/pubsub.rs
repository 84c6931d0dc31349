//! Change Notifications
//!
//! A minimal synchronous publisher/subscriber pair. Every entity owns a
//! [`Publisher`] that fires on each field mutation, and the object store owns
//! one that fires whenever an entity is added or removed.
//!
//! Dispatch is a plain fan-out on the calling thread. Handlers must not
//! subscribe, unsubscribe or mutate the store they are observing from inside
//! [`Subscriber::on_change`]; the subscriber list is snapshotted before
//! dispatch, so such changes only take effect for later notifications and
//! store mutations would re-enter the dispatch in progress.

use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::trace;

use crate::entity::EntityId;

// ─────────────────────────────────────────────────────────────────────────────
// Change
// ─────────────────────────────────────────────────────────────────────────────

/// What happened to the notifying object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Delete,
    Update,
}

/// A single change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    /// Mutated field name, or `"store"` for store membership changes
    pub target: String,
    pub kind: ChangeKind,
    pub id: EntityId,
}

impl Change {
    /// Target used by the object store for add/delete notifications
    pub const STORE: &'static str = "store";

    pub fn new(target: impl Into<String>, kind: ChangeKind, id: EntityId) -> Self {
        Self {
            target: target.into(),
            kind,
            id,
        }
    }

    pub fn store(kind: ChangeKind, id: EntityId) -> Self {
        Self::new(Self::STORE, kind, id)
    }

    pub fn update(field: &str, id: EntityId) -> Self {
        Self::new(field, ChangeKind::Update, id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscriber
// ─────────────────────────────────────────────────────────────────────────────

/// Receiver of change notifications
pub trait Subscriber: Send + Sync {
    fn on_change(&self, change: &Change);
}

// ─────────────────────────────────────────────────────────────────────────────
// Publisher
// ─────────────────────────────────────────────────────────────────────────────

/// Ordered list of weakly held subscribers plus a one-shot suppression flag
///
/// Subscribers are held weakly so a publisher never keeps its observers
/// alive; dropped subscribers are skipped and pruned on the next subscribe.
pub struct Publisher {
    enabled: AtomicBool,
    subscribers: RwLock<Vec<Weak<dyn Subscriber>>>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Append a subscriber; an already registered one moves to the end
    pub fn subscribe(&self, subscriber: Weak<dyn Subscriber>) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|s| s.strong_count() > 0 && !same(s, &subscriber));
        subscribers.push(subscriber);
    }

    /// Remove a subscriber, returning whether it was registered
    pub fn unsubscribe(&self, subscriber: &Weak<dyn Subscriber>) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|s| !same(s, subscriber));
        subscribers.len() != before
    }

    pub fn is_subscribed(&self, subscriber: &Weak<dyn Subscriber>) -> bool {
        self.subscribers.read().iter().any(|s| same(s, subscriber))
    }

    /// Number of live subscribers
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|s| s.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disabling suppresses exactly the next notification
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Deliver `change` to every subscriber in registration order
    ///
    /// Nothing is delivered while disabled. The flag is re-enabled afterwards
    /// either way.
    pub fn notify(&self, change: &Change) {
        if self.is_enabled() {
            let subscribers: Vec<_> = self
                .subscribers
                .read()
                .iter()
                .filter_map(Weak::upgrade)
                .collect();
            trace!(target_field = %change.target, kind = ?change.kind, id = %change.id, subscribers = subscribers.len(), "notify");
            for subscriber in subscribers {
                subscriber.on_change(change);
            }
        } else {
            trace!(target_field = %change.target, id = %change.id, "notification suppressed");
        }
        self.enabled.store(true, Ordering::Release);
    }
}

fn same(a: &Weak<dyn Subscriber>, b: &Weak<dyn Subscriber>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Subscriber that records every change it receives
    #[derive(Default)]
    pub(crate) struct Recorder {
        pub(crate) name: &'static str,
        pub(crate) log: Arc<Mutex<Vec<(&'static str, Change)>>>,
    }

    impl Recorder {
        pub(crate) fn changes(&self) -> Vec<Change> {
            self.log.lock().iter().map(|(_, c)| c.clone()).collect()
        }
    }

    impl Subscriber for Recorder {
        fn on_change(&self, change: &Change) {
            self.log.lock().push((self.name, change.clone()));
        }
    }

    pub(crate) fn weak(recorder: &Arc<Recorder>) -> Weak<dyn Subscriber> {
        let weak: Weak<Recorder> = Arc::downgrade(recorder);
        weak
    }

    fn id() -> EntityId {
        EntityId::from_raw(7)
    }

    #[test]
    fn test_notify_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::new(Recorder { name: "a", log: log.clone() });
        let b = Arc::new(Recorder { name: "b", log: log.clone() });

        let publisher = Publisher::new();
        publisher.subscribe(weak(&a));
        publisher.subscribe(weak(&b));
        publisher.notify(&Change::update("name", id()));

        let order: Vec<_> = log.lock().iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_resubscribe_moves_to_end() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::new(Recorder { name: "a", log: log.clone() });
        let b = Arc::new(Recorder { name: "b", log: log.clone() });

        let publisher = Publisher::new();
        publisher.subscribe(weak(&a));
        publisher.subscribe(weak(&b));
        publisher.subscribe(weak(&a));
        assert_eq!(publisher.len(), 2);

        publisher.notify(&Change::update("name", id()));
        let order: Vec<_> = log.lock().iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_disable_suppresses_one_notification() {
        let recorder = Arc::new(Recorder::default());
        let publisher = Publisher::new();
        publisher.subscribe(weak(&recorder));

        publisher.set_enabled(false);
        publisher.notify(&Change::update("first", id()));
        assert!(publisher.is_enabled());
        publisher.notify(&Change::update("second", id()));

        let changes = recorder.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].target, "second");
    }

    #[test]
    fn test_unsubscribe_and_dropped_subscribers() {
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        let publisher = Publisher::new();
        publisher.subscribe(weak(&a));
        publisher.subscribe(weak(&b));

        assert!(publisher.unsubscribe(&weak(&a)));
        assert!(!publisher.unsubscribe(&weak(&a)));
        drop(b);
        assert!(publisher.is_empty());

        publisher.notify(&Change::store(ChangeKind::Add, id()));
        assert!(a.changes().is_empty());
    }
}
