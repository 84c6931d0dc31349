//! Object Store
//!
//! Registry of live entities, indexed by business key and by numeric id, with
//! a separate insertion-ordered list used for migration and encoding.
//!
//! Every insert and delete publishes a `{target: "store"}` change to the
//! store's observers after the store lock has been released. Access point
//! membership changes are additionally reported to the [`DeviceLifecycle`]
//! hook wired by [`ObjectStore::initialize`].

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::entity::{EntityId, EntityRef};
use crate::pubsub::{Change, ChangeKind, Publisher, Subscriber};

// ─────────────────────────────────────────────────────────────────────────────
// Device Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Reaction to access points entering or leaving the store
///
/// Implementations typically start and stop a live device session.
pub trait DeviceLifecycle: Send + Sync {
    fn device_added(&self, id: EntityId);
    fn device_removed(&self, id: EntityId);
}

/// Lifecycle hook that only logs
#[derive(Debug, Default)]
pub struct LoggingLifecycle;

impl DeviceLifecycle for LoggingLifecycle {
    fn device_added(&self, id: EntityId) {
        info!(%id, "create device session");
    }

    fn device_removed(&self, id: EntityId) {
        info!(%id, "destroy device session");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object Store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Indexes {
    by_key: BTreeMap<String, EntityRef>,
    id_to_key: BTreeMap<EntityId, String>,
    ordered: Vec<EntityRef>,
}

/// Registry of live entities
///
/// Created once at the composition root and passed by reference to every
/// component that needs it.
pub struct ObjectStore {
    this: Weak<ObjectStore>,
    indexes: RwLock<Indexes>,
    publisher: Publisher,
    lifecycle: RwLock<Option<Arc<dyn DeviceLifecycle>>>,
}

impl ObjectStore {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| ObjectStore {
            this: this.clone(),
            indexes: RwLock::new(Indexes::default()),
            publisher: Publisher::new(),
            lifecycle: RwLock::new(None),
        })
    }

    /// Wire the hook notified about access point additions and removals
    pub fn initialize(&self, lifecycle: Arc<dyn DeviceLifecycle>) {
        *self.lifecycle.write() = Some(lifecycle);
        debug!("object store initialized");
    }

    /// Publisher of `{target: "store"}` add/delete changes
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn subscribe(&self, subscriber: Weak<dyn Subscriber>) {
        self.publisher.subscribe(subscriber);
    }

    pub fn unsubscribe(&self, subscriber: &Weak<dyn Subscriber>) -> bool {
        self.publisher.unsubscribe(subscriber)
    }

    fn as_subscriber(&self) -> Weak<dyn Subscriber> {
        let this: Weak<ObjectStore> = self.this.clone();
        this
    }

    /// Register an entity under its business key
    ///
    /// Any entity already stored under the key, or under the entity's id, is
    /// deleted first, so re-inserting fires a Delete followed by an Add.
    pub fn insert(&self, entity: EntityRef) {
        let key = entity.key();
        self.delete(&key);
        self.delete_by_id(entity.id());

        {
            let mut indexes = self.indexes.write();
            indexes.by_key.insert(key.clone(), entity.clone());
            indexes.id_to_key.insert(entity.id(), key.clone());
            indexes.ordered.push(entity.clone());
        }
        entity.publisher().subscribe(self.as_subscriber());
        debug!(%key, id = %entity.id(), kind = %entity.kind(), "entity inserted");

        self.publish(ChangeKind::Add, entity.id());
    }

    /// Remove the entity stored under `key`
    pub fn delete(&self, key: &str) -> bool {
        let removed = {
            let mut indexes = self.indexes.write();
            indexes.by_key.remove(key).inspect(|entity| {
                indexes.id_to_key.remove(&entity.id());
                indexes.ordered.retain(|e| !Arc::ptr_eq(e, entity));
            })
        };
        self.finish_delete(removed)
    }

    /// Remove the entity stored under `id`
    pub fn delete_by_id(&self, id: EntityId) -> bool {
        let removed = {
            let mut indexes = self.indexes.write();
            indexes
                .id_to_key
                .remove(&id)
                .and_then(|key| indexes.by_key.remove(&key))
                .inspect(|entity| indexes.ordered.retain(|e| !Arc::ptr_eq(e, entity)))
        };
        self.finish_delete(removed)
    }

    fn finish_delete(&self, removed: Option<EntityRef>) -> bool {
        let Some(entity) = removed else {
            return false;
        };
        entity.publisher().unsubscribe(&self.as_subscriber());
        debug!(key = %entity.key(), id = %entity.id(), "entity deleted");
        self.publish(ChangeKind::Delete, entity.id());
        true
    }

    fn publish(&self, kind: ChangeKind, id: EntityId) {
        if id.is_access_point() {
            let lifecycle = self.lifecycle.read().clone();
            if let Some(lifecycle) = lifecycle {
                match kind {
                    ChangeKind::Add => lifecycle.device_added(id),
                    ChangeKind::Delete => lifecycle.device_removed(id),
                    ChangeKind::Update => {}
                }
            }
        }
        self.publisher.notify(&Change::store(kind, id));
    }

    pub fn find(&self, key: &str) -> Option<EntityRef> {
        self.indexes.read().by_key.get(key).cloned()
    }

    pub fn find_by_id(&self, id: EntityId) -> Option<EntityRef> {
        let indexes = self.indexes.read();
        indexes
            .id_to_key
            .get(&id)
            .and_then(|key| indexes.by_key.get(key))
            .cloned()
    }

    /// All entities in key order
    pub fn list(&self) -> Vec<EntityRef> {
        self.indexes.read().by_key.values().cloned().collect()
    }

    /// All entities in insertion order
    pub fn ordered(&self) -> Vec<EntityRef> {
        self.indexes.read().ordered.clone()
    }

    /// Forget the insertion order without removing any entity
    pub fn clear_ordered(&self) {
        self.indexes.write().ordered.clear();
    }

    pub fn len(&self) -> usize {
        self.indexes.read().by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human readable rendering of both indexes and every entity
    pub fn dump(&self) -> String {
        let indexes = self.indexes.read();
        let mut out = String::new();

        let _ = writeln!(out, "key index ({}):", indexes.by_key.len());
        for (key, entity) in &indexes.by_key {
            let _ = writeln!(out, "  {key} -> {}", entity.id());
        }
        let _ = writeln!(out, "id index ({}):", indexes.id_to_key.len());
        for (id, key) in &indexes.id_to_key {
            let _ = writeln!(out, "  {id} -> {key}");
        }
        let _ = writeln!(out, "ordered ({}):", indexes.ordered.len());
        for entity in &indexes.ordered {
            let _ = write!(out, "{entity}");
        }
        out
    }
}

impl Subscriber for ObjectStore {
    fn on_change(&self, change: &Change) {
        debug!(field = %change.target, id = %change.id, "entity updated");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use shim_types::{EntityKind, SchemaVersion};

    use super::*;
    use crate::entity::Entity;
    use crate::pubsub::tests::{Recorder, weak};

    fn site(name: &str) -> EntityRef {
        let site = Entity::create(EntityKind::Site, SchemaVersion::V1).unwrap();
        site.set("name", name).unwrap();
        site
    }

    fn access_point(fcc_id: &str, serial: &str) -> EntityRef {
        let ap = Entity::create(EntityKind::AccessPoint, SchemaVersion::V1).unwrap();
        ap.set("fcc_id", fcc_id).unwrap();
        ap.set("serial_number", serial).unwrap();
        ap
    }

    #[derive(Default)]
    struct CountingLifecycle {
        events: Mutex<Vec<(bool, EntityId)>>,
    }

    impl DeviceLifecycle for CountingLifecycle {
        fn device_added(&self, id: EntityId) {
            self.events.lock().push((true, id));
        }

        fn device_removed(&self, id: EntityId) {
            self.events.lock().push((false, id));
        }
    }

    #[test]
    fn test_insert_and_find() {
        let store = ObjectStore::new();
        let a = site("A");
        store.insert(a.clone());

        assert_eq!(store.len(), 1);
        assert!(Arc::ptr_eq(&store.find("A").unwrap(), &a));
        assert!(Arc::ptr_eq(&store.find_by_id(a.id()).unwrap(), &a));
        assert!(store.find("B").is_none());
        assert!(a.publisher().is_subscribed(&store.as_subscriber()));
    }

    #[test]
    fn test_reinsert_replaces_with_delete_then_add() {
        let store = ObjectStore::new();
        let recorder = Arc::new(Recorder::default());
        store.subscribe(weak(&recorder));

        let first = site("A");
        let second = site("A");
        store.insert(first.clone());
        store.insert(second.clone());

        assert!(Arc::ptr_eq(&store.find("A").unwrap(), &second));
        assert!(store.find_by_id(first.id()).is_none());
        assert_eq!(store.len(), 1);

        let changes = recorder.changes();
        assert_eq!(
            changes,
            vec![
                Change::store(ChangeKind::Add, first.id()),
                Change::store(ChangeKind::Delete, first.id()),
                Change::store(ChangeKind::Add, second.id()),
            ]
        );
    }

    #[test]
    fn test_delete_by_key_and_id() {
        let store = ObjectStore::new();
        let a = site("A");
        let b = site("B");
        store.insert(a.clone());
        store.insert(b.clone());

        assert!(store.delete("A"));
        assert!(!store.delete("A"));
        assert!(store.delete_by_id(b.id()));
        assert!(!store.delete_by_id(b.id()));
        assert!(store.is_empty());
        assert!(store.ordered().is_empty());
        assert!(!a.publisher().is_subscribed(&store.as_subscriber()));
    }

    #[test]
    fn test_ordered_keeps_insertion_order() {
        let store = ObjectStore::new();
        for name in ["c", "a", "b"] {
            store.insert(site(name));
        }
        let ordered: Vec<_> = store.ordered().iter().map(|e| e.key()).collect();
        assert_eq!(ordered, vec!["c", "a", "b"]);
        let listed: Vec<_> = store.list().iter().map(|e| e.key()).collect();
        assert_eq!(listed, vec!["a", "b", "c"]);

        store.clear_ordered();
        assert!(store.ordered().is_empty());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_lifecycle_sees_access_points_only() {
        let store = ObjectStore::new();
        let lifecycle = Arc::new(CountingLifecycle::default());
        store.initialize(lifecycle.clone());

        let ap = access_point("fcc1", "serial1");
        store.insert(site("A"));
        store.insert(ap.clone());
        store.delete("fcc1:serial1");

        assert_eq!(*lifecycle.events.lock(), vec![(true, ap.id()), (false, ap.id())]);
    }

    #[test]
    fn test_dump_lists_indexes() {
        let store = ObjectStore::new();
        let a = site("A");
        store.insert(a.clone());
        let dump = store.dump();
        assert!(dump.contains("key index (1):"));
        assert!(dump.contains(&format!("{} -> A", a.id())));
        assert!(dump.contains("site#"));
    }
}
