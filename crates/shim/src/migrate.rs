//! Schema Migration
//!
//! Ports every live entity to another schema version without per-version
//! converters. The source and target schemas of a kind are diffed by field
//! name, and the values of fields present in both are copied as-is.
//!
//! A run stops at the first entity that fails. Entities migrated before the
//! failure stay migrated; nothing is rolled back.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use shim_types::{EntityKind, Schema, SchemaVersion};
use tracing::{debug, info, warn};

use crate::entity::{Entity, EntityRef, schema_for};
use crate::error::{Result, ShimError};
use crate::store::ObjectStore;

// ─────────────────────────────────────────────────────────────────────────────
// Schema Diff
// ─────────────────────────────────────────────────────────────────────────────

/// Classification of one field between two schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldChange {
    /// Only in the target
    Added,
    /// Only in the source
    Deleted,
    /// In both with a different descriptor
    Changed,
    /// In both with an identical descriptor
    Unchanged,
}

impl FieldChange {
    pub fn marker(&self) -> char {
        match self {
            FieldChange::Added => '+',
            FieldChange::Deleted => '-',
            FieldChange::Changed => '*',
            FieldChange::Unchanged => '=',
        }
    }
}

/// Field-by-field comparison of two schemas, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    pub added: Vec<&'static str>,
    pub deleted: Vec<&'static str>,
    pub changed: Vec<&'static str>,
    pub unchanged: Vec<&'static str>,
}

impl SchemaDiff {
    pub fn classify(&self, field: &str) -> Option<FieldChange> {
        [
            (&self.added, FieldChange::Added),
            (&self.deleted, FieldChange::Deleted),
            (&self.changed, FieldChange::Changed),
            (&self.unchanged, FieldChange::Unchanged),
        ]
        .into_iter()
        .find(|(names, _)| names.iter().any(|n| *n == field))
        .map(|(_, change)| change)
    }

    /// Fields whose values are carried over
    pub fn retained(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.unchanged.iter().chain(&self.changed).copied()
    }

    /// True when both schemas declare identical fields
    pub fn is_identity(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.changed.is_empty()
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups = [
            (FieldChange::Added, &self.added),
            (FieldChange::Deleted, &self.deleted),
            (FieldChange::Changed, &self.changed),
            (FieldChange::Unchanged, &self.unchanged),
        ];
        for (change, names) in groups {
            for name in names {
                writeln!(f, "{} {name}", change.marker())?;
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Report
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a completed migration run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub target: SchemaVersion,
    pub migrated: usize,
    pub by_kind: BTreeMap<EntityKind, usize>,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "migrated {} entities to {}", self.migrated, self.target)?;
        for (kind, count) in &self.by_kind {
            write!(f, ", {kind}: {count}")?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Migrator
// ─────────────────────────────────────────────────────────────────────────────

/// Replaces the entities of a store with equivalents of another version
pub struct Migrator {
    store: Arc<ObjectStore>,
}

impl Migrator {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    /// Compare two schemas by field name
    pub fn diff(source: &Schema, target: &Schema) -> SchemaDiff {
        let mut diff = SchemaDiff::default();
        for field in source.fields() {
            match target.meta(field.name) {
                None => diff.deleted.push(field.name),
                Some(meta) if *meta == field.meta => diff.unchanged.push(field.name),
                Some(_) => diff.changed.push(field.name),
            }
        }
        for field in target.fields() {
            if !source.contains(field.name) {
                diff.added.push(field.name);
            }
        }
        diff
    }

    /// Migrate every stored entity, in insertion order, to `target`
    pub fn migrate(&self, target: SchemaVersion) -> Result<MigrationReport> {
        let mut report = MigrationReport {
            target,
            migrated: 0,
            by_kind: BTreeMap::new(),
        };

        for source in self.store.ordered() {
            let key = source.key();
            let kind = source.id().kind();
            let ported = schema_for(kind, target)
                .ok_or(ShimError::UnsupportedVersion {
                    kind,
                    version: target,
                })
                .and_then(|schema| Self::port(&source, schema));
            let replacement = match ported {
                Ok(replacement) => replacement,
                Err(source_err) => {
                    warn!(%key, %kind, error = %source_err, "migration aborted");
                    return Err(ShimError::MigrationAborted {
                        key,
                        source: Box::new(source_err),
                    });
                }
            };

            self.store.delete_by_id(source.id());
            self.store.insert(replacement.clone());
            debug!(%key, %kind, from = %source.version(), to = %target, id = %replacement.id(), "entity migrated");

            report.migrated += 1;
            *report.by_kind.entry(kind).or_default() += 1;
        }

        info!(%report, "migration finished");
        Ok(report)
    }

    /// Build an entity bound to `target` carrying the retained values of `source`
    ///
    /// Changed fields must keep their runtime type; otherwise nothing is
    /// copied and [`ShimError::IncompatibleFieldType`] is returned. Fields
    /// only the target declares keep their initial value.
    pub fn port(source: &Entity, target: &'static Schema) -> Result<EntityRef> {
        let diff = Self::diff(source.schema(), target);
        for &name in &diff.changed {
            if let (Some(from), Some(to)) = (source.schema().meta(name), target.meta(name)) {
                if from.tag != to.tag {
                    return Err(ShimError::IncompatibleFieldType {
                        kind: target.kind(),
                        field: name,
                        from: from.tag,
                        to: to.tag,
                    });
                }
            }
        }

        let replacement = Entity::with_schema(target)?;
        for name in diff.retained() {
            if let Some(value) = source.get(name) {
                replacement.set(name, value)?;
            }
        }
        Ok(replacement)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use shim_types::{FieldSpec, Setting, TypeTag, Value};

    use super::*;
    use crate::mapper::TreeMapper;
    use crate::mapper::tests::SAMPLE;
    use crate::pubsub::tests::{Recorder, weak};
    use crate::pubsub::{Change, ChangeKind};

    fn leak(schema: Schema) -> &'static Schema {
        Box::leak(Box::new(schema))
    }

    fn loaded() -> (Arc<ObjectStore>, TreeMapper) {
        let store = ObjectStore::new();
        let mapper = TreeMapper::new(store.clone());
        mapper.decode(&Setting::parse_toml(SAMPLE).unwrap()).unwrap();
        (store, mapper)
    }

    #[test]
    fn test_access_point_diff() {
        let v1 = schema_for(EntityKind::AccessPoint, SchemaVersion::V1).unwrap();
        let v2 = schema_for(EntityKind::AccessPoint, SchemaVersion::V2).unwrap();
        let diff = Migrator::diff(v1, v2);

        assert_eq!(diff.added, vec!["key_password"]);
        assert_eq!(diff.deleted, vec!["key_passwd"]);
        assert_eq!(
            diff.changed,
            vec![
                "protected_header",
                "encoded_cpi_signed_data",
                "digital_signature",
                "ap_cert",
                "ap_key"
            ]
        );
        assert_eq!(diff.classify("fcc_id"), Some(FieldChange::Unchanged));
        assert_eq!(diff.classify("nope"), None);

        let site_v1 = schema_for(EntityKind::Site, SchemaVersion::V1).unwrap();
        let site_v2 = schema_for(EntityKind::Site, SchemaVersion::V2).unwrap();
        assert!(Migrator::diff(site_v1, site_v2).is_identity());
    }

    #[test]
    fn test_unchanged_fields_are_identical() {
        let (store, _) = loaded();
        let before = store.find("A").unwrap().fields();

        Migrator::new(store.clone()).migrate(SchemaVersion::V2).unwrap();

        let site = store.find("A").unwrap();
        assert_eq!(site.version(), SchemaVersion::V2);
        assert_eq!(site.fields(), before);
    }

    #[test]
    fn test_key_passwd_becomes_unset_key_password() {
        let (store, mapper) = loaded();
        let report = Migrator::new(store.clone()).migrate(SchemaVersion::V2).unwrap();
        assert_eq!(report.migrated, 4);
        assert_eq!(report.by_kind[&EntityKind::AccessPoint], 1);

        let ap = store.find("fcc1:serial1").unwrap();
        assert_eq!(ap.version(), SchemaVersion::V2);
        assert!(!ap.fields().contains_key("key_passwd"));
        assert!(!ap.is_set("key_password"));
        assert_eq!(ap.get("protected_header"), Some(Value::from("hdr")));
        assert_eq!(ap.get("site_name"), Some(Value::from("A")));

        // the unset field is written as an empty placeholder and reads back empty
        let tree = mapper.encode().unwrap();
        assert_eq!(tree.lookup("ver"), Some(&Setting::Int(2)));
        let ap_node = tree.lookup("sites.[0].buildings.[0].aps.[0]").unwrap();
        assert_eq!(ap_node.lookup("key_password"), Some(&Setting::String(String::new())));
        assert_eq!(ap_node.lookup("protected_header"), Some(&Setting::String("hdr".into())));
        assert!(!ap_node.exists("cpi_signature_data"));

        let again = ObjectStore::new();
        TreeMapper::new(again.clone()).decode(&tree).unwrap();
        let ap = again.find("fcc1:serial1").unwrap();
        assert_eq!(ap.get("key_password"), Some(Value::from("")));
    }

    #[test]
    fn test_added_field_takes_target_default() {
        let source = leak(
            Schema::builder(EntityKind::Site, SchemaVersion(10))
                .field(FieldSpec::required("name", TypeTag::String))
                .field(FieldSpec::optional("legacy", TypeTag::String))
                .build(),
        );
        let target = leak(
            Schema::builder(EntityKind::Site, SchemaVersion(11))
                .field(FieldSpec::required("name", TypeTag::String))
                .field(FieldSpec::optional("retries", TypeTag::Int32).with_default(3))
                .build(),
        );
        let entity = Entity::with_schema(source).unwrap();
        entity.set("name", "A").unwrap();
        entity.set("legacy", "old").unwrap();

        let ported = Migrator::port(&entity, target).unwrap();
        assert_eq!(ported.get("name"), Some(Value::from("A")));
        assert_eq!(ported.get("retries"), Some(Value::Int32(3)));
        assert!(!ported.fields().contains_key("legacy"));
    }

    #[test]
    fn test_changed_field_with_new_type_is_rejected() {
        let source = leak(
            Schema::builder(EntityKind::Building, SchemaVersion(10))
                .field(FieldSpec::required("name", TypeTag::String))
                .field(FieldSpec::optional("port", TypeTag::String))
                .build(),
        );
        let target = leak(
            Schema::builder(EntityKind::Building, SchemaVersion(11))
                .field(FieldSpec::required("name", TypeTag::String))
                .field(FieldSpec::optional("port", TypeTag::Int32))
                .build(),
        );
        let entity = Entity::with_schema(source).unwrap();
        entity.set("name", "B1").unwrap();

        let err = Migrator::port(&entity, target).unwrap_err();
        assert!(matches!(
            err,
            ShimError::IncompatibleFieldType {
                field: "port",
                from: TypeTag::String,
                to: TypeTag::Int32,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_target_aborts() {
        let (store, _) = loaded();
        let err = Migrator::new(store.clone())
            .migrate(SchemaVersion(7))
            .unwrap_err();
        match err {
            ShimError::MigrationAborted { key, source } => {
                assert_eq!(key, "A");
                assert!(matches!(*source, ShimError::UnsupportedVersion { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.find("A").unwrap().version(), SchemaVersion::V1);
    }

    #[test]
    fn test_migration_fires_delete_then_add() {
        let (store, _) = loaded();
        let old_id = store.find("A").unwrap().id();
        let recorder = Arc::new(Recorder::default());
        store.subscribe(weak(&recorder));

        Migrator::new(store.clone()).migrate(SchemaVersion::V2).unwrap();

        let new_id = store.find("A").unwrap().id();
        let changes = recorder.changes();
        assert_eq!(changes.len(), 8);
        assert_eq!(changes[0], Change::store(ChangeKind::Delete, old_id));
        assert_eq!(changes[1], Change::store(ChangeKind::Add, new_id));
    }
}
