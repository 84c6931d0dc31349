//! Tree → entities

use std::collections::BTreeSet;

use shim_types::{
    Composition, EntityKind, FieldSpec, Requirement, Schema, SchemaVersion, Setting, Value,
    join_path,
};
use tracing::{debug, info, trace};

use super::{TreeMapper, VERSION_SETTING, invalid, list_value, scalar_value, tree_version};
use crate::entity::{Entity, EntityId, EntityRef, schema_for};
use crate::error::{Result, ShimError};

/// An enclosing entity of the node being decoded
type Ancestor = (EntityKind, EntityId);

/// Totals of a decode run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    pub version: SchemaVersion,
    pub sites: usize,
    pub buildings: usize,
    pub access_points: usize,
    pub application: bool,
}

impl DecodeSummary {
    fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            sites: 0,
            buildings: 0,
            access_points: 0,
            application: false,
        }
    }

    fn count(&mut self, kind: EntityKind) {
        match kind {
            EntityKind::Site => self.sites += 1,
            EntityKind::Building => self.buildings += 1,
            EntityKind::AccessPoint => self.access_points += 1,
            EntityKind::Application => self.application = true,
        }
    }
}

impl TreeMapper {
    /// Decode every entity of `root` into the store
    ///
    /// Sites are registered before their buildings, buildings before their
    /// access points, so composed fields can resolve their ancestors through
    /// the store. Entities decoded before a failure stay registered.
    pub fn decode(&self, root: &Setting) -> Result<DecodeSummary> {
        let group = root
            .as_group()
            .ok_or_else(|| invalid("<root>", "document root must be a group"))?;
        let version = tree_version(root)?;
        if schema_for(EntityKind::Site, version).is_none() {
            return Err(ShimError::UnsupportedVersion {
                kind: EntityKind::Site,
                version,
            });
        }

        let mut summary = DecodeSummary::new(version);
        for (name, node) in group.entries() {
            match (name, node) {
                (VERSION_SETTING, _) => {}
                ("sites", _) => {
                    self.decode_container(EntityKind::Site, node, name, version, &[], &mut summary)?;
                }
                ("app", Setting::Group(_)) => {
                    self.decode_entity(EntityKind::Application, node, name, version, &[], &mut summary)?;
                }
                _ if is_container(node) => {
                    return Err(ShimError::UnknownNodeKind {
                        name: name.to_string(),
                        path: name.to_string(),
                    });
                }
                _ => trace!(name, "ignoring top-level setting"),
            }
        }

        info!(
            %version,
            sites = summary.sites,
            buildings = summary.buildings,
            access_points = summary.access_points,
            "tree decoded"
        );
        Ok(summary)
    }

    fn decode_container(
        &self,
        kind: EntityKind,
        node: &Setting,
        path: &str,
        version: SchemaVersion,
        ancestry: &[Ancestor],
        summary: &mut DecodeSummary,
    ) -> Result<()> {
        let items = match node {
            Setting::List(items) | Setting::Array(items) => items,
            other => {
                return Err(invalid(path, format!("expected list, found {}", other.kind_name())));
            }
        };
        for (index, item) in items.iter().enumerate() {
            let item_path = join_path(path, &format!("[{index}]"));
            if item.as_group().is_none() {
                return Err(invalid(&item_path, format!("expected group, found {}", item.kind_name())));
            }
            self.decode_entity(kind, item, &item_path, version, ancestry, summary)?;
        }
        Ok(())
    }

    fn decode_entity(
        &self,
        kind: EntityKind,
        node: &Setting,
        path: &str,
        version: SchemaVersion,
        ancestry: &[Ancestor],
        summary: &mut DecodeSummary,
    ) -> Result<EntityRef> {
        let entity = Entity::create(kind, version)?;
        let schema = entity.schema();

        for spec in schema.fields() {
            if spec.meta.requirement == Requirement::Composed {
                continue;
            }
            match read_field(node, spec, path)? {
                Some(value) => entity.set(spec.name, value)?,
                None if spec.meta.requirement == Requirement::Required => {
                    return Err(ShimError::MissingRequiredField {
                        field: spec.name,
                        path: join_path(path, spec.meta.path),
                    });
                }
                None => {}
            }
        }

        self.store.insert(entity.clone());
        self.compose(&entity, ancestry)?;
        summary.count(kind);
        debug!(%kind, key = %entity.key(), path, "entity decoded");

        let mut nested = ancestry.to_vec();
        nested.push((kind, entity.id()));
        let child = kind.child();
        let reserved = field_roots(schema);

        if let Some(group) = node.as_group() {
            for (name, child_node) in group.entries() {
                let child_path = join_path(path, name);
                match child {
                    Some(child_kind) if name == child_kind.container() => {
                        self.decode_container(child_kind, child_node, &child_path, version, &nested, summary)?;
                    }
                    _ if is_container(child_node) && !reserved.contains(name) => {
                        return Err(ShimError::UnknownNodeKind {
                            name: name.to_string(),
                            path: child_path,
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(entity)
    }

    /// Fill composed fields once the entity and its ancestors are registered
    fn compose(&self, entity: &EntityRef, ancestry: &[Ancestor]) -> Result<()> {
        for spec in entity.schema().fields() {
            let Some(rule) = spec.composition else {
                continue;
            };
            let value = match rule {
                Composition::AncestorKey(parent) => {
                    let ancestor = ancestry
                        .iter()
                        .rev()
                        .find(|(kind, _)| *kind == parent)
                        .and_then(|(_, id)| self.store.find_by_id(*id))
                        .ok_or_else(|| ShimError::MissingParent {
                            kind: entity.kind(),
                            key: entity.key(),
                            parent,
                            parent_key: String::new(),
                        })?;
                    ancestor.key()
                }
                Composition::Concat {
                    first,
                    second,
                    separator,
                } => format!("{}{separator}{}", entity.get_str(first), entity.get_str(second)),
            };
            trace!(field = spec.name, %value, "composed");
            entity.set(spec.name, Value::String(value))?;
        }
        Ok(())
    }
}

/// Lists of groups denote entity containers
fn is_container(node: &Setting) -> bool {
    match node {
        Setting::List(items) => !items.is_empty() && items.iter().all(|i| i.as_group().is_some()),
        _ => false,
    }
}

/// First path segment of every declared field
fn field_roots(schema: &Schema) -> BTreeSet<&'static str> {
    schema
        .fields()
        .iter()
        .filter_map(|f| f.meta.path.split('.').next())
        .collect()
}

/// Read one field at its wire path below `node`
///
/// Returns `None` when the path is absent.
fn read_field(node: &Setting, spec: &FieldSpec, base: &str) -> Result<Option<Value>> {
    let meta = &spec.meta;
    let path = join_path(base, meta.path);

    if let Some(collection) = meta.template_collection() {
        let Some(records) = node.lookup(collection) else {
            return Ok(None);
        };
        if !matches!(records, Setting::List(_) | Setting::Array(_)) {
            return Err(invalid(&path, format!("expected list, found {}", records.kind_name())));
        }
        // each templated list ends at the first record lacking its member
        let elements = (0..records.len())
            .map_while(|i| node.lookup(&meta.element_path(i)));
        return list_value(elements, meta.tag, &path).map(Some);
    }

    let Some(found) = node.lookup(meta.path) else {
        return Ok(None);
    };
    if meta.tag.is_list() {
        match found {
            Setting::Array(items) | Setting::List(items) => list_value(items, meta.tag, &path).map(Some),
            other => Err(invalid(&path, format!("expected {}, found {}", meta.tag, other.kind_name()))),
        }
    } else {
        scalar_value(found, meta.tag, &path).map(Some)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mapper::tests::SAMPLE;
    use crate::store::ObjectStore;

    fn decode(doc: &str) -> (Arc<ObjectStore>, Result<DecodeSummary>) {
        let store = ObjectStore::new();
        let mapper = TreeMapper::new(store.clone());
        let root = Setting::parse_toml(doc).unwrap();
        let result = mapper.decode(&root);
        (store, result)
    }

    #[test]
    fn test_decode_hierarchy_composes_fields() {
        let (store, result) = decode(SAMPLE);
        let summary = result.unwrap();
        assert_eq!(summary.sites, 1);
        assert_eq!(summary.buildings, 1);
        assert_eq!(summary.access_points, 1);
        assert!(summary.application);

        let site = store.find("A").unwrap();
        assert_eq!(site.get("name"), Some(Value::from("A")));
        assert_eq!(site.get("dns_interval"), Some(Value::Int64(600)));
        assert_eq!(site.get("maxage_conn"), Some(Value::Int64(118)));
        assert_eq!(site.get("tls_debug"), Some(Value::Bool(true)));

        let building = store.find("B1").unwrap();
        assert_eq!(building.get("site_name"), Some(Value::from("A")));
        assert_eq!(building.get("root_ca"), Some(Value::from("/")));

        let ap = store.find("fcc1:serial1").unwrap();
        assert_eq!(ap.get("name"), Some(Value::from("fcc1:serial1")));
        assert_eq!(ap.get("site_name"), Some(Value::from("A")));
        assert_eq!(ap.get("building_name"), Some(Value::from("B1")));
        assert_eq!(ap.get("central_freq_khz"), Some(Value::Unsigned(3_625_000)));
        assert_eq!(ap.get("longitude"), Some(Value::Double(-122.0)));
        assert_eq!(ap.get("channel_blacklist"), Some(Value::from(vec![1, 6])));
        assert_eq!(
            ap.get("group_types"),
            Some(Value::from(vec!["INTERFERENCE_COORDINATION", "COEXISTENCE"]))
        );
        assert_eq!(ap.get("group_ids"), Some(Value::from(vec!["g1", "g2"])));
        assert_eq!(ap.get("protected_header"), Some(Value::from("hdr")));
        assert_eq!(ap.get("psi_interval"), Some(Value::Int32(30)));

        let app = store.find(crate::entity::APPLICATION_KEY).unwrap();
        assert_eq!(app.get("thread_pool_size"), Some(Value::Unsigned(4)));
        assert_eq!(app.get("sas_log_level"), Some(Value::from("debug")));

        let order: Vec<_> = store.ordered().iter().map(|e| e.kind()).collect();
        assert_eq!(
            order,
            vec![
                EntityKind::Site,
                EntityKind::Building,
                EntityKind::AccessPoint,
                EntityKind::Application
            ]
        );
    }

    #[test]
    fn test_missing_required_field() {
        let doc = r#"
[[sites]]
name = "A"

[[sites.buildings]]
name = "B1"
sas_url = "https://sas"
ca_path = "/ca"
"#;
        let (store, result) = decode(doc);
        match result {
            Err(ShimError::MissingRequiredField { field, path }) => {
                assert_eq!(field, "user_id");
                assert_eq!(path, "sites.[0].buildings.[0].user_id");
            }
            other => panic!("unexpected {other:?}"),
        }
        // the site decoded before the failure stays registered
        assert!(store.find("A").is_some());
    }

    #[test]
    fn test_unknown_container() {
        let doc = r#"
[[sites]]
name = "A"

[[sites.floors]]
name = "F1"
"#;
        let (_, result) = decode(doc);
        assert!(matches!(
            result,
            Err(ShimError::UnknownNodeKind { ref name, .. }) if name == "floors"
        ));

        let (_, result) = decode("[[regions]]\nname = \"R\"\n");
        assert!(matches!(result, Err(ShimError::UnknownNodeKind { .. })));
    }

    #[test]
    fn test_unsupported_version() {
        let (store, result) = decode("ver = 9\n[[sites]]\nname = \"A\"\n");
        assert!(matches!(
            result,
            Err(ShimError::UnsupportedVersion { version: SchemaVersion(9), .. })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_wrong_node_type() {
        let (_, result) = decode("[[sites]]\nname = 5\n");
        assert!(matches!(result, Err(ShimError::InvalidValue { .. })));
    }

    #[test]
    fn test_absent_containers_are_empty() {
        let (store, result) = decode("ver = 2\n");
        let summary = result.unwrap();
        assert_eq!(summary.version, SchemaVersion::V2);
        assert_eq!(summary.sites, 0);
        assert!(store.is_empty());
    }
}
