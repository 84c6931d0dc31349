//! Entities → tree

use shim_types::{EntityKind, Group, SchemaVersion, Setting};
use tracing::{debug, info};

use super::{TreeMapper, VERSION_SETTING, list_elements, value_node};
use crate::entity::Entity;
use crate::error::{Result, ShimError};

impl TreeMapper {
    /// Write every stored entity into a fresh tree, in insertion order
    ///
    /// Buildings and access points are nested below the site and building
    /// whose names match their `site_name` and `building_name`. Composed
    /// fields are written like any other field; decode ignores them and
    /// recomputes them from the ancestry. The `ver` setting takes the version
    /// of the first stored entity.
    pub fn encode(&self) -> Result<Setting> {
        let entities = self.store.ordered();
        let version = entities
            .first()
            .map(|e| e.version())
            .unwrap_or(SchemaVersion::V1);

        let mut root = Group::new();
        root.insert(VERSION_SETTING, Setting::Int(i64::from(version.0)));
        root.insert(EntityKind::Site.container(), Setting::List(Vec::new()));

        for entity in &entities {
            let node = encode_fields(entity)?;
            match entity.kind() {
                EntityKind::Application => {
                    root.insert(EntityKind::Application.container(), node);
                }
                EntityKind::Site => root.list_mut(EntityKind::Site.container())?.push(node),
                EntityKind::Building => {
                    let site = parent_group(&mut root, entity, &[EntityKind::Site])?;
                    site.list_mut(EntityKind::Building.container())?.push(node);
                }
                EntityKind::AccessPoint => {
                    let building =
                        parent_group(&mut root, entity, &[EntityKind::Site, EntityKind::Building])?;
                    building.list_mut(EntityKind::AccessPoint.container())?.push(node);
                }
            }
            debug!(kind = %entity.kind(), key = %entity.key(), "entity encoded");
        }

        info!(%version, entities = entities.len(), "tree encoded");
        Ok(Setting::Group(root))
    }
}

/// Field of a child entity naming its enclosing entity of `kind`
fn parent_field(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Building => "building_name",
        _ => "site_name",
    }
}

/// Walk down from the root through the groups named by the entity's
/// ancestor keys
fn parent_group<'a>(
    root: &'a mut Group,
    entity: &Entity,
    chain: &[EntityKind],
) -> Result<&'a mut Group> {
    let mut group = root;
    for &kind in chain {
        let parent_key = entity.get_str(parent_field(kind));
        let missing = || ShimError::MissingParent {
            kind: entity.kind(),
            key: entity.key(),
            parent: kind,
            parent_key: parent_key.clone(),
        };
        let members = match group.get_mut(kind.container()) {
            Some(Setting::List(members)) => members,
            _ => return Err(missing()),
        };
        group = members
            .iter_mut()
            .filter_map(Setting::as_group_mut)
            .find(|g| g.get("name").and_then(Setting::as_str) == Some(parent_key.as_str()))
            .ok_or_else(missing)?;
    }
    Ok(group)
}

/// Every field of an entity at its wire path
///
/// Unset fields are written as the empty value of their type so the
/// structure of the schema is always present.
fn encode_fields(entity: &Entity) -> Result<Setting> {
    let mut node = Setting::Group(Group::new());
    for spec in entity.schema().fields() {
        let value = entity.get(spec.name).unwrap_or_else(|| spec.meta.tag.zero());
        match spec.meta.template_collection() {
            Some(collection) => {
                if !node.exists(collection) {
                    node.set_path(collection, Setting::List(Vec::new()))?;
                }
                for (index, element) in list_elements(&value).into_iter().enumerate() {
                    node.set_path(&spec.meta.element_path(index), element)?;
                }
            }
            None => node.set_path(spec.meta.path, value_node(&value))?,
        }
    }
    Ok(node)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use shim_types::{FieldTable, Requirement, Value};

    use super::*;
    use crate::mapper::tests::SAMPLE;
    use crate::store::ObjectStore;

    fn non_composed(entity: &Entity) -> FieldTable {
        let mut fields = entity.fields();
        for spec in entity.schema().fields() {
            if spec.meta.requirement == Requirement::Composed {
                fields.remove(spec.name);
            }
        }
        fields
    }

    fn by_key(store: &ObjectStore) -> BTreeMap<String, (FieldTable, FieldTable)> {
        store
            .list()
            .iter()
            .map(|e| (e.key(), (non_composed(e), e.fields())))
            .collect()
    }

    #[test]
    fn test_round_trip_reproduces_fields() {
        let first = ObjectStore::new();
        let mapper = TreeMapper::new(first.clone());
        mapper.decode(&Setting::parse_toml(SAMPLE).unwrap()).unwrap();

        let tree = mapper.encode().unwrap();
        let text = tree.to_toml_string().unwrap();

        let second = ObjectStore::new();
        TreeMapper::new(second.clone())
            .decode(&Setting::parse_toml(&text).unwrap())
            .unwrap();

        // composed fields recompute to the same values, so whole tables match
        assert_eq!(by_key(&first), by_key(&second));
        assert_eq!(second.len(), 4);
    }

    #[test]
    fn test_encode_nests_by_ancestor_keys() {
        let store = ObjectStore::new();
        let mapper = TreeMapper::new(store.clone());
        mapper.decode(&Setting::parse_toml(SAMPLE).unwrap()).unwrap();

        let tree = mapper.encode().unwrap();
        assert_eq!(tree.lookup("ver"), Some(&Setting::Int(1)));
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].aps.[0].fcc_id"),
            Some(&Setting::String("fcc1".into()))
        );
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].aps.[0].groups.[1].id"),
            Some(&Setting::String("g2".into()))
        );
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].aps.[0].cpi_signature_data.digital_signature"),
            Some(&Setting::String("sig".into()))
        );
        assert_eq!(tree.lookup("sites.[0].tls.dns_interval"), Some(&Setting::Int(600)));
        assert_eq!(tree.lookup("app.thread_pool_size"), Some(&Setting::Int(4)));
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].site_name"),
            Some(&Setting::String("A".into()))
        );
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].aps.[0].name"),
            Some(&Setting::String("fcc1:serial1".into()))
        );
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].aps.[0].building_name"),
            Some(&Setting::String("B1".into()))
        );
    }

    #[test]
    fn test_unset_fields_get_placeholders() {
        let store = ObjectStore::new();
        let site = Entity::create(EntityKind::Site, SchemaVersion::V2).unwrap();
        site.set("name", "A").unwrap();
        store.insert(site);
        let building = Entity::create(EntityKind::Building, SchemaVersion::V2).unwrap();
        building.set("name", "B1").unwrap();
        building.set("site_name", "A").unwrap();
        store.insert(building);

        let tree = TreeMapper::new(store).encode().unwrap();
        assert_eq!(tree.lookup("ver"), Some(&Setting::Int(2)));
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].sas_url"),
            Some(&Setting::String(String::new()))
        );
        assert_eq!(
            tree.lookup("sites.[0].buildings.[0].root_ca"),
            Some(&Setting::String("/".into()))
        );
    }

    #[test]
    fn test_empty_list_placeholders_decode_back() {
        let store = ObjectStore::new();
        let mapper = TreeMapper::new(store.clone());
        mapper.decode(&Setting::parse_toml(SAMPLE).unwrap()).unwrap();
        let ap = store.find("fcc1:serial1").unwrap();
        ap.set("channel_blacklist", Vec::<i32>::new()).unwrap();
        ap.set("group_types", Vec::<String>::new()).unwrap();
        ap.set("group_ids", Vec::<String>::new()).unwrap();

        let text = mapper.encode().unwrap().to_toml_string().unwrap();
        let again = ObjectStore::new();
        TreeMapper::new(again.clone())
            .decode(&Setting::parse_toml(&text).unwrap())
            .unwrap();
        let ap = again.find("fcc1:serial1").unwrap();
        assert_eq!(ap.get("channel_blacklist"), Some(Value::IntList(Vec::new())));
        assert_eq!(ap.get("group_ids"), Some(Value::StringList(Vec::new())));
    }

    #[test]
    fn test_uneven_record_lists_decode_back() {
        let store = ObjectStore::new();
        let mapper = TreeMapper::new(store.clone());
        mapper.decode(&Setting::parse_toml(SAMPLE).unwrap()).unwrap();
        let ap = store.find("fcc1:serial1").unwrap();
        ap.set("group_ids", vec!["only".to_string()]).unwrap();

        let tree = mapper.encode().unwrap();
        assert!(!tree.exists("sites.[0].buildings.[0].aps.[0].groups.[1].id"));
        let text = tree.to_toml_string().unwrap();

        let again = ObjectStore::new();
        TreeMapper::new(again.clone())
            .decode(&Setting::parse_toml(&text).unwrap())
            .unwrap();
        let ap = again.find("fcc1:serial1").unwrap();
        assert_eq!(ap.get("group_ids"), Some(Value::StringList(vec!["only".into()])));
        assert_eq!(
            ap.get("group_types"),
            Some(Value::StringList(vec![
                "INTERFERENCE_COORDINATION".into(),
                "COEXISTENCE".into(),
            ]))
        );
    }

    #[test]
    fn test_missing_parent() {
        let store = ObjectStore::new();
        let building = Entity::create(EntityKind::Building, SchemaVersion::V1).unwrap();
        building.set("name", "B1").unwrap();
        building.set("site_name", "nowhere").unwrap();
        store.insert(building);

        let err = TreeMapper::new(store).encode().unwrap_err();
        assert!(matches!(
            err,
            ShimError::MissingParent { parent: EntityKind::Site, ref parent_key, .. } if parent_key == "nowhere"
        ));
    }
}
