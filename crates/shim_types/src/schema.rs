//! Declarative entity schemas
//!
//! A [`Schema`] lists, for one (kind, version) pair, every field an entity of
//! that kind carries: its wire path inside the settings tree, its type and
//! whether it is required, optional or composed from ancestor context.
//! Schemas are immutable once built and are shared by every instance.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{TypeTag, Value, ValueError};

/// Placeholder substituted with an element index in templated list paths
pub const INDEX_PLACEHOLDER: &str = "[%d]";

// ─────────────────────────────────────────────────────────────────────────────
// Entity Kinds & Versions
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of configuration entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Site,
    Building,
    AccessPoint,
    Application,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Site => "site",
            EntityKind::Building => "building",
            EntityKind::AccessPoint => "access_point",
            EntityKind::Application => "application",
        }
    }

    /// Name of the list holding entities of this kind in the settings tree
    pub fn container(&self) -> &'static str {
        match self {
            EntityKind::Site => "sites",
            EntityKind::Building => "buildings",
            EntityKind::AccessPoint => "aps",
            EntityKind::Application => "app",
        }
    }

    /// Resolve a container name back to the kind it holds
    pub fn from_container(name: &str) -> Option<EntityKind> {
        match name {
            "sites" => Some(EntityKind::Site),
            "buildings" => Some(EntityKind::Building),
            "aps" => Some(EntityKind::AccessPoint),
            "app" => Some(EntityKind::Application),
            _ => None,
        }
    }

    /// Enclosing kind in the site → building → access point hierarchy
    pub fn parent(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Building => Some(EntityKind::Site),
            EntityKind::AccessPoint => Some(EntityKind::Building),
            EntityKind::Site | EntityKind::Application => None,
        }
    }

    /// Kind nested directly below this one
    pub fn child(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Site => Some(EntityKind::Building),
            EntityKind::Building => Some(EntityKind::AccessPoint),
            EntityKind::AccessPoint | EntityKind::Application => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version of a schema set, selected by the top-level `ver` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(pub u32);

impl SchemaVersion {
    pub const V1: SchemaVersion = SchemaVersion(1);
    pub const V2: SchemaVersion = SchemaVersion(2);
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Meta Descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// How a field is obtained while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Requirement {
    Required,
    Optional,
    /// Derived from ancestor context, never read from the tree
    Composed,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Requirement::Required => "required",
            Requirement::Optional => "optional",
            Requirement::Composed => "composed",
        })
    }
}

/// Wire path, type and requirement of one field
///
/// Two descriptors are equal when all three parts are equal; schema diffs
/// compare fields with this equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MetaDescriptor {
    pub path: &'static str,
    pub tag: TypeTag,
    pub requirement: Requirement,
}

impl MetaDescriptor {
    /// For templated paths (`groups.[%d].type`), the path of the backing collection
    pub fn template_collection(&self) -> Option<&'static str> {
        self.path
            .find(INDEX_PLACEHOLDER)
            .map(|pos| self.path[..pos].trim_end_matches('.'))
    }

    /// Concrete path of element `index` of a templated path
    pub fn element_path(&self, index: usize) -> String {
        self.path
            .replacen(INDEX_PLACEHOLDER, &format!("[{index}]"), 1)
    }
}

impl fmt::Display for MetaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path = {}, type = {}, trait = {}",
            self.path, self.tag, self.requirement
        )
    }
}

/// Rule used to fill a composed field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// Business key of the nearest enclosing entity of the given kind
    AncestorKey(EntityKind),
    /// Two of the entity's own fields joined by a separator
    Concat {
        first: &'static str,
        second: &'static str,
        separator: &'static str,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Field Storage & Accessors
// ─────────────────────────────────────────────────────────────────────────────

/// Per-instance field storage; a missing entry means the field is unset
pub type FieldTable = BTreeMap<&'static str, Value>;

/// Typed get/set capability for one declared field
///
/// A single accessor exists per field of a schema and is reused by every
/// instance bound to that schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accessor {
    field: &'static str,
    tag: TypeTag,
}

impl Accessor {
    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn get(&self, table: &FieldTable) -> Option<Value> {
        table.get(self.field).cloned()
    }

    /// Store a value, rejecting any value whose runtime type is not the declared one
    pub fn set(&self, table: &mut FieldTable, value: Value) -> Result<(), ValueError> {
        value.expect_tag(self.tag)?;
        table.insert(self.field, value);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field Specification
// ─────────────────────────────────────────────────────────────────────────────

/// Declaration of a single schema field
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub meta: MetaDescriptor,
    pub default: Option<Value>,
    pub composition: Option<Composition>,
}

impl FieldSpec {
    fn new(name: &'static str, tag: TypeTag, requirement: Requirement) -> Self {
        Self {
            name,
            meta: MetaDescriptor {
                path: name,
                tag,
                requirement,
            },
            default: None,
            composition: None,
        }
    }

    /// A field that must be present in the tree
    pub fn required(name: &'static str, tag: TypeTag) -> Self {
        Self::new(name, tag, Requirement::Required)
    }

    /// A field that keeps its default when absent from the tree
    pub fn optional(name: &'static str, tag: TypeTag) -> Self {
        Self::new(name, tag, Requirement::Optional)
    }

    /// A field derived after decoding
    pub fn composed(name: &'static str, tag: TypeTag, rule: Composition) -> Self {
        let mut spec = Self::new(name, tag, Requirement::Composed);
        spec.composition = Some(rule);
        spec
    }

    /// Read and write the field at `path` instead of its name
    pub fn at(mut self, path: &'static str) -> Self {
        self.meta.path = path;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        debug_assert_eq!(value.tag(), self.meta.tag, "default of {}", self.name);
        self.default = Some(value);
        self
    }

    pub fn accessor(&self) -> Accessor {
        Accessor {
            field: self.name,
            tag: self.meta.tag,
        }
    }

    /// Value a fresh instance starts with
    ///
    /// Declared defaults win; optional fields otherwise start at their zero
    /// value, and required or composed fields start unset.
    pub fn initial_value(&self) -> Option<Value> {
        match (&self.default, self.meta.requirement) {
            (Some(value), _) => Some(value.clone()),
            (None, Requirement::Optional) => Some(self.meta.tag.zero()),
            (None, _) => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// The field declarations of one (kind, version) pair
#[derive(Debug, Clone)]
pub struct Schema {
    kind: EntityKind,
    version: SchemaVersion,
    fields: Vec<FieldSpec>,
    index: HashMap<&'static str, usize>,
}

impl Schema {
    pub fn builder(kind: EntityKind, version: SchemaVersion) -> SchemaBuilder {
        SchemaBuilder {
            kind,
            version,
            fields: Vec::new(),
        }
    }

    /// Same field set declared under another version
    pub fn with_version(&self, version: SchemaVersion) -> Schema {
        Schema {
            version,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn meta(&self, name: &str) -> Option<&MetaDescriptor> {
        self.field(name).map(|f| &f.meta)
    }

    pub fn accessor(&self, name: &str) -> Option<Accessor> {
        self.field(name).map(FieldSpec::accessor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field table of a freshly constructed instance
    pub fn initial_table(&self) -> FieldTable {
        self.fields
            .iter()
            .filter_map(|f| f.initial_value().map(|v| (f.name, v)))
            .collect()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "meta info of {} {}:", self.kind, self.version)?;
        for field in &self.fields {
            writeln!(f, "  {}, {}", field.name, field.meta)?;
        }
        Ok(())
    }
}

/// Builder for [`Schema`]
pub struct SchemaBuilder {
    kind: EntityKind,
    version: SchemaVersion,
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn field(mut self, spec: FieldSpec) -> Self {
        debug_assert!(
            self.fields.iter().all(|f| f.name != spec.name),
            "duplicate field {}",
            spec.name
        );
        self.fields.push(spec);
        self
    }

    pub fn build(self) -> Schema {
        let index = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name, i))
            .collect();
        Schema {
            kind: self.kind,
            version: self.version,
            fields: self.fields,
            index,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::builder(EntityKind::AccessPoint, SchemaVersion::V1)
            .field(FieldSpec::required("fcc_id", TypeTag::String))
            .field(FieldSpec::optional("psi_interval", TypeTag::Int32).with_default(30))
            .field(FieldSpec::optional("persistent", TypeTag::Bool))
            .field(FieldSpec::required("group_ids", TypeTag::StringList).at("groups.[%d].id"))
            .field(FieldSpec::composed(
                "site_name",
                TypeTag::String,
                Composition::AncestorKey(EntityKind::Site),
            ))
            .build()
    }

    #[test]
    fn test_initial_table() {
        let table = sample().initial_table();
        assert_eq!(table.get("psi_interval"), Some(&Value::Int32(30)));
        assert_eq!(table.get("persistent"), Some(&Value::Bool(false)));
        assert!(!table.contains_key("fcc_id"));
        assert!(!table.contains_key("site_name"));
    }

    #[test]
    fn test_accessor_rejects_wrong_type() {
        let schema = sample();
        let mut table = schema.initial_table();
        let accessor = schema.accessor("psi_interval").unwrap();

        let err = accessor.set(&mut table, Value::from("thirty")).unwrap_err();
        assert!(matches!(err, ValueError::TypeMismatch { .. }));
        assert_eq!(accessor.get(&table), Some(Value::Int32(30)));

        accessor.set(&mut table, Value::from(45)).unwrap();
        assert_eq!(accessor.get(&table), Some(Value::Int32(45)));
    }

    #[test]
    fn test_meta_equality_is_structural() {
        let a = FieldSpec::optional("protected_header", TypeTag::String)
            .at("cpi_signature_data.protected_header");
        let b = FieldSpec::optional("protected_header", TypeTag::String);
        let c = FieldSpec::optional("protected_header", TypeTag::String);
        assert_ne!(a.meta, b.meta);
        assert_eq!(b.meta, c.meta);
    }

    #[test]
    fn test_template_paths() {
        let schema = sample();
        let meta = schema.meta("group_ids").unwrap();
        assert_eq!(meta.template_collection(), Some("groups"));
        assert_eq!(meta.element_path(3), "groups.[3].id");
        assert_eq!(schema.meta("fcc_id").unwrap().template_collection(), None);
    }

    #[test]
    fn test_display_lists_fields() {
        let text = sample().to_string();
        assert!(text.starts_with("meta info of access_point v1:"));
        assert!(text.contains(
            "  group_ids, path = groups.[%d].id, type = list<string>, trait = required"
        ));
    }

    #[test]
    fn test_container_names() {
        for kind in [
            EntityKind::Site,
            EntityKind::Building,
            EntityKind::AccessPoint,
            EntityKind::Application,
        ] {
            assert_eq!(EntityKind::from_container(kind.container()), Some(kind));
        }
        assert_eq!(EntityKind::from_container("floors"), None);
    }
}
