//! Configuration Entities
//!
//! An [`Entity`] is one live configuration object: a site, a building, an
//! access point or the application settings. Each entity is bound to the
//! static [`Schema`] of its (kind, version) pair, owns a field table and
//! carries a hierarchical numeric identifier.
//!
//! All field writes go through [`Entity::set`], which checks the declared
//! type and fires an update notification naming the field.

mod access_point;
mod application;
mod building;
mod site;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shim_types::{EntityKind, FieldTable, Schema, SchemaVersion, Value};
use tracing::trace;

use crate::error::{Result, ShimError};
use crate::pubsub::{Change, Publisher};

pub use application::APPLICATION_KEY;

/// Shared handle to a live entity
pub type EntityRef = Arc<Entity>;

/// Kinds in hierarchy order, followed by the application singleton
pub const KINDS: [EntityKind; 4] = [
    EntityKind::Site,
    EntityKind::Building,
    EntityKind::AccessPoint,
    EntityKind::Application,
];

/// Versions a schema is declared for
pub const VERSIONS: [SchemaVersion; 2] = [SchemaVersion::V1, SchemaVersion::V2];

/// Static schema of a (kind, version) pair
pub fn schema_for(kind: EntityKind, version: SchemaVersion) -> Option<&'static Schema> {
    match kind {
        EntityKind::Site => site::schema(version),
        EntityKind::Building => building::schema(version),
        EntityKind::AccessPoint => access_point::schema(version),
        EntityKind::Application => application::schema(version),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Id
// ─────────────────────────────────────────────────────────────────────────────

const SITE_SHIFT: u32 = 48;
const BUILDING_SHIFT: u32 = 32;
const MAX_SITE_SEQ: u32 = 0xffff;
const MAX_BUILDING_SEQ: u32 = 0xffff;

/// Hierarchical numeric identifier
///
/// The kind is encoded in the bit range holding the sequence number:
/// sites use bits 48..64, buildings bits 32..48, access points bits 0..32.
/// The application singleton uses the reserved value `0`, outside all three
/// ranges. A raw id belongs to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    pub const APPLICATION: EntityId = EntityId(0);

    /// Id of the `ordinal`-th (zero based) entity of a kind
    pub fn new(kind: EntityKind, ordinal: u32) -> Result<Self> {
        let seq = ordinal
            .checked_add(1)
            .ok_or(ShimError::IdSpaceExhausted(kind))?;
        match kind {
            EntityKind::Site if seq <= MAX_SITE_SEQ => Ok(EntityId(u64::from(seq) << SITE_SHIFT)),
            EntityKind::Building if seq <= MAX_BUILDING_SEQ => {
                Ok(EntityId(u64::from(seq) << BUILDING_SHIFT))
            }
            EntityKind::AccessPoint => Ok(EntityId(u64::from(seq))),
            EntityKind::Application => Ok(Self::APPLICATION),
            _ => Err(ShimError::IdSpaceExhausted(kind)),
        }
    }

    pub fn from_raw(raw: u64) -> Self {
        EntityId(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    pub fn is_site(&self) -> bool {
        self.0 >> SITE_SHIFT != 0
    }

    pub fn is_building(&self) -> bool {
        self.0 >> SITE_SHIFT == 0 && self.0 >> BUILDING_SHIFT != 0
    }

    pub fn is_access_point(&self) -> bool {
        self.0 >> BUILDING_SHIFT == 0 && self.0 != 0
    }

    pub fn is_application(&self) -> bool {
        self.0 == 0
    }

    /// Kind encoded in the id range
    pub fn kind(&self) -> EntityKind {
        if self.is_site() {
            EntityKind::Site
        } else if self.is_building() {
            EntityKind::Building
        } else if self.is_access_point() {
            EntityKind::AccessPoint
        } else {
            EntityKind::Application
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

static SITE_COUNTER: AtomicU32 = AtomicU32::new(0);
static BUILDING_COUNTER: AtomicU32 = AtomicU32::new(0);
static ACCESS_POINT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Claim the next ordinal of a kind; shared by every version of the kind
fn next_ordinal(kind: EntityKind) -> Result<u32> {
    let counter = match kind {
        EntityKind::Site => &SITE_COUNTER,
        EntityKind::Building => &BUILDING_COUNTER,
        EntityKind::AccessPoint => &ACCESS_POINT_COUNTER,
        EntityKind::Application => return Ok(0),
    };
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1))
        .map_err(|_| ShimError::IdSpaceExhausted(kind))
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity
// ─────────────────────────────────────────────────────────────────────────────

/// A live configuration object
pub struct Entity {
    id: EntityId,
    ordinal: u32,
    schema: &'static Schema,
    fields: RwLock<FieldTable>,
    publisher: Publisher,
}

impl Entity {
    /// Construct a fresh entity of the given kind and version
    ///
    /// Fields start at their declared defaults; see
    /// [`shim_types::FieldSpec::initial_value`].
    pub fn create(kind: EntityKind, version: SchemaVersion) -> Result<EntityRef> {
        let schema =
            schema_for(kind, version).ok_or(ShimError::UnsupportedVersion { kind, version })?;
        Self::with_schema(schema)
    }

    /// Construct a fresh entity bound to an arbitrary schema
    pub fn with_schema(schema: &'static Schema) -> Result<EntityRef> {
        let kind = schema.kind();
        let ordinal = next_ordinal(kind)?;
        let id = EntityId::new(kind, ordinal)?;
        trace!(%kind, version = %schema.version(), ordinal, %id, "entity created");
        Ok(Arc::new(Entity {
            id,
            ordinal,
            schema,
            fields: RwLock::new(schema.initial_table()),
            publisher: Publisher::new(),
        }))
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn kind(&self) -> EntityKind {
        self.schema.kind()
    }

    pub fn version(&self) -> SchemaVersion {
        self.schema.version()
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Current value of a field; `None` when unset or not declared
    pub fn get(&self, field: &str) -> Option<Value> {
        let accessor = self.schema.accessor(field)?;
        accessor.get(&self.fields.read())
    }

    /// String view of a field, empty when unset
    pub fn get_str(&self, field: &str) -> String {
        self.get(field)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.fields.read().contains_key(field)
    }

    /// Assign a field and notify subscribers
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        let spec = self
            .schema
            .field(field)
            .ok_or_else(|| ShimError::UnknownField {
                kind: self.kind(),
                field: field.to_string(),
            })?;
        let value = value.into();
        trace!(id = %self.id, field, %value, "set");
        spec.accessor()
            .set(&mut self.fields.write(), value)
            .map_err(|e| ShimError::from_value(self.kind(), field, e))?;
        self.publisher.notify(&Change::update(spec.name, self.id));
        Ok(())
    }

    /// Copy of the field table
    pub fn fields(&self) -> FieldTable {
        self.fields.read().clone()
    }

    /// Business key used by the object store
    pub fn key(&self) -> String {
        match self.kind() {
            EntityKind::Site | EntityKind::Building => self.get_str("name"),
            EntityKind::AccessPoint => {
                access_point::business_key(&self.get_str("fcc_id"), &self.get_str("serial_number"))
            }
            EntityKind::Application => APPLICATION_KEY.to_string(),
        }
    }

    /// Serializable view of this entity
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            id: self.id,
            kind: self.kind(),
            version: self.version(),
            key: self.key(),
            fields: self
                .fields
                .read()
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("version", &self.version())
            .field("fields", &*self.fields.read())
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}#{} '{}' ({}) id={}",
            self.kind(),
            self.ordinal,
            self.key(),
            self.version(),
            self.id
        )?;
        let fields = self.fields.read();
        for spec in self.schema.fields() {
            match fields.get(spec.name) {
                Some(value) => writeln!(f, "  {} = {}", spec.name, value)?,
                None => writeln!(f, "  {} = <unset>", spec.name)?,
            }
        }
        Ok(())
    }
}

/// Serializable copy of an entity's identity and fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub kind: EntityKind,
    pub version: SchemaVersion,
    pub key: String,
    pub fields: BTreeMap<String, Value>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
