//! Tree Mapper
//!
//! Materializes entities from a [`Setting`] tree and writes the store back
//! into one. Both directions are driven entirely by schema metadata: the
//! wire path and type tag of every declared field.
//!
//! ```text
//! ver = 1
//! [[sites]]                      -> Site
//!   [[sites.buildings]]          -> Building      (site_name composed)
//!     [[sites.buildings.aps]]    -> AccessPoint   (name, site_name, building_name composed)
//! [app]                          -> Application
//! ```

mod decode;
mod encode;

use std::sync::Arc;

use shim_types::{Setting, SchemaVersion, TypeTag, Value, ValueError};

use crate::error::{Result, ShimError};
use crate::store::ObjectStore;

pub use decode::DecodeSummary;

/// Name of the top-level version setting
pub const VERSION_SETTING: &str = "ver";

/// Converts between settings trees and the entities of an [`ObjectStore`]
pub struct TreeMapper {
    store: Arc<ObjectStore>,
}

impl TreeMapper {
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }
}

/// Schema version selected by a tree's `ver` setting, 1 when absent
pub fn tree_version(root: &Setting) -> Result<SchemaVersion> {
    match root.lookup(VERSION_SETTING) {
        None => Ok(SchemaVersion::V1),
        Some(Setting::Int(v)) => u32::try_from(*v)
            .map(SchemaVersion)
            .map_err(|_| ShimError::InvalidValue {
                path: VERSION_SETTING.to_string(),
                reason: format!("{v} is not a version number"),
            }),
        Some(other) => Err(ShimError::InvalidValue {
            path: VERSION_SETTING.to_string(),
            reason: format!("expected int, found {}", other.kind_name()),
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value Conversion
// ─────────────────────────────────────────────────────────────────────────────

fn invalid(path: &str, reason: impl Into<String>) -> ShimError {
    ShimError::InvalidValue {
        path: path.to_string(),
        reason: reason.into(),
    }
}

fn wrong_node(path: &str, tag: TypeTag, node: &Setting) -> ShimError {
    invalid(path, format!("expected {tag}, found {}", node.kind_name()))
}

fn int_in_range<T: TryFrom<i64>>(value: i64, tag: TypeTag, path: &str) -> Result<T> {
    T::try_from(value).map_err(|_| invalid(path, ValueError::OutOfRange { value, tag }.to_string()))
}

/// Decode a scalar node for a scalar tag
fn scalar_value(node: &Setting, tag: TypeTag, path: &str) -> Result<Value> {
    let value = match (tag, node) {
        (TypeTag::Int32, Setting::Int(i)) => Value::Int32(int_in_range(*i, tag, path)?),
        (TypeTag::Int64, Setting::Int(i)) => Value::Int64(*i),
        (TypeTag::Unsigned, Setting::Int(i)) => Value::Unsigned(int_in_range(*i, tag, path)?),
        (TypeTag::Double, Setting::Float(f)) => Value::Double(*f),
        (TypeTag::Double, Setting::Int(i)) => Value::Double(*i as f64),
        (TypeTag::Bool, Setting::Bool(b)) => Value::Bool(*b),
        (TypeTag::String, Setting::String(s)) => Value::String(s.clone()),
        _ => return Err(wrong_node(path, tag, node)),
    };
    Ok(value)
}

/// Decode a sequence of scalar nodes for a list tag
fn list_value<'a>(
    items: impl IntoIterator<Item = &'a Setting>,
    tag: TypeTag,
    path: &str,
) -> Result<Value> {
    match tag {
        TypeTag::IntList => items
            .into_iter()
            .map(|item| match item {
                Setting::Int(i) => int_in_range::<i32>(*i, TypeTag::Int32, path),
                other => Err(wrong_node(path, TypeTag::Int32, other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::IntList),
        TypeTag::StringList => items
            .into_iter()
            .map(|item| match item {
                Setting::String(s) => Ok(s.clone()),
                other => Err(wrong_node(path, TypeTag::String, other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Value::StringList),
        _ => Err(invalid(path, format!("{tag} is not a list type"))),
    }
}

/// Node written for a value
fn value_node(value: &Value) -> Setting {
    match value {
        Value::Int32(i) => Setting::Int(i64::from(*i)),
        Value::Int64(i) => Setting::Int(*i),
        Value::Unsigned(u) => Setting::Int(i64::from(*u)),
        Value::Double(d) => Setting::Float(*d),
        Value::Bool(b) => Setting::Bool(*b),
        Value::String(s) => Setting::String(s.clone()),
        Value::IntList(l) => Setting::Array(l.iter().map(|i| Setting::Int(i64::from(*i))).collect()),
        Value::StringList(l) => Setting::Array(l.iter().cloned().map(Setting::String).collect()),
    }
}

/// Scalar elements of a list value, for templated paths
fn list_elements(value: &Value) -> Vec<Setting> {
    match value_node(value) {
        Setting::Array(items) => items,
        scalar => vec![scalar],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// One site "A" with building "B1" holding access point "fcc1:serial1"
    pub(crate) const SAMPLE: &str = r#"
ver = 1

[[sites]]
name = "A"
spectrum_controller_host = "sc.example.net"

[sites.tls]
dns_interval = 600
tls_debug = true

[[sites.buildings]]
name = "B1"
sas_url = "https://sas.example.net/v1.2"
user_id = "user"
ca_path = "/etc/ca"

[[sites.buildings.aps]]
admin_state = true
single_step = false
central_freq_khz = 3625000
radio_bandwidth_mhz = 20
channel_blacklist = [1, 6]
fcc_id = "fcc1"
serial_number = "serial1"
category = "A"
call_sign = "CALL"
radio_technology = "NR"
vendor = "acme"
model = "m1"
software_version = "1.0"
hardware_version = "2.0"
firmware_version = "3.0"
meas_capabilities = ["RECEIVED_POWER_WITHOUT_GRANT"]
eirp_capability = 30
latitude = 37.4
longitude = -122
height = 6.5
height_type = "AGL"
horizontal_accuracy = 1.0
vertical_accuracy = 2.0
indoor_site = true
antenna_azimuth = 90
antenna_downtilt = 3
antenna_gain = 5
antenna_beamwidth = 60
antenna_model = "ant"
ap_cert = "/certs/ap.pem"
ap_key = "/certs/ap.key"
key_passwd = "secret"
groups = [
  { type = "INTERFERENCE_COORDINATION", id = "g1" },
  { type = "COEXISTENCE", id = "g2" },
]

[sites.buildings.aps.cpi_signature_data]
protected_header = "hdr"
encoded_cpi_signed_data = "data"
digital_signature = "sig"

[app]
thread_pool_size = 4
log_path = "/var/log/shim"
"#;

    #[test]
    fn test_tree_version() {
        let root = Setting::parse_toml("ver = 2").unwrap();
        assert_eq!(tree_version(&root).unwrap(), SchemaVersion::V2);
        let root = Setting::parse_toml("x = 1").unwrap();
        assert_eq!(tree_version(&root).unwrap(), SchemaVersion::V1);
        let root = Setting::parse_toml("ver = \"two\"").unwrap();
        assert!(matches!(tree_version(&root), Err(ShimError::InvalidValue { .. })));
    }

    #[test]
    fn test_scalar_ranges() {
        assert_eq!(
            scalar_value(&Setting::Int(-5), TypeTag::Int32, "p").unwrap(),
            Value::Int32(-5)
        );
        assert!(scalar_value(&Setting::Int(-5), TypeTag::Unsigned, "p").is_err());
        assert!(scalar_value(&Setting::Int(1 << 40), TypeTag::Int32, "p").is_err());
        assert_eq!(
            scalar_value(&Setting::Int(3), TypeTag::Double, "p").unwrap(),
            Value::Double(3.0)
        );
        assert!(scalar_value(&Setting::Bool(true), TypeTag::String, "p").is_err());
    }
}
