//! Access point schemas
//!
//! Version 2 moves the CPI signature fields to the top level, makes the
//! certificate material mandatory and renames `key_passwd` to the required
//! `key_password`.

use std::sync::LazyLock;

use shim_types::{Composition, EntityKind, FieldSpec, Schema, SchemaBuilder, SchemaVersion, TypeTag};

/// Access points are keyed by their FCC id and serial number
pub(super) fn business_key(fcc_id: &str, serial_number: &str) -> String {
    format!("{fcc_id}:{serial_number}")
}

/// Fields shared by every version, in declaration order
fn common(version: SchemaVersion) -> SchemaBuilder {
    Schema::builder(EntityKind::AccessPoint, version)
        .field(FieldSpec::composed(
            "name",
            TypeTag::String,
            Composition::Concat {
                first: "fcc_id",
                second: "serial_number",
                separator: ":",
            },
        ))
        .field(FieldSpec::composed(
            "site_name",
            TypeTag::String,
            Composition::AncestorKey(EntityKind::Site),
        ))
        .field(FieldSpec::composed(
            "building_name",
            TypeTag::String,
            Composition::AncestorKey(EntityKind::Building),
        ))
        .field(FieldSpec::required("admin_state", TypeTag::Bool))
        .field(FieldSpec::required("single_step", TypeTag::Bool))
        .field(FieldSpec::optional("persistent", TypeTag::Bool))
        .field(FieldSpec::optional("psi_enabled", TypeTag::Bool).with_default(true))
        .field(FieldSpec::optional("psi_interval", TypeTag::Int32).with_default(30))
        .field(FieldSpec::optional("hbt_interval", TypeTag::Int32).with_default(60))
        .field(FieldSpec::optional("trans_expire_margin", TypeTag::Int32).with_default(10))
        .field(FieldSpec::required("central_freq_khz", TypeTag::Unsigned))
        .field(FieldSpec::required("radio_bandwidth_mhz", TypeTag::Unsigned))
        .field(FieldSpec::required("channel_blacklist", TypeTag::IntList))
        // registration
        .field(FieldSpec::required("fcc_id", TypeTag::String))
        .field(FieldSpec::required("serial_number", TypeTag::String))
        .field(FieldSpec::required("category", TypeTag::String))
        .field(FieldSpec::required("call_sign", TypeTag::String))
        .field(FieldSpec::required("radio_technology", TypeTag::String))
        .field(FieldSpec::required("vendor", TypeTag::String))
        .field(FieldSpec::required("model", TypeTag::String))
        .field(FieldSpec::required("software_version", TypeTag::String))
        .field(FieldSpec::required("hardware_version", TypeTag::String))
        .field(FieldSpec::required("firmware_version", TypeTag::String))
        .field(FieldSpec::required("meas_capabilities", TypeTag::StringList))
        .field(FieldSpec::required("eirp_capability", TypeTag::Int32))
        // installation
        .field(FieldSpec::required("latitude", TypeTag::Double))
        .field(FieldSpec::required("longitude", TypeTag::Double))
        .field(FieldSpec::required("height", TypeTag::Double))
        .field(FieldSpec::required("height_type", TypeTag::String))
        .field(FieldSpec::required("horizontal_accuracy", TypeTag::Double))
        .field(FieldSpec::required("vertical_accuracy", TypeTag::Double))
        .field(FieldSpec::required("indoor_site", TypeTag::Bool))
        .field(FieldSpec::required("antenna_azimuth", TypeTag::Int32))
        .field(FieldSpec::required("antenna_downtilt", TypeTag::Int32))
        .field(FieldSpec::required("antenna_gain", TypeTag::Int32))
        .field(FieldSpec::required("antenna_beamwidth", TypeTag::Int32))
        .field(FieldSpec::required("antenna_model", TypeTag::String))
        // grouping, synthesized from the `groups` records
        .field(FieldSpec::required("group_types", TypeTag::StringList).at("groups.[%d].type"))
        .field(FieldSpec::required("group_ids", TypeTag::StringList).at("groups.[%d].id"))
}

static ACCESS_POINT_V1: LazyLock<Schema> = LazyLock::new(|| {
    common(SchemaVersion::V1)
        .field(
            FieldSpec::optional("protected_header", TypeTag::String)
                .at("cpi_signature_data.protected_header"),
        )
        .field(
            FieldSpec::optional("encoded_cpi_signed_data", TypeTag::String)
                .at("cpi_signature_data.encoded_cpi_signed_data"),
        )
        .field(
            FieldSpec::optional("digital_signature", TypeTag::String)
                .at("cpi_signature_data.digital_signature"),
        )
        .field(FieldSpec::optional("ap_cert", TypeTag::String))
        .field(FieldSpec::optional("ap_key", TypeTag::String))
        .field(FieldSpec::optional("key_passwd", TypeTag::String))
        .build()
});

static ACCESS_POINT_V2: LazyLock<Schema> = LazyLock::new(|| {
    common(SchemaVersion::V2)
        .field(FieldSpec::optional("protected_header", TypeTag::String))
        .field(FieldSpec::optional("encoded_cpi_signed_data", TypeTag::String))
        .field(FieldSpec::optional("digital_signature", TypeTag::String))
        .field(FieldSpec::required("ap_cert", TypeTag::String))
        .field(FieldSpec::required("ap_key", TypeTag::String))
        .field(FieldSpec::required("key_password", TypeTag::String))
        .build()
});

pub(super) fn schema(version: SchemaVersion) -> Option<&'static Schema> {
    match version {
        SchemaVersion::V1 => Some(&ACCESS_POINT_V1),
        SchemaVersion::V2 => Some(&ACCESS_POINT_V2),
        _ => None,
    }
}
