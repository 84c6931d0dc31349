//! Building schema

use std::sync::LazyLock;

use shim_types::{Composition, EntityKind, FieldSpec, Schema, SchemaVersion, TypeTag};

static BUILDING_V1: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder(EntityKind::Building, SchemaVersion::V1)
        .field(FieldSpec::required("name", TypeTag::String))
        .field(FieldSpec::composed(
            "site_name",
            TypeTag::String,
            Composition::AncestorKey(EntityKind::Site),
        ))
        .field(FieldSpec::required("sas_url", TypeTag::String))
        .field(FieldSpec::required("user_id", TypeTag::String))
        .field(FieldSpec::required("ca_path", TypeTag::String))
        .field(FieldSpec::optional("root_ca", TypeTag::String).with_default("/"))
        .field(FieldSpec::optional("sas_crl", TypeTag::String).with_default("/test.crl"))
        .build()
});

static BUILDING_V2: LazyLock<Schema> =
    LazyLock::new(|| BUILDING_V1.with_version(SchemaVersion::V2));

pub(super) fn schema(version: SchemaVersion) -> Option<&'static Schema> {
    match version {
        SchemaVersion::V1 => Some(&BUILDING_V1),
        SchemaVersion::V2 => Some(&BUILDING_V2),
        _ => None,
    }
}
