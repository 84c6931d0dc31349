//! Application settings schema
//!
//! The application entity is a process-wide singleton holding runtime
//! tuning. It always uses [`EntityId::APPLICATION`](super::EntityId::APPLICATION)
//! and the fixed key [`APPLICATION_KEY`].

use std::sync::LazyLock;

use shim_types::{EntityKind, FieldSpec, Schema, SchemaVersion, TypeTag};

/// Business key of the application singleton
pub const APPLICATION_KEY: &str = "app_config";

static APPLICATION_V1: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder(EntityKind::Application, SchemaVersion::V1)
        .field(FieldSpec::optional("thread_pool_size", TypeTag::Unsigned).with_default(1u32))
        .field(FieldSpec::optional("max_req_per_msg", TypeTag::Unsigned).with_default(1u32))
        .field(FieldSpec::optional("flush_interval_ms", TypeTag::Unsigned).with_default(1000u32))
        .field(FieldSpec::optional("log_path", TypeTag::String).with_default("./"))
        .field(FieldSpec::optional("sas_log_level", TypeTag::String).with_default("debug"))
        .field(FieldSpec::optional("dev_log_level", TypeTag::String).with_default("debug"))
        .field(FieldSpec::optional("con_log_level", TypeTag::String).with_default("debug"))
        .build()
});

static APPLICATION_V2: LazyLock<Schema> =
    LazyLock::new(|| APPLICATION_V1.with_version(SchemaVersion::V2));

pub(super) fn schema(version: SchemaVersion) -> Option<&'static Schema> {
    match version {
        SchemaVersion::V1 => Some(&APPLICATION_V1),
        SchemaVersion::V2 => Some(&APPLICATION_V2),
        _ => None,
    }
}
