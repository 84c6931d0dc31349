//! Site schema
//!
//! A site is the root of the hierarchy. Besides its name it carries the
//! connection tuning used when talking to the spectrum controller.

use std::sync::LazyLock;

use shim_types::{EntityKind, FieldSpec, Schema, SchemaVersion, TypeTag};

static SITE_V1: LazyLock<Schema> = LazyLock::new(|| {
    Schema::builder(EntityKind::Site, SchemaVersion::V1)
        .field(FieldSpec::required("name", TypeTag::String))
        .field(FieldSpec::optional("ap_mode", TypeTag::Int32).with_default(0))
        .field(FieldSpec::optional("spectrum_controller_host", TypeTag::String))
        .field(FieldSpec::optional("dns_cache", TypeTag::String).at("tls.dns_cache"))
        .field(
            FieldSpec::optional("dns_interval", TypeTag::Int64)
                .at("tls.dns_interval")
                .with_default(86_400i64),
        )
        .field(
            FieldSpec::optional("local_port", TypeTag::Int32)
                .at("tls.local_port")
                .with_default(0),
        )
        .field(
            FieldSpec::optional("maxage_conn", TypeTag::Int64)
                .at("tls.maxage_conn")
                .with_default(118i64),
        )
        .field(
            FieldSpec::optional("conn_timeout", TypeTag::Int64)
                .at("tls.conn_timeout")
                .with_default(300i64),
        )
        .field(
            FieldSpec::optional("ip_resolve", TypeTag::Int64)
                .at("tls.ip_resolve")
                .with_default(0i64),
        )
        .field(FieldSpec::optional("interface", TypeTag::String).at("tls.interface"))
        .field(
            FieldSpec::optional("tcp_keepalive_idle", TypeTag::Int64)
                .at("tls.tcp_keepalive_idle")
                .with_default(60i64),
        )
        .field(
            FieldSpec::optional("tcp_keepalive_interval", TypeTag::Int64)
                .at("tls.tcp_keepalive_interval")
                .with_default(60i64),
        )
        .field(
            FieldSpec::optional("tls_debug", TypeTag::Bool)
                .at("tls.tls_debug")
                .with_default(false),
        )
        .build()
});

// v2 did not change the site layout
static SITE_V2: LazyLock<Schema> = LazyLock::new(|| SITE_V1.with_version(SchemaVersion::V2));

pub(super) fn schema(version: SchemaVersion) -> Option<&'static Schema> {
    match version {
        SchemaVersion::V1 => Some(&SITE_V1),
        SchemaVersion::V2 => Some(&SITE_V2),
        _ => None,
    }
}
