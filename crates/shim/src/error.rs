//! Error types for the configuration shim

use shim_types::{EntityKind, SchemaVersion, SettingError, TypeTag, ValueError};

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, ShimError>;

/// Errors raised by the object model, the mapper and the migrator
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("missing required field '{field}' at {path}")]
    MissingRequiredField { field: &'static str, path: String },

    #[error("type mismatch on {kind}.{field}: expected {expected}, got {actual}")]
    TypeMismatch {
        kind: EntityKind,
        field: String,
        expected: TypeTag,
        actual: TypeTag,
    },

    #[error("unsupported version {version} for {kind}")]
    UnsupportedVersion {
        kind: EntityKind,
        version: SchemaVersion,
    },

    #[error("field '{field}' of {kind} changes type from {from} to {to}")]
    IncompatibleFieldType {
        kind: EntityKind,
        field: &'static str,
        from: TypeTag,
        to: TypeTag,
    },

    #[error("migration aborted at '{key}': {source}")]
    MigrationAborted {
        key: String,
        #[source]
        source: Box<ShimError>,
    },

    #[error("unknown node kind '{name}' at {path}")]
    UnknownNodeKind { name: String, path: String },

    #[error("{kind} has no field '{field}'")]
    UnknownField { kind: EntityKind, field: String },

    #[error("invalid value at {path}: {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("{kind} '{key}' has no enclosing {parent} '{parent_key}'")]
    MissingParent {
        kind: EntityKind,
        key: String,
        parent: EntityKind,
        parent_key: String,
    },

    #[error("identifier space exhausted for {0}")]
    IdSpaceExhausted(EntityKind),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Setting(#[from] SettingError),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ShimError {
    /// Attach entity context to an accessor error
    pub(crate) fn from_value(kind: EntityKind, field: &str, err: ValueError) -> Self {
        match err {
            ValueError::TypeMismatch { expected, actual } => ShimError::TypeMismatch {
                kind,
                field: field.to_string(),
                expected,
                actual,
            },
            ValueError::OutOfRange { .. } => ShimError::InvalidValue {
                path: format!("{kind}.{field}"),
                reason: err.to_string(),
            },
        }
    }
}
