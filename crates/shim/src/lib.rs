//! Shim - Schema-driven configuration object model
//!
//! This crate provides the runtime of the configuration shim:
//! - Live entities bound to declarative, versioned schemas
//! - An object store indexing entities by business key and numeric id
//! - Synchronous change notifications
//! - Mapping between settings trees and entities
//! - Mechanical migration of entities between schema versions

pub use shim_types;

// Error types
pub mod error;

// Change notifications
pub mod pubsub;

// Entities and their schemas
pub mod entity;

// Entity registry
pub mod store;

// Settings tree ↔ entities
pub mod mapper;

// Version migration
pub mod migrate;

// Outer boundary: load, parse, migrate, build, save
pub mod session;

// Settings file IO
pub mod io;

// Tree outline rendering
pub mod inspect;

// Binary configuration
pub mod config;

pub use error::{Result, ShimError};
