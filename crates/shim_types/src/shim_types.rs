//! Shim Types - Data model shared by the configuration shim
//!
//! This crate holds the pure data structures of the shim: tagged field
//! values, the generic settings tree that configuration files are parsed
//! into, and the declarative schemas describing each entity kind.

mod schema;
mod setting;
mod value;

pub use schema::*;
pub use setting::*;
pub use value::*;
