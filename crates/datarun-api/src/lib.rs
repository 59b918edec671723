//! HTTP wire types and converters for datarun.
//!
//! This crate contains:
//! - Request/response bodies shared by the server, the runner and the CLI
//! - Converters between wire types and domain types

pub mod convert;
pub mod types;

pub use types::*;
