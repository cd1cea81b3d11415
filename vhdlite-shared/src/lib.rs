//! VhdLite Shared - Common types for the library and its tools
//!
//! This crate contains the error type and the native protocol vocabulary
//! used by both the `vhdlite` library and the `vhdlite` command-line tool.

pub mod constants;
pub mod errors;

pub use errors::{VhdliteError, VhdliteResult};
