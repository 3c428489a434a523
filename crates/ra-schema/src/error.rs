//! Error types for the schema registry

use crate::mode::SchemaVersion;

/// Registry construction errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A schema document failed to compile
    #[error("schema {version} failed to compile: {reason}")]
    Compile {
        /// Version being compiled
        version: SchemaVersion,
        /// Compiler message
        reason: String,
    },
}
