//! Schema Registry
//!
//! Holds the versioned output schemas (one per request mode) and exposes a
//! pure validation function over generator payloads:
//! - [`SchemaRegistry::validate`] maps every schema violation to a
//!   [`ValidationIssue`] with a [`FieldPath`] and an [`ErrorKind`]
//! - [`SchemaRegistry::parse`] turns raw generator text into JSON, reporting
//!   `malformed_json` on failure
//! - [`SchemaRegistry::fallback`] produces the static schema-valid placeholder
//!   returned when the retry budget is exhausted
//!
//! # Example
//!
//! ```rust,ignore
//! use ra_schema::{SchemaRegistry, SchemaVersion};
//!
//! let registry = SchemaRegistry::new()?;
//! let payload = registry.parse(raw)?;
//! let result = registry.validate(&payload, SchemaVersion::TopicV1);
//! assert!(result.is_valid());
//! ```

pub mod documents;
pub mod error;
pub mod fallback;
pub mod issue;
pub mod mode;
pub mod path;
pub mod registry;

pub use error::SchemaError;
pub use issue::{ErrorKind, ValidationIssue, ValidationResult};
pub use mode::{Mode, ModeParseError, SchemaVersion};
pub use path::{FieldPath, PathError, Segment};
pub use registry::{ArrayBounds, SchemaRegistry};

/// Self-check marker placed in `quality.self_checks` of fallback payloads
pub const FALLBACK_MARKER: &str = "fallback_used";

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
