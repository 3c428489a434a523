//! Coercion Engine
//!
//! Given raw generator text and the issues the schema registry found in it,
//! attempts deterministic repairs without calling the generator again.
//! Repairs run as ordered passes, each applied at most once per attempt:
//!
//! 1. [`RepairKind::StripProse`] - cut the JSON object/array out of surrounding text
//! 2. [`RepairKind::CoerceNumbers`] - turn numeric strings into numbers where the
//!    schema asks for a number
//! 3. [`RepairKind::NormalizeEnums`] - case-insensitive match against the enum domain
//! 4. [`RepairKind::TruncateArrays`] - cut arrays down to their upper bound
//!
//! Short arrays are never padded; that is left to the correction loop.

pub mod engine;
pub mod passes;

pub use engine::{CoercionEngine, CoercionOutcome};
pub use passes::{PassResult, RepairKind};
