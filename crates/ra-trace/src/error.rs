//! Error types for the trace store

use crate::record::TraceId;
use std::path::PathBuf;

/// Trace store errors
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// No run with this identifier was ever recorded
    #[error("trace not found: {0}")]
    NotFound(TraceId),

    /// Identifier already registered
    #[error("trace already exists: {0}")]
    AlreadyExists(TraceId),

    /// Run already has a final status
    #[error("trace {0} is sealed")]
    Sealed(TraceId),

    /// Attempt index does not continue the sequence
    #[error("trace {trace_id}: expected attempt {expected}, got {got}")]
    OutOfOrder {
        /// Run identifier
        trace_id: TraceId,
        /// Next index the store accepts
        expected: u32,
        /// Index that was offered
        got: u32,
    },

    /// Final status does not agree with the recorded attempts
    #[error("trace {trace_id}: {reason}")]
    Inconsistent {
        /// Run identifier
        trace_id: TraceId,
        /// What disagrees
        reason: String,
    },

    /// Journal I/O failed
    #[error("journal I/O at {path}: {source}")]
    Journal {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Journal file does not describe a valid run
    #[error("corrupt journal {path} line {line}: {reason}")]
    Corrupt {
        /// Journal file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },
}

impl TraceError {
    /// Check if the error means the trace does not exist
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
