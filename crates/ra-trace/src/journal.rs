//! JSON-lines journal
//!
//! One file per run at `<dir>/<trace_id>.jsonl`, one [`TraceEvent`] per line.
//! Files are only ever appended to, so an abandoned run leaves a readable
//! prefix behind.

use crate::error::TraceError;
use crate::record::{AttemptRecord, FinalStatus, RunRecord, TraceId};
use chrono::{DateTime, Utc};
use ra_schema::Mode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Run registered
    Start {
        /// Run identifier
        trace_id: TraceId,
        /// Request mode
        mode: Mode,
        /// Normalized input
        input_summary: Value,
        /// Event time
        ts: DateTime<Utc>,
    },
    /// Attempt recorded
    Attempt {
        /// The attempt
        attempt: AttemptRecord,
    },
    /// Run sealed
    Done {
        /// How the payload was obtained
        final_status: FinalStatus,
        /// Payload returned to the caller
        final_payload: Value,
        /// Event time
        ts: DateTime<Utc>,
    },
}

/// Directory of per-run journal files
#[derive(Debug, Clone)]
pub struct TraceJournal {
    dir: PathBuf,
}

impl TraceJournal {
    /// Open a journal directory, creating it if needed
    ///
    /// # Errors
    /// Returns [`TraceError::Journal`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, TraceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| TraceError::Journal {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Journal directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the events of `id`
    #[must_use]
    pub fn path_for(&self, id: &TraceId) -> PathBuf {
        self.dir.join(format!("{id}.jsonl"))
    }

    /// Append one event to the run's file
    ///
    /// # Errors
    /// Returns [`TraceError::Journal`] on I/O failure.
    pub fn append(&self, id: &TraceId, event: &TraceEvent) -> Result<(), TraceError> {
        let path = self.path_for(id);
        let io_err = |source| TraceError::Journal {
            path: path.clone(),
            source,
        };
        let mut line = serde_json::to_vec(event)
            .map_err(|e| io_err(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        file.write_all(&line).map_err(io_err)?;
        file.flush().map_err(io_err)
    }

    /// Rebuild a run from its file
    ///
    /// A trailing line that fails to parse is treated as a torn write and
    /// skipped; a bad line anywhere else is corruption.
    ///
    /// # Errors
    /// - [`TraceError::NotFound`] if the run has no file
    /// - [`TraceError::Corrupt`] if the events do not describe a run
    /// - [`TraceError::Journal`] on I/O failure
    pub fn replay(&self, id: &TraceId) -> Result<RunRecord, TraceError> {
        let path = self.path_for(id);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(TraceError::NotFound(*id)),
            Err(source) => return Err(TraceError::Journal { path, source }),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()
            .map_err(|source| TraceError::Journal {
                path: path.clone(),
                source,
            })?;

        let corrupt = |line: usize, reason: String| TraceError::Corrupt {
            path: path.clone(),
            line,
            reason,
        };

        let mut run: Option<RunRecord> = None;
        let last = lines.len();
        for (n, line) in lines.iter().enumerate().map(|(i, l)| (i + 1, l)) {
            if line.trim().is_empty() {
                continue;
            }
            let event: TraceEvent = match serde_json::from_str(line) {
                Ok(ev) => ev,
                Err(e) if n == last => {
                    tracing::warn!(path = %path.display(), line = n, error = %e, "skipping torn journal line");
                    break;
                }
                Err(e) => return Err(corrupt(n, e.to_string())),
            };

            match (event, run.as_mut()) {
                (TraceEvent::Start { trace_id, mode, input_summary, ts }, None) => {
                    if trace_id != *id {
                        return Err(corrupt(n, format!("start event names {trace_id}")));
                    }
                    let mut record = RunRecord::new(trace_id, mode, input_summary);
                    record.started_at = ts;
                    run = Some(record);
                }
                (TraceEvent::Start { .. }, Some(_)) => {
                    return Err(corrupt(n, "duplicate start event".into()));
                }
                (_, None) => return Err(corrupt(n, "event before start".into())),
                (_, Some(record)) if record.is_complete() => {
                    return Err(corrupt(n, "event after done".into()));
                }
                (TraceEvent::Attempt { attempt }, Some(record)) => {
                    let expected = u32::try_from(record.attempts.len()).unwrap_or(u32::MAX);
                    if attempt.attempt_index != expected {
                        return Err(corrupt(
                            n,
                            format!("attempt {} out of order, expected {expected}", attempt.attempt_index),
                        ));
                    }
                    record.attempts.push(attempt);
                }
                (TraceEvent::Done { final_status, final_payload, ts }, Some(record)) => {
                    record.final_status = Some(final_status);
                    record.final_payload = Some(final_payload);
                    record.finished_at = Some(ts);
                }
            }
        }

        run.ok_or_else(|| corrupt(1, "journal has no start event".into()))
    }
}
