//! Concurrent trace store

use crate::error::TraceError;
use crate::journal::{TraceEvent, TraceJournal};
use crate::record::{AttemptRecord, FinalStatus, RunRecord, TraceId};
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ra_schema::Mode;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug)]
enum TraceSlot {
    Open(RunRecord),
    Sealed(Arc<RunRecord>),
}

/// Append-only store of run traces
///
/// Runs are keyed by [`TraceId`]; writes to different runs never contend on
/// a shared lock. Sealed records are shared as `Arc<RunRecord>` and are
/// immutable from then on.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    runs: DashMap<TraceId, TraceSlot>,
    journal: Option<TraceJournal>,
}

impl TraceRecorder {
    /// Create memory-only recorder
    #[inline]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Create recorder that mirrors every event to `journal`
    #[inline]
    #[must_use]
    pub fn with_journal(journal: TraceJournal) -> Self {
        Self {
            runs: DashMap::new(),
            journal: Some(journal),
        }
    }

    /// Journal, if any
    #[inline]
    #[must_use]
    pub fn journal(&self) -> Option<&TraceJournal> {
        self.journal.as_ref()
    }

    /// Register a new run
    ///
    /// # Errors
    /// Returns [`TraceError::AlreadyExists`] if `trace_id` is taken.
    pub fn open(&self, trace_id: TraceId, mode: Mode, input_summary: Value) -> Result<(), TraceError> {
        let record = RunRecord::new(trace_id, mode, input_summary.clone());
        let started_at = record.started_at;
        match self.runs.entry(trace_id) {
            Entry::Occupied(_) => return Err(TraceError::AlreadyExists(trace_id)),
            Entry::Vacant(slot) => {
                slot.insert(TraceSlot::Open(record));
            }
        }
        tracing::debug!(%trace_id, mode = mode.as_str(), "trace opened");
        self.journal_event(
            &trace_id,
            &TraceEvent::Start {
                trace_id,
                mode,
                input_summary,
                ts: started_at,
            },
        );
        Ok(())
    }

    /// Append an attempt to an open run
    ///
    /// # Errors
    /// - [`TraceError::NotFound`] if the run was never opened
    /// - [`TraceError::Sealed`] if the run is already complete
    /// - [`TraceError::OutOfOrder`] unless `attempt_index` equals the number of
    ///   attempts recorded so far
    pub fn record(&self, trace_id: &TraceId, attempt: AttemptRecord) -> Result<(), TraceError> {
        {
            let mut slot = self
                .runs
                .get_mut(trace_id)
                .ok_or(TraceError::NotFound(*trace_id))?;
            let TraceSlot::Open(run) = &mut *slot else {
                return Err(TraceError::Sealed(*trace_id));
            };
            let expected = u32::try_from(run.attempts.len()).unwrap_or(u32::MAX);
            if attempt.attempt_index != expected {
                return Err(TraceError::OutOfOrder {
                    trace_id: *trace_id,
                    expected,
                    got: attempt.attempt_index,
                });
            }
            run.attempts.push(attempt.clone());
        }
        tracing::debug!(
            trace_id = %trace_id,
            attempt = attempt.attempt_index,
            outcome = ?attempt.outcome,
            "attempt recorded"
        );
        self.journal_event(trace_id, &TraceEvent::Attempt { attempt });
        Ok(())
    }

    /// Set the final status and payload, sealing the run
    ///
    /// # Errors
    /// - [`TraceError::NotFound`] if the run was never opened
    /// - [`TraceError::Sealed`] if the run is already complete
    /// - [`TraceError::Inconsistent`] if `status` contradicts the last attempt
    pub fn complete(
        &self,
        trace_id: &TraceId,
        payload: Value,
        status: FinalStatus,
    ) -> Result<Arc<RunRecord>, TraceError> {
        let sealed = {
            let mut slot = self
                .runs
                .get_mut(trace_id)
                .ok_or(TraceError::NotFound(*trace_id))?;
            let TraceSlot::Open(run) = &*slot else {
                return Err(TraceError::Sealed(*trace_id));
            };
            run.check_status(status)
                .map_err(|reason| TraceError::Inconsistent {
                    trace_id: *trace_id,
                    reason,
                })?;

            let mut run = run.clone();
            run.final_payload = Some(payload.clone());
            run.final_status = Some(status);
            run.finished_at = Some(Utc::now());
            let sealed = Arc::new(run);
            *slot = TraceSlot::Sealed(Arc::clone(&sealed));
            sealed
        };
        tracing::debug!(%trace_id, %status, attempts = sealed.attempts.len(), "trace sealed");
        self.journal_event(
            trace_id,
            &TraceEvent::Done {
                final_status: status,
                final_payload: payload,
                ts: sealed.finished_at.unwrap_or_else(Utc::now),
            },
        );
        Ok(sealed)
    }

    /// Fetch a run, complete or partial
    ///
    /// Runs not held in memory are replayed from the journal when one is
    /// configured.
    ///
    /// # Errors
    /// - [`TraceError::NotFound`] if no run with this identifier exists
    /// - journal errors if replay fails
    pub fn get(&self, trace_id: &TraceId) -> Result<Arc<RunRecord>, TraceError> {
        if let Some(slot) = self.runs.get(trace_id) {
            return Ok(match slot.value() {
                TraceSlot::Open(run) => Arc::new(run.clone()),
                TraceSlot::Sealed(run) => Arc::clone(run),
            });
        }

        let journal = self.journal.as_ref().ok_or(TraceError::NotFound(*trace_id))?;
        let run = Arc::new(journal.replay(trace_id)?);
        if run.is_complete() {
            self.runs
                .entry(*trace_id)
                .or_insert_with(|| TraceSlot::Sealed(Arc::clone(&run)));
        }
        Ok(run)
    }

    /// Number of runs held in memory
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Check if no runs are held in memory
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Identifiers of runs held in memory
    #[must_use]
    pub fn trace_ids(&self) -> Vec<TraceId> {
        self.runs.iter().map(|entry| *entry.key()).collect()
    }

    /// Stop the recorder, returning the runs it still held
    ///
    /// Journal files are flushed per event, so nothing is left to write.
    #[must_use]
    pub fn shutdown(self) -> Vec<RunRecord> {
        let open = self
            .runs
            .iter()
            .filter(|entry| matches!(entry.value(), TraceSlot::Open(_)))
            .count();
        if open > 0 {
            tracing::info!(open, "recorder stopped with unfinished runs");
        }
        self.runs
            .into_iter()
            .map(|(_, slot)| match slot {
                TraceSlot::Open(run) => run,
                TraceSlot::Sealed(run) => Arc::try_unwrap(run).unwrap_or_else(|run| (*run).clone()),
            })
            .collect()
    }

    fn journal_event(&self, trace_id: &TraceId, event: &TraceEvent) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(trace_id, event) {
                tracing::warn!(%trace_id, error = %e, "trace journal write failed");
            }
        }
    }
}
