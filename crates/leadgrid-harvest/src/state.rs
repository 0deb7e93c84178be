//! Run status tracking: the per-run state machine and the process-wide
//! registry callers poll.
//!
//! Transitions: PENDING → RUNNING (on the first progress update) →
//! {COMPLETED, FAILED}. Terminal states are final; later updates are
//! rejected. Progress is a single monotonically non-decreasing percentage.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("run {0} is not registered")]
    UnknownRun(Uuid),

    #[error("run {0} already reached a terminal status")]
    Terminal(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Payload of a COMPLETED run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub record_count: usize,
    pub export_path: PathBuf,
}

/// Pollable snapshot of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    pub status: RunStatus,
    pub progress_percent: f64,
    pub status_message: String,
    /// Present only when `status` is `Completed`.
    pub outcome: Option<RunOutcome>,
}

impl RunState {
    fn pending() -> Self {
        Self {
            status: RunStatus::Pending,
            progress_percent: 0.0,
            status_message: "submitted".to_owned(),
            outcome: None,
        }
    }
}

/// Cooperative cancellation signal for one run.
///
/// Checked before every sleep and every external call; cancellation fails the
/// run with message "cancelled" and leaves its checkpoint intact for a later
/// resume.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Process-wide map of run id → state.
///
/// Entries are inserted on submission and retained until [`Self::remove`];
/// independent runs touch disjoint entries, so a plain mutex around the map
/// is all the synchronization this needs.
#[derive(Debug, Clone, Default)]
pub struct RunRegistry {
    inner: Arc<Mutex<HashMap<Uuid, RunState>>>,
}

impl RunRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, RunState>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new PENDING run and returns its identifier.
    #[must_use]
    pub fn submit(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().insert(id, RunState::pending());
        id
    }

    /// Records forward progress.
    ///
    /// The first update moves PENDING → RUNNING. Progress is clamped to
    /// `[0, 100]` and never decreases: a lower value than the current one is
    /// ignored (the message still updates).
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownRun`] for an unregistered id,
    /// [`StateError::Terminal`] once the run finished.
    pub fn update_progress(
        &self,
        id: Uuid,
        percent: f64,
        message: impl Into<String>,
    ) -> Result<(), StateError> {
        let mut map = self.lock();
        let state = map.get_mut(&id).ok_or(StateError::UnknownRun(id))?;
        if state.status.is_terminal() {
            return Err(StateError::Terminal(id));
        }
        state.status = RunStatus::Running;
        let clamped = percent.clamp(0.0, 100.0);
        if clamped > state.progress_percent {
            state.progress_percent = clamped;
        }
        state.status_message = message.into();
        Ok(())
    }

    /// Moves the run to COMPLETED with its outcome; progress becomes 100.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownRun`] for an unregistered id,
    /// [`StateError::Terminal`] once the run finished.
    pub fn complete(&self, id: Uuid, outcome: RunOutcome) -> Result<(), StateError> {
        let mut map = self.lock();
        let state = map.get_mut(&id).ok_or(StateError::UnknownRun(id))?;
        if state.status.is_terminal() {
            return Err(StateError::Terminal(id));
        }
        state.status = RunStatus::Completed;
        state.progress_percent = 100.0;
        state.status_message = format!("completed: {} records", outcome.record_count);
        state.outcome = Some(outcome);
        Ok(())
    }

    /// Moves the run to FAILED with a human-readable message.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownRun`] for an unregistered id,
    /// [`StateError::Terminal`] once the run finished.
    pub fn fail(&self, id: Uuid, message: impl Into<String>) -> Result<(), StateError> {
        let mut map = self.lock();
        let state = map.get_mut(&id).ok_or(StateError::UnknownRun(id))?;
        if state.status.is_terminal() {
            return Err(StateError::Terminal(id));
        }
        state.status = RunStatus::Failed;
        state.status_message = message.into();
        Ok(())
    }

    /// Current state of a run, if registered.
    #[must_use]
    pub fn snapshot(&self, id: Uuid) -> Option<RunState> {
        self.lock().get(&id).cloned()
    }

    /// Explicit garbage collection of a finished (or abandoned) run entry.
    pub fn remove(&self, id: Uuid) -> Option<RunState> {
        self.lock().remove(&id)
    }
}
