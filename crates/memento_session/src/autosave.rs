//! Debounced autosave as an explicit-time state machine.
//!
//! ```text
//! Idle -> Pending -> Saving -> Saved -> Idle
//!                      \-> Error -> Idle
//! ```
//!
//! The coordinator never reads a clock. Callers hand it `now` and ask for
//! [`AutosaveCoordinator::next_deadline`] to know when to poll again; the
//! tokio driver in [`crate::driver`] does exactly that.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use memento_core::config::AutosaveConfig;
use memento_core::{ProjectSnapshot, TimeUs};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::Result;
use crate::store::ProjectStore;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SaveStatus {
    Idle,
    Pending,
    Saving,
    Saved,
    Error,
}

/// Single restartable deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceTimer {
    delay: TimeUs,
    deadline: Option<TimeUs>,
}

impl DebounceTimer {
    pub fn new(delay: TimeUs) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Start the timer, replacing any earlier deadline.
    pub fn arm(&mut self, now: TimeUs) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<TimeUs> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: TimeUs) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

pub struct AutosaveCoordinator {
    store: Arc<dyn ProjectStore>,
    config: AutosaveConfig,
    status: watch::Sender<SaveStatus>,
    timer: DebounceTimer,
    /// When a `Saved` or `Error` status falls back to `Idle`.
    revert_at: Option<TimeUs>,
    baseline: Option<String>,
    pending: Option<ProjectSnapshot>,
    closed: bool,
    save_count: u64,
    last_saved: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl std::fmt::Debug for AutosaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveCoordinator")
            .field("status", &self.status())
            .field("timer", &self.timer)
            .field("closed", &self.closed)
            .field("save_count", &self.save_count)
            .finish()
    }
}

impl AutosaveCoordinator {
    pub fn new(store: Arc<dyn ProjectStore>, config: AutosaveConfig) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            store,
            timer: DebounceTimer::new(config.debounce()),
            config,
            status,
            revert_at: None,
            baseline: None,
            pending: None,
            closed: false,
            save_count: 0,
            last_saved: None,
            last_error: None,
        }
    }

    pub fn status(&self) -> SaveStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    pub fn save_count(&self) -> u64 {
        self.save_count
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Earliest time `poll` has something to do.
    pub fn next_deadline(&self) -> Option<TimeUs> {
        if self.closed {
            return None;
        }
        match (self.timer.deadline(), self.revert_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Record the current project state. The first call only sets the
    /// baseline; later calls with different content (re)start the debounce
    /// timer. Returns `true` if a save is now scheduled.
    pub fn observe(&mut self, now: TimeUs, snapshot: ProjectSnapshot) -> Result<bool> {
        if self.closed {
            return Ok(false);
        }
        let key = snapshot.change_key()?;
        match &self.baseline {
            None => {
                self.baseline = Some(key);
                return Ok(false);
            }
            Some(previous) if *previous == key => return Ok(false),
            Some(_) => {}
        }

        self.baseline = Some(key);
        self.pending = Some(snapshot);
        self.revert_at = None;
        self.timer.arm(now);
        self.set_status(SaveStatus::Pending);
        Ok(true)
    }

    /// Fire whatever is due at `now`: the debounced save, or the fall back to
    /// `Idle` after a save result has been shown long enough.
    pub async fn poll(&mut self, now: TimeUs) {
        if self.closed {
            return;
        }
        if self.revert_at.is_some_and(|t| now >= t) {
            self.revert_at = None;
            if matches!(self.status(), SaveStatus::Saved | SaveStatus::Error) {
                self.set_status(SaveStatus::Idle);
            }
        }
        if self.timer.is_due(now) {
            self.timer.cancel();
            // Failures are already recorded in the status.
            let _ = self.save_pending(now).await;
        }
    }

    /// Save `snapshot` right away, dropping any scheduled save. A closed
    /// coordinator does nothing.
    pub async fn force_save(&mut self, now: TimeUs, snapshot: ProjectSnapshot) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.timer.cancel();
        self.baseline = Some(snapshot.change_key()?);
        self.pending = Some(snapshot);
        self.save_pending(now).await
    }

    /// Cancel any scheduled save. Nothing is saved after this.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.timer.cancel();
        self.revert_at = None;
        if self.pending.take().is_some() {
            tracing::debug!("autosave closed with an unsaved change");
        }
    }

    async fn save_pending(&mut self, now: TimeUs) -> Result<()> {
        let Some(snapshot) = self.pending.take() else {
            return Ok(());
        };
        self.set_status(SaveStatus::Saving);
        match self.store.save(snapshot.id, &snapshot).await {
            Ok(()) => {
                self.save_count += 1;
                self.last_saved = Some(Utc::now());
                self.last_error = None;
                self.revert_at = Some(now + self.config.saved_display());
                tracing::info!(project_id = %snapshot.id, saves = self.save_count, "project saved");
                self.set_status(SaveStatus::Saved);
                Ok(())
            }
            Err(e) => {
                tracing::error!(project_id = %snapshot.id, error = %e, "autosave failed");
                self.last_error = Some(e.to_string());
                self.revert_at = Some(now + self.config.error_display());
                self.set_status(SaveStatus::Error);
                Err(e)
            }
        }
    }

    fn set_status(&self, status: SaveStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            tracing::debug!(from = ?previous, to = ?status, "autosave status");
        }
    }
}
