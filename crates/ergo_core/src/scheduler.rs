//! Regeneration coalescing.
//!
//! # Responsibility
//! - Collapse bursts of change notifications into as few regeneration passes
//!   as possible.
//! - Suppress notifications while a bulk load repopulates the document.
//!
//! # Invariants
//! - At most one check is pending at any time.
//! - A pass consumes the whole backlog; changes arriving during a pass are
//!   picked up by exactly one follow-up pass.
//! - While loading, `notify_changed` is ignored entirely.

use crate::config::SchedulerConfig;
use std::time::{Duration, Instant};

/// Dirty flag plus single pending check.
#[derive(Debug, Clone)]
pub struct UpdateScheduler {
    /// A change arrived since the last pass began.
    dirty: bool,
    /// A deferred check is scheduled.
    pending: bool,
    /// A pass is between `begin_pass` and `finish_pass`.
    running: bool,
    loading: bool,
    last_change: Option<Instant>,
    quiet_period: Duration,
    passes_run: u64,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

impl UpdateScheduler {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            dirty: false,
            pending: false,
            running: false,
            loading: false,
            last_change: None,
            quiet_period: config.quiet_period(),
            passes_run: 0,
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Number of passes started so far.
    pub fn passes_run(&self) -> u64 {
        self.passes_run
    }

    /// Records a change now.
    pub fn notify_changed(&mut self) {
        self.notify_changed_at(Instant::now());
    }

    /// Records a change at `now`.
    pub fn notify_changed_at(&mut self, now: Instant) {
        if self.loading {
            return;
        }
        self.dirty = true;
        self.last_change = Some(now);
        if !self.running {
            self.pending = true;
        }
    }

    /// Whether the pending check may run at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        if !self.pending || self.running {
            return false;
        }
        match self.last_change {
            Some(last) if !self.quiet_period.is_zero() => {
                now.saturating_duration_since(last) >= self.quiet_period
            }
            _ => true,
        }
    }

    /// Runs the pending check at `now`.
    ///
    /// Returns `true` when a pass must run now. A due check with no backlog
    /// clears the pending flag and returns `false`.
    pub fn begin_pass(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.start_if_dirty()
    }

    /// Runs the pending check ignoring the quiet period.
    pub fn begin_pass_immediately(&mut self) -> bool {
        if !self.pending || self.running {
            return false;
        }
        self.start_if_dirty()
    }

    /// Ends the running pass and schedules one follow-up check.
    pub fn finish_pass(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.pending = true;
    }

    /// Enters bulk-load mode, discarding any backlog.
    pub fn begin_load(&mut self) {
        self.loading = true;
        self.dirty = false;
        self.pending = false;
    }

    /// Leaves bulk-load mode.
    ///
    /// Schedules exactly one pass when the load populated the document.
    pub fn finish_load(&mut self, populated: bool) {
        self.loading = false;
        self.last_change = None;
        self.dirty = populated;
        self.pending = populated;
    }

    fn start_if_dirty(&mut self) -> bool {
        self.pending = false;
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.running = true;
        self.passes_run += 1;
        true
    }
}
