//! Debounced scan trigger. Scans never run while removals are still animating.

use log::{debug, warn};
use std::time::Duration;

/// Delay before the re-check that follows a finished removal.
pub const DEFAULT_CASCADE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A scan is pending; the countdown is running.
    Scheduled,
    /// Groups are being removed; scans are held back.
    Resolving,
}

#[derive(Debug, Clone)]
pub struct ScanScheduler {
    pending: bool,
    countdown: Duration,
    resolving: bool,
    active_removals: usize,
    cascade_delay: Duration,
}

impl Default for ScanScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_CASCADE_DELAY)
    }
}

impl ScanScheduler {
    pub fn new(cascade_delay: Duration) -> Self {
        Self {
            pending: false,
            countdown: Duration::ZERO,
            resolving: false,
            active_removals: 0,
            cascade_delay,
        }
    }

    /// Ask for a scan after `delay`. A later request replaces the countdown.
    pub fn request_scan(&mut self, delay: Duration) {
        self.pending = true;
        self.countdown = delay;
    }

    /// Advance by `dt`. Returns true when a scan is due now.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if self.resolving || !self.pending {
            return false;
        }
        self.countdown = self.countdown.saturating_sub(dt);
        if self.countdown.is_zero() {
            self.pending = false;
            return true;
        }
        false
    }

    /// A qualifying group was handed to the removal pipeline.
    pub fn begin_removal(&mut self) {
        self.active_removals += 1;
        self.resolving = true;
    }

    /// Record the outcome of a scan that started `groups` removals.
    pub fn scan_finished(&mut self, groups: usize) {
        if groups == 0 && self.active_removals == 0 {
            self.resolving = false;
        }
    }

    /// One removal finished. Returns false (and changes nothing) if none was in flight.
    pub fn complete_removal(&mut self) -> bool {
        if self.active_removals == 0 {
            warn!("[Scheduler] removal completed with none in flight");
            return false;
        }
        self.active_removals -= 1;
        if self.active_removals == 0 {
            self.resolving = false;
            debug!("[Scheduler] all removals done, cascade scan in {:?}", self.cascade_delay);
        }
        self.request_scan(self.cascade_delay);
        true
    }

    pub fn state(&self) -> SchedulerState {
        if self.resolving {
            SchedulerState::Resolving
        } else if self.pending {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving
    }

    pub fn active_removals(&self) -> usize {
        self.active_removals
    }

    pub fn countdown(&self) -> Duration {
        self.countdown
    }

    pub fn cascade_delay(&self) -> Duration {
        self.cascade_delay
    }
}
