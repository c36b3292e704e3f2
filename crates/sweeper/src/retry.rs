//! Cycle scheduling and transient-failure backoff.
//!
//! The controller never sleeps a fixed interval: the delay before the
//! next cycle is a function of what the last cycle did. A cycle that
//! acted re-polls almost immediately (the action usually unblocks the
//! next rule in the priority chain), an idle cycle waits the poll
//! interval, and a transient failure backs off exponentially.

use std::time::Duration;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Exponential backoff parameters for transient failures.
///
/// There is no attempt cap: the controller is unattended, and a node
/// outage of any length must not abandon funds mid-sweep. Only terminal
/// errors end the run.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Multiplier applied to the backoff after each consecutive failure.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: config::constants::INITIAL_BACKOFF,
            max_backoff: config::constants::MAX_BACKOFF,
            backoff_multiplier: config::constants::BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Compute the backoff duration for the given attempt number (0-indexed).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_backoff.min(self.max_backoff);
        }
        let factor = self.backoff_multiplier.powi(attempt as i32);
        let ms = (self.initial_backoff.as_millis() as f64 * factor) as u64;
        Duration::from_millis(ms).min(self.max_backoff)
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// What the last cycle did, which determines the delay before the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A mutating action was submitted and acknowledged.
    Acted,
    /// Nothing to do; all relevant balances were empty.
    Idle,
    /// The cycle failed with a transient error; `attempt` counts
    /// consecutive failures (0-indexed).
    TransientFailure { attempt: u32 },
}

/// Maps cycle outcomes to inter-cycle delays.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    pub idle_interval: Duration,
    pub repoll_delay: Duration,
    pub retry: RetryPolicy,
}

impl Scheduler {
    /// The delay to sleep before the next cycle.
    pub fn delay_for(&self, outcome: CycleOutcome) -> Duration {
        match outcome {
            CycleOutcome::Acted => self.repoll_delay,
            CycleOutcome::Idle => self.idle_interval,
            CycleOutcome::TransientFailure { attempt } => self.retry.backoff_for(attempt),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
