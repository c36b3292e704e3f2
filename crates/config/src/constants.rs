//! Protocol-level timing parameters.

use std::time::Duration;

/// Poll interval when a cycle found nothing to do.
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Poll delay after a successful mutating action.
///
/// A completed action usually unblocks the next rule in the priority
/// chain (a withdraw funds the follow-up transfer), so the controller
/// re-polls almost immediately instead of waiting the idle interval.
pub const ACTION_REPOLL_DELAY: Duration = Duration::from_millis(250);

/// First backoff delay after a transient failure.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Backoff ceiling; transient failures never wait longer than this.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Multiplier applied to the backoff after each consecutive failure.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;
