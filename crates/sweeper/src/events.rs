//! Observer interface for controller progress.
//!
//! The controller reports progress through named, ordered [`SweepObserver`]
//! callbacks instead of owning any display surface. Observers can be added
//! and removed at runtime; a daemon wires up a logging observer, a UI
//! would wire up its own.
//!
//! Callbacks run synchronously on the controller task between awaits, so
//! implementations must return quickly and never block.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use sweep_core::{ConsensusAddress, Layer};

use crate::SweepError;

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where the controller currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sleeping until the next poll.
    Idle,
    /// Reading balances and nonces.
    Polling,
    /// Evaluating the policy's priority chain against the snapshot.
    Deciding,
    /// Building and signing a transaction.
    Acting,
    /// A transaction has been submitted; waiting for the node's verdict.
    AwaitingAck,
    /// Sleeping out a transient-failure backoff.
    Backoff,
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The mutating actions the controller can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Consensus allowance change toward the paratime's staking account.
    Allow,
    /// Consensus-to-paratime bridge deposit.
    Deposit,
    /// Paratime-to-consensus bridge withdrawal.
    Withdraw,
    /// Consensus-layer transfer out of the intermediate account.
    Transfer,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
        }
    }
}

// ---------------------------------------------------------------------------
// SweepEvent
// ---------------------------------------------------------------------------

/// A progress event emitted by the controller.
///
/// Amounts are in the base unit of the layer the event concerns:
/// consensus units for `Allow`/`Transfer` and consensus balances,
/// paratime units for `Deposit`/`Withdraw` and paratime balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SweepEvent {
    /// The controller moved to a new phase.
    PhaseChanged { phase: Phase },

    /// A fresh balance was read for an account.
    BalanceUpdated {
        layer: Layer,
        address: ConsensusAddress,
        amount: u128,
    },

    /// A transaction was submitted and acknowledged by the node.
    ActionSubmitted {
        action: ActionKind,
        amount: u128,
        nonce: u64,
    },

    /// A submitted transaction was not acknowledged.
    ActionFailed {
        action: ActionKind,
        error: SweepError,
    },

    /// A cycle failed with a transient error and the controller is
    /// backing off. `attempt` counts consecutive failures.
    CycleFailed {
        error: SweepError,
        attempt: u32,
        backoff: Duration,
    },
}

/// A callback sink for [`SweepEvent`]s.
pub trait SweepObserver: Send + Sync {
    fn on_event(&self, event: &SweepEvent);
}

// ---------------------------------------------------------------------------
// Observers registry
// ---------------------------------------------------------------------------

/// Internal registry of named observers.
///
/// Read-locks are taken when emitting; write-locks only during
/// add/remove. Emission order is registration order.
pub(crate) struct Observers {
    chain: RwLock<Vec<(&'static str, Arc<dyn SweepObserver>)>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self {
            chain: RwLock::new(Vec::new()),
        }
    }

    /// Add a named observer. If one with the same name already exists,
    /// it is replaced in-place (preserving order); otherwise appended.
    pub(crate) fn add(&self, name: &'static str, observer: Arc<dyn SweepObserver>) {
        let mut chain = self.chain.write().unwrap();
        if let Some(entry) = chain.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = observer;
        } else {
            chain.push((name, observer));
        }
    }

    /// Remove a named observer. Returns `true` if found.
    pub(crate) fn remove(&self, name: &'static str) -> bool {
        let mut chain = self.chain.write().unwrap();
        let len_before = chain.len();
        chain.retain(|(n, _)| *n != name);
        chain.len() < len_before
    }

    /// Deliver an event to every registered observer, in order.
    pub(crate) fn emit(&self, event: &SweepEvent) {
        let chain = self.chain.read().unwrap();
        for (_, observer) in chain.iter() {
            observer.on_event(event);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
