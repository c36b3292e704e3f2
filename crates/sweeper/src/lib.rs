//! Unattended fund-sweeping controller for the two-layer ledger.
//!
//! The sweeper watches an account on both ledger layers and moves any
//! balance it finds toward a fixed destination, unattended, by combining:
//!
//! - **Ledger access** ([`client::LedgerClient`]) for balances, nonces,
//!   allowances, and submission on both layers
//! - **Signing** ([`signer::Signer`]) for chain-bound ed25519 signatures
//! - **Policy** ([`SweepPolicy`]) for which direction funds move
//! - **Observers** ([`SweepObserver`]) for progress reporting
//!
//! # Control loop
//!
//! Each cycle polls fresh balances, evaluates the policy's priority
//! chain, and submits at most one action per account before re-polling.
//! The delay until the next cycle is a function of the outcome: an
//! action re-polls almost immediately, an idle cycle waits the poll
//! interval, a transient failure backs off exponentially. Terminal
//! errors stop the run.
//!
//! # Usage
//!
//! ```no_run
//! use client::mock::MockLedger;
//! use config::NetworkConfig;
//! use sweep_core::{Layer, Network};
//! use sweeper::{Destination, Identity, KeySource, Sweeper, SweeperConfig, SweepPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), sweeper::SweepError> {
//! let config = SweeperConfig::new(
//!     NetworkConfig::for_network(Network::Mainnet),
//!     SweepPolicy::DepositOnly,
//! );
//! let identity = Identity::from_key_source(KeySource::Generate, false)?;
//! let destination = Destination::parse(
//!     Layer::Paratime,
//!     "0x90adE3B7065fa715c7a150313877dF1d33e777D5",
//! )?;
//!
//! let bridge = config.network.paratime_staking_account().unwrap();
//! let ledger = MockLedger::new("example", config.network.scale(), bridge);
//! let cancel = CancellationToken::new();
//!
//! let sweeper = Sweeper::new(config, ledger, identity, destination, cancel.clone())?;
//!
//! // Sweeper is Clone -- keep a handle for shutdown.
//! let handle = sweeper.clone();
//! let task = tokio::spawn(async move { sweeper.run().await });
//!
//! cancel.cancel();
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod fee;
pub mod identity;
pub mod retry;

mod builder;
mod controller;

pub use error::SweepError;
pub use events::{ActionKind, Phase, SweepEvent, SweepObserver};
pub use fee::FeePolicy;
pub use identity::{Destination, Identity, IntermediateAccount, KeySource};
pub use retry::{CycleOutcome, RetryPolicy, Scheduler};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bip39::Mnemonic;
use client::LedgerClient;
use config::NetworkConfig;
use signer::Signer;
use sweep_core::{ConsensusAddress, Layer};
use tokio_util::sync::CancellationToken;

use crate::events::Observers;

// ---------------------------------------------------------------------------
// SweepPolicy
// ---------------------------------------------------------------------------

/// Which direction funds move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPolicy {
    /// Consensus balance is bridged into the paratime, to an EVM account.
    DepositOnly,
    /// Paratime balance is bridged out to a consensus account.
    WithdrawOnly,
    /// Paratime balance is bridged out to an intermediate account, then
    /// transferred on to the consensus destination. The extra hop keeps
    /// the destination out of the bridge call entirely.
    WithdrawThenTransfer,
}

impl SweepPolicy {
    /// The layer the destination address must live on.
    pub fn destination_layer(&self) -> Layer {
        match self {
            Self::DepositOnly => Layer::Paratime,
            Self::WithdrawOnly | Self::WithdrawThenTransfer => Layer::Consensus,
        }
    }

    /// Whether the policy needs the intermediate quarantine account.
    pub fn requires_intermediate(&self) -> bool {
        self.two_hop()
    }

    pub(crate) fn withdraws(&self) -> bool {
        matches!(self, Self::WithdrawOnly | Self::WithdrawThenTransfer)
    }

    pub(crate) fn deposits(&self) -> bool {
        matches!(self, Self::DepositOnly)
    }

    pub(crate) fn two_hop(&self) -> bool {
        matches!(self, Self::WithdrawThenTransfer)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sweeper configuration.
#[derive(Debug, Clone, Copy)]
pub struct SweeperConfig {
    /// Network parameters for both layers.
    pub network: NetworkConfig,
    /// Which direction funds move.
    pub policy: SweepPolicy,
    /// Backoff for transient failures.
    pub retry_policy: RetryPolicy,
    /// Poll interval when a cycle found nothing to do.
    pub idle_interval: Duration,
    /// Poll delay after a successful action.
    pub repoll_delay: Duration,
    /// Gas policy for consensus-layer transactions.
    pub consensus_fee: FeePolicy,
    /// Gas policy for paratime transactions.
    pub paratime_fee: FeePolicy,
}

impl SweeperConfig {
    /// Build a configuration with standard timing and fee policies:
    /// consensus gas is estimated per call, paratime gas uses the
    /// network's fixed bridge-call limit.
    pub fn new(network: NetworkConfig, policy: SweepPolicy) -> Self {
        Self {
            network,
            policy,
            retry_policy: RetryPolicy::default(),
            idle_interval: config::constants::IDLE_POLL_INTERVAL,
            repoll_delay: config::constants::ACTION_REPOLL_DELAY,
            consensus_fee: FeePolicy::Estimated,
            paratime_fee: FeePolicy::Fixed {
                gas: network.paratime.fee_gas,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Sweeper
// ---------------------------------------------------------------------------

/// Shared state across the controller and its handles.
pub(crate) struct SweeperInner<C, S> {
    pub(crate) config: SweeperConfig,
    pub(crate) client: C,
    pub(crate) identity: Identity<S>,
    pub(crate) destination: Destination,
    /// The paratime's consensus staking account, parsed once.
    pub(crate) bridge: ConsensusAddress,
    pub(crate) observers: Observers,
    pub(crate) cancel: CancellationToken,
    pub(crate) in_flight: AtomicBool,
}

/// The sweep controller entry point.
///
/// `Clone`-able (wraps an `Arc`); one handle runs the loop via
/// [`Sweeper::run`], others observe and shut it down.
pub struct Sweeper<C, S> {
    pub(crate) inner: Arc<SweeperInner<C, S>>,
}

// Manual Clone: we don't require C or S to be Clone.
impl<C, S> Clone for Sweeper<C, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C, S> std::fmt::Debug for Sweeper<C, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("policy", &self.inner.config.policy)
            .field("address", &self.inner.identity.address)
            .finish()
    }
}

impl<C, S> Sweeper<C, S>
where
    C: LedgerClient,
    S: Signer,
{
    /// Create a new sweeper.
    ///
    /// No network I/O happens during construction; the chain context is
    /// fetched when [`Sweeper::run`] starts.
    ///
    /// # Errors
    ///
    /// - [`SweepError::InvalidDestination`] if the destination's layer
    ///   does not match the policy
    /// - [`SweepError::InvalidConfig`] if the two-hop policy is missing
    ///   its intermediate account, the destination equals the
    ///   intermediate, or the network's bridge account is unparseable
    pub fn new(
        config: SweeperConfig,
        client: C,
        identity: Identity<S>,
        destination: Destination,
        cancel: CancellationToken,
    ) -> Result<Self, SweepError> {
        if destination.layer() != config.policy.destination_layer() {
            return Err(SweepError::InvalidDestination);
        }
        if config.policy.two_hop() {
            let intermediate = identity
                .intermediate
                .as_ref()
                .ok_or(SweepError::InvalidConfig)?;
            if destination == Destination::Consensus(intermediate.address) {
                return Err(SweepError::InvalidConfig);
            }
        }
        let bridge = config
            .network
            .paratime_staking_account()
            .map_err(|_| SweepError::InvalidConfig)?;

        Ok(Self {
            inner: Arc::new(SweeperInner {
                config,
                client,
                identity,
                destination,
                bridge,
                observers: Observers::new(),
                cancel,
                in_flight: AtomicBool::new(false),
            }),
        })
    }

    /// Returns a reference to the configuration.
    pub fn config(&self) -> &SweeperConfig {
        &self.inner.config
    }

    /// The consensus address being swept. Funds sent here get moved.
    pub fn address(&self) -> ConsensusAddress {
        self.inner.identity.address
    }

    /// The configured destination.
    pub fn destination(&self) -> Destination {
        self.inner.destination
    }

    /// The identity's mnemonic, if it has one. Surface it to the
    /// operator before the loop starts.
    pub fn mnemonic(&self) -> Option<&Mnemonic> {
        self.inner.identity.mnemonic.as_ref()
    }

    /// Returns a reference to the cancellation token.
    pub fn cancel(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    /// Checks whether the sweeper has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Returns [`SweepError::Cancelled`] if the cancellation token has fired.
    pub(crate) fn check_cancelled(&self) -> Result<(), SweepError> {
        if self.inner.cancel.is_cancelled() {
            Err(SweepError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Whether a mutating action is currently between build and
    /// acknowledgement. Shutdown during this window risks a submitted
    /// but unconfirmed transaction.
    pub fn is_action_in_flight(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Graceful shutdown: signals cancellation and yields so the loop
    /// can observe it.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        tokio::task::yield_now().await;
    }

    // -----------------------------------------------------------------------
    // Observer management
    // -----------------------------------------------------------------------

    /// Register a named observer.
    ///
    /// If an observer with the same `name` already exists, it is
    /// replaced in-place (preserving delivery order). Otherwise it is
    /// appended to the end of the chain.
    pub fn add_observer(&self, name: &'static str, observer: Arc<dyn SweepObserver>) {
        self.inner.observers.add(name, observer);
    }

    /// Remove a named observer. Returns `true` if one was found.
    pub fn remove_observer(&self, name: &'static str) -> bool {
        self.inner.observers.remove(name)
    }

    pub(crate) fn emit(&self, event: SweepEvent) {
        self.inner.observers.emit(&event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use client::mock::MockLedger;
    use sweep_core::Network;

    fn make_ledger(config: &SweeperConfig) -> MockLedger {
        let bridge = config.network.paratime_staking_account().unwrap();
        MockLedger::new("test", config.network.scale(), bridge)
    }

    fn evm_destination() -> Destination {
        Destination::parse(
            Layer::Paratime,
            "0x90adE3B7065fa715c7a150313877dF1d33e777D5",
        )
        .unwrap()
    }

    #[test]
    fn rejects_destination_on_wrong_layer() {
        let config = SweeperConfig::new(
            NetworkConfig::for_network(Network::Testnet),
            SweepPolicy::WithdrawOnly,
        );
        let ledger = make_ledger(&config);
        let identity = Identity::from_key_source(KeySource::Generate, false).unwrap();

        let result = Sweeper::new(
            config,
            ledger,
            identity,
            evm_destination(),
            CancellationToken::new(),
        );
        assert!(matches!(result, Err(SweepError::InvalidDestination)));
    }

    #[test]
    fn two_hop_requires_intermediate_account() {
        let config = SweeperConfig::new(
            NetworkConfig::for_network(Network::Testnet),
            SweepPolicy::WithdrawThenTransfer,
        );
        let ledger = make_ledger(&config);
        let identity = Identity::from_key_source(KeySource::Generate, false).unwrap();
        let destination =
            Destination::Consensus(ConsensusAddress::from_public_key(&[1u8; 32]));

        let result = Sweeper::new(config, ledger, identity, destination, CancellationToken::new());
        assert!(matches!(result, Err(SweepError::InvalidConfig)));
    }

    #[test]
    fn two_hop_destination_must_differ_from_intermediate() {
        let config = SweeperConfig::new(
            NetworkConfig::for_network(Network::Testnet),
            SweepPolicy::WithdrawThenTransfer,
        );
        let ledger = make_ledger(&config);
        let identity = Identity::from_key_source(KeySource::Generate, true).unwrap();
        let destination =
            Destination::Consensus(identity.intermediate.as_ref().unwrap().address);

        let result = Sweeper::new(config, ledger, identity, destination, CancellationToken::new());
        assert!(matches!(result, Err(SweepError::InvalidConfig)));
    }
}
