//! End-to-end tests for the sweep control loop.
//!
//! The loop runs against [`MockLedger`] under a paused tokio clock, so
//! poll intervals and backoffs elapse instantly while their relative
//! timing stays observable. Each test seeds ledger state, spawns the
//! loop, waits for the expected effect, and inspects the accepted
//! submissions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bip39::Mnemonic;
use client::mock::{MockLedger, Submission};
use client::types::{ConsensusTxBody, ParatimeTxBody};
use client::ClientError;
use config::NetworkConfig;
use signer::Ed25519Signer;
use sweep_core::{ConsensusAddress, EvmAddress, Quantity};
use sweeper::{
    Destination, Identity, KeySource, Phase, SweepError, SweepEvent, SweepObserver, SweepPolicy,
    Sweeper, SweeperConfig,
};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Test configuration
// ---------------------------------------------------------------------------

const NETWORK: NetworkConfig = NetworkConfig::TESTNET;

/// Consensus-to-paratime unit multiplier (10^9 for 18 vs 9 decimals).
const SCALE: u128 = 1_000_000_000;

/// Withdrawal fee: gas_price (100) * fee_gas (70_000), scaled.
const WITHDRAW_FEE: u128 = 7_000_000_000_000_000;

const EVM_DESTINATION: &str = "0x90adE3B7065fa715c7a150313877dF1d33e777D5";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Identity from fixed entropy, so addresses are stable across runs.
fn test_identity(with_intermediate: bool) -> Identity<Ed25519Signer> {
    let mnemonic = Mnemonic::from_entropy(&[0x42u8; 32]).unwrap();
    Identity::from_key_source(KeySource::FromMnemonic(mnemonic), with_intermediate).unwrap()
}

fn make_ledger() -> MockLedger {
    let bridge = NETWORK.paratime_staking_account().unwrap();
    MockLedger::new("test-chain", NETWORK.scale(), bridge)
}

fn consensus_destination() -> ConsensusAddress {
    ConsensusAddress::from_public_key(&[9u8; 32])
}

fn evm_destination() -> EvmAddress {
    EVM_DESTINATION.parse().unwrap()
}

/// Spawn the loop and return the handle plus its join handle.
fn spawn_sweeper(
    policy: SweepPolicy,
    ledger: &MockLedger,
    identity: Identity<Ed25519Signer>,
    destination: Destination,
    cancel: &CancellationToken,
) -> (
    Sweeper<MockLedger, Ed25519Signer>,
    tokio::task::JoinHandle<Result<(), SweepError>>,
) {
    let config = SweeperConfig::new(NETWORK, policy);
    let sweeper = Sweeper::new(
        config,
        ledger.clone(),
        identity,
        destination,
        cancel.clone(),
    )
    .expect("sweeper construction should succeed");

    let task = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run().await }
    });
    (sweeper, task)
}

/// Poll a condition under the paused clock. Virtual time auto-advances
/// through the controller's sleeps while we wait.
async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("condition not reached within the virtual time limit");
}

/// Observer that records every event with its virtual timestamp.
#[derive(Clone, Default)]
struct Collector {
    events: Arc<Mutex<Vec<(tokio::time::Instant, SweepEvent)>>>,
}

impl Collector {
    fn snapshot(&self) -> Vec<(tokio::time::Instant, SweepEvent)> {
        self.events.lock().unwrap().clone()
    }
}

impl SweepObserver for Collector {
    fn on_event(&self, event: &SweepEvent) {
        self.events
            .lock()
            .unwrap()
            .push((tokio::time::Instant::now(), *event));
    }
}

// ---------------------------------------------------------------------------
// Deposit policy
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn deposit_sweeps_full_consensus_balance() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;
    let bridge = NETWORK.paratime_staking_account().unwrap();

    let balance = 500_000_000_000u128; // 500 units at consensus precision
    ledger.set_consensus_balance(address, balance);

    let evm = evm_destination();
    let destination_account = ConsensusAddress::from_evm(&evm);
    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::DepositOnly,
        &ledger,
        identity,
        Destination::Paratime(evm),
        &cancel,
    );

    let probe = ledger.clone();
    wait_until(move || probe.paratime_balance_of(&destination_account) > 0).await;

    assert_eq!(ledger.consensus_balance_of(&address), 0);
    assert_eq!(
        ledger.paratime_balance_of(&destination_account),
        balance * SCALE
    );
    // The allowance was raised by exactly the swept amount and consumed.
    assert_eq!(ledger.allowance_of(&address, &bridge), 0);

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(matches!(
        submissions[0],
        Submission::Consensus(tx) if matches!(
            tx.body,
            ConsensusTxBody::Allow { amount_change, .. } if amount_change == Quantity(balance)
        )
    ));
    assert!(matches!(
        submissions[1],
        Submission::Paratime(tx) if matches!(tx.body, ParatimeTxBody::Deposit { .. })
    ));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn deposit_tops_up_allowance_by_delta_only() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;
    let bridge = NETWORK.paratime_staking_account().unwrap();

    let balance = 100u128;
    ledger.set_consensus_balance(address, balance);
    // A prior interrupted run already granted part of the allowance.
    ledger.set_allowance(address, bridge, 30);

    let evm = evm_destination();
    let destination_account = ConsensusAddress::from_evm(&evm);
    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::DepositOnly,
        &ledger,
        identity,
        Destination::Paratime(evm),
        &cancel,
    );

    let probe = ledger.clone();
    wait_until(move || probe.paratime_balance_of(&destination_account) > 0).await;

    let submissions = ledger.submissions();
    assert!(matches!(
        submissions[0],
        Submission::Consensus(tx) if matches!(
            tx.body,
            ConsensusTxBody::Allow { amount_change, .. } if amount_change == Quantity(70)
        )
    ));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn deposit_skips_allowance_when_already_sufficient() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;
    let bridge = NETWORK.paratime_staking_account().unwrap();

    ledger.set_consensus_balance(address, 100);
    ledger.set_allowance(address, bridge, 100);

    let evm = evm_destination();
    let destination_account = ConsensusAddress::from_evm(&evm);
    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::DepositOnly,
        &ledger,
        identity,
        Destination::Paratime(evm),
        &cancel,
    );

    let probe = ledger.clone();
    wait_until(move || probe.paratime_balance_of(&destination_account) > 0).await;

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(matches!(submissions[0], Submission::Paratime(_)));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

// ---------------------------------------------------------------------------
// Withdraw policies
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn withdraw_sweeps_balance_minus_fee() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;

    let balance = 500_000_000_000_000_000_000u128; // 500 units at paratime precision
    ledger.set_paratime_balance(address, balance);

    let destination = consensus_destination();
    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::WithdrawOnly,
        &ledger,
        identity,
        Destination::Consensus(destination),
        &cancel,
    );

    let probe = ledger.clone();
    wait_until(move || probe.consensus_balance_of(&destination) > 0).await;

    assert_eq!(ledger.paratime_balance_of(&address), 0);
    assert_eq!(
        ledger.consensus_balance_of(&destination),
        (balance - WITHDRAW_FEE) / SCALE
    );

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(matches!(
        submissions[0],
        Submission::Paratime(tx) if tx.nonce == 0 && matches!(
            tx.body,
            ParatimeTxBody::Withdraw { to, amount } if to == destination && amount == Quantity(balance - WITHDRAW_FEE)
        )
    ));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn withdraw_leaves_dust_below_fee_untouched() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;

    // At the fee exactly: sweeping would deliver zero, so nothing moves.
    ledger.set_paratime_balance(address, WITHDRAW_FEE);

    let collector = Collector::default();
    let destination = consensus_destination();
    let cancel = CancellationToken::new();
    let (sweeper, task) = spawn_sweeper(
        SweepPolicy::WithdrawOnly,
        &ledger,
        identity,
        Destination::Consensus(destination),
        &cancel,
    );
    sweeper.add_observer("collector", Arc::new(collector.clone()));

    // Let several idle cycles pass.
    let probe = collector.clone();
    wait_until(move || {
        probe
            .snapshot()
            .iter()
            .filter(|(_, e)| matches!(e, SweepEvent::PhaseChanged { phase: Phase::Polling }))
            .count()
            >= 5
    })
    .await;

    assert!(ledger.submissions().is_empty());
    assert_eq!(ledger.paratime_balance_of(&address), WITHDRAW_FEE);

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn two_hop_withdraws_then_transfers_onward() {
    let ledger = make_ledger();
    let identity = test_identity(true);
    let address = identity.address;
    let intermediate = identity.intermediate.as_ref().unwrap().address;

    let balance = 500_000_000_000_000_000_000u128;
    ledger.set_paratime_balance(address, balance);
    let delivered = (balance - WITHDRAW_FEE) / SCALE;

    let destination = consensus_destination();
    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::WithdrawThenTransfer,
        &ledger,
        identity,
        Destination::Consensus(destination),
        &cancel,
    );

    let probe = ledger.clone();
    wait_until(move || probe.consensus_balance_of(&destination) > 0).await;

    // Funds passed through the intermediate account and left nothing.
    assert_eq!(ledger.consensus_balance_of(&destination), delivered);
    assert_eq!(ledger.consensus_balance_of(&intermediate), 0);
    assert_eq!(ledger.paratime_balance_of(&address), 0);

    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 2);
    assert!(matches!(
        submissions[0],
        Submission::Paratime(tx) if matches!(
            tx.body,
            ParatimeTxBody::Withdraw { to, .. } if to == intermediate
        )
    ));
    assert!(matches!(
        submissions[1],
        Submission::Consensus(tx) if matches!(
            tx.body,
            ConsensusTxBody::Transfer { to, amount } if to == destination && amount == Quantity(delivered)
        )
    ));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn successive_sweeps_use_strictly_increasing_nonces() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;

    ledger.set_paratime_balance(address, 2 * WITHDRAW_FEE);

    let destination = consensus_destination();
    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::WithdrawOnly,
        &ledger,
        identity,
        Destination::Consensus(destination),
        &cancel,
    );

    let probe = ledger.clone();
    wait_until(move || probe.paratime_balance_of(&address) == 0).await;

    // More funds arrive; the next sweep must pick up the next nonce.
    ledger.set_paratime_balance(address, 3 * WITHDRAW_FEE);
    let probe = ledger.clone();
    wait_until(move || probe.paratime_balance_of(&address) == 0).await;

    let nonces: Vec<u64> = ledger
        .submissions()
        .iter()
        .map(|submission| match submission {
            Submission::Paratime(tx) => tx.nonce,
            Submission::Consensus(tx) => tx.nonce,
        })
        .collect();
    assert_eq!(nonces, vec![0, 1]);

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn idle_cycles_poll_at_the_configured_interval() {
    let ledger = make_ledger();
    let identity = test_identity(false);

    let collector = Collector::default();
    let cancel = CancellationToken::new();
    let config = SweeperConfig::new(NETWORK, SweepPolicy::DepositOnly);
    let idle_interval = config.idle_interval;
    let sweeper = Sweeper::new(
        config,
        ledger.clone(),
        identity,
        Destination::Paratime(evm_destination()),
        cancel.clone(),
    )
    .unwrap();
    sweeper.add_observer("collector", Arc::new(collector.clone()));

    let task = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run().await }
    });

    let probe = collector.clone();
    wait_until(move || {
        probe
            .snapshot()
            .iter()
            .filter(|(_, e)| matches!(e, SweepEvent::PhaseChanged { phase: Phase::Polling }))
            .count()
            >= 5
    })
    .await;
    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));

    let polls: Vec<_> = collector
        .snapshot()
        .into_iter()
        .filter(|(_, e)| matches!(e, SweepEvent::PhaseChanged { phase: Phase::Polling }))
        .map(|(at, _)| at)
        .collect();
    for pair in polls.windows(2) {
        assert_eq!(pair[1] - pair[0], idle_interval);
    }
}

// ---------------------------------------------------------------------------
// Failure handling
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn transient_failure_backs_off_and_retries_with_fresh_state() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    let address = identity.address;

    let balance = 500_000_000_000_000_000_000u128;
    ledger.set_paratime_balance(address, balance);
    ledger.fail_next_submission(ClientError::Unavailable);

    let collector = Collector::default();
    let destination = consensus_destination();
    let cancel = CancellationToken::new();
    let (sweeper, task) = spawn_sweeper(
        SweepPolicy::WithdrawOnly,
        &ledger,
        identity,
        Destination::Consensus(destination),
        &cancel,
    );
    sweeper.add_observer("collector", Arc::new(collector.clone()));

    let probe = ledger.clone();
    wait_until(move || probe.consensus_balance_of(&destination) > 0).await;

    // The failed attempt consumed no nonce; the retry rebuilt the
    // transaction from a fresh poll and landed with nonce 0.
    let submissions = ledger.submissions();
    assert_eq!(submissions.len(), 1);
    assert!(matches!(submissions[0], Submission::Paratime(tx) if tx.nonce == 0));

    let events = collector.snapshot();
    assert!(events.iter().any(|(_, e)| matches!(
        e,
        SweepEvent::CycleFailed {
            error: SweepError::Transport,
            attempt: 0,
            ..
        }
    )));
    assert!(events
        .iter()
        .any(|(_, e)| matches!(e, SweepEvent::PhaseChanged { phase: Phase::Backoff })));

    cancel.cancel();
    assert_eq!(task.await.unwrap(), Err(SweepError::Cancelled));
}

#[tokio::test(start_paused = true)]
async fn signature_rejection_stops_the_run() {
    let ledger = make_ledger();
    let identity = test_identity(false);
    ledger.set_consensus_balance(identity.address, 100);
    ledger.fail_next_submission(ClientError::InvalidSignature);

    let cancel = CancellationToken::new();
    let (_sweeper, task) = spawn_sweeper(
        SweepPolicy::DepositOnly,
        &ledger,
        identity,
        Destination::Paratime(evm_destination()),
        &cancel,
    );

    assert_eq!(task.await.unwrap(), Err(SweepError::SignatureRejected));
    assert!(ledger.submissions().is_empty());
}
