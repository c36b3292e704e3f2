//! Unattended sweep daemon.
//!
//! Builds a sweep identity, logs its receiving address and mnemonic,
//! then runs the sweep loop until ctrl-c or a terminal error. Progress
//! is reported through a tracing observer.
//!
//! This binary wires the controller to the in-memory ledger; a
//! production deployment substitutes a [`client::LedgerClient`] backed
//! by a real node.
//!
//! # Configuration
//!
//! - `SWEEP_NETWORK`: `mainnet` or `testnet` (default `testnet`)
//! - `SWEEP_POLICY`: `deposit-only`, `withdraw-only`, or
//!   `withdraw-then-transfer` (default `deposit-only`)
//! - `SWEEP_MNEMONIC`: resume an existing identity; if unset, a fresh
//!   24-word mnemonic is generated
//! - `SWEEP_DESTINATION`: destination address; prompted for if unset
//!
//! ```bash
//! SWEEP_DESTINATION=0x90adE3B7065fa715c7a150313877dF1d33e777D5 \
//! RUST_LOG=info cargo run --release -p sweepd
//! ```

mod observer;

use std::io::Write;
use std::sync::Arc;

use bip39::Mnemonic;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use client::mock::MockLedger;
use config::NetworkConfig;
use observer::TracingObserver;
use sweep_core::{Layer, Network};
use sweeper::{Destination, Identity, KeySource, SweepError, SweepPolicy, Sweeper, SweeperConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("sweepd starting");

    // -----------------------------------------------------------------------
    // Identity setup
    // -----------------------------------------------------------------------

    let network = resolve_network("SWEEP_NETWORK");
    let policy = resolve_policy("SWEEP_POLICY");
    let key_source = resolve_key_source("SWEEP_MNEMONIC");

    let identity = Identity::from_key_source(key_source, policy.requires_intermediate())
        .expect("key derivation");

    let destination_input = resolve_destination("SWEEP_DESTINATION", policy);
    let destination = Destination::parse(policy.destination_layer(), destination_input.trim())
        .unwrap_or_else(|e| panic!("invalid destination for {policy:?}: {e}"));

    tracing::info!(%network, ?policy, "configured");
    tracing::info!(address = %identity.address, "send funds here; they will be swept");
    if let Some(mnemonic) = &identity.mnemonic {
        tracing::info!(%mnemonic, "mnemonic (keep this until the sweep completes)");
    }

    // -----------------------------------------------------------------------
    // Sweeper init
    // -----------------------------------------------------------------------

    let config = SweeperConfig::new(NetworkConfig::for_network(network), policy);
    let bridge = config
        .network
        .paratime_staking_account()
        .expect("bridge account");
    let ledger = MockLedger::new("sweepd-local", config.network.scale(), bridge);

    let cancel = CancellationToken::new();
    let sweeper = Sweeper::new(config, ledger, identity, destination, cancel.clone())
        .expect("sweeper init");
    sweeper.add_observer("tracing", Arc::new(TracingObserver));

    let mut task = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run().await }
    });

    // -----------------------------------------------------------------------
    // Wait for shutdown
    // -----------------------------------------------------------------------

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
            if sweeper.is_action_in_flight() {
                tracing::warn!("an action is awaiting acknowledgement; its outcome is unknown");
            }
            sweeper.shutdown().await;
            report(task.await);
        }
        result = &mut task => {
            report(result);
        }
    }

    tracing::info!("sweepd stopped");
}

/// Log how the loop ended; terminal errors exit nonzero.
fn report(result: Result<Result<(), SweepError>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) | Ok(Err(SweepError::Cancelled)) => {
            tracing::info!("sweep loop stopped");
        }
        Ok(Err(error)) => {
            tracing::error!(%error, "sweep loop failed");
            std::process::exit(1);
        }
        Err(join_error) => {
            tracing::error!(%join_error, "sweep task panicked");
            std::process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration helpers
// ---------------------------------------------------------------------------

fn resolve_network(env_key: &str) -> Network {
    match std::env::var(env_key).as_deref() {
        Ok("mainnet") => Network::Mainnet,
        Ok("testnet") | Err(_) => Network::Testnet,
        Ok(other) => panic!("{env_key}: unknown network {other:?}"),
    }
}

fn resolve_policy(env_key: &str) -> SweepPolicy {
    match std::env::var(env_key).as_deref() {
        Ok("deposit-only") | Err(_) => SweepPolicy::DepositOnly,
        Ok("withdraw-only") => SweepPolicy::WithdrawOnly,
        Ok("withdraw-then-transfer") => SweepPolicy::WithdrawThenTransfer,
        Ok(other) => panic!("{env_key}: unknown policy {other:?}"),
    }
}

/// Resume from a supplied mnemonic, or generate a fresh identity.
fn resolve_key_source(env_key: &str) -> KeySource {
    match std::env::var(env_key) {
        Ok(phrase) => {
            let mnemonic = phrase
                .parse::<Mnemonic>()
                .unwrap_or_else(|e| panic!("{env_key} is not a valid BIP39 mnemonic: {e}"));
            KeySource::FromMnemonic(mnemonic)
        }
        Err(_) => KeySource::Generate,
    }
}

/// Read the destination from the environment, prompting on stdin if unset.
fn resolve_destination(env_key: &str, policy: SweepPolicy) -> String {
    if let Ok(value) = std::env::var(env_key) {
        return value;
    }
    let hint = match policy.destination_layer() {
        Layer::Paratime => "0x...",
        Layer::Consensus => "oasis1...",
    };
    eprint!("destination address ({hint}): ");
    std::io::stderr().flush().expect("flush prompt");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .expect("read destination");
    line
}
