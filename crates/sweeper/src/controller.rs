//! The sweep control loop.
//!
//! One cycle: poll fresh balances, walk the policy's priority chain,
//! submit at most one action per account, re-poll. Decisions are made on
//! data read in the same cycle; nothing is cached across cycles except
//! the chain context, which is immutable for a network's lifetime.
//!
//! The priority chain is withdraw, then intermediate transfer, then
//! deposit: bridging out is always drained before onward hops, and a
//! completed action usually unblocks the next rule, which is why an
//! acting cycle re-polls almost immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use client::types::{ConsensusTx, ParatimeTx, SignedEnvelope};
use client::{ChainContext, LedgerClient};
use signer::{SignatureContext, Signer};
use sweep_core::{to_paratime_units, ConsensusAddress, Layer};

use crate::builder;
use crate::events::{ActionKind, Phase, SweepEvent};
use crate::identity::Destination;
use crate::retry::{CycleOutcome, Scheduler};
use crate::{SweepError, SweepPolicy, Sweeper};

// ---------------------------------------------------------------------------
// Snapshot and decision
// ---------------------------------------------------------------------------

/// Balances read in a single polling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BalanceSnapshot {
    /// The identity's consensus-layer balance.
    pub consensus: u128,
    /// Paratime balance in paratime base units: the identity's own for
    /// withdraw policies, the destination's for deposit-only (where it
    /// is reported but never acted on).
    pub paratime: u128,
    /// The intermediate account's consensus balance, two-hop only.
    pub intermediate: Option<u128>,
}

/// The single action a cycle decided to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SweepAction {
    /// Bridge out everything above the fee, in paratime base units.
    Withdraw { to: ConsensusAddress, amount: u128 },
    /// Move the intermediate account's full balance onward, in
    /// consensus base units.
    Transfer { amount: u128 },
    /// Bridge the full consensus balance in, in consensus base units.
    Deposit { amount: u128 },
}

/// Walk the policy's priority chain against a snapshot.
///
/// `withdraw_to` is `Some` only for withdrawing policies. A withdrawal
/// is attempted only when the balance strictly exceeds the fee; a
/// balance at or below it stays put rather than burning to zero.
pub(crate) fn decide(
    policy: SweepPolicy,
    snapshot: &BalanceSnapshot,
    withdraw_fee: u128,
    withdraw_to: Option<ConsensusAddress>,
) -> Option<SweepAction> {
    if let Some(to) = withdraw_to {
        if snapshot.paratime > withdraw_fee {
            return Some(SweepAction::Withdraw {
                to,
                amount: snapshot.paratime - withdraw_fee,
            });
        }
    }

    if policy.two_hop() {
        if let Some(balance) = snapshot.intermediate {
            if balance > 0 {
                return Some(SweepAction::Transfer { amount: balance });
            }
        }
    }

    if policy.deposits() && snapshot.consensus > 0 {
        return Some(SweepAction::Deposit {
            amount: snapshot.consensus,
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// Both layers' signature contexts, derived once at startup.
struct Contexts {
    consensus: SignatureContext,
    paratime: SignatureContext,
}

/// Marks an action in flight for the guard's lifetime.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn arm(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C, S> Sweeper<C, S>
where
    C: LedgerClient,
    S: Signer,
{
    /// Run the sweep loop until cancellation or a terminal error.
    ///
    /// Returns [`SweepError::Cancelled`] on a clean shutdown. Transient
    /// failures never end the run; they back off and re-poll.
    pub async fn run(&self) -> Result<(), SweepError> {
        let config = &self.inner.config;
        let scheduler = Scheduler {
            idle_interval: config.idle_interval,
            repoll_delay: config.repoll_delay,
            retry: config.retry_policy,
        };

        let chain_context = self.fetch_chain_context(&scheduler).await?;
        let contexts = Contexts {
            consensus: SignatureContext::consensus_tx(chain_context.as_str()),
            paratime: SignatureContext::paratime_tx(
                chain_context.as_str(),
                config.network.paratime.runtime_id,
            ),
        };
        tracing::info!(
            network = %config.network.network,
            policy = ?config.policy,
            address = %self.inner.identity.address,
            "sweep loop started"
        );

        let mut attempt: u32 = 0;
        loop {
            self.check_cancelled()?;

            let outcome = match self.cycle(&contexts).await {
                Ok(true) => {
                    attempt = 0;
                    CycleOutcome::Acted
                }
                Ok(false) => {
                    attempt = 0;
                    CycleOutcome::Idle
                }
                Err(SweepError::Cancelled) => return Err(SweepError::Cancelled),
                Err(error) if error.is_transient() => {
                    let outcome = CycleOutcome::TransientFailure { attempt };
                    let backoff = scheduler.delay_for(outcome);
                    tracing::warn!(%error, attempt, ?backoff, "cycle failed; backing off");
                    self.emit(SweepEvent::CycleFailed {
                        error,
                        attempt,
                        backoff,
                    });
                    attempt += 1;
                    outcome
                }
                Err(error) => {
                    tracing::error!(%error, "terminal failure; stopping");
                    return Err(error);
                }
            };

            let phase = match outcome {
                CycleOutcome::TransientFailure { .. } => Phase::Backoff,
                _ => Phase::Idle,
            };
            self.emit(SweepEvent::PhaseChanged { phase });

            tokio::select! {
                _ = self.inner.cancel.cancelled() => return Err(SweepError::Cancelled),
                _ = tokio::time::sleep(scheduler.delay_for(outcome)) => {}
            }
        }
    }

    /// Fetch the chain context, backing off on transient failures. The
    /// loop cannot sign anything before this succeeds.
    async fn fetch_chain_context(
        &self,
        scheduler: &Scheduler,
    ) -> Result<ChainContext, SweepError> {
        let mut attempt: u32 = 0;
        loop {
            self.check_cancelled()?;
            match self.inner.client.chain_context().await {
                Ok(context) => return Ok(context),
                Err(error) => {
                    let error = SweepError::from(error);
                    if error.is_terminal() {
                        return Err(error);
                    }
                    let backoff = scheduler.retry.backoff_for(attempt);
                    tracing::warn!(%error, attempt, ?backoff, "chain context fetch failed");
                    self.emit(SweepEvent::CycleFailed {
                        error,
                        attempt,
                        backoff,
                    });
                    attempt += 1;
                    tokio::select! {
                        _ = self.inner.cancel.cancelled() => return Err(SweepError::Cancelled),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }
    }

    /// One poll-decide-act pass. Returns whether an action was taken.
    async fn cycle(&self, contexts: &Contexts) -> Result<bool, SweepError> {
        self.emit(SweepEvent::PhaseChanged {
            phase: Phase::Polling,
        });
        let snapshot = self.poll().await?;

        self.emit(SweepEvent::PhaseChanged {
            phase: Phase::Deciding,
        });
        let withdraw_fee = builder::withdraw_fee_amount(&self.inner.config.network)?;
        let Some(action) = decide(
            self.inner.config.policy,
            &snapshot,
            withdraw_fee,
            self.withdraw_target(),
        ) else {
            return Ok(false);
        };

        self.emit(SweepEvent::PhaseChanged {
            phase: Phase::Acting,
        });
        let _guard = InFlightGuard::arm(&self.inner.in_flight);
        self.execute(action, contexts).await?;
        Ok(true)
    }

    /// Read every balance the policy's decision depends on.
    async fn poll(&self) -> Result<BalanceSnapshot, SweepError> {
        let inner = &self.inner;

        let consensus = inner.client.consensus_balance(&inner.identity.address).await?;
        self.emit(SweepEvent::BalanceUpdated {
            layer: Layer::Consensus,
            address: inner.identity.address,
            amount: consensus,
        });

        let paratime_account = match inner.destination {
            Destination::Paratime(evm) if inner.config.policy.deposits() => {
                ConsensusAddress::from_evm(&evm)
            }
            _ => inner.identity.address,
        };
        let paratime = inner.client.paratime_balance(&paratime_account).await?;
        self.emit(SweepEvent::BalanceUpdated {
            layer: Layer::Paratime,
            address: paratime_account,
            amount: paratime,
        });

        let intermediate = match &inner.identity.intermediate {
            Some(account) if inner.config.policy.two_hop() => {
                let balance = inner.client.consensus_balance(&account.address).await?;
                self.emit(SweepEvent::BalanceUpdated {
                    layer: Layer::Consensus,
                    address: account.address,
                    amount: balance,
                });
                Some(balance)
            }
            _ => None,
        };

        tracing::debug!(consensus, paratime, ?intermediate, "polled balances");
        Ok(BalanceSnapshot {
            consensus,
            paratime,
            intermediate,
        })
    }

    /// Where withdrawals land: the intermediate account for the two-hop
    /// policy, the destination otherwise. `None` when the policy never
    /// withdraws.
    fn withdraw_target(&self) -> Option<ConsensusAddress> {
        if !self.inner.config.policy.withdraws() {
            return None;
        }
        if let Some(account) = &self.inner.identity.intermediate {
            if self.inner.config.policy.two_hop() {
                return Some(account.address);
            }
        }
        match self.inner.destination {
            Destination::Consensus(address) => Some(address),
            Destination::Paratime(_) => None,
        }
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    async fn execute(&self, action: SweepAction, contexts: &Contexts) -> Result<(), SweepError> {
        match action {
            SweepAction::Withdraw { to, amount } => self.withdraw(to, amount, contexts).await,
            SweepAction::Transfer { amount } => self.transfer_onward(amount, contexts).await,
            SweepAction::Deposit { amount } => self.deposit(amount, contexts).await,
        }
    }

    /// Bridge `amount` (paratime base units) out to `to`.
    async fn withdraw(
        &self,
        to: ConsensusAddress,
        amount: u128,
        contexts: &Contexts,
    ) -> Result<(), SweepError> {
        let inner = &self.inner;
        let identity = &inner.identity;

        let fee_amount = builder::withdraw_fee_amount(&inner.config.network)?;
        let nonce = inner.client.paratime_nonce(&identity.address).await?;
        let public_key = identity.signer.public_key();

        let draft = builder::withdraw_tx(nonce, to, amount, fee_amount, 0);
        let gas = inner
            .config
            .paratime_fee
            .paratime_gas(&inner.client, &draft, &public_key)
            .await?;

        let tx = builder::withdraw_tx(nonce, to, amount, fee_amount, gas);
        let envelope = builder::sign_paratime(&tx, &identity.signer, &contexts.paratime)?;
        self.submit_paratime_action(ActionKind::Withdraw, &tx, &envelope, amount)
            .await
    }

    /// Move the intermediate account's full balance to the destination.
    async fn transfer_onward(&self, amount: u128, contexts: &Contexts) -> Result<(), SweepError> {
        let inner = &self.inner;
        let account = inner
            .identity
            .intermediate
            .as_ref()
            .ok_or(SweepError::InvalidConfig)?;
        let Destination::Consensus(to) = inner.destination else {
            return Err(SweepError::InvalidDestination);
        };

        let nonce = inner.client.consensus_nonce(&account.address).await?;
        let public_key = account.signer.public_key();

        let draft = builder::transfer_tx(nonce, to, amount, 0);
        let gas = inner
            .config
            .consensus_fee
            .consensus_gas(&inner.client, &draft, &public_key)
            .await?;

        let tx = builder::transfer_tx(nonce, to, amount, gas);
        let envelope = builder::sign_consensus(&tx, &account.signer, &contexts.consensus)?;
        self.submit_consensus_action(ActionKind::Transfer, &tx, &envelope, amount)
            .await
    }

    /// Bridge `amount` (consensus base units) into the paratime,
    /// topping up the bridge allowance first when it falls short.
    async fn deposit(&self, amount: u128, contexts: &Contexts) -> Result<(), SweepError> {
        let inner = &self.inner;
        let identity = &inner.identity;
        let Destination::Paratime(evm) = inner.destination else {
            return Err(SweepError::InvalidDestination);
        };
        let public_key = identity.signer.public_key();

        // Query the standing allowance rather than assuming it is zero;
        // a prior interrupted cycle may have already raised it.
        let allowance = inner
            .client
            .consensus_allowance(&identity.address, &inner.bridge)
            .await?;
        if allowance < amount {
            let delta = amount - allowance;
            let nonce = inner.client.consensus_nonce(&identity.address).await?;

            let draft = builder::allowance_tx(nonce, inner.bridge, delta, 0);
            let gas = inner
                .config
                .consensus_fee
                .consensus_gas(&inner.client, &draft, &public_key)
                .await?;

            let tx = builder::allowance_tx(nonce, inner.bridge, delta, gas);
            let envelope = builder::sign_consensus(&tx, &identity.signer, &contexts.consensus)?;
            self.submit_consensus_action(ActionKind::Allow, &tx, &envelope, delta)
                .await?;
        }

        let paratime_amount = to_paratime_units(amount, inner.config.network.scale())
            .ok_or(SweepError::AmountOverflow)?;
        let to = ConsensusAddress::from_evm(&evm);
        let nonce = inner.client.paratime_nonce(&identity.address).await?;

        let draft = builder::deposit_tx(nonce, to, paratime_amount, 0);
        let gas = inner
            .config
            .paratime_fee
            .paratime_gas(&inner.client, &draft, &public_key)
            .await?;

        let tx = builder::deposit_tx(nonce, to, paratime_amount, gas);
        let envelope = builder::sign_paratime(&tx, &identity.signer, &contexts.paratime)?;
        self.submit_paratime_action(ActionKind::Deposit, &tx, &envelope, paratime_amount)
            .await
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    async fn submit_consensus_action(
        &self,
        kind: ActionKind,
        tx: &ConsensusTx,
        envelope: &SignedEnvelope,
        amount: u128,
    ) -> Result<(), SweepError> {
        self.emit(SweepEvent::PhaseChanged {
            phase: Phase::AwaitingAck,
        });
        match self.inner.client.submit_consensus(envelope).await {
            Ok(()) => {
                tracing::info!(
                    action = kind.as_str(),
                    amount,
                    nonce = tx.nonce,
                    "action acknowledged"
                );
                self.emit(SweepEvent::ActionSubmitted {
                    action: kind,
                    amount,
                    nonce: tx.nonce,
                });
                Ok(())
            }
            Err(error) => {
                let error = SweepError::from(error);
                self.emit(SweepEvent::ActionFailed {
                    action: kind,
                    error,
                });
                Err(error)
            }
        }
    }

    async fn submit_paratime_action(
        &self,
        kind: ActionKind,
        tx: &ParatimeTx,
        envelope: &SignedEnvelope,
        amount: u128,
    ) -> Result<(), SweepError> {
        self.emit(SweepEvent::PhaseChanged {
            phase: Phase::AwaitingAck,
        });
        match self.inner.client.submit_paratime(envelope).await {
            Ok(()) => {
                tracing::info!(
                    action = kind.as_str(),
                    amount,
                    nonce = tx.nonce,
                    "action acknowledged"
                );
                self.emit(SweepEvent::ActionSubmitted {
                    action: kind,
                    amount,
                    nonce: tx.nonce,
                });
                Ok(())
            }
            Err(error) => {
                let error = SweepError::from(error);
                self.emit(SweepEvent::ActionFailed {
                    action: kind,
                    error,
                });
                Err(error)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
