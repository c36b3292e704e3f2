//! In-memory ledger for tests and the reference daemon.
//!
//! [`MockLedger`] models just enough of both layers for the sweep
//! controller to run end to end: general balances, paratime balances,
//! per-address nonces with exact-sequence enforcement, allowances toward
//! the bridging account, and scripted submission failures.
//!
//! Cloning is cheap and shares state, so a test can keep a handle for
//! inspection while the controller owns another.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use sweep_core::ConsensusAddress;

use crate::types::{ConsensusTx, ConsensusTxBody, ParatimeTx, ParatimeTxBody, SignedEnvelope};
use crate::{ChainContext, ClientError, LedgerClient};

// ---------------------------------------------------------------------------
// Submission record
// ---------------------------------------------------------------------------

/// A decoded transaction the mock accepted, in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Consensus(ConsensusTx),
    Paratime(ParatimeTx),
}

// ---------------------------------------------------------------------------
// MockLedger
// ---------------------------------------------------------------------------

struct State {
    chain_context: String,
    scale: u128,
    bridge: ConsensusAddress,
    gas_estimate: u64,
    consensus_balances: HashMap<ConsensusAddress, u128>,
    paratime_balances: HashMap<ConsensusAddress, u128>,
    consensus_nonces: HashMap<ConsensusAddress, u64>,
    paratime_nonces: HashMap<ConsensusAddress, u64>,
    allowances: HashMap<(ConsensusAddress, ConsensusAddress), u128>,
    fail_queue: VecDeque<ClientError>,
    submissions: Vec<Submission>,
}

/// Shared-state in-memory ledger.
#[derive(Clone)]
pub struct MockLedger {
    inner: Arc<Mutex<State>>,
}

impl MockLedger {
    /// Create an empty ledger.
    ///
    /// `scale` is the consensus-to-paratime unit multiplier; `bridge` is
    /// the paratime's consensus staking account (deposits consume
    /// allowance granted to it).
    pub fn new(chain_context: &str, scale: u128, bridge: ConsensusAddress) -> Self {
        Self {
            inner: Arc::new(Mutex::new(State {
                chain_context: chain_context.to_owned(),
                scale,
                bridge,
                gas_estimate: 1_300,
                consensus_balances: HashMap::new(),
                paratime_balances: HashMap::new(),
                consensus_nonces: HashMap::new(),
                paratime_nonces: HashMap::new(),
                allowances: HashMap::new(),
                fail_queue: VecDeque::new(),
                submissions: Vec::new(),
            })),
        }
    }

    // -- seeding --

    pub fn set_consensus_balance(&self, address: ConsensusAddress, amount: u128) {
        self.inner
            .lock()
            .unwrap()
            .consensus_balances
            .insert(address, amount);
    }

    pub fn set_paratime_balance(&self, address: ConsensusAddress, amount: u128) {
        self.inner
            .lock()
            .unwrap()
            .paratime_balances
            .insert(address, amount);
    }

    pub fn set_allowance(&self, owner: ConsensusAddress, beneficiary: ConsensusAddress, amount: u128) {
        self.inner
            .lock()
            .unwrap()
            .allowances
            .insert((owner, beneficiary), amount);
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.inner.lock().unwrap().gas_estimate = gas;
    }

    /// Make the next submission fail with `error` (queued, FIFO).
    pub fn fail_next_submission(&self, error: ClientError) {
        self.inner.lock().unwrap().fail_queue.push_back(error);
    }

    // -- inspection --

    pub fn consensus_balance_of(&self, address: &ConsensusAddress) -> u128 {
        *self
            .inner
            .lock()
            .unwrap()
            .consensus_balances
            .get(address)
            .unwrap_or(&0)
    }

    pub fn paratime_balance_of(&self, address: &ConsensusAddress) -> u128 {
        *self
            .inner
            .lock()
            .unwrap()
            .paratime_balances
            .get(address)
            .unwrap_or(&0)
    }

    pub fn allowance_of(&self, owner: &ConsensusAddress, beneficiary: &ConsensusAddress) -> u128 {
        *self
            .inner
            .lock()
            .unwrap()
            .allowances
            .get(&(*owner, *beneficiary))
            .unwrap_or(&0)
    }

    /// Every accepted transaction, in submission order.
    pub fn submissions(&self) -> Vec<Submission> {
        self.inner.lock().unwrap().submissions.clone()
    }
}

// ---------------------------------------------------------------------------
// Transaction application
// ---------------------------------------------------------------------------

impl State {
    fn apply_consensus(&mut self, tx: &ConsensusTx, signer: ConsensusAddress) -> Result<(), ClientError> {
        let expected = *self.consensus_nonces.get(&signer).unwrap_or(&0);
        if tx.nonce != expected {
            return Err(ClientError::Rejected);
        }

        match tx.body {
            ConsensusTxBody::Allow {
                beneficiary,
                negative,
                amount_change,
            } => {
                let entry = self.allowances.entry((signer, beneficiary)).or_insert(0);
                *entry = if negative {
                    entry.saturating_sub(amount_change.value())
                } else {
                    entry
                        .checked_add(amount_change.value())
                        .ok_or(ClientError::Rejected)?
                };
            }
            ConsensusTxBody::Transfer { to, amount } => {
                let total = amount
                    .value()
                    .checked_add(tx.fee.amount.value())
                    .ok_or(ClientError::Rejected)?;
                let from = self.consensus_balances.entry(signer).or_insert(0);
                if *from < total {
                    return Err(ClientError::Rejected);
                }
                *from -= total;
                *self.consensus_balances.entry(to).or_insert(0) += amount.value();
            }
        }

        self.consensus_nonces.insert(signer, expected + 1);
        self.submissions.push(Submission::Consensus(*tx));
        Ok(())
    }

    fn apply_paratime(&mut self, tx: &ParatimeTx, signer: ConsensusAddress) -> Result<(), ClientError> {
        let expected = *self.paratime_nonces.get(&signer).unwrap_or(&0);
        if tx.nonce != expected {
            return Err(ClientError::Rejected);
        }

        match tx.body {
            ParatimeTxBody::Deposit { to, amount } => {
                // Deposits must be whole consensus units.
                if amount.value() % self.scale != 0 {
                    return Err(ClientError::Rejected);
                }
                let consensus_amount = amount.value() / self.scale;

                let allowance = self
                    .allowances
                    .entry((signer, self.bridge))
                    .or_insert(0);
                if *allowance < consensus_amount {
                    return Err(ClientError::Rejected);
                }
                let from = self.consensus_balances.entry(signer).or_insert(0);
                if *from < consensus_amount {
                    return Err(ClientError::Rejected);
                }
                *allowance -= consensus_amount;
                *from -= consensus_amount;
                *self.paratime_balances.entry(to).or_insert(0) += amount.value();
            }
            ParatimeTxBody::Withdraw { to, amount } => {
                let total = amount
                    .value()
                    .checked_add(tx.fee.amount.value())
                    .ok_or(ClientError::Rejected)?;
                let from = self.paratime_balances.entry(signer).or_insert(0);
                if *from < total {
                    return Err(ClientError::Rejected);
                }
                *from -= total;
                // The fee is consumed; only the amount crosses the bridge.
                *self.consensus_balances.entry(to).or_insert(0) += amount.value() / self.scale;
            }
        }

        self.paratime_nonces.insert(signer, expected + 1);
        self.submissions.push(Submission::Paratime(*tx));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LedgerClient impl
// ---------------------------------------------------------------------------

impl LedgerClient for MockLedger {
    async fn chain_context(&self) -> Result<ChainContext, ClientError> {
        Ok(ChainContext::new(
            self.inner.lock().unwrap().chain_context.clone(),
        ))
    }

    async fn consensus_balance(&self, address: &ConsensusAddress) -> Result<u128, ClientError> {
        Ok(self.consensus_balance_of(address))
    }

    async fn paratime_balance(&self, address: &ConsensusAddress) -> Result<u128, ClientError> {
        Ok(self.paratime_balance_of(address))
    }

    async fn consensus_nonce(&self, address: &ConsensusAddress) -> Result<u64, ClientError> {
        Ok(*self
            .inner
            .lock()
            .unwrap()
            .consensus_nonces
            .get(address)
            .unwrap_or(&0))
    }

    async fn paratime_nonce(&self, address: &ConsensusAddress) -> Result<u64, ClientError> {
        Ok(*self
            .inner
            .lock()
            .unwrap()
            .paratime_nonces
            .get(address)
            .unwrap_or(&0))
    }

    async fn consensus_allowance(
        &self,
        owner: &ConsensusAddress,
        beneficiary: &ConsensusAddress,
    ) -> Result<u128, ClientError> {
        Ok(self.allowance_of(owner, beneficiary))
    }

    async fn estimate_consensus_gas(
        &self,
        _tx: &ConsensusTx,
        _signer_public_key: &[u8; 32],
    ) -> Result<u64, ClientError> {
        Ok(self.inner.lock().unwrap().gas_estimate)
    }

    async fn estimate_paratime_gas(
        &self,
        _tx: &ParatimeTx,
        _signer_public_key: &[u8; 32],
    ) -> Result<u64, ClientError> {
        Ok(self.inner.lock().unwrap().gas_estimate)
    }

    async fn submit_consensus(&self, envelope: &SignedEnvelope) -> Result<(), ClientError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(error) = state.fail_queue.pop_front() {
            return Err(error);
        }
        let tx = envelope
            .decode_consensus()
            .map_err(|_| ClientError::Rejected)?;
        let signer = ConsensusAddress::from_public_key(&envelope.public_key);
        state.apply_consensus(&tx, signer)
    }

    async fn submit_paratime(&self, envelope: &SignedEnvelope) -> Result<(), ClientError> {
        let mut state = self.inner.lock().unwrap();
        if let Some(error) = state.fail_queue.pop_front() {
            return Err(error);
        }
        let tx = envelope
            .decode_paratime()
            .map_err(|_| ClientError::Rejected)?;
        let signer = ConsensusAddress::from_public_key(&envelope.public_key);
        state.apply_paratime(&tx, signer)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
