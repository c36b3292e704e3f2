//! Ledger client abstraction.
//!
//! The sweep controller never speaks to a node directly; it consumes the
//! [`LedgerClient`] capability: balance/nonce/allowance reads, gas
//! estimation, and transaction submission on both layers. Production
//! deployments implement this trait over their node's RPC; tests and the
//! reference daemon use [`mock::MockLedger`].
//!
//! # Contract
//!
//! - Reads are authoritative: callers re-read right before use and never
//!   cache across polls.
//! - `submit_*` is fire-and-wait: the future resolves once the node
//!   accepts or rejects the transaction. Exactly one submission per built
//!   transaction; after an error the caller re-queries the nonce instead
//!   of resubmitting verbatim.
//! - `chain_context` is fetched once at startup and bound into every
//!   signature.

pub mod mock;
pub mod types;

pub use types::{
    ConsensusTx, ConsensusTxBody, Fee, ParatimeTx, ParatimeTxBody, SignedEnvelope, WireError,
};

use std::fmt;
use std::future::Future;

use sweep_core::ConsensusAddress;

// ---------------------------------------------------------------------------
// ChainContext
// ---------------------------------------------------------------------------

/// The network's domain-separation value, opaque to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContext(String);

impl ChainContext {
    pub fn new(context: impl Into<String>) -> Self {
        Self(context.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientError
// ---------------------------------------------------------------------------

/// Errors surfaced by a ledger client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientError {
    /// The node could not be reached or timed out. Transient.
    Unavailable,

    /// The node refused the transaction (bad nonce, insufficient funds,
    /// malformed body). A fresh poll usually resolves it.
    Rejected,

    /// Signature verification failed at the node. Indicates a chain
    /// context mismatch or a signing defect; retrying cannot help.
    InvalidSignature,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "ledger node unavailable"),
            Self::Rejected => write!(f, "transaction rejected"),
            Self::InvalidSignature => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for ClientError {}

// ---------------------------------------------------------------------------
// LedgerClient trait
// ---------------------------------------------------------------------------

/// Read and submission access to both ledger layers.
pub trait LedgerClient: Send + Sync {
    /// Fetch the network's chain context. Called once at startup.
    fn chain_context(&self) -> impl Future<Output = Result<ChainContext, ClientError>> + Send;

    /// General balance of a consensus-layer account.
    fn consensus_balance(
        &self,
        address: &ConsensusAddress,
    ) -> impl Future<Output = Result<u128, ClientError>> + Send;

    /// Balance of an account inside the paratime, in paratime base units.
    fn paratime_balance(
        &self,
        address: &ConsensusAddress,
    ) -> impl Future<Output = Result<u128, ClientError>> + Send;

    /// Next unused consensus-layer nonce for an address.
    fn consensus_nonce(
        &self,
        address: &ConsensusAddress,
    ) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Next unused paratime nonce for an address.
    fn paratime_nonce(
        &self,
        address: &ConsensusAddress,
    ) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Current consensus allowance granted by `owner` to `beneficiary`.
    fn consensus_allowance(
        &self,
        owner: &ConsensusAddress,
        beneficiary: &ConsensusAddress,
    ) -> impl Future<Output = Result<u128, ClientError>> + Send;

    /// Simulate an unsigned consensus transaction against current chain
    /// state and return the gas it would consume.
    fn estimate_consensus_gas(
        &self,
        tx: &ConsensusTx,
        signer_public_key: &[u8; 32],
    ) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Simulate an unsigned paratime transaction and return the gas it
    /// would consume.
    fn estimate_paratime_gas(
        &self,
        tx: &ParatimeTx,
        signer_public_key: &[u8; 32],
    ) -> impl Future<Output = Result<u64, ClientError>> + Send;

    /// Submit a signed consensus-layer transaction and await the node's
    /// acceptance.
    fn submit_consensus(
        &self,
        envelope: &SignedEnvelope,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Submit a signed paratime transaction and await the node's
    /// acceptance.
    fn submit_paratime(
        &self,
        envelope: &SignedEnvelope,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}
