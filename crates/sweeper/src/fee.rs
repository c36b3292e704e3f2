//! Per-layer gas policy.
//!
//! Each layer carries its own [`FeePolicy`]: either a fixed gas limit or
//! simulation against the node. The defaults mirror how the bridge is
//! actually operated -- consensus transactions are cheap enough to
//! estimate per-call, while paratime bridge calls use a conservative
//! constant (a stale constant overpays, it does not fail).

use client::{ConsensusTx, LedgerClient, ParatimeTx};
use signer::PublicKey;

use crate::SweepError;

/// How the gas limit for a transaction is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    /// Use a fixed gas limit.
    Fixed { gas: u64 },
    /// Simulate the transaction against current chain state.
    Estimated,
}

impl FeePolicy {
    /// Resolve the gas limit for a consensus transaction. `draft` is the
    /// transaction with a zero gas limit; only [`FeePolicy::Estimated`]
    /// inspects it.
    pub(crate) async fn consensus_gas<C: LedgerClient>(
        &self,
        client: &C,
        draft: &ConsensusTx,
        signer_public_key: &PublicKey,
    ) -> Result<u64, SweepError> {
        match self {
            Self::Fixed { gas } => Ok(*gas),
            Self::Estimated => Ok(client
                .estimate_consensus_gas(draft, signer_public_key)
                .await?),
        }
    }

    /// Resolve the gas limit for a paratime transaction.
    pub(crate) async fn paratime_gas<C: LedgerClient>(
        &self,
        client: &C,
        draft: &ParatimeTx,
        signer_public_key: &PublicKey,
    ) -> Result<u64, SweepError> {
        match self {
            Self::Fixed { gas } => Ok(*gas),
            Self::Estimated => Ok(client
                .estimate_paratime_gas(draft, signer_public_key)
                .await?),
        }
    }
}
