//! Transaction construction and signing.
//!
//! Builders are pure: they take the nonce and gas limit the controller
//! already resolved and return a complete unsigned transaction. Signing
//! encodes the payload exactly once and binds the layer's chain-bound
//! context.

use client::types::{
    encode, ConsensusTx, ConsensusTxBody, Fee, ParatimeTx, ParatimeTxBody, SignedEnvelope,
};
use config::NetworkConfig;
use signer::{SignatureContext, Signer};
use sweep_core::{ConsensusAddress, Quantity};

use crate::SweepError;

// ---------------------------------------------------------------------------
// Consensus-layer builders
// ---------------------------------------------------------------------------

/// Raise the allowance toward `beneficiary` by `amount_change`
/// (consensus base units). Consensus transactions ride with a zero fee
/// amount; only the gas limit varies.
pub(crate) fn allowance_tx(
    nonce: u64,
    beneficiary: ConsensusAddress,
    amount_change: u128,
    gas: u64,
) -> ConsensusTx {
    ConsensusTx {
        nonce,
        fee: Fee {
            amount: Quantity::ZERO,
            gas,
            consensus_messages: 0,
        },
        body: ConsensusTxBody::Allow {
            beneficiary,
            negative: false,
            amount_change: Quantity(amount_change),
        },
    }
}

/// Move `amount` (consensus base units) to `to`.
pub(crate) fn transfer_tx(nonce: u64, to: ConsensusAddress, amount: u128, gas: u64) -> ConsensusTx {
    ConsensusTx {
        nonce,
        fee: Fee {
            amount: Quantity::ZERO,
            gas,
            consensus_messages: 0,
        },
        body: ConsensusTxBody::Transfer {
            to,
            amount: Quantity(amount),
        },
    }
}

// ---------------------------------------------------------------------------
// Paratime builders
// ---------------------------------------------------------------------------

/// Bridge `amount` (paratime base units) in from the signer's consensus
/// balance, crediting `to` inside the paratime. Deposits are subsidized:
/// the fee amount is zero, only the gas limit is set. The call emits one
/// consensus-layer message.
pub(crate) fn deposit_tx(nonce: u64, to: ConsensusAddress, amount: u128, gas: u64) -> ParatimeTx {
    ParatimeTx {
        nonce,
        fee: Fee {
            amount: Quantity::ZERO,
            gas,
            consensus_messages: 1,
        },
        body: ParatimeTxBody::Deposit {
            to,
            amount: Quantity(amount),
        },
    }
}

/// Bridge `amount` (paratime base units) out to the consensus account
/// `to`. Withdrawals pay `fee_amount` from the signer's paratime balance
/// on top of `amount`.
pub(crate) fn withdraw_tx(
    nonce: u64,
    to: ConsensusAddress,
    amount: u128,
    fee_amount: u128,
    gas: u64,
) -> ParatimeTx {
    ParatimeTx {
        nonce,
        fee: Fee {
            amount: Quantity(fee_amount),
            gas,
            consensus_messages: 1,
        },
        body: ParatimeTxBody::Withdraw {
            to,
            amount: Quantity(amount),
        },
    }
}

/// The fee a withdrawal pays, in paratime base units:
/// `gas_price * fee_gas`, scaled up from consensus precision.
pub(crate) fn withdraw_fee_amount(network: &NetworkConfig) -> Result<u128, SweepError> {
    network
        .paratime
        .gas_price
        .checked_mul(network.paratime.fee_gas as u128)
        .and_then(|fee| fee.checked_mul(network.scale()))
        .ok_or(SweepError::AmountOverflow)
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Encode and sign a consensus transaction under the consensus context.
pub(crate) fn sign_consensus(
    tx: &ConsensusTx,
    signer: &impl Signer,
    context: &SignatureContext,
) -> Result<SignedEnvelope, SweepError> {
    seal(tx, signer, context)
}

/// Encode and sign a paratime transaction under the paratime context.
pub(crate) fn sign_paratime(
    tx: &ParatimeTx,
    signer: &impl Signer,
    context: &SignatureContext,
) -> Result<SignedEnvelope, SweepError> {
    seal(tx, signer, context)
}

fn seal(
    tx: &impl serde::Serialize,
    signer: &impl Signer,
    context: &SignatureContext,
) -> Result<SignedEnvelope, SweepError> {
    let payload = encode(tx).map_err(|_| SweepError::EncodingFailed)?;
    let signature = signer.sign(context, &payload);
    Ok(SignedEnvelope {
        payload,
        signature,
        public_key: signer.public_key(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_withdraw_fee() {
        // 100 units/gas * 70_000 gas, scaled by 10^9.
        let fee = withdraw_fee_amount(&NetworkConfig::MAINNET).unwrap();
        assert_eq!(fee, 7_000_000_000_000_000);
    }

    #[test]
    fn deposit_is_free_with_one_message() {
        let to = ConsensusAddress::from_public_key(&[7u8; 32]);
        let tx = deposit_tx(3, to, 1_000_000_000, 70_000);
        assert_eq!(tx.fee.amount, Quantity::ZERO);
        assert_eq!(tx.fee.consensus_messages, 1);
        assert_eq!(tx.nonce, 3);
    }

    #[test]
    fn signed_envelope_round_trips() {
        let signer = signer::Ed25519Signer::from_secret(&[5u8; 32]);
        let context = SignatureContext::consensus_tx("test-chain");
        let tx = transfer_tx(0, ConsensusAddress::from_public_key(&[8u8; 32]), 42, 1_300);

        let envelope = sign_consensus(&tx, &signer, &context).unwrap();
        assert_eq!(envelope.public_key, signer.public_key());
        assert_eq!(envelope.decode_consensus().unwrap(), tx);
    }
}
