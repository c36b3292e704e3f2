//! Transaction wire types.
//!
//! Unsigned bodies are plain value types: the builder constructs one, the
//! signer consumes it exactly once, and nothing mutates it in between.
//! Payloads are CBOR; amounts ride as trimmed big-endian byte strings
//! (see [`sweep_core::Quantity`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use sweep_core::{ConsensusAddress, Quantity};

// ---------------------------------------------------------------------------
// Fee
// ---------------------------------------------------------------------------

/// Fee fields carried by every transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// Fee amount in the transaction's layer base unit.
    pub amount: Quantity,
    /// Gas limit.
    pub gas: u64,
    /// Number of consensus-layer messages the transaction may emit.
    /// Bridging calls (deposit, withdraw) emit exactly one.
    pub consensus_messages: u32,
}

impl Fee {
    /// A zero fee with no consensus messages.
    pub const FREE: Self = Self {
        amount: Quantity::ZERO,
        gas: 0,
        consensus_messages: 0,
    };
}

// ---------------------------------------------------------------------------
// Consensus-layer transactions
// ---------------------------------------------------------------------------

/// Consensus-layer transaction methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusTxBody {
    /// Change the allowance granted to `beneficiary` by the signer.
    Allow {
        beneficiary: ConsensusAddress,
        negative: bool,
        amount_change: Quantity,
    },
    /// Move `amount` from the signer to `to`, same layer.
    Transfer {
        to: ConsensusAddress,
        amount: Quantity,
    },
}

/// An unsigned consensus-layer transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusTx {
    pub nonce: u64,
    pub fee: Fee,
    pub body: ConsensusTxBody,
}

// ---------------------------------------------------------------------------
// Paratime transactions
// ---------------------------------------------------------------------------

/// Paratime transaction methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParatimeTxBody {
    /// Bridge `amount` (paratime base units) from the signer's consensus
    /// balance into the paratime, crediting `to`.
    Deposit {
        to: ConsensusAddress,
        amount: Quantity,
    },
    /// Bridge `amount` (paratime base units) out of the paratime,
    /// crediting the consensus account `to`.
    Withdraw {
        to: ConsensusAddress,
        amount: Quantity,
    },
}

/// An unsigned paratime transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParatimeTx {
    pub nonce: u64,
    pub fee: Fee,
    pub body: ParatimeTxBody,
}

// ---------------------------------------------------------------------------
// SignedEnvelope
// ---------------------------------------------------------------------------

/// A signed transaction ready for submission.
///
/// `payload` is the CBOR encoding of the unsigned transaction; the
/// signature covers it under the layer's chain-bound context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub payload: Vec<u8>,
    pub signature: [u8; 64],
    pub public_key: [u8; 32],
}

impl SignedEnvelope {
    /// Decode the payload as a consensus-layer transaction.
    pub fn decode_consensus(&self) -> Result<ConsensusTx, WireError> {
        decode(&self.payload)
    }

    /// Decode the payload as a paratime transaction.
    pub fn decode_paratime(&self) -> Result<ParatimeTx, WireError> {
        decode(&self.payload)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode an unsigned transaction into its signing payload.
pub fn encode<T: Serialize>(tx: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(tx, &mut buf).map_err(|_| WireError::Encode)?;
    Ok(buf)
}

fn decode<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Result<T, WireError> {
    ciborium::de::from_reader(payload).map_err(|_| WireError::Decode)
}

/// CBOR encode/decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    Encode,
    Decode,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode => write!(f, "transaction encoding failed"),
            Self::Decode => write!(f, "transaction decoding failed"),
        }
    }
}

impl std::error::Error for WireError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn some_address() -> ConsensusAddress {
        ConsensusAddress::from_public_key(&[9u8; 32])
    }

    #[test]
    fn consensus_tx_round_trip() {
        let tx = ConsensusTx {
            nonce: 7,
            fee: Fee::FREE,
            body: ConsensusTxBody::Allow {
                beneficiary: some_address(),
                negative: false,
                amount_change: Quantity(1_000),
            },
        };
        let payload = encode(&tx).unwrap();
        let envelope = SignedEnvelope {
            payload,
            signature: [0u8; 64],
            public_key: [0u8; 32],
        };
        assert_eq!(envelope.decode_consensus().unwrap(), tx);
    }

    #[test]
    fn paratime_tx_round_trip() {
        let tx = ParatimeTx {
            nonce: 0,
            fee: Fee {
                amount: Quantity(7_000_000_000_000_000),
                gas: 70_000,
                consensus_messages: 1,
            },
            body: ParatimeTxBody::Withdraw {
                to: some_address(),
                amount: Quantity(499_993_000_000_000_000_000),
            },
        };
        let payload = encode(&tx).unwrap();
        let envelope = SignedEnvelope {
            payload,
            signature: [0u8; 64],
            public_key: [0u8; 32],
        };
        assert_eq!(envelope.decode_paratime().unwrap(), tx);
    }

    #[test]
    fn decode_rejects_wrong_shape() {
        let tx = ConsensusTx {
            nonce: 1,
            fee: Fee::FREE,
            body: ConsensusTxBody::Transfer {
                to: some_address(),
                amount: Quantity(5),
            },
        };
        let envelope = SignedEnvelope {
            payload: encode(&tx).unwrap(),
            signature: [0u8; 64],
            public_key: [0u8; 32],
        };
        assert!(envelope.decode_paratime().is_err());
    }
}
