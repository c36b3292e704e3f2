//! Sweep controller error types.
//!
//! [`SweepError`] is the unified error type for the controller. Variants
//! are zero-size discriminants -- no string payloads -- and each one is
//! classified as transient or terminal, which drives the retry loop.

use client::ClientError;
use std::fmt;

// ---------------------------------------------------------------------------
// SweepError
// ---------------------------------------------------------------------------

/// Errors from the sweep controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepError {
    /// The controller has been shut down (cancellation token fired).
    Cancelled,

    /// The destination address is malformed or on the wrong layer for
    /// the configured policy.
    InvalidDestination,

    /// The configuration is inconsistent (missing intermediate account,
    /// destination equals the intermediate, unparseable bridge account).
    InvalidConfig,

    /// Key derivation from the mnemonic failed.
    KeyDerivationFailed,

    /// A unit conversion overflowed u128.
    AmountOverflow,

    /// A transaction payload failed to encode.
    EncodingFailed,

    /// The ledger node could not be reached.
    Transport,

    /// The node rejected a transaction or query. A stale nonce or a
    /// balance that moved under us; a fresh poll usually resolves it.
    Rejected,

    /// The node rejected a signature. The chain context binding or the
    /// signing path is wrong; retrying the same key cannot help.
    SignatureRejected,
}

impl SweepError {
    /// Whether the error is expected to clear on its own, so the
    /// controller should back off and re-poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport | Self::Rejected)
    }

    /// Whether the error can never clear without operator intervention.
    /// Terminal errors abort the run. [`SweepError::Cancelled`] is
    /// neither transient nor terminal; it is a clean stop.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::InvalidDestination
                | Self::InvalidConfig
                | Self::KeyDerivationFailed
                | Self::AmountOverflow
                | Self::EncodingFailed
                | Self::SignatureRejected
        )
    }
}

impl From<ClientError> for SweepError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Unavailable => Self::Transport,
            ClientError::Rejected => Self::Rejected,
            ClientError::InvalidSignature => Self::SignatureRejected,
        }
    }
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "sweep cancelled"),
            Self::InvalidDestination => write!(f, "invalid destination address"),
            Self::InvalidConfig => write!(f, "invalid sweep configuration"),
            Self::KeyDerivationFailed => write!(f, "key derivation failed"),
            Self::AmountOverflow => write!(f, "amount conversion overflowed"),
            Self::EncodingFailed => write!(f, "transaction encoding failed"),
            Self::Transport => write!(f, "ledger node unreachable"),
            Self::Rejected => write!(f, "transaction or query rejected"),
            Self::SignatureRejected => write!(f, "signature rejected by node"),
        }
    }
}

impl std::error::Error for SweepError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
