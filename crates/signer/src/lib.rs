//! Signing abstractions for the sweep agent.
//!
//! This crate provides:
//!
//! - [`Signer`] trait -- the minimal signing capability the controller needs
//! - [`SignatureContext`] -- chain-bound domain separation for signatures
//! - [`Ed25519Signer`] -- concrete ed25519 implementation
//! - [`hd`] module -- BIP-39 mnemonics and hardened child-key derivation
//!
//! # Design
//!
//! The secret key is owned by exactly one [`Signer`] for the process
//! lifetime; no other component can read it. Every signature binds a
//! [`SignatureContext`] derived from the network's chain context, so a
//! transaction signed for one network fails verification on any other.
//! The context is built once at startup and reused for the run; if the
//! chain context ever changed mid-run, in-flight transactions would fail
//! verification rather than silently use a stale binding.

pub mod hd;

mod ed25519;

pub use ed25519::Ed25519Signer;

use sha2::{Digest, Sha512_256};

/// A raw ed25519 public key.
pub type PublicKey = [u8; 32];

/// A raw ed25519 signature.
pub type Signature = [u8; 64];

// ---------------------------------------------------------------------------
// SignatureContext
// ---------------------------------------------------------------------------

/// Domain-separation tag bound into every signature.
///
/// Consensus and paratime transactions use distinct contexts, and both
/// incorporate the network's chain context, preventing cross-network and
/// cross-layer replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContext(String);

impl SignatureContext {
    /// Context for consensus-layer transactions.
    pub fn consensus_tx(chain_context: &str) -> Self {
        Self(format!("oasis-core/consensus: tx for chain {chain_context}"))
    }

    /// Context for paratime transactions.
    ///
    /// The paratime's signature domain binds both the runtime identifier
    /// and the consensus chain context.
    pub fn paratime_tx(chain_context: &str, runtime_id: &str) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(runtime_id.as_bytes());
        hasher.update(chain_context.as_bytes());
        let digest = hasher.finalize();
        Self(format!(
            "oasis-runtime-sdk/tx: v0 for chain {}",
            sweep_core::hex::encode(&digest)
        ))
    }

    /// The raw context bytes mixed into the signed digest.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// The signing capability consumed by the sweep controller.
///
/// Implementations sign `SHA-512/256(context || message)`; the secret key
/// never leaves the implementation.
pub trait Signer: Send + Sync {
    /// The signer's public key.
    fn public_key(&self) -> PublicKey;

    /// Sign a message under the given domain-separation context.
    fn sign(&self, context: &SignatureContext, message: &[u8]) -> Signature;
}

/// Compute the digest that is actually signed.
pub(crate) fn signing_digest(context: &SignatureContext, message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    hasher.update(context.as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
