//! Ed25519 signer implementation.

use ed25519_dalek::{Signer as _, SigningKey};
use rand_core::CryptoRngCore;

use crate::{signing_digest, PublicKey, Signature, SignatureContext, Signer};

// ---------------------------------------------------------------------------
// Ed25519Signer
// ---------------------------------------------------------------------------

/// An ed25519 signing identity.
///
/// Holds the expanded signing key for the process lifetime. Constructed
/// either from fresh randomness (one-shot identities) or from a derived
/// 32-byte secret (mnemonic-backed identities, see [`crate::hd`]).
#[derive(Debug)]
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a signer from fresh randomness.
    pub fn generate<R: CryptoRngCore>(rng: &mut R) -> Self {
        Self {
            key: SigningKey::generate(rng),
        }
    }

    /// Construct a signer from a 32-byte secret.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        self.key.verifying_key().to_bytes()
    }

    fn sign(&self, context: &SignatureContext, message: &[u8]) -> Signature {
        let digest = signing_digest(context, message);
        self.key.sign(&digest).to_bytes()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::{Verifier, VerifyingKey};

    fn verify(pk: &PublicKey, context: &SignatureContext, message: &[u8], sig: &Signature) -> bool {
        let key = VerifyingKey::from_bytes(pk).expect("valid public key");
        let digest = signing_digest(context, message);
        key.verify(&digest, &ed25519_dalek::Signature::from_bytes(sig))
            .is_ok()
    }

    #[test]
    fn sign_and_verify() {
        let signer = Ed25519Signer::from_secret(&[11u8; 32]);
        let ctx = SignatureContext::consensus_tx("test-chain");
        let sig = signer.sign(&ctx, b"payload");
        assert!(verify(&signer.public_key(), &ctx, b"payload", &sig));
    }

    #[test]
    fn signature_does_not_verify_under_other_context() {
        let signer = Ed25519Signer::from_secret(&[11u8; 32]);
        let ctx = SignatureContext::consensus_tx("test-chain");
        let other = SignatureContext::consensus_tx("other-chain");
        let sig = signer.sign(&ctx, b"payload");
        assert!(!verify(&signer.public_key(), &other, b"payload", &sig));
    }

    #[test]
    fn from_secret_is_deterministic() {
        let a = Ed25519Signer::from_secret(&[5u8; 32]);
        let b = Ed25519Signer::from_secret(&[5u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
    }
}
