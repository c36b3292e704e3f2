//! Mnemonic handling and hardened child-key derivation.
//!
//! Identities are derived from a BIP-39 mnemonic along the hardened path
//! `m/44'/474'/account'` using the ed25519 variant of SLIP-0010. The same
//! mnemonic and account index always yield the same key, and therefore
//! the same pair of layer addresses.
//!
//! Account 0 is the primary sweep identity; account 1 is the intermediate
//! quarantine account used by the two-hop policy.

use std::fmt;

use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use rand_core::CryptoRngCore;
use sha2::Sha512;

use crate::Ed25519Signer;

type HmacSha512 = Hmac<Sha512>;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// BIP-44 purpose component.
const PURPOSE: u32 = 44;

/// Registered coin type for the consensus layer.
const COIN_TYPE: u32 = 474;

/// SLIP-0010 master-key HMAC domain for the ed25519 curve.
const CURVE_SEED: &[u8] = b"ed25519 seed";

/// Hardened-index bit.
const HARDENED: u32 = 1 << 31;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdError {
    /// The account index exceeds the hardened range (must be < 2^31).
    InvalidAccount(u32),
}

impl fmt::Display for HdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAccount(i) => write!(f, "account index {i} out of range"),
        }
    }
}

impl std::error::Error for HdError {}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Generate a fresh 24-word mnemonic (256 bits of entropy).
pub fn generate_mnemonic<R: CryptoRngCore>(rng: &mut R) -> Mnemonic {
    let mut entropy = [0u8; 32];
    rng.fill_bytes(&mut entropy);
    Mnemonic::from_entropy(&entropy).expect("32 bytes is valid mnemonic entropy")
}

/// Derive the signer for an account along `m/44'/474'/account'`.
pub fn derive_signer(mnemonic: &Mnemonic, account: u32) -> Result<Ed25519Signer, HdError> {
    if account >= HARDENED {
        return Err(HdError::InvalidAccount(account));
    }

    let seed = mnemonic.to_seed("");
    let (mut key, mut chain_code) = master_key(&seed);
    for index in [PURPOSE, COIN_TYPE, account] {
        (key, chain_code) = derive_child(&key, &chain_code, index | HARDENED);
    }

    Ok(Ed25519Signer::from_secret(&key))
}

/// SLIP-0010 master key: `HMAC-SHA512("ed25519 seed", seed)`.
fn master_key(seed: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut mac = HmacSha512::new_from_slice(CURVE_SEED).expect("HMAC accepts any key length");
    mac.update(seed);
    split(mac.finalize().into_bytes().as_slice())
}

/// SLIP-0010 hardened child: `HMAC-SHA512(chain_code, 0x00 || key || index)`.
///
/// The ed25519 variant only defines hardened derivation; `index` must
/// already carry the hardened bit.
fn derive_child(key: &[u8; 32], chain_code: &[u8; 32], index: u32) -> ([u8; 32], [u8; 32]) {
    debug_assert!(index & HARDENED != 0);
    let mut mac = HmacSha512::new_from_slice(chain_code).expect("HMAC accepts any key length");
    mac.update(&[0x00]);
    mac.update(key);
    mac.update(&index.to_be_bytes());
    split(mac.finalize().into_bytes().as_slice())
}

fn split(digest: &[u8]) -> ([u8; 32], [u8; 32]) {
    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&digest[..32]);
    chain_code.copy_from_slice(&digest[32..]);
    (key, chain_code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
