//! Consensus and EVM address codecs.
//!
//! Consensus-layer accounts are 21-byte addresses: a context version byte
//! followed by a truncated SHA-512/256 digest, rendered as Bech32 with the
//! `oasis` human-readable part. Two derivation contexts matter here:
//!
//! - the staking context, for addresses derived from an ed25519 public key
//! - the secp256k1eth context, for the consensus-format shadow of an EVM
//!   address inside the paratime
//!
//! EVM addresses are the familiar fixed-length `0x` + 40 hex characters.
//! Both parsers are strict; a destination that fails its layer's syntax
//! check is a fatal startup error, never retried.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512_256};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Human-readable part of consensus addresses (same on every network).
pub const HRP: &str = "oasis";

/// Address derivation context version.
const ADDRESS_VERSION: u8 = 0;

/// Derivation context for staking accounts (ed25519 public keys).
const STAKING_CONTEXT: &[u8] = b"oasis-core/address: staking";

/// Derivation context for EVM-derived paratime accounts.
const SECP256K1ETH_CONTEXT: &[u8] = b"oasis-runtime-sdk/address: secp256k1eth";

/// Version byte + 20-byte truncated digest.
const ADDRESS_SIZE: usize = 21;

// ---------------------------------------------------------------------------
// ConsensusAddress
// ---------------------------------------------------------------------------

/// A 21-byte consensus-layer account address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsensusAddress([u8; ADDRESS_SIZE]);

impl ConsensusAddress {
    /// Derive the staking address of an ed25519 public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        Self::from_data(STAKING_CONTEXT, public_key)
    }

    /// Derive the consensus-format address of an EVM account inside the
    /// paratime. Deposits destined for an EVM address are credited here.
    pub fn from_evm(address: &EvmAddress) -> Self {
        Self::from_data(SECP256K1ETH_CONTEXT, address.as_bytes())
    }

    fn from_data(context: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha512_256::new();
        hasher.update(context);
        hasher.update([ADDRESS_VERSION]);
        hasher.update(data);
        let digest = hasher.finalize();

        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes[0] = ADDRESS_VERSION;
        bytes[1..].copy_from_slice(&digest[..20]);
        Self(bytes)
    }

    /// The raw 21-byte form (the wire representation).
    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Rebuild an address from its raw 21-byte form.
    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Result<Self, AddressError> {
        if bytes[0] != ADDRESS_VERSION {
            return Err(AddressError::UnknownVersion(bytes[0]));
        }
        Ok(Self(bytes))
    }

    /// Parse a Bech32 consensus address string.
    ///
    /// Bech32 is case-insensitive; lowercase input (the common case, and
    /// the only case our encoder produces) parses without allocating.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let normalized: Cow<'_, str> = if s.bytes().any(|b| b.is_ascii_uppercase()) {
            Cow::Owned(s.to_lowercase())
        } else {
            Cow::Borrowed(s)
        };

        let checked = CheckedHrpstring::new::<Bech32>(&normalized)
            .map_err(|e| AddressError::Bech32(e.to_string()))?;

        if checked.hrp().as_str() != HRP {
            return Err(AddressError::UnknownHrp(checked.hrp().to_string()));
        }

        let mut buf = [0u8; ADDRESS_SIZE];
        let mut len = 0;
        for byte in checked.byte_iter() {
            if len >= ADDRESS_SIZE {
                return Err(AddressError::BadLength);
            }
            buf[len] = byte;
            len += 1;
        }
        if len != ADDRESS_SIZE {
            return Err(AddressError::BadLength);
        }

        Self::from_bytes(buf)
    }
}

/// Zero-alloc: writes the Bech32 encoding directly to the formatter.
impl fmt::Display for ConsensusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hrp = Hrp::parse(HRP).expect("HRP constant is valid");
        bech32::encode_lower_to_fmt::<Bech32, _>(f, hrp, &self.0).map_err(|_| fmt::Error)
    }
}

impl FromStr for ConsensusAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ConsensusAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

struct ConsensusAddressVisitor;

impl<'de> Visitor<'de> for ConsensusAddressVisitor {
    type Value = ConsensusAddress;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a 21-byte address")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ConsensusAddress, E> {
        let bytes: [u8; ADDRESS_SIZE] = v
            .try_into()
            .map_err(|_| E::invalid_length(v.len(), &"21 bytes"))?;
        ConsensusAddress::from_bytes(bytes).map_err(E::custom)
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<ConsensusAddress, E> {
        self.visit_bytes(&v)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<ConsensusAddress, A::Error> {
        let mut bytes = Vec::with_capacity(ADDRESS_SIZE);
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        self.visit_bytes(&bytes)
    }
}

impl<'de> Deserialize<'de> for ConsensusAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(ConsensusAddressVisitor)
    }
}

// ---------------------------------------------------------------------------
// EvmAddress
// ---------------------------------------------------------------------------

/// A 20-byte EVM account address on the paratime layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EvmAddress([u8; 20]);

impl EvmAddress {
    /// Parse the canonical `0x` + 40 hex characters form. Anything else
    /// is rejected.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let hex = s.strip_prefix("0x").ok_or(AddressError::MissingPrefix)?;
        if hex.len() != 40 {
            return Err(AddressError::BadLength);
        }
        let decoded = crate::hex::decode(hex).ok_or(AddressError::BadHex)?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    /// The raw 20-byte form.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for EvmAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors from address parsing and reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Bech32 decoding failed.
    Bech32(String),

    /// The human-readable part is not the consensus HRP.
    UnknownHrp(String),

    /// The address version byte is not recognized.
    UnknownVersion(u8),

    /// The payload has the wrong size.
    BadLength,

    /// An EVM address without the `0x` prefix.
    MissingPrefix,

    /// Non-hex characters in an EVM address.
    BadHex,
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bech32(e) => write!(f, "bech32 error: {e}"),
            Self::UnknownHrp(hrp) => write!(f, "unknown address prefix: {hrp}"),
            Self::UnknownVersion(v) => write!(f, "unknown address version: {v}"),
            Self::BadLength => write!(f, "address has the wrong length"),
            Self::MissingPrefix => write!(f, "EVM address must start with 0x"),
            Self::BadHex => write!(f, "EVM address contains non-hex characters"),
        }
    }
}

impl std::error::Error for AddressError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staking_address_is_deterministic() {
        let pk = [7u8; 32];
        let a = ConsensusAddress::from_public_key(&pk);
        let b = ConsensusAddress::from_public_key(&pk);
        assert_eq!(a, b);
        assert_ne!(a, ConsensusAddress::from_public_key(&[8u8; 32]));
    }

    #[test]
    fn staking_and_evm_contexts_are_separated() {
        // Same 20 trailing bytes must not collide across contexts.
        let evm = EvmAddress::parse("0x0101010101010101010101010101010101010101").unwrap();
        let from_evm = ConsensusAddress::from_evm(&evm);
        let from_pk = ConsensusAddress::from_public_key(&[1u8; 32]);
        assert_ne!(from_evm, from_pk);
    }

    #[test]
    fn consensus_address_round_trip() {
        let addr = ConsensusAddress::from_public_key(&[42u8; 32]);
        let encoded = addr.to_string();
        assert!(encoded.starts_with("oasis1"));
        assert!(!encoded.contains(char::is_uppercase));

        let parsed = ConsensusAddress::parse(&encoded).unwrap();
        assert_eq!(parsed, addr);

        // Case-insensitive parse.
        let parsed = ConsensusAddress::parse(&encoded.to_uppercase()).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn consensus_address_rejects_garbage() {
        assert!(ConsensusAddress::parse("").is_err());
        assert!(ConsensusAddress::parse("oasis1").is_err());
        assert!(ConsensusAddress::parse("not-an-address").is_err());
        // Valid bech32, wrong HRP.
        let other = bech32::encode::<Bech32>(Hrp::parse("other").unwrap(), &[0u8; 21]).unwrap();
        assert!(matches!(
            ConsensusAddress::parse(&other),
            Err(AddressError::UnknownHrp(_))
        ));
    }

    #[test]
    fn evm_address_round_trip() {
        let s = "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
        let addr = EvmAddress::parse(s).unwrap();
        assert_eq!(addr.to_string(), s);
    }

    #[test]
    fn evm_address_rejects_bad_syntax() {
        assert!(EvmAddress::parse("deadbeef").is_err());
        assert!(EvmAddress::parse("0xdeadbeef").is_err());
        assert!(EvmAddress::parse("0xzzadbeefdeadbeefdeadbeefdeadbeefdeadbeef").is_err());
        assert!(EvmAddress::parse("0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef00").is_err());
    }

    #[test]
    fn consensus_address_cbor_round_trip() {
        let addr = ConsensusAddress::from_public_key(&[3u8; 32]);
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&addr, &mut buf).unwrap();
        let back: ConsensusAddress = ciborium::de::from_reader(buf.as_slice()).unwrap();
        assert_eq!(back, addr);
    }
}
