//! Amounts and cross-layer unit scaling.
//!
//! Balances are unsigned integers in each layer's base unit. The two
//! layers declare different decimal precisions (consensus 9, paratime 18
//! on both built-in networks), so moving an amount across the bridge
//! multiplies or divides by a fixed power-of-ten scale factor.
//!
//! # Wire form
//!
//! The ledger encodes amounts as trimmed big-endian byte strings inside
//! CBOR, because CBOR integers cap at 64 bits and paratime base units
//! routinely exceed that. [`Quantity`] carries that wire form; plain
//! `u128` is used for arithmetic everywhere else.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Scaling
// ---------------------------------------------------------------------------

/// The multiplier that converts consensus base units to paratime base units.
///
/// `paratime_decimals` must be >= `consensus_decimals`; both built-in
/// networks declare 18 and 9.
pub const fn scale_factor(paratime_decimals: u32, consensus_decimals: u32) -> u128 {
    10u128.pow(paratime_decimals - consensus_decimals)
}

/// Convert a consensus-layer amount into paratime base units.
///
/// Returns `None` on overflow (an amount too large to represent in the
/// finer precision).
pub fn to_paratime_units(consensus_amount: u128, scale: u128) -> Option<u128> {
    consensus_amount.checked_mul(scale)
}

/// Convert a paratime-layer amount back into consensus base units.
///
/// Truncates toward zero; sub-consensus-unit dust stays on the paratime
/// side. Converting a value produced by [`to_paratime_units`] is exact.
pub fn to_consensus_units(paratime_amount: u128, scale: u128) -> u128 {
    paratime_amount / scale
}

// ---------------------------------------------------------------------------
// Quantity
// ---------------------------------------------------------------------------

/// A ledger amount in wire form.
///
/// Serializes as the shortest big-endian byte string that represents the
/// value (zero is the empty string), matching the ledger's CBOR quantity
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Quantity(pub u128);

impl Quantity {
    /// Zero, the empty byte string on the wire.
    pub const ZERO: Self = Self(0);

    /// The contained value.
    pub fn value(self) -> u128 {
        self.0
    }

    /// Big-endian bytes with leading zeros trimmed.
    fn to_trimmed_be(self) -> ([u8; 16], usize) {
        let bytes = self.0.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        (bytes, skip)
    }

    /// Parse a trimmed big-endian byte string. Fails on values wider
    /// than 128 bits.
    pub fn from_be_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[16 - slice.len()..].copy_from_slice(slice);
        Some(Self(u128::from_be_bytes(buf)))
    }
}

impl From<u128> for Quantity {
    fn from(value: u128) -> Self {
        Self(value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (bytes, skip) = self.to_trimmed_be();
        serializer.serialize_bytes(&bytes[skip..])
    }
}

struct QuantityVisitor;

impl<'de> Visitor<'de> for QuantityVisitor {
    type Value = Quantity;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a big-endian byte string of at most 16 bytes")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Quantity, E> {
        Quantity::from_be_slice(v)
            .ok_or_else(|| E::invalid_length(v.len(), &"at most 16 bytes"))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Quantity, E> {
        self.visit_bytes(&v)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Quantity, A::Error> {
        let mut bytes = Vec::with_capacity(16);
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        Quantity::from_be_slice(&bytes)
            .ok_or_else(|| de::Error::invalid_length(bytes.len(), &"at most 16 bytes"))
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_bytes(QuantityVisitor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
