//! # Addresses
//!
//! An [`Address`] is an opaque 20-byte account handle rendered as
//! `0x`-prefixed lowercase hex.
//!
//! Derived addresses are computed as:
//!
//! ```text
//! BLAKE3(domain || 0x00 || part_0 || part_1 || ...)[..20]
//! ```
//!
//! The domain string separates the different kinds of derived accounts
//! (vault, portal, portal trustee, vault trustee), so a trustee address can
//! never coincide with a vault address even for identical parts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::config::LABEL_DOMAIN;

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing an address.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The string was not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded bytes have the wrong length.
    #[error("invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account handle.
///
/// `Ord` follows the raw bytes, which gives every `BTreeMap` keyed by
/// address a deterministic iteration order (and therefore deterministic
/// JSON snapshots).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    /// Wraps raw bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Returns `true` for the all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses hex, with or without a leading `0x`.
    pub fn from_hex(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH,
                got: bytes.len(),
            });
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derives an address from a domain tag and a list of parent addresses.
    pub fn derive(domain: &str, parts: &[&Address]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain.as_bytes());
        hasher.update(&[0x00]);
        for part in parts {
            hasher.update(part.as_bytes());
        }
        Self::truncate(hasher.finalize().as_bytes())
    }

    /// Derives a stable address from a human-readable label.
    ///
    /// Used by tests and the scenario runner so that `"alice"` always maps
    /// to the same account.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(LABEL_DOMAIN.as_bytes());
        hasher.update(&[0x00]);
        hasher.update(label.as_bytes());
        Self::truncate(hasher.finalize().as_bytes())
    }

    fn truncate(digest: &[u8; 32]) -> Self {
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(arr)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Serialized as a hex string so that address-keyed maps become plain JSON
// objects.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn hex_roundtrip_with_and_without_prefix() {
        let addr = Address::from_label("alice");
        let rendered = addr.to_string();
        assert!(rendered.starts_with("0x"));
        assert_eq!(rendered.len(), 2 + 2 * ADDRESS_LENGTH);

        assert_eq!(Address::from_hex(&rendered).unwrap(), addr);
        assert_eq!(Address::from_hex(&addr.to_hex()).unwrap(), addr);
    }

    #[test]
    fn wrong_length_rejected() {
        let err = Address::from_hex("0xdeadbeef").unwrap_err();
        assert!(matches!(
            err,
            AddressError::InvalidLength {
                expected: 20,
                got: 4
            }
        ));
    }

    #[test]
    fn bad_hex_rejected() {
        assert!(matches!(
            Address::from_hex("0xzz").unwrap_err(),
            AddressError::InvalidHex(_)
        ));
    }

    #[test]
    fn labels_are_stable_and_distinct() {
        assert_eq!(Address::from_label("alice"), Address::from_label("alice"));
        assert_ne!(Address::from_label("alice"), Address::from_label("bob"));
        assert!(!Address::from_label("alice").is_zero());
    }

    #[test]
    fn derivation_is_domain_separated() {
        let parent = Address::from_label("vault-parent");
        let a = Address::derive("domain-a", &[&parent]);
        let b = Address::derive("domain-b", &[&parent]);
        assert_ne!(a, b);
        assert_eq!(a, Address::derive("domain-a", &[&parent]));
    }

    #[test]
    fn derivation_depends_on_part_order() {
        let x = Address::from_label("x");
        let y = Address::from_label("y");
        assert_ne!(
            Address::derive("pair", &[&x, &y]),
            Address::derive("pair", &[&y, &x])
        );
    }

    #[test]
    fn address_keyed_map_serializes_as_object() {
        let mut map = BTreeMap::new();
        map.insert(Address::from_label("alice"), 7u64);

        let json = serde_json::to_string(&map).expect("serialize");
        assert!(json.starts_with("{\"0x"));

        let recovered: BTreeMap<Address, u64> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(recovered, map);
    }
}
