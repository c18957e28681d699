//! Core types for the ledger
//!
//! All types are designed for:
//! - Fixed-width arithmetic (every accumulator is checked, never wraps)
//! - Byte-exact signing payloads (addresses and words as the EVM lays them out)
//! - Deterministic serialization (serde + bincode)

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Token amount. Balances, debts, rewards and allowances all use this width.
pub type Amount = u128;

/// Per-account replay counter
pub type Nonce = u64;

/// Seconds since the Unix epoch, as reported by the ledger clock
pub type Timestamp = u64;

/// 32-byte keccak-256 output
pub type Hash = [u8; 32];

/// 20-byte account identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Create from a 20-byte slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 20] = bytes.try_into().map_err(|_| {
            Error::InvalidInput(format!("address must be 20 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Parse `0x`-prefixed (or bare) hex, any letter case
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| Error::InvalidInput(format!("invalid address {:?}: {}", s, e)))?;
        Self::from_slice(&bytes)
    }

    /// Get bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Lowercase `0x`-prefixed hex
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Whether this is the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Per-account record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    /// Cumulative IOUs issued and still outstanding, plus netting rewards
    pub balance: Amount,

    /// Next nonce the account must sign with
    pub nonce: Nonce,

    /// Reward credited to this account each time it takes part in a netted cycle
    pub cycle_reward: Amount,
}

/// Recoverable secp256k1 signature in `(v, r, s)` form
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    v: u8,
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    /// Signature length in bytes (`r || s || v`)
    pub const LEN: usize = 65;

    /// Create from components. `v` is stored as given; promotion happens at recovery.
    pub fn from_vrs(v: u8, r: [u8; 32], s: [u8; 32]) -> Self {
        Self { v, r, s }
    }

    /// Split a 65-byte `r || s || v` encoding
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(Error::MalformedSignature(format!(
                "expected {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok(Self { v: bytes[64], r, s })
    }

    /// Parse the hex string produced by off-line signers
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits)
            .map_err(|e| Error::MalformedSignature(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// `r || s || v`
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// Recovery byte as supplied
    pub fn v(&self) -> u8 {
        self.v
    }

    /// `r` scalar
    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// `s` scalar
    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Recovery id in `{0, 1}`. Values below 27 are promoted by 27 first.
    pub fn recovery_id(&self) -> Result<u8> {
        let v = if self.v < 27 { self.v + 27 } else { self.v };
        match v {
            27 | 28 => Ok(v - 27),
            other => Err(Error::MalformedSignature(format!(
                "recovery byte {} out of range",
                other
            ))),
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(0x{})", hex::encode(self.to_bytes()))
    }
}

/// Journal entry emitted by committed mutations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Debt issued from `from` to `to`
    Transfer {
        /// Issuer
        from: Address,
        /// Creditor
        to: Address,
        /// Amount issued
        amount: Amount,
    },

    /// Cycle reward configured
    CycleRewardSet {
        /// Account owner
        owner: Address,
        /// New reward
        amount: Amount,
    },

    /// Allowance replaced
    Approval {
        /// Granting account
        owner: Address,
        /// Authorized spender
        spender: Address,
        /// New ceiling
        value: Amount,
    },

    /// Circular debt cancelled
    CycleMined {
        /// Submitting beneficiary
        miner: Address,
        /// Cycle participants in order
        accounts: Vec<Address>,
        /// Amount removed from every edge
        amount: Amount,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip_is_case_insensitive() {
        let upper = Address::from_hex("0xCD2A3D9F938E13CD947EC05ABC7FE734DF8DD826").unwrap();
        let mixed: Address = "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826".parse().unwrap();
        assert_eq!(upper, mixed);
        assert_eq!(mixed.to_hex(), "0xcd2a3d9f938e13cd947ec05abc7fe734df8dd826");
    }

    #[test]
    fn test_address_rejects_wrong_length() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("not hex").is_err());
    }

    #[test]
    fn test_address_serde_as_string() {
        let address = Address::new([0xab; 20]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }

    #[test]
    fn test_signature_split_and_promotion() {
        let mut raw = [0u8; 65];
        raw[0] = 1;
        raw[32] = 2;
        raw[64] = 1;
        let sig = Signature::from_bytes(&raw).unwrap();
        assert_eq!(sig.r()[0], 1);
        assert_eq!(sig.s()[0], 2);
        assert_eq!(sig.recovery_id().unwrap(), 1);
        assert_eq!(sig.to_bytes(), raw);

        assert_eq!(Signature::from_vrs(27, [0; 32], [0; 32]).recovery_id().unwrap(), 0);
        assert_eq!(Signature::from_vrs(28, [0; 32], [0; 32]).recovery_id().unwrap(), 1);
    }

    #[test]
    fn test_signature_malformed_encodings() {
        assert!(matches!(
            Signature::from_bytes(&[0u8; 64]),
            Err(Error::MalformedSignature(_))
        ));
        assert!(matches!(
            Signature::from_vrs(29, [0; 32], [0; 32]).recovery_id(),
            Err(Error::MalformedSignature(_))
        ));
        assert!(matches!(
            Signature::from_vrs(2, [0; 32], [0; 32]).recovery_id(),
            Err(Error::MalformedSignature(_))
        ));
    }
}
