//! Account addresses and composite authenticator identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::errors::{Result, SmartAccountError};

/// Number of hash bytes kept when deriving an address from a public key
pub const ADDRESS_LEN: usize = 20;

/// Raw account address, rendered as lowercase hex.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountAddress(Vec<u8>);

impl AccountAddress {
    /// Wrap raw address bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Derive an address from a public key: the first 20 bytes of its SHA-256.
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        Self(digest[..ADDRESS_LEN].to_vec())
    }

    /// Underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// True for the zero-length address
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl FromStr for AccountAddress {
    type Err = SmartAccountError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(SmartAccountError::malformed_request("empty address string"));
        }
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| {
            SmartAccountError::malformed_request(format!("invalid address {s}: {e}"))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountAddress({})", self.to_hex())
    }
}

impl From<&[u8]> for AccountAddress {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Position of an authenticator inside a combinator tree.
///
/// The root is the stored authenticator id; the k-th child of `P` is `P.k`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeId(String);

impl CompositeId {
    /// Create an identifier from a raw dot-path.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Root identifier for a stored authenticator
    pub fn root(id: u64) -> Self {
        Self(id.to_string())
    }

    /// Identifier of the child at `index`
    pub fn child(&self, index: usize) -> Self {
        Self(format!("{}.{index}", self.0))
    }

    /// Get the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CompositeId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for CompositeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_roundtrip() {
        let address = AccountAddress::new(vec![0xab, 0x01, 0xff]);
        assert_eq!(address.to_string(), "ab01ff");
        let parsed: AccountAddress = "0xab01ff".parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!("".parse::<AccountAddress>().is_err());
        assert!("not-hex".parse::<AccountAddress>().is_err());
    }

    #[test]
    fn test_address_from_public_key_is_stable() {
        let a = AccountAddress::from_public_key(&[7u8; 32]);
        let b = AccountAddress::from_public_key(&[7u8; 32]);
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), ADDRESS_LEN);
        assert_ne!(a, AccountAddress::from_public_key(&[8u8; 32]));
    }

    #[test]
    fn test_composite_id_nesting() {
        let root = CompositeId::root(3);
        assert_eq!(root.child(0).child(1).as_str(), "3.0.1");
        assert_eq!(root.child(1).to_string(), "3.1");
    }

    #[test]
    fn test_address_serializes_as_hex_string() {
        let address = AccountAddress::new(vec![1, 2]);
        assert_eq!(serde_json::to_string(&address).unwrap(), "\"0102\"");
    }
}
