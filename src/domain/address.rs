use crate::error::{Error, INVALID_VALUE, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account identifier.
///
/// Addresses are never chosen freely; they are derived from a [`Condition`]
/// (a signing key, or a module-owned account such as a channel escrow).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; ADDRESS_LENGTH] = bytes.try_into().map_err(|_| {
            INVALID_VALUE.new_error(format!(
                "address must be {} bytes, got {}",
                ADDRESS_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let bytes = hex::decode(value.trim())
            .map_err(|e| INVALID_VALUE.new_error(format!("invalid hex address: {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.to_hex()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

/// A permission in the form `extension/type/hex(data)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition(String);

impl Condition {
    pub fn new(extension: &str, kind: &str, data: &[u8]) -> Self {
        Self(format!("{}/{}/{}", extension, kind, hex::encode(data)))
    }

    /// First 20 bytes of the SHA-256 digest of the condition.
    pub fn address(&self) -> Address {
        let digest = Sha256::digest(self.0.as_bytes());
        let mut raw = [0u8; ADDRESS_LENGTH];
        raw.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Address(raw)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A compressed secp256k1 public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PubKey(#[serde(with = "crate::domain::hex_bytes")] Vec<u8>);

impl PubKey {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn condition(&self) -> Condition {
        Condition::new("sigs", "secp256k1", &self.0)
    }

    /// Address controlled by whoever holds the matching secret key.
    pub fn address(&self) -> Address {
        self.condition().address()
    }
}
