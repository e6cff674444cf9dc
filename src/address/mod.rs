//! Address - Bitcoin segwit codec and Stacks c32check translation
//!
//! A native segwit (P2WPKH) Bitcoin address and a single-sig Stacks address
//! share the same payload: the HASH160 of one compressed public key. This
//! module moves between the two.
//!
//! # Flow
//!
//! ```text
//! "bc1q..." ──classify──► BitcoinAddressClass::P2wpkh(WitnessProgram)
//!                                   │
//!                                   ▼ hash160()
//!                               Hash160 (20 bytes)
//!                                   │
//!                                   ▼ derive_target_address(version)
//!                         "SP..." (c32check, version 22)
//!
//! pubkey (33 bytes) ──derive_address_from_public_key──► "bc1q..."
//! ```
//!
//! Legacy (`1...`, `3...`) and taproot (`bc1p...`) addresses are recognized
//! so callers can say *why* they are rejected, but they are never decoded.

pub mod c32;
mod segwit;
mod translate;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use c32::{StacksVersion, VersionError};
pub use segwit::AddressCodec;
pub use translate::{derive_target_address, translate_bitcoin_to_target, TranslationError};

/// Length of a HASH160 digest and of a v0 key-hash witness program.
pub const HASH160_LEN: usize = 20;

/// Bitcoin network the codec speaks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "bitcoin" | "main" => Some(Network::Mainnet),
            "testnet" | "test" => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Bech32 human-readable part.
    pub fn hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }

    /// Leading characters of base58 P2PKH addresses.
    pub(crate) fn p2pkh_prefixes(&self) -> &'static [char] {
        match self {
            Network::Mainnet => &['1'],
            Network::Testnet => &['m', 'n'],
        }
    }

    /// Leading characters of base58 P2SH addresses.
    pub(crate) fn p2sh_prefixes(&self) -> &'static [char] {
        match self {
            Network::Mainnet => &['3'],
            Network::Testnet => &['2'],
        }
    }

    /// Stacks single-sig version byte for this network (22 = `SP`, 26 = `ST`).
    pub fn stacks_version(&self) -> StacksVersion {
        match self {
            Network::Mainnet => StacksVersion::MAINNET_SINGLE_SIG,
            Network::Testnet => StacksVersion::TESTNET_SINGLE_SIG,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 20-byte HASH160 digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash160([u8; HASH160_LEN]);

impl Hash160 {
    pub const fn from_bytes(bytes: [u8; HASH160_LEN]) -> Self {
        Self(bytes)
    }

    /// Rejects anything that is not exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let array: [u8; HASH160_LEN] = bytes
            .try_into()
            .map_err(|_| DecodeError::InvalidProgramLength(bytes.len()))?;
        Ok(Self(array))
    }

    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let bytes = hex::decode(s).map_err(|e| DecodeError::InvalidInput(format!("invalid hex digest: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// HASH160 (RIPEMD160 of SHA256) of arbitrary data.
    pub fn digest(data: &[u8]) -> Self {
        use bitcoin::hashes::{hash160, Hash};
        Self(hash160::Hash::hash(data).to_byte_array())
    }

    pub fn as_bytes(&self) -> &[u8; HASH160_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash160({})", self.to_hex())
    }
}

/// Version 0 key-hash witness program. Always exactly 20 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WitnessProgram(Hash160);

impl WitnessProgram {
    pub fn new(hash: Hash160) -> Self {
        Self(hash)
    }

    pub fn hash160(&self) -> Hash160 {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; HASH160_LEN] {
        self.0.as_bytes()
    }
}

/// Bitcoin address families the codec can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    P2wpkh,
    P2pkh,
    P2sh,
    P2tr,
}

impl AddressFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressFamily::P2wpkh => "p2wpkh",
            AddressFamily::P2pkh => "p2pkh",
            AddressFamily::P2sh => "p2sh",
            AddressFamily::P2tr => "p2tr",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

/// Result of classifying an address string. Only `P2wpkh` carries data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitcoinAddressClass {
    P2wpkh(WitnessProgram),
    P2pkh,
    P2sh,
    P2tr,
    Unrecognized,
}

impl BitcoinAddressClass {
    pub fn family(&self) -> Option<AddressFamily> {
        match self {
            BitcoinAddressClass::P2wpkh(_) => Some(AddressFamily::P2wpkh),
            BitcoinAddressClass::P2pkh => Some(AddressFamily::P2pkh),
            BitcoinAddressClass::P2sh => Some(AddressFamily::P2sh),
            BitcoinAddressClass::P2tr => Some(AddressFamily::P2tr),
            BitcoinAddressClass::Unrecognized => None,
        }
    }

    pub fn witness_program(&self) -> Option<WitnessProgram> {
        match self {
            BitcoinAddressClass::P2wpkh(program) => Some(*program),
            _ => None,
        }
    }
}

/// Errors while decoding addresses or public keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Bech32 decoding failed: {0}")]
    Bech32(String),
    #[error("Wrong network: expected prefix {expected}, found {found}")]
    WrongNetwork { expected: String, found: String },
    #[error("Missing witness version")]
    MissingWitnessVersion,
    #[error("Unsupported witness version: {0}")]
    UnsupportedWitnessVersion(u8),
    #[error("Invalid padding in witness program")]
    InvalidPadding,
    #[error("Invalid witness program length: {0} bytes (expected 20)")]
    InvalidProgramLength(usize),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
}
