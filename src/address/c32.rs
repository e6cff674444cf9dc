//! c32check - Stacks address encoding
//!
//! Crockford-style base32 over a big-endian integer, with one `0` digit kept
//! per leading zero byte, and a 4-byte double-SHA256 checksum over
//! `version ‖ payload`.
//!
//! | Part | Content |
//! |------|---------|
//! | `S` | fixed address prefix |
//! | version | one c32 digit (22 → `P`, 26 → `T`) |
//! | body | c32(hash160 ‖ checksum) |

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::{Hash160, HASH160_LEN};

pub const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const ADDRESS_PREFIX: char = 'S';
const CHECKSUM_LEN: usize = 4;

/// Stacks address version byte. Always below 32 so it fits one c32 digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct StacksVersion(u8);

impl StacksVersion {
    pub const MAINNET_SINGLE_SIG: Self = Self(22);
    pub const MAINNET_MULTI_SIG: Self = Self(20);
    pub const TESTNET_SINGLE_SIG: Self = Self(26);
    pub const TESTNET_MULTI_SIG: Self = Self(21);

    pub fn new(version: u8) -> Result<Self, VersionError> {
        if (version as usize) < C32_ALPHABET.len() {
            Ok(Self(version))
        } else {
            Err(VersionError::OutOfRange(version))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    fn digit(&self) -> char {
        C32_ALPHABET[self.0 as usize] as char
    }
}

impl TryFrom<u8> for StacksVersion {
    type Error = VersionError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StacksVersion> for u8 {
    fn from(value: StacksVersion) -> Self {
        value.0
    }
}

impl fmt::Display for StacksVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Version byte {0} out of range (must be below 32)")]
    OutOfRange(u8),
}

/// Errors while decoding a c32 string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum C32Error {
    #[error("Address must start with '{}'", ADDRESS_PREFIX)]
    MissingPrefix,
    #[error("Invalid c32 character: {0:?}")]
    InvalidCharacter(char),
    #[error("Invalid payload length: {0} bytes")]
    InvalidLength(usize),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Encode bytes as c32.
pub fn c32_encode(data: &[u8]) -> String {
    // Digits are produced least significant first.
    let mut digits = Vec::with_capacity(data.len() * 8 / 5 + 1);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;

    for &byte in data.iter().rev() {
        acc |= (byte as u32) << bits;
        bits += 8;
        while bits >= 5 {
            digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
            acc >>= 5;
            bits -= 5;
        }
    }
    if bits > 0 {
        digits.push(C32_ALPHABET[(acc & 0x1f) as usize]);
    }

    while digits.last() == Some(&b'0') {
        digits.pop();
    }
    let leading_zero_bytes = data.iter().take_while(|b| **b == 0).count();
    digits.extend(std::iter::repeat(b'0').take(leading_zero_bytes));

    digits.iter().rev().map(|d| *d as char).collect()
}

/// Decode a c32 string. Accepts lowercase and the `O`/`I`/`L` aliases.
pub fn c32_decode(input: &str) -> Result<Vec<u8>, C32Error> {
    let digits = input.chars().map(c32_digit).collect::<Result<Vec<_>, _>>()?;
    let mut bytes = digits_to_bytes(&digits);
    let leading_zero_digits = digits.iter().take_while(|d| **d == 0).count();
    let mut out = vec![0u8; leading_zero_digits];
    out.append(&mut bytes);
    Ok(out)
}

/// Stacks address for a version and hash160.
pub fn encode_address(version: StacksVersion, hash: &Hash160) -> String {
    let mut payload = Vec::with_capacity(HASH160_LEN + CHECKSUM_LEN);
    payload.extend_from_slice(hash.as_bytes());
    payload.extend_from_slice(&checksum(version, hash.as_bytes()));
    format!("{}{}{}", ADDRESS_PREFIX, version.digit(), c32_encode(&payload))
}

/// Split a Stacks address back into version and hash160, verifying the checksum.
pub fn decode_address(address: &str) -> Result<(StacksVersion, Hash160), C32Error> {
    let mut chars = address.chars();
    if chars.next().map(|c| c.to_ascii_uppercase()) != Some(ADDRESS_PREFIX) {
        return Err(C32Error::MissingPrefix);
    }
    let version_char = chars.next().ok_or(C32Error::InvalidLength(0))?;
    let version = StacksVersion::new(c32_digit(version_char)?)?;

    let digits = chars.map(c32_digit).collect::<Result<Vec<_>, _>>()?;
    let bytes = digits_to_bytes(&digits);
    let expected = HASH160_LEN + CHECKSUM_LEN;
    if bytes.len() > expected {
        return Err(C32Error::InvalidLength(bytes.len()));
    }
    // Payload is fixed width; restore any leading zero bytes.
    let mut payload = vec![0u8; expected - bytes.len()];
    payload.extend_from_slice(&bytes);

    let (hash, sum) = payload.split_at(HASH160_LEN);
    if sum != checksum(version, hash) {
        return Err(C32Error::ChecksumMismatch);
    }
    let hash = Hash160::from_slice(hash).map_err(|_| C32Error::InvalidLength(hash.len()))?;
    Ok((version, hash))
}

fn checksum(version: StacksVersion, payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update([version.get()]);
    hasher.update(payload);
    let twice = Sha256::digest(hasher.finalize());
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&twice[..CHECKSUM_LEN]);
    out
}

fn c32_digit(c: char) -> Result<u8, C32Error> {
    let normalized = match c.to_ascii_uppercase() {
        'O' => '0',
        'I' | 'L' => '1',
        other => other,
    };
    C32_ALPHABET
        .iter()
        .position(|d| *d as char == normalized)
        .map(|i| i as u8)
        .ok_or(C32Error::InvalidCharacter(c))
}

/// Big-endian base32 digits to minimal big-endian bytes.
fn digits_to_bytes(digits: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(digits.len() * 5 / 8 + 1);
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;

    for &digit in digits.iter().rev() {
        acc |= (digit as u32) << bits;
        bits += 5;
        if bits >= 8 {
            bytes.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    if bits > 0 && acc != 0 {
        bytes.push(acc as u8);
    }

    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes.reverse();
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_must_fit_one_digit() {
        assert!(StacksVersion::new(31).is_ok());
        assert_eq!(StacksVersion::new(32), Err(VersionError::OutOfRange(32)));
        assert_eq!(StacksVersion::MAINNET_SINGLE_SIG.digit(), 'P');
        assert_eq!(StacksVersion::TESTNET_SINGLE_SIG.digit(), 'T');
    }

    #[test]
    fn encodes_known_address() {
        let hash = Hash160::from_hex("a46ff88886c2ef9762d970b4d2c63678835bd39d").unwrap();
        assert_eq!(
            encode_address(StacksVersion::MAINNET_SINGLE_SIG, &hash),
            "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7"
        );
    }

    #[test]
    fn zero_hash_keeps_leading_zero_digits() {
        let hash = Hash160::from_bytes([0u8; 20]);
        assert_eq!(encode_address(StacksVersion::MAINNET_SINGLE_SIG, &hash), "SP000000000000000000002Q6VF78");
    }

    #[test]
    fn decode_recovers_version_and_hash() {
        let (version, hash) = decode_address("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7").unwrap();
        assert_eq!(version, StacksVersion::MAINNET_SINGLE_SIG);
        assert_eq!(hash.to_hex(), "a46ff88886c2ef9762d970b4d2c63678835bd39d");

        let (_, zero) = decode_address("SP000000000000000000002Q6VF78").unwrap();
        assert_eq!(zero, Hash160::from_bytes([0u8; 20]));
    }

    #[test]
    fn decode_detects_typos() {
        assert_eq!(decode_address("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ8"), Err(C32Error::ChecksumMismatch));
        assert_eq!(decode_address("XP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7"), Err(C32Error::MissingPrefix));
        assert_eq!(decode_address("SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJU"), Err(C32Error::InvalidCharacter('U')));
    }

    #[test]
    fn raw_codec_preserves_leading_zeros() {
        let data = [0u8, 0, 1, 2, 3];
        assert_eq!(c32_decode(&c32_encode(&data)).unwrap(), data.to_vec());
        assert_eq!(c32_encode(&[]), "");
    }
}
