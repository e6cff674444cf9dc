//! AddressCodec - native segwit v0 (P2WPKH) classification, decoding and derivation

use bitcoin::bech32::primitives::decode::CheckedHrpstring;
use bitcoin::bech32::{self, Bech32, Fe32, Hrp};
use bitcoin::secp256k1::PublicKey;
use tracing::debug;

use super::{BitcoinAddressClass, DecodeError, Hash160, Network, WitnessProgram, HASH160_LEN};

/// Length of the bech32 checksum in characters.
const CHECKSUM_LEN: usize = 6;
/// Length of a compressed secp256k1 public key.
const COMPRESSED_KEY_LEN: usize = 33;

/// Bitcoin address codec bound to one network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressCodec {
    network: Network,
}

impl AddressCodec {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn mainnet() -> Self {
        Self::new(Network::Mainnet)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Bucket an address by its prefix.
    ///
    /// Legacy and taproot addresses are recognized by prefix alone, even if
    /// malformed. A `bc1q` address is only `P2wpkh` when it fully decodes to a
    /// 20-byte program; otherwise it is `Unrecognized`.
    pub fn classify(&self, address: &str) -> BitcoinAddressClass {
        let lower = address.to_ascii_lowercase();
        let hrp = self.network.hrp();

        if lower.starts_with(&format!("{}1q", hrp)) {
            return match self.decode_witness_program(address) {
                Ok(program) => BitcoinAddressClass::P2wpkh(program),
                Err(e) => {
                    debug!(address, error = %e, "segwit-prefixed address failed to decode");
                    BitcoinAddressClass::Unrecognized
                }
            };
        }
        if lower.starts_with(&format!("{}1p", hrp)) {
            return BitcoinAddressClass::P2tr;
        }

        match address.chars().next() {
            Some(c) if self.network.p2pkh_prefixes().contains(&c) => BitcoinAddressClass::P2pkh,
            Some(c) if self.network.p2sh_prefixes().contains(&c) => BitcoinAddressClass::P2sh,
            _ => BitcoinAddressClass::Unrecognized,
        }
    }

    /// Decode a P2WPKH address into its 20-byte witness program.
    ///
    /// Verifies the bech32 checksum and network prefix, strips the witness
    /// version symbol, then regroups the remaining 5-bit symbols into bytes.
    pub fn decode_witness_program(&self, address: &str) -> Result<WitnessProgram, DecodeError> {
        let checked = CheckedHrpstring::new::<Bech32>(address).map_err(|e| DecodeError::Bech32(e.to_string()))?;

        let found = checked.hrp().to_lowercase();
        if found != self.network.hrp() {
            return Err(DecodeError::WrongNetwork { expected: self.network.hrp().into(), found });
        }

        // Checksum already verified; the data part sits between the last '1' and the checksum.
        let separator = address.rfind('1').ok_or(DecodeError::MissingWitnessVersion)?;
        let data = &address[separator + 1..address.len() - CHECKSUM_LEN];
        let symbols = data
            .chars()
            .map(Fe32::from_char)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DecodeError::Bech32(e.to_string()))?;

        let (version, program) = symbols.split_first().ok_or(DecodeError::MissingWitnessVersion)?;
        if version.to_u8() != 0 {
            return Err(DecodeError::UnsupportedWitnessVersion(version.to_u8()));
        }

        let bytes = fes_to_bytes(program)?;
        if bytes.len() != HASH160_LEN {
            return Err(DecodeError::InvalidProgramLength(bytes.len()));
        }
        Ok(WitnessProgram::new(Hash160::from_slice(&bytes)?))
    }

    /// Encode a witness program as a v0 bech32 address for this network.
    pub fn encode_witness_program(&self, program: &WitnessProgram) -> Result<String, DecodeError> {
        bech32::segwit::encode_v0(self.hrp(), program.as_bytes()).map_err(|e| DecodeError::Bech32(e.to_string()))
    }

    /// P2WPKH address for a compressed secp256k1 public key.
    pub fn derive_address_from_public_key(&self, public_key: &[u8]) -> Result<String, DecodeError> {
        if public_key.is_empty() {
            return Err(DecodeError::InvalidInput("public key is empty".into()));
        }
        if public_key.len() != COMPRESSED_KEY_LEN {
            return Err(DecodeError::InvalidPublicKey(format!(
                "expected {}-byte compressed key, got {} bytes",
                COMPRESSED_KEY_LEN,
                public_key.len()
            )));
        }
        PublicKey::from_slice(public_key).map_err(|e| DecodeError::InvalidPublicKey(e.to_string()))?;

        let program = WitnessProgram::new(Hash160::digest(public_key));
        let address = self.encode_witness_program(&program)?;
        debug!(%address, "derived receive address");
        Ok(address)
    }

    /// Same as [`derive_address_from_public_key`](Self::derive_address_from_public_key) for hex input.
    pub fn derive_address_from_public_key_hex(&self, public_key_hex: &str) -> Result<String, DecodeError> {
        let trimmed = public_key_hex.trim();
        if trimmed.is_empty() {
            return Err(DecodeError::InvalidInput("public key is empty".into()));
        }
        let bytes = hex::decode(trimmed).map_err(|e| DecodeError::InvalidInput(format!("public key is not valid hex: {}", e)))?;
        self.derive_address_from_public_key(&bytes)
    }

    fn hrp(&self) -> Hrp {
        match self.network {
            Network::Mainnet => bech32::hrp::BC,
            Network::Testnet => bech32::hrp::TB,
        }
    }
}

/// Regroup 5-bit symbols into bytes.
///
/// Leftover bits must number fewer than five and all be zero.
fn fes_to_bytes(fes: &[Fe32]) -> Result<Vec<u8>, DecodeError> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut result = Vec::with_capacity(fes.len() * 5 / 8);

    for fe in fes {
        acc = ((acc << 5) | fe.to_u8() as u32) & 0xfff;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            result.push((acc >> bits) as u8);
        }
    }

    if bits >= 5 || (acc & ((1 << bits) - 1)) != 0 {
        return Err(DecodeError::InvalidPadding);
    }
    Ok(result)
}
