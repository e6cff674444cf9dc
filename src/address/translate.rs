//! AddressTranslator - Bitcoin P2WPKH → Stacks address

use tracing::{debug, info};

use super::c32::{self, StacksVersion};
use super::{AddressCodec, AddressFamily, BitcoinAddressClass, DecodeError, Hash160};

/// Why an address could not be translated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    /// Recognized, but only native segwit (bc1q) addresses carry a key hash we can reuse.
    #[error("Only bc1q (native SegWit) addresses can be converted. {0} address format is not supported.")]
    UnsupportedAddressFamily(AddressFamily),
    #[error("Invalid Bitcoin address: {0}")]
    Malformed(#[from] DecodeError),
}

impl TranslationError {
    pub fn family(&self) -> Option<AddressFamily> {
        match self {
            TranslationError::UnsupportedAddressFamily(family) => Some(*family),
            TranslationError::Malformed(_) => None,
        }
    }
}

/// Checksummed Stacks address for a hash160. Total: the version is range-checked
/// by [`StacksVersion`] and the digest length by [`Hash160`].
pub fn derive_target_address(hash: &Hash160, version: StacksVersion) -> String {
    c32::encode_address(version, hash)
}

/// Classify, decode and re-encode a user-entered Bitcoin address.
pub fn translate_bitcoin_to_target(
    codec: &AddressCodec,
    address: &str,
    version: StacksVersion,
) -> Result<String, TranslationError> {
    match codec.classify(address) {
        BitcoinAddressClass::P2wpkh(program) => {
            let target = derive_target_address(&program.hash160(), version);
            info!(bitcoin = address, stacks = %target, "translated address");
            Ok(target)
        }
        BitcoinAddressClass::Unrecognized => {
            // Decode again for the precise reason; classification only keeps the bucket.
            let err = codec
                .decode_witness_program(address)
                .err()
                .unwrap_or_else(|| DecodeError::InvalidInput("unrecognized address".into()));
            debug!(address, error = %err, "address not translatable");
            Err(TranslationError::Malformed(err))
        }
        BitcoinAddressClass::P2pkh => Err(unsupported(address, AddressFamily::P2pkh)),
        BitcoinAddressClass::P2sh => Err(unsupported(address, AddressFamily::P2sh)),
        BitcoinAddressClass::P2tr => Err(unsupported(address, AddressFamily::P2tr)),
    }
}

fn unsupported(address: &str, family: AddressFamily) -> TranslationError {
    debug!(address, %family, "unsupported address family");
    TranslationError::UnsupportedAddressFamily(family)
}
