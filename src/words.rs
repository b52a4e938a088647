//! ABI-less payload decoding helpers.
//!
//! Log `data` is a sequence of 32-byte words; addresses and amounts are
//! sliced out of words by the fixed layouts in [`crate::decoders`],
//! without any contract metadata.

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use fastnum::UD256;

use crate::num::Converter;

/// Amounts are scaled by a fixed default; no per-token decimals lookup
/// is performed.
const DEFAULT_DECIMALS: u8 = 18;

/// Splits log `data` into consecutive 32-byte words.
///
/// Word 0 is the leftmost word. A trailing partial word is dropped.
pub fn data_words(data: &Bytes) -> Vec<B256> {
    data.chunks_exact(32).map(B256::from_slice).collect()
}

/// Recovers an address from the low 20 bytes of a word, regardless of
/// its leading content.
pub fn address_from_word(word: &B256) -> Address {
    Address::from_slice(&word[12..])
}

/// Interprets a word as an unsigned big-endian integer scaled by
/// [`DEFAULT_DECIMALS`].
pub fn amount_from_word(word: &B256) -> UD256 {
    Converter::new(DEFAULT_DECIMALS).from_unsigned(U256::from_be_bytes(word.0))
}

/// Reconstructs the indexed trading pair hash of exchange fill and
/// cancel events: the hash of the two raw 20-byte token addresses
/// concatenated, base first, quote second.
pub fn trading_pair_hash(base: Address, quote: Address) -> B256 {
    let mut pair = [0u8; 40];
    pair[..20].copy_from_slice(base.as_slice());
    pair[20..].copy_from_slice(quote.as_slice());
    keccak256(pair)
}
