//! Exchange fill and cancel decoders.

use alloy::primitives::{Address, B256, TxHash};
use fastnum::UD256;

use super::{Field, FieldValue, ProjectFields, now_millis};
use crate::{types::RawLog, words};

/// Decoded partial fill of one counter-order.
///
/// Fill records are not published directly; they feed the trade
/// aggregator, which consolidates the fills of one transaction into a
/// [`crate::trades::Trade`].
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct FillEvent {
    pub maker: Address,
    pub taker: Address,
    pub fee_recipient: Address,
    pub maker_token: Address,
    pub taker_token: Address,
    #[debug("{filled_maker_amount}")]
    pub filled_maker_amount: UD256,
    #[debug("{filled_taker_amount}")]
    pub filled_taker_amount: UD256,
    #[debug("{paid_maker_fee}")]
    pub paid_maker_fee: UD256,
    #[debug("{paid_taker_fee}")]
    pub paid_taker_fee: UD256,
    /// Hash of the base and quote token addresses, base first; see
    /// [`crate::words::trading_pair_hash`].
    pub trading_pair_hash: B256,
    pub transaction_hash: TxHash,
    /// Processing-time stamp (Unix milliseconds), not chain time.
    pub timestamp: u64,
}

/// Direction an order's price moved when it was partially cancelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PriceAdjustment {
    Up,
    Down,
}

/// Decoded order cancellation.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct CancelEvent {
    pub maker: Address,
    pub maker_token: Address,
    pub taker_token: Address,
    #[debug("{cancelled_maker_amount}")]
    pub cancelled_maker_amount: UD256,
    #[debug("{cancelled_taker_amount}")]
    pub cancelled_taker_amount: UD256,
    /// `None` when both cancelled amounts are zero or both non-zero.
    pub price_adjustment: Option<PriceAdjustment>,
    pub trading_pair_hash: B256,
    pub transaction_hash: TxHash,
    /// Processing-time stamp (Unix milliseconds), not chain time.
    pub timestamp: u64,
}

// Layout: maker and the pair hash are indexed; the data words are
// taker, maker token, taker token, the two filled amounts and the two
// paid fees. Word 2 doubles as fee recipient and taker token.
pub(super) fn decode_fill(log: &RawLog) -> Option<FillEvent> {
    let data = words::data_words(&log.data);
    Some(FillEvent {
        maker: words::address_from_word(log.topics.get(1)?),
        taker: words::address_from_word(data.first()?),
        maker_token: words::address_from_word(data.get(1)?),
        fee_recipient: words::address_from_word(data.get(2)?),
        taker_token: words::address_from_word(data.get(2)?),
        filled_maker_amount: words::amount_from_word(data.get(3)?),
        filled_taker_amount: words::amount_from_word(data.get(4)?),
        paid_maker_fee: words::amount_from_word(data.get(5)?),
        paid_taker_fee: words::amount_from_word(data.get(6)?),
        trading_pair_hash: *log.topics.get(3)?,
        transaction_hash: log.transaction_hash,
        timestamp: now_millis(),
    })
}

// Layout: maker and the pair hash are indexed; the data words are
// maker token, taker token and the two cancelled amounts.
pub(super) fn decode_cancel(log: &RawLog) -> Option<CancelEvent> {
    let data = words::data_words(&log.data);
    let cancelled_maker_amount = words::amount_from_word(data.get(2)?);
    let cancelled_taker_amount = words::amount_from_word(data.get(3)?);

    let price_adjustment = match (
        cancelled_maker_amount.is_zero(),
        cancelled_taker_amount.is_zero(),
    ) {
        (true, false) => Some(PriceAdjustment::Down),
        (false, true) => Some(PriceAdjustment::Up),
        _ => None,
    };

    Some(CancelEvent {
        maker: words::address_from_word(log.topics.get(1)?),
        maker_token: words::address_from_word(data.first()?),
        taker_token: words::address_from_word(data.get(1)?),
        cancelled_maker_amount,
        cancelled_taker_amount,
        price_adjustment,
        trading_pair_hash: *log.topics.get(3)?,
        transaction_hash: log.transaction_hash,
        timestamp: now_millis(),
    })
}

impl ProjectFields for CancelEvent {
    fn fields(&self) -> Vec<Field> {
        vec![
            ("maker", FieldValue::Address(self.maker)),
            ("maker_token", FieldValue::Address(self.maker_token)),
            ("taker_token", FieldValue::Address(self.taker_token)),
            (
                "cancelled_maker_amount",
                FieldValue::Amount(self.cancelled_maker_amount),
            ),
            (
                "cancelled_taker_amount",
                FieldValue::Amount(self.cancelled_taker_amount),
            ),
            (
                "price_adjustment",
                FieldValue::Adjustment(self.price_adjustment),
            ),
            ("trading_pair_hash", FieldValue::Hash(self.trading_pair_hash)),
            ("transaction_hash", FieldValue::Hash(self.transaction_hash)),
            ("timestamp", FieldValue::Timestamp(self.timestamp)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Bytes, address, b256};
    use fastnum::udec256;

    use super::*;
    use crate::decoders::{CANCEL_SIGNATURE, DecodedEvent, DecoderKind, FILL_SIGNATURE};

    fn word_for_address(address: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_slice());
        B256::from(word)
    }

    fn word_for_units(units: u64) -> B256 {
        // `units` whole tokens at the default 18 decimals
        let mut word = [0u8; 32];
        let scaled = u128::from(units) * 10u128.pow(18);
        word[16..].copy_from_slice(&scaled.to_be_bytes());
        B256::from(word)
    }

    fn data_from_words(words: &[B256]) -> Bytes {
        let mut data = Vec::with_capacity(words.len() * 32);
        for word in words {
            data.extend_from_slice(word.as_slice());
        }
        Bytes::from(data)
    }

    fn fill_log(maker_units: u64, taker_units: u64) -> RawLog {
        RawLog {
            address: address!("0x12459c951127e0c374ff9105dda097662a027093"),
            topics: vec![
                FILL_SIGNATURE,
                word_for_address(address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")),
                word_for_address(address!("0xffffffffffffffffffffffffffffffffffffffff")),
                B256::repeat_byte(0x77),
            ],
            data: data_from_words(&[
                word_for_address(address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")),
                word_for_address(address!("0x1111111111111111111111111111111111111111")),
                word_for_address(address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")),
                word_for_units(maker_units),
                word_for_units(taker_units),
                word_for_units(0),
                word_for_units(0),
            ]),
            transaction_hash: B256::repeat_byte(0x42),
            block_number: 7,
            block_hash: B256::repeat_byte(0x07),
            log_index: 0,
        }
    }

    #[test]
    fn test_decode_fill_layout() {
        let decoded = DecoderKind::Fill.decode(&[fill_log(100, 50)]);
        assert_eq!(decoded.len(), 1);
        let DecodedEvent::Fill(fill) = &decoded[0] else {
            panic!("expected fill");
        };
        assert_eq!(fill.maker, address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
        assert_eq!(fill.taker, address!("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"));
        assert_eq!(
            fill.maker_token,
            address!("0x1111111111111111111111111111111111111111")
        );
        assert_eq!(
            fill.taker_token,
            address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")
        );
        // Fee recipient shares word 2 with the taker token.
        assert_eq!(fill.fee_recipient, fill.taker_token);
        assert_eq!(fill.filled_maker_amount, udec256!(100));
        assert_eq!(fill.filled_taker_amount, udec256!(50));
        assert_eq!(fill.trading_pair_hash, B256::repeat_byte(0x77));
    }

    fn cancel_log(maker_units: u64, taker_units: u64) -> RawLog {
        RawLog {
            address: address!("0x12459c951127e0c374ff9105dda097662a027093"),
            topics: vec![
                CANCEL_SIGNATURE,
                word_for_address(address!("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")),
                b256!("0x0000000000000000000000000000000000000000000000000000000000000000"),
                B256::repeat_byte(0x77),
            ],
            data: data_from_words(&[
                word_for_address(address!("0x1111111111111111111111111111111111111111")),
                word_for_address(address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")),
                word_for_units(maker_units),
                word_for_units(taker_units),
            ]),
            transaction_hash: B256::repeat_byte(0x42),
            block_number: 7,
            block_hash: B256::repeat_byte(0x07),
            log_index: 1,
        }
    }

    #[test]
    fn test_decode_cancel_price_adjustment() {
        let decode = |log| match DecoderKind::Cancel.decode(&[log]).remove(0) {
            DecodedEvent::Cancel(cancel) => cancel,
            other => panic!("expected cancel, got {other:?}"),
        };

        assert_eq!(
            decode(cancel_log(0, 10)).price_adjustment,
            Some(PriceAdjustment::Down)
        );
        assert_eq!(
            decode(cancel_log(10, 0)).price_adjustment,
            Some(PriceAdjustment::Up)
        );
        assert_eq!(decode(cancel_log(10, 10)).price_adjustment, None);
        assert_eq!(decode(cancel_log(0, 0)).price_adjustment, None);
    }
}
