//! ERC-20 transfer and approval decoders.

use alloy::primitives::{Address, TxHash};
use fastnum::UD256;

use super::{Field, FieldValue, ProjectFields, now_millis};
use crate::{types::RawLog, words};

/// Decoded ERC-20 `Transfer` event.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    #[debug("{value}")]
    pub value: UD256,
    pub transaction_hash: TxHash,
    /// Processing-time stamp (Unix milliseconds), not chain time.
    pub timestamp: u64,
}

/// Decoded ERC-20 `Approval` event.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct ApprovalEvent {
    pub owner: Address,
    pub spender: Address,
    #[debug("{value}")]
    pub value: UD256,
    pub transaction_hash: TxHash,
    /// Processing-time stamp (Unix milliseconds), not chain time.
    pub timestamp: u64,
}

// Layout: sender and recipient are indexed, the amount is data word 0.
pub(super) fn decode_transfer(log: &RawLog) -> Option<TransferEvent> {
    let data = words::data_words(&log.data);
    Some(TransferEvent {
        from: words::address_from_word(log.topics.get(1)?),
        to: words::address_from_word(log.topics.get(2)?),
        value: words::amount_from_word(data.first()?),
        transaction_hash: log.transaction_hash,
        timestamp: now_millis(),
    })
}

pub(super) fn decode_approval(log: &RawLog) -> Option<ApprovalEvent> {
    let data = words::data_words(&log.data);
    Some(ApprovalEvent {
        owner: words::address_from_word(log.topics.get(1)?),
        spender: words::address_from_word(log.topics.get(2)?),
        value: words::amount_from_word(data.first()?),
        transaction_hash: log.transaction_hash,
        timestamp: now_millis(),
    })
}

impl ProjectFields for TransferEvent {
    fn fields(&self) -> Vec<Field> {
        vec![
            ("from", FieldValue::Address(self.from)),
            ("to", FieldValue::Address(self.to)),
            ("value", FieldValue::Amount(self.value)),
            ("transaction_hash", FieldValue::Hash(self.transaction_hash)),
            ("timestamp", FieldValue::Timestamp(self.timestamp)),
        ]
    }
}

impl ProjectFields for ApprovalEvent {
    fn fields(&self) -> Vec<Field> {
        vec![
            ("owner", FieldValue::Address(self.owner)),
            ("spender", FieldValue::Address(self.spender)),
            ("value", FieldValue::Amount(self.value)),
            ("transaction_hash", FieldValue::Hash(self.transaction_hash)),
            ("timestamp", FieldValue::Timestamp(self.timestamp)),
        ]
    }
}
