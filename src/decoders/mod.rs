//! Event decoders.
//!
//! Each decoder filters a confirmed batch of raw logs by its fixed
//! topic-0 signature and slices the matches into typed records using a
//! hand-coded word layout. Logs that do not match the signature, or
//! whose payload is shorter than the layout expects, are skipped
//! without error.

mod erc20;
mod zeroex;

pub use erc20::{ApprovalEvent, TransferEvent};
pub use zeroex::{CancelEvent, FillEvent, PriceAdjustment};

use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, B256, b256};
use fastnum::UD256;

use crate::types::RawLog;

/// `Transfer(address,address,uint256)`
pub const TRANSFER_SIGNATURE: B256 =
    b256!("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// `Approval(address,address,uint256)`
pub const APPROVAL_SIGNATURE: B256 =
    b256!("0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925");

/// Exchange `LogFill` event.
pub const FILL_SIGNATURE: B256 =
    b256!("0x0d0b9391970d9a25552f37d436d2aae2925e2bfe1b2a923754bada030c498cb3");

/// Exchange `LogCancel` event.
pub const CANCEL_SIGNATURE: B256 =
    b256!("0x67d66f160bc93d925d05dae1794c90d2d6d6688b29b84ff069398a9b04587131");

/// Registry of the supported event shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderKind {
    Erc20Transfer,
    Erc20Approval,
    Fill,
    Cancel,
}

impl DecoderKind {
    /// Topic-0 signature the decoder filters by.
    pub fn signature(self) -> B256 {
        match self {
            Self::Erc20Transfer => TRANSFER_SIGNATURE,
            Self::Erc20Approval => APPROVAL_SIGNATURE,
            Self::Fill => FILL_SIGNATURE,
            Self::Cancel => CANCEL_SIGNATURE,
        }
    }

    /// Decodes every matching log of a confirmed batch.
    pub fn decode(self, logs: &[RawLog]) -> Vec<DecodedEvent> {
        logs.iter()
            .filter(|log| log.signature() == Some(self.signature()))
            .filter_map(|log| match self {
                Self::Erc20Transfer => erc20::decode_transfer(log).map(DecodedEvent::Transfer),
                Self::Erc20Approval => erc20::decode_approval(log).map(DecodedEvent::Approval),
                Self::Fill => zeroex::decode_fill(log).map(DecodedEvent::Fill),
                Self::Cancel => zeroex::decode_cancel(log).map(DecodedEvent::Cancel),
            })
            .collect()
    }
}

/// A decoded, typed domain event.
#[derive(Clone, Debug)]
pub enum DecodedEvent {
    Transfer(TransferEvent),
    Approval(ApprovalEvent),
    Fill(FillEvent),
    Cancel(CancelEvent),
}

/// One projected record field.
pub type Field = (&'static str, FieldValue);

/// Value of a single record field.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub enum FieldValue {
    Address(Address),
    Hash(B256),
    #[debug("{_0}")]
    Amount(UD256),
    #[debug("{_0:?}")]
    Price(Option<UD256>),
    Timestamp(u64),
    Count(usize),
    #[debug("{_0:?}")]
    Adjustment(Option<PriceAdjustment>),
}

/// Record types reducible to an ordered field list.
pub trait ProjectFields {
    /// All fields of the record, in declaration order.
    fn fields(&self) -> Vec<Field>;
}

/// Decoder output after the optional field projection.
#[derive(Clone, Debug)]
pub enum Payload<T> {
    /// The full typed record; no projection was configured.
    Record(T),

    /// The record restricted to the requested fields.
    Projected(Vec<Field>),
}

impl<T> Payload<T> {
    /// The full record, if no projection was configured.
    pub fn record(&self) -> Option<&T> {
        match self {
            Self::Record(record) => Some(record),
            Self::Projected(_) => None,
        }
    }
}

/// Restricts records to an ordered subset of their fields.
///
/// Requested names keep their request order; names the record does not
/// carry are omitted. An empty projection passes records through
/// unchanged.
#[derive(Clone, Debug, Default)]
pub struct FieldProjection {
    fields: Vec<String>,
}

impl FieldProjection {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn apply<T: ProjectFields>(&self, record: T) -> Payload<T> {
        if self.fields.is_empty() {
            return Payload::Record(record);
        }
        let all = record.fields();
        Payload::Projected(
            self.fields
                .iter()
                .filter_map(|name| all.iter().find(|(n, _)| *n == name.as_str()).cloned())
                .collect(),
        )
    }
}

/// Processing-time stamp applied to records at decode time. This is
/// not the chain time of the containing block.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
