//! Notification and subscriber-facing types.

use alloy::primitives::{Address, B256, Bytes, TxHash};
use serde::{Deserialize, Serialize};

use crate::{
    decoders::{ApprovalEvent, CancelEvent, Payload, TransferEvent},
    trades::Trade,
};

/// Raw log notification as delivered by the chain data source.
///
/// Log identity is `(transaction_hash, block_hash, log_index)`; see
/// [`RawLog::same_identity`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Contract the log was emitted by.
    pub address: Address,

    /// Up to four topics; topic 0 is the event signature.
    pub topics: Vec<B256>,

    /// Opaque payload, a sequence of 32-byte words.
    pub data: Bytes,

    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub block_hash: B256,
    pub log_index: u64,
}

impl RawLog {
    /// Whether both logs refer to the same chain entry.
    pub fn same_identity(&self, other: &RawLog) -> bool {
        self.transaction_hash == other.transaction_hash
            && self.block_hash == other.block_hash
            && self.log_index == other.log_index
    }

    /// Event signature (topic 0), if present.
    pub fn signature(&self) -> Option<B256> {
        self.topics.first().copied()
    }
}

/// New block header notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
}

/// Classified events delivered to downstream subscribers.
///
/// Typed replacement for a string-keyed emitter: each variant carries the
/// payload shape of the event it names.
#[derive(Clone, Debug)]
pub enum FeedEvent {
    /// A new block header was observed.
    NewBlock(BlockHeader),

    /// A pending transaction hash was observed.
    Pending(TxHash),

    /// A raw log was observed. Provisional: the log has not reached its
    /// confirmation depth yet and may still be retracted.
    Mined(RawLog),

    /// A raw log reached its confirmation depth.
    Confirmed(RawLog),

    /// A log re-appeared at a depth already evicted from the
    /// confirmation window, so it cannot be placed back into it.
    LateReconfirm(RawLog),

    /// A log was retracted after it was already reported confirmed; a
    /// consumer may have acted on data that chain history invalidated.
    LateUnconfirm(RawLog),

    /// Decoded ERC-20 transfer.
    Transferred(Payload<TransferEvent>),

    /// Decoded ERC-20 approval.
    Approved(Payload<ApprovalEvent>),

    /// Consolidated trade aggregated from confirmed fills.
    Traded(Payload<Trade>),

    /// Decoded order cancellation.
    Cancelled(Payload<CancelEvent>),
}

impl FeedEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewBlock(_) => "newblock",
            Self::Pending(_) => "pending",
            Self::Mined(_) => "mined",
            Self::Confirmed(_) => "confirmed",
            Self::LateReconfirm(_) => "latereconfirm",
            Self::LateUnconfirm(_) => "lateunconfirm",
            Self::Transferred(_) => "transferred",
            Self::Approved(_) => "approved",
            Self::Traded(_) => "traded",
            Self::Cancelled(_) => "cancelled",
        }
    }
}
