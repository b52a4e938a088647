//! Confirmation depth tracking with reorg correction.

use std::collections::VecDeque;

use alloy::primitives::B256;
use tracing::{debug, warn};

use crate::types::RawLog;

/// Outcome of feeding one log notification to the tracker.
#[derive(Clone, Debug, Default)]
pub struct LogOutcome {
    /// Logs whose confirmation depth was reached by this notification.
    pub confirmed: Vec<RawLog>,

    /// The log itself, when it re-appeared at a depth already evicted
    /// from the window. Also included in `confirmed` iff the tracker
    /// was built with `include_reconfirms`.
    pub late_reconfirm: Option<RawLog>,
}

/// Sliding window of logs pending confirmation, keyed by depth.
///
/// The window holds exactly `num_confirmations` buckets: bucket 0 is
/// the next to be evicted, the last bucket collects the logs of the
/// most recently seen block. Every pending log sits in exactly one
/// bucket. The `VecDeque` keeps advance and eviction O(1).
///
/// With `num_confirmations == 0` the tracker is a pass-through: every
/// log is confirmed the instant it is seen and never revisited, a
/// deliberate trade of reorg correctness for latency.
#[derive(Debug)]
pub struct ConfirmationTracker {
    num_confirmations: usize,
    include_reconfirms: bool,
    current_block_number: u64,
    current_block_hash: B256,
    window: VecDeque<Vec<RawLog>>,
}

impl ConfirmationTracker {
    pub fn new(num_confirmations: usize, include_reconfirms: bool) -> Self {
        Self {
            num_confirmations,
            include_reconfirms,
            current_block_number: 0,
            current_block_hash: B256::ZERO,
            window: std::iter::repeat_with(Vec::new)
                .take(num_confirmations)
                .collect(),
        }
    }

    pub fn num_confirmations(&self) -> usize {
        self.num_confirmations
    }

    /// Number of logs currently pending in the window.
    pub fn pending(&self) -> usize {
        self.window.iter().map(Vec::len).sum()
    }

    /// Advances the window on a new block header and returns the logs
    /// that reached their confirmation depth. Stale or repeated headers
    /// do not move the window.
    pub fn on_new_block(&mut self, number: u64, hash: B256) -> Vec<RawLog> {
        self.advance(number, hash, None)
    }

    /// Feeds one log notification.
    ///
    /// A log ahead of the current head advances the window exactly like
    /// a block header would, with the log attached to the new bucket. A
    /// log at the head is appended to the newest bucket. Anything else
    /// is a reorged delivery and is re-inserted at its true depth, or
    /// reported as a late reconfirm when that depth has already been
    /// evicted.
    pub fn on_new_log(&mut self, log: RawLog) -> LogOutcome {
        if self.num_confirmations == 0 {
            return LogOutcome {
                confirmed: vec![log],
                late_reconfirm: None,
            };
        }

        if log.block_number > self.current_block_number {
            let (number, hash) = (log.block_number, log.block_hash);
            return LogOutcome {
                confirmed: self.advance(number, hash, Some(log)),
                late_reconfirm: None,
            };
        }

        if log.block_number == self.current_block_number
            && log.block_hash == self.current_block_hash
        {
            if let Some(newest) = self.window.back_mut() {
                newest.push(log);
            }
            return LogOutcome::default();
        }

        debug!(
            log_block = log.block_number,
            head_block = self.current_block_number,
            tx = %log.transaction_hash,
            "reorged log"
        );
        let depth = self.current_block_number - log.block_number;
        match self.bucket_index(depth) {
            Some(index) => {
                self.window[index].push(log);
                LogOutcome::default()
            }
            None => {
                warn!(
                    log_block = log.block_number,
                    tx = %log.transaction_hash,
                    "late reconfirmed log"
                );
                LogOutcome {
                    confirmed: if self.include_reconfirms {
                        vec![log.clone()]
                    } else {
                        Vec::new()
                    },
                    late_reconfirm: Some(log),
                }
            }
        }
    }

    /// Removes a retracted log from the window.
    ///
    /// Returns the log back when it is no longer pending: a consumer
    /// may already have acted on a log that chain history has now
    /// invalidated.
    pub fn on_retracted_log(&mut self, log: RawLog) -> Option<RawLog> {
        debug!(
            block = log.block_number,
            tx = %log.transaction_hash,
            index = log.log_index,
            "retracted log"
        );
        // Newer blocks are the more likely reorg site, scan backwards.
        for bucket in self.window.iter_mut().rev() {
            if let Some(position) = bucket.iter().position(|l| l.same_identity(&log)) {
                bucket.remove(position);
                return None;
            }
        }
        warn!(
            block = log.block_number,
            tx = %log.transaction_hash,
            "late unconfirmed log"
        );
        Some(log)
    }

    /// Read-only view of the pending logs of the given block, or `None`
    /// when the block is outside the window.
    pub fn logs_at_block(&self, number: u64) -> Option<&[RawLog]> {
        let depth = self.current_block_number.checked_sub(number)?;
        let index = self.bucket_index(depth)?;
        self.window.get(index).map(Vec::as_slice)
    }

    fn advance(&mut self, number: u64, hash: B256, log: Option<RawLog>) -> Vec<RawLog> {
        if number <= self.current_block_number {
            return Vec::new();
        }
        self.current_block_number = number;
        self.current_block_hash = hash;
        self.window.push_back(log.into_iter().collect());
        self.window.pop_front().unwrap_or_default()
    }

    /// Window index holding logs at the given confirmation depth, or
    /// `None` when that depth is already past the window.
    fn bucket_index(&self, depth: u64) -> Option<usize> {
        (self.num_confirmations as u64)
            .checked_sub(depth + 1)
            .map(|index| index as usize)
    }
}
