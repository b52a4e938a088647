//! Trade aggregation over partial fills.
//!
//! One swap transaction can fill several counter-orders, producing one
//! fill record each; those collapse into a single [`Trade`]. Fills
//! arrive in bursts, so flushing is debounced: every push re-arms a
//! quiescence timer and the buffer is consolidated once input settles.
//! There is no maximum-wait cutoff; a continuous stream of fills delays
//! aggregation indefinitely.

use std::{collections::HashSet, time::Duration};

use alloy::primitives::Address;
use fastnum::UD256;
use itertools::Itertools;

use crate::decoders::{Field, FieldValue, FillEvent, ProjectFields};

/// Consolidated trade over the partial fills of one transaction.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct Trade {
    /// Processing-time stamp of the first fill of the group.
    pub timestamp: u64,

    /// Base token volume, `max(sum_base_made, sum_base_taken)`. Taking
    /// the larger side avoids double counting when a trade crosses
    /// orders on both sides of the book.
    #[debug("{amount}")]
    pub amount: UD256,

    /// Quote volume per base unit. `None` when `amount` is zero: the
    /// price of an empty trade is undefined, not zero.
    #[debug("{price:?}")]
    pub price: Option<UD256>,

    /// Number of fills consolidated into this trade.
    pub num_orders: usize,

    pub base_token: Address,
    pub quote_token: Address,

    #[debug("{sum_base_made}")]
    pub sum_base_made: UD256,
    #[debug("{sum_base_taken}")]
    pub sum_base_taken: UD256,
    #[debug("{sum_quote_made}")]
    pub sum_quote_made: UD256,
    #[debug("{sum_quote_taken}")]
    pub sum_quote_taken: UD256,
}

impl ProjectFields for Trade {
    fn fields(&self) -> Vec<Field> {
        vec![
            ("timestamp", FieldValue::Timestamp(self.timestamp)),
            ("amount", FieldValue::Amount(self.amount)),
            ("price", FieldValue::Price(self.price)),
            ("num_orders", FieldValue::Count(self.num_orders)),
            ("base_token", FieldValue::Address(self.base_token)),
            ("quote_token", FieldValue::Address(self.quote_token)),
            ("sum_base_made", FieldValue::Amount(self.sum_base_made)),
            ("sum_base_taken", FieldValue::Amount(self.sum_base_taken)),
            ("sum_quote_made", FieldValue::Amount(self.sum_quote_made)),
            ("sum_quote_taken", FieldValue::Amount(self.sum_quote_taken)),
        ]
    }
}

/// Debounce state of the aggregator's flush timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Debounce {
    Idle,
    Pending(tokio::time::Instant),
}

impl Debounce {
    /// Cancels any armed timer and arms a fresh one `delay` from now.
    pub fn rearm(&mut self, delay: Duration) {
        *self = Self::Pending(tokio::time::Instant::now() + delay);
    }

    pub fn deadline(&self) -> Option<tokio::time::Instant> {
        match self {
            Self::Idle => None,
            Self::Pending(deadline) => Some(*deadline),
        }
    }
}

/// Buffers confirmed fills and consolidates them into trades.
#[derive(Debug, Default)]
pub struct TradeAggregator {
    quote_tokens: HashSet<Address>,
    buffer: Vec<FillEvent>,
}

impl TradeAggregator {
    pub fn new(quote_tokens: HashSet<Address>) -> Self {
        Self {
            quote_tokens,
            buffer: Vec::new(),
        }
    }

    /// Appends fills in arrival order. Returns whether anything was
    /// buffered, which is the caller's cue to re-arm the debounce.
    pub fn push(&mut self, fills: impl IntoIterator<Item = FillEvent>) -> bool {
        let before = self.buffer.len();
        self.buffer.extend(fills);
        self.buffer.len() > before
    }

    /// Consolidates the buffered fills into trades and clears the
    /// buffer.
    ///
    /// Grouping by transaction hash is adjacent-only: a group ends as
    /// soon as the hash changes, and a hash recurring later in the
    /// buffer starts a fresh group rather than merging back.
    pub fn flush(&mut self) -> Vec<Trade> {
        let fills = std::mem::take(&mut self.buffer);
        let mut trades = Vec::new();
        for (_, group) in &fills.into_iter().chunk_by(|fill| fill.transaction_hash) {
            let group: Vec<FillEvent> = group.collect();
            trades.push(self.consolidate(&group));
        }
        trades
    }

    fn is_quote(&self, token: Address) -> bool {
        self.quote_tokens.contains(&token)
    }

    fn consolidate(&self, fills: &[FillEvent]) -> Trade {
        let first = &fills[0];
        let (base_token, quote_token) = if self.is_quote(first.taker_token) {
            (first.maker_token, first.taker_token)
        } else {
            (first.taker_token, first.maker_token)
        };

        let mut sum_base_made = UD256::ZERO;
        let mut sum_base_taken = UD256::ZERO;
        let mut sum_quote_made = UD256::ZERO;
        let mut sum_quote_taken = UD256::ZERO;
        for fill in fills {
            if self.is_quote(fill.taker_token) {
                sum_base_made += fill.filled_maker_amount;
                sum_quote_taken += fill.filled_taker_amount;
            } else {
                sum_base_taken += fill.filled_taker_amount;
                sum_quote_made += fill.filled_maker_amount;
            }
        }

        let amount = larger(sum_base_made, sum_base_taken);
        let quote_traded = larger(sum_quote_made, sum_quote_taken);
        let price = (!amount.is_zero()).then(|| quote_traded / amount);

        Trade {
            timestamp: first.timestamp,
            amount,
            price,
            num_orders: fills.len(),
            base_token,
            quote_token,
            sum_base_made,
            sum_base_taken,
            sum_quote_made,
            sum_quote_taken,
        }
    }
}

fn larger(a: UD256, b: UD256) -> UD256 {
    if a >= b { a } else { b }
}
