//! Reorg-aware chain event classifier.
//!
//! # Overview
//!
//! Turns a raw stream of block/log notifications into reliable, typed
//! domain events: ERC-20 transfers and approvals, consolidated trades
//! and order cancellations.
//!
//! Logs are buffered by confirmation depth in a sliding window and
//! promoted once enough blocks have been observed past them; retracted
//! and out-of-order deliveries are corrected or reported as explicit
//! late signals. Confirmed batches are fanned out to fixed-layout
//! decoders, and partial fills are consolidated per transaction by a
//! debounced trade aggregator.
//!
//! Build a [`FeedConfig`], plug the upstream notification streams into
//! a [`bus::ChainSource`], and consume [`types::FeedEvent`]s from the
//! receiver returned by [`bus::start`].
//!
//! See `./tests` for examples.
//!
//! # Limitations/follow-ups
//!
//! * With `num_confirmations == 0` every log is confirmed the instant
//!   it is seen and reorg correction is bypassed entirely.
//!
//! * Decoded records are stamped with processing time, not the chain
//!   time of their block.
//!
//! * The trade debounce has no maximum-wait cutoff: a continuous fill
//!   stream delays aggregation, and the aggregation buffer, without
//!   bound.
//!
//! * Amounts are scaled by a fixed 18 decimals; there is no per-token
//!   decimals lookup.

pub mod bus;
pub mod confirm;
pub mod decoders;
pub mod error;
pub mod num;
pub mod trades;
pub mod types;
pub mod words;

use std::{collections::HashSet, time::Duration};

use alloy::primitives::{Address, B256, address};

use crate::{
    decoders::{DecoderKind, FieldProjection},
    error::FeedError,
};

/// Exchange contract (mainnet).
pub const EXCHANGE_CONTRACT: Address = address!("0x12459c951127e0c374ff9105dda097662a027093");

/// WETH (mainnet), the default quote token.
pub const WETH: Address = address!("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");

/// Default trade aggregation debounce delay.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// One registered decoder with its optional output projection.
///
/// For the fill decoder the projection applies to the aggregated
/// [`trades::Trade`] records, since fills are never published directly.
#[derive(Clone, Debug)]
pub struct DecoderSpec {
    pub kind: DecoderKind,
    pub projection: FieldProjection,
}

/// Watch configuration accepted by the pipeline.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub(crate) contract: Address,
    pub(crate) topics: Vec<B256>,
    pub(crate) num_confirmations: usize,
    pub(crate) include_reconfirms: bool,
    pub(crate) quote_tokens: HashSet<Address>,
    pub(crate) debounce: Duration,
    pub(crate) decoders: Vec<DecoderSpec>,
    dangling_projection: bool,
}

impl FeedConfig {
    /// Empty configuration watching `contract`; register decoders with
    /// [`FeedConfig::with_decoder`].
    pub fn new(contract: Address) -> Self {
        Self {
            contract,
            topics: Vec::new(),
            num_confirmations: 0,
            include_reconfirms: false,
            quote_tokens: HashSet::new(),
            debounce: DEFAULT_DEBOUNCE,
            decoders: Vec::new(),
            dangling_projection: false,
        }
    }

    /// Mainnet preset: the exchange contract, WETH as the quote token
    /// and all four decoders.
    pub fn mainnet() -> Self {
        Self::new(EXCHANGE_CONTRACT)
            .with_quote_token(WETH)
            .with_decoder(DecoderKind::Erc20Transfer)
            .with_decoder(DecoderKind::Erc20Approval)
            .with_decoder(DecoderKind::Fill)
            .with_decoder(DecoderKind::Cancel)
    }

    /// Registers a decoder and adds its signature to the subscription
    /// topics.
    pub fn with_decoder(mut self, kind: DecoderKind) -> Self {
        if !self.topics.contains(&kind.signature()) {
            self.topics.push(kind.signature());
        }
        self.decoders.push(DecoderSpec {
            kind,
            projection: FieldProjection::default(),
        });
        self
    }

    /// Restricts the output of the most recently registered decoder to
    /// the given fields.
    pub fn with_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        match self.decoders.last_mut() {
            Some(spec) => spec.projection = FieldProjection::new(fields),
            None => self.dangling_projection = true,
        }
        self
    }

    /// Replaces the subscription topic list.
    pub fn with_topics(mut self, topics: Vec<B256>) -> Self {
        self.topics = topics;
        self
    }

    /// Number of blocks to observe past a log's block before confirming
    /// it. Zero confirms every log instantly and bypasses reorg
    /// correction.
    pub fn with_confirmations(mut self, num_confirmations: usize) -> Self {
        self.num_confirmations = num_confirmations;
        self
    }

    /// Whether late reconfirmed logs are included in the confirmed
    /// output in addition to the late signal.
    pub fn include_reconfirms(mut self, include: bool) -> Self {
        self.include_reconfirms = include;
        self
    }

    pub fn with_quote_token(mut self, token: Address) -> Self {
        self.quote_tokens.insert(token);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn topics(&self) -> &[B256] {
        &self.topics
    }

    pub fn num_confirmations(&self) -> usize {
        self.num_confirmations
    }

    pub fn decoders(&self) -> &[DecoderSpec] {
        &self.decoders
    }

    /// Fails fast on a configuration the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.contract == Address::ZERO {
            return Err(FeedError::MissingContract);
        }
        if self.topics.is_empty() || self.topics.len() > 4 {
            return Err(FeedError::InvalidTopics(self.topics.len()));
        }
        if self.dangling_projection {
            return Err(FeedError::ProjectionWithoutDecoder);
        }
        if self.decoders.is_empty() {
            return Err(FeedError::NoDecoders);
        }
        let has_fills = self
            .decoders
            .iter()
            .any(|spec| spec.kind == DecoderKind::Fill);
        if has_fills && self.quote_tokens.is_empty() {
            return Err(FeedError::MissingQuoteTokens);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_preset_is_valid() {
        let config = FeedConfig::mainnet();
        assert!(config.validate().is_ok());
        assert_eq!(config.decoders().len(), 4);
        assert_eq!(config.topics().len(), 4);
    }

    #[test]
    fn test_validation_failures() {
        assert!(matches!(
            FeedConfig::new(Address::ZERO).validate(),
            Err(FeedError::MissingContract)
        ));

        assert!(matches!(
            FeedConfig::new(WETH).validate(),
            Err(FeedError::InvalidTopics(0))
        ));

        assert!(matches!(
            FeedConfig::new(WETH)
                .with_topics(vec![B256::ZERO; 5])
                .validate(),
            Err(FeedError::InvalidTopics(5))
        ));

        assert!(matches!(
            FeedConfig::new(WETH).with_topics(vec![B256::ZERO]).validate(),
            Err(FeedError::NoDecoders)
        ));

        assert!(matches!(
            FeedConfig::new(WETH)
                .with_topics(vec![B256::ZERO])
                .with_projection(["value"])
                .validate(),
            Err(FeedError::ProjectionWithoutDecoder)
        ));

        assert!(matches!(
            FeedConfig::new(EXCHANGE_CONTRACT)
                .with_decoder(DecoderKind::Fill)
                .validate(),
            Err(FeedError::MissingQuoteTokens)
        ));
    }
}
