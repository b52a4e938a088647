//! Pipeline orchestration.
//!
//! Wires the upstream notification streams into the confirmation
//! tracker, fans confirmed batches out to the configured decoders, and
//! republishes everything as [`FeedEvent`]s on one channel. All mutable
//! state lives on a single task; the only suspension point besides
//! channel I/O is the trade debounce timer.

use std::time::Duration;

use alloy::primitives::TxHash;
use futures::{StreamExt, stream::BoxStream};
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::{
    DecoderSpec, FeedConfig,
    confirm::ConfirmationTracker,
    decoders::{DecodedEvent, DecoderKind},
    error::FeedError,
    trades::{Debounce, TradeAggregator},
    types::{BlockHeader, FeedEvent, RawLog},
};

/// Output channel capacity.
const DEFAULT_CHANNEL_SIZE: usize = 100;

/// Upstream chain notification streams.
///
/// Each stream must deliver its own items in order; nothing is assumed
/// about ordering across streams (a log and the header of its block may
/// arrive either way around).
pub struct ChainSource {
    /// New block headers.
    pub blocks: BoxStream<'static, BlockHeader>,

    /// Log notifications for the watched contract and topics.
    pub logs: BoxStream<'static, RawLog>,

    /// Retractions of previously delivered logs that are no longer part
    /// of the canonical chain.
    pub retractions: BoxStream<'static, RawLog>,

    /// Pending transaction hashes, republished as-is when present.
    pub pending_txs: Option<BoxStream<'static, TxHash>>,
}

/// Receiver for classified feed events.
pub struct FeedReceiver {
    inner: mpsc::Receiver<FeedEvent>,
}

impl FeedReceiver {
    pub(crate) fn new(inner: mpsc::Receiver<FeedEvent>) -> Self {
        Self { inner }
    }

    /// Receives the next event, or `None` once the pipeline stopped.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.inner.recv().await
    }
}

/// Handle to the running pipeline task.
///
/// Dropping the handle tears the pipeline down as well.
pub struct FeedHandle {
    shutdown: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl FeedHandle {
    /// Stops the pipeline: cancels any armed debounce timer and
    /// releases the upstream subscriptions as one unit. Teardown
    /// failures are suppressed, the upstream is assumed to be shutting
    /// down already.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            debug!(%err, "pipeline teardown");
        }
    }
}

/// Starts the classification pipeline.
///
/// Validates the configuration up front, then spawns a single task
/// owning the tracker, the decoders and the trade aggregator. Events
/// are delivered through the returned receiver; the pipeline stops when
/// the receiver is dropped, the handle is stopped or every upstream
/// stream ends.
pub fn start(
    config: FeedConfig,
    source: ChainSource,
) -> Result<(FeedReceiver, FeedHandle), FeedError> {
    config.validate()?;

    let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_SIZE);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(config, source, tx, shutdown_rx));

    Ok((FeedReceiver::new(rx), FeedHandle { shutdown, task }))
}

async fn run(
    config: FeedConfig,
    mut source: ChainSource,
    tx: mpsc::Sender<FeedEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut pipeline = Pipeline {
        tracker: ConfirmationTracker::new(config.num_confirmations, config.include_reconfirms),
        aggregator: TradeAggregator::new(config.quote_tokens),
        debounce: Debounce::Idle,
        debounce_delay: config.debounce,
        decoders: config.decoders,
        tx,
    };

    let mut blocks_done = false;
    let mut logs_done = false;
    let mut retractions_done = false;

    loop {
        let running = tokio::select! {
            _ = shutdown.changed() => break,
            header = source.blocks.next(), if !blocks_done => match header {
                Some(header) => pipeline.on_block(header).await,
                None => {
                    blocks_done = true;
                    true
                }
            },
            log = source.logs.next(), if !logs_done => match log {
                Some(log) => pipeline.on_log(log).await,
                None => {
                    logs_done = true;
                    true
                }
            },
            log = source.retractions.next(), if !retractions_done => match log {
                Some(log) => pipeline.on_retraction(log).await,
                None => {
                    retractions_done = true;
                    true
                }
            },
            tx_hash = next_pending(&mut source.pending_txs), if source.pending_txs.is_some() => {
                match tx_hash {
                    Some(tx_hash) => pipeline.emit(FeedEvent::Pending(tx_hash)).await,
                    None => {
                        source.pending_txs = None;
                        true
                    }
                }
            }
            _ = sleep_until(pipeline.debounce.deadline()), if pipeline.debounce.deadline().is_some() => {
                pipeline.flush_trades().await
            }
        };
        if !running {
            break;
        }
        // Every upstream stream ended and no debounce is armed.
        if blocks_done
            && logs_done
            && retractions_done
            && source.pending_txs.is_none()
            && pipeline.debounce.deadline().is_none()
        {
            break;
        }
    }
}

async fn next_pending(pending: &mut Option<BoxStream<'static, TxHash>>) -> Option<TxHash> {
    match pending {
        Some(stream) => stream.next().await,
        None => None,
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

struct Pipeline {
    tracker: ConfirmationTracker,
    aggregator: TradeAggregator,
    debounce: Debounce,
    debounce_delay: Duration,
    decoders: Vec<DecoderSpec>,
    tx: mpsc::Sender<FeedEvent>,
}

impl Pipeline {
    /// Sends one event; `false` means the receiver is gone and the
    /// pipeline should wind down.
    async fn emit(&self, event: FeedEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    async fn on_block(&mut self, header: BlockHeader) -> bool {
        let confirmed = self.tracker.on_new_block(header.number, header.hash);
        self.dispatch(confirmed).await && self.emit(FeedEvent::NewBlock(header)).await
    }

    async fn on_log(&mut self, log: RawLog) -> bool {
        // Provisional signal, in parallel with the confirmation path.
        if !self.emit(FeedEvent::Mined(log.clone())).await {
            return false;
        }
        let outcome = self.tracker.on_new_log(log);
        if let Some(late) = outcome.late_reconfirm {
            if !self.emit(FeedEvent::LateReconfirm(late)).await {
                return false;
            }
        }
        self.dispatch(outcome.confirmed).await
    }

    async fn on_retraction(&mut self, log: RawLog) -> bool {
        match self.tracker.on_retracted_log(log) {
            Some(late) => self.emit(FeedEvent::LateUnconfirm(late)).await,
            None => true,
        }
    }

    /// Fans one confirmed batch out to every registered decoder. Fill
    /// records are routed to the aggregator, everything else is
    /// published through its decoder's projection.
    async fn dispatch(&mut self, confirmed: Vec<RawLog>) -> bool {
        if confirmed.is_empty() {
            return true;
        }
        for log in &confirmed {
            if !self.emit(FeedEvent::Confirmed(log.clone())).await {
                return false;
            }
        }

        let mut fills = Vec::new();
        let mut decoded = Vec::new();
        for spec in &self.decoders {
            for event in spec.kind.decode(&confirmed) {
                match event {
                    DecodedEvent::Fill(fill) => fills.push(fill),
                    DecodedEvent::Transfer(transfer) => {
                        decoded.push(FeedEvent::Transferred(spec.projection.apply(transfer)));
                    }
                    DecodedEvent::Approval(approval) => {
                        decoded.push(FeedEvent::Approved(spec.projection.apply(approval)));
                    }
                    DecodedEvent::Cancel(cancel) => {
                        decoded.push(FeedEvent::Cancelled(spec.projection.apply(cancel)));
                    }
                }
            }
        }
        for event in decoded {
            if !self.emit(event).await {
                return false;
            }
        }

        // Every new fill resets the quiescence window.
        if self.aggregator.push(fills) {
            self.debounce.rearm(self.debounce_delay);
        }
        true
    }

    async fn flush_trades(&mut self) -> bool {
        self.debounce = Debounce::Idle;
        let projection = self
            .decoders
            .iter()
            .find(|spec| spec.kind == DecoderKind::Fill)
            .map(|spec| spec.projection.clone())
            .unwrap_or_default();
        for trade in self.aggregator.flush() {
            if !self.emit(FeedEvent::Traded(projection.apply(trade))).await {
                return false;
            }
        }
        true
    }
}
