//! Price-feed pipeline
//!
//! A single task owns the tracked set, the symbol registry, the streaming
//! client and the telemetry counter. All state changes happen between the
//! awaits of one `select!` loop, so nothing here needs a lock. The host talks
//! to the task only through [`PipelineHandle`].

mod reconcile;

pub use reconcile::{apply_trade, plan_snapshot, FetchKind, SnapshotPlan};

use crate::boundary::{HostCommand, PipelineMessage};
use crate::config::{PipelineConfig, StreamConfig};
use crate::feed::{self, PriceDelta, StreamSignal, TradeStreamClient};
use crate::market::{AssetRecord, FetchError, SnapshotSource, SymbolRegistry};
use crate::telemetry::{self, TickCounter};
use crate::ws::{self, Backoff, StreamConnector, StreamEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Host-facing notice for any snapshot failure; details go to the log
pub const FETCH_ERROR_MESSAGE: &str = "Failed to fetch coin data";

/// Fetch task output, stamped with the sequence number it was requested under
type FetchOutcome = (u64, FetchKind, Result<Vec<AssetRecord>, FetchError>);

/// Reconciliation engine and its event loop
pub struct Pipeline {
    settings: PipelineConfig,
    source: Arc<dyn SnapshotSource>,
    registry: SymbolRegistry,
    stream: TradeStreamClient,
    events_rx: mpsc::Receiver<StreamEvent>,
    outbox: mpsc::UnboundedSender<PipelineMessage>,
    ticks: TickCounter,
    fetches: JoinSet<FetchOutcome>,
    fetch_seq: u64,
    installed_seq: u64,
    init_retry_at: Option<Instant>,
}

impl Pipeline {
    pub fn new(
        settings: &PipelineConfig,
        stream: &StreamConfig,
        source: Arc<dyn SnapshotSource>,
        connector: Arc<dyn StreamConnector>,
        outbox: mpsc::UnboundedSender<PipelineMessage>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(stream.event_buffer.max(1));
        let backoff = Backoff::new(stream.reconnect_base(), stream.reconnect_max());

        Self {
            settings: settings.clone(),
            source,
            registry: SymbolRegistry::new(&stream.quote_asset),
            stream: TradeStreamClient::new(connector, &stream.base_url, backoff, events_tx),
            events_rx,
            outbox,
            ticks: TickCounter::new(),
            fetches: JoinSet::new(),
            fetch_seq: 0,
            installed_seq: 0,
            init_retry_at: None,
        }
    }

    /// Run until cancelled or until the host drops its command sender
    pub async fn run(mut self, mut commands: mpsc::Receiver<HostCommand>, cancel: CancellationToken) {
        tracing::info!("Pipeline started");

        self.initialize();

        let start = Instant::now();
        let refresh_period = self.settings.refresh_interval();
        let stats_period = self.settings.stats_interval();
        let mut refresh = interval_at(start + refresh_period, refresh_period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = interval_at(start + stats_period, stats_period);
        stats.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        tracing::info!("Host command channel closed");
                        break;
                    }
                },

                Some(event) = self.events_rx.recv() => self.on_stream_event(event),

                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    self.on_fetch_joined(joined);
                }

                _ = stats.tick() => self.flush_stats(),

                _ = refresh.tick() => self.refresh(),

                _ = ws::sleep_until_opt(self.init_retry_at) => {
                    self.init_retry_at = None;
                    self.initialize();
                }

                _ = ws::sleep_until_opt(self.stream.reconnect_deadline()) => self.on_reconnect_due(),
            }
        }

        self.teardown();
    }

    /// Request the initial snapshot
    pub fn initialize(&mut self) {
        tracing::debug!("Initializing tracked set");
        self.spawn_fetch(FetchKind::Initialize);
    }

    /// Request a replacement snapshot
    pub fn refresh(&mut self) {
        tracing::debug!("Refreshing tracked set");
        self.spawn_fetch(FetchKind::Refresh);
    }

    /// Release the connection, the pending reconnect, the initialize retry
    /// and every in-flight fetch
    pub fn teardown(&mut self) {
        self.stream.teardown();
        self.fetches.abort_all();
        self.init_retry_at = None;
        tracing::info!("Pipeline stopped");
    }

    fn spawn_fetch(&mut self, kind: FetchKind) {
        self.fetch_seq += 1;
        let seq = self.fetch_seq;
        let source = Arc::clone(&self.source);
        self.fetches
            .spawn(async move { (seq, kind, source.fetch_snapshot().await) });
    }

    fn on_fetch_joined(&mut self, joined: Result<FetchOutcome, JoinError>) {
        match joined {
            // Requested before the installed set, so already superseded
            Ok((seq, kind, _)) if seq < self.installed_seq => {
                tracing::debug!(seq, installed = self.installed_seq, ?kind, "Dropping stale snapshot");
            }
            Ok((seq, kind, result)) => {
                if let SnapshotPlan::Install { .. } = self.on_snapshot(kind, result) {
                    self.installed_seq = seq;
                }
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                tracing::error!(error = %e, "Snapshot task failed");
                if self.registry.is_empty() && self.init_retry_at.is_none() {
                    self.schedule_init_retry();
                }
            }
        }
    }

    /// Reconcile a completed fetch with the tracked set
    pub fn on_snapshot(
        &mut self,
        kind: FetchKind,
        result: Result<Vec<AssetRecord>, FetchError>,
    ) -> SnapshotPlan {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(?kind, error = %e, "Snapshot fetch failed");
                telemetry::record_fetch_failure();
                self.emit(PipelineMessage::Error {
                    message: FETCH_ERROR_MESSAGE.to_string(),
                });
                Vec::new()
            }
        };

        let plan = plan_snapshot(kind, &self.registry, &records);
        match plan {
            SnapshotPlan::RetryInitialize => self.schedule_init_retry(),
            SnapshotPlan::KeepCurrent => {
                tracing::debug!(tracked = self.registry.len(), "Empty refresh, keeping current set");
            }
            SnapshotPlan::Install { resubscribe } => self.install(records, resubscribe),
        }
        plan
    }

    fn schedule_init_retry(&mut self) {
        let delay = self.settings.init_retry();
        tracing::info!(delay_secs = delay.as_secs(), "No snapshot yet, retrying initialize later");
        self.init_retry_at = Some(Instant::now() + delay);
    }

    fn install(&mut self, records: Vec<AssetRecord>, resubscribe: bool) {
        self.init_retry_at = None;
        self.registry.rebuild(records);
        telemetry::record_snapshot(self.registry.len());

        tracing::info!(
            assets = self.registry.len(),
            resubscribe,
            "Installed market snapshot"
        );

        self.emit(PipelineMessage::Coins {
            coins: self.registry.snapshot(),
        });

        if resubscribe {
            telemetry::record_universe_change();
            self.stream.subscribe(&self.registry.stream_names());
        }
    }

    fn on_command(&mut self, command: HostCommand) {
        match command {
            HostCommand::Ping => self.emit(PipelineMessage::Pong { timestamp: now_ms() }),
            HostCommand::Refresh => self.refresh(),
        }
    }

    /// Feed one transport event through the streaming client
    pub fn on_stream_event(&mut self, event: StreamEvent) {
        match self.stream.handle_event(event) {
            Some(StreamSignal::Status(connected)) => {
                self.emit(PipelineMessage::Status { connected });
            }
            Some(StreamSignal::Frame(text)) => self.on_frame(&text),
            None => {}
        }
    }

    fn on_frame(&mut self, frame: &str) {
        let Some(tick) = feed::parse_trade(frame) else {
            telemetry::record_tick_discarded();
            return;
        };

        let Some(record) = self.registry.resolve_mut(tick.symbol) else {
            tracing::trace!(symbol = tick.symbol, "Tick for untracked symbol");
            telemetry::record_tick_discarded();
            return;
        };

        let Some(direction) = apply_trade(record, tick.price) else {
            telemetry::record_tick_discarded();
            return;
        };

        let update = PriceDelta {
            symbol: record.symbol.clone(),
            price: tick.price,
            direction,
            timestamp: now_ms(),
        };

        self.ticks.record();
        telemetry::record_tick_accepted();
        self.emit(PipelineMessage::Price { update });
    }

    fn on_reconnect_due(&mut self) {
        let streams = self.registry.stream_names();
        self.stream.reconnect(&streams);
    }

    fn flush_stats(&mut self) {
        let updates = self.ticks.take();
        self.emit(PipelineMessage::Stats { updates });
    }

    fn emit(&self, message: PipelineMessage) {
        if self.outbox.send(message).is_err() {
            tracing::trace!("Host receiver dropped, message discarded");
        }
    }

    pub fn registry(&self) -> &SymbolRegistry {
        &self.registry
    }

    pub fn stream(&self) -> &TradeStreamClient {
        &self.stream
    }

    /// Ticks accepted in the current telemetry window
    pub fn pending_ticks(&self) -> u64 {
        self.ticks.current()
    }

    pub fn init_retry_deadline(&self) -> Option<Instant> {
        self.init_retry_at
    }
}

/// The pipeline task is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pipeline has shut down")]
pub struct PipelineClosed;

/// Host side of a running pipeline
pub struct PipelineHandle {
    commands: mpsc::Sender<HostCommand>,
    messages: mpsc::UnboundedReceiver<PipelineMessage>,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PipelineHandle {
    /// Spawn a pipeline task on the current runtime
    pub fn spawn(
        settings: &PipelineConfig,
        stream: &StreamConfig,
        source: Arc<dyn SnapshotSource>,
        connector: Arc<dyn StreamConnector>,
    ) -> Self {
        let (outbox, messages) = mpsc::unbounded_channel();
        let (commands, commands_rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();

        let pipeline = Pipeline::new(settings, stream, source, connector, outbox);
        let join = tokio::spawn(pipeline.run(commands_rx, cancel.clone()));

        Self {
            commands,
            messages,
            cancel,
            join,
        }
    }

    pub async fn send(&self, command: HostCommand) -> Result<(), PipelineClosed> {
        self.commands.send(command).await.map_err(|_| PipelineClosed)
    }

    pub async fn ping(&self) -> Result<(), PipelineClosed> {
        self.send(HostCommand::Ping).await
    }

    pub async fn refresh(&self) -> Result<(), PipelineClosed> {
        self.send(HostCommand::Refresh).await
    }

    /// Next message in emission order; `None` once the pipeline has stopped
    pub async fn recv(&mut self) -> Option<PipelineMessage> {
        self.messages.recv().await
    }

    /// Stop the pipeline and wait for its teardown to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.join.await {
            tracing::error!(error = %e, "Pipeline task ended abnormally");
        }
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
