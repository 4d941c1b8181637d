//! Test doubles for driving a pipeline without network access

use async_trait::async_trait;
use coin_ticker::boundary::PipelineMessage;
use coin_ticker::config::{PipelineConfig, StreamConfig};
use coin_ticker::market::{AssetRecord, FetchError, SnapshotSource};
use coin_ticker::pipeline::PipelineHandle;
use coin_ticker::ws::{ConnectionHandle, StreamConnector, StreamEvent, StreamEventKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

pub type Snapshot = Result<Vec<AssetRecord>, FetchError>;

/// Hands out queued snapshot results, each after its own delay, then empty
/// snapshots
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<(Duration, Snapshot)>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(script: Vec<Snapshot>) -> Self {
        Self::delayed(script.into_iter().map(|s| (Duration::ZERO, s)).collect())
    }

    pub fn delayed(script: Vec<(Duration, Snapshot)>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn fetch_snapshot(&self) -> Result<Vec<AssetRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        let (delay, snapshot) = next.unwrap_or_else(|| (Duration::ZERO, Ok(Vec::new())));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        snapshot
    }
}

pub struct FakeConnection {
    pub url: String,
    pub generation: u64,
    events: mpsc::Sender<StreamEvent>,
    close_rx: oneshot::Receiver<()>,
}

/// Records every opened connection and lets the test play the transport
#[derive(Default)]
pub struct FakeConnector {
    connections: Mutex<Vec<FakeConnection>>,
}

impl FakeConnector {
    pub fn count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn url(&self, index: usize) -> String {
        self.connections.lock().unwrap()[index].url.clone()
    }

    pub fn was_closed(&self, index: usize) -> bool {
        self.connections.lock().unwrap()[index].close_rx.try_recv().is_ok()
    }

    pub async fn emit(&self, index: usize, kind: StreamEventKind) {
        let (events, generation) = {
            let connections = self.connections.lock().unwrap();
            let conn = &connections[index];
            (conn.events.clone(), conn.generation)
        };
        events.send(StreamEvent::new(generation, kind)).await.unwrap();
    }

    pub async fn establish(&self, index: usize) {
        self.emit(index, StreamEventKind::Opened).await;
    }

    pub async fn drop_connection(&self, index: usize) {
        self.emit(index, StreamEventKind::Closed { reason: Some("reset".to_string()) })
            .await;
    }

    pub async fn trade(&self, index: usize, symbol: &str, price: &str) {
        let frame = format!(
            r#"{{"stream":"{}@trade","data":{{"e":"trade","E":1,"s":"{symbol}","t":7,"p":"{price}","q":"0.5","T":1700000000000,"m":false}}}}"#,
            symbol.to_lowercase()
        );
        self.emit(index, StreamEventKind::Frame(frame)).await;
    }

    /// Poll until `n` connections exist
    pub async fn wait_for(&self, n: usize) {
        while self.count() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl StreamConnector for FakeConnector {
    fn open(&self, url: String, generation: u64, events: mpsc::Sender<StreamEvent>) -> ConnectionHandle {
        let (close_tx, close_rx) = oneshot::channel();
        self.connections.lock().unwrap().push(FakeConnection {
            url,
            generation,
            events,
            close_rx,
        });
        ConnectionHandle::new(generation, close_tx)
    }
}

pub struct Harness {
    pub pipeline: PipelineHandle,
    pub connector: Arc<FakeConnector>,
    pub source: Arc<ScriptedSource>,
}

impl Harness {
    pub fn spawn(script: Vec<Snapshot>) -> Self {
        Self::spawn_with(PipelineConfig::default(), ScriptedSource::new(script))
    }

    pub fn spawn_with(settings: PipelineConfig, source: ScriptedSource) -> Self {
        let connector = Arc::new(FakeConnector::default());
        let source = Arc::new(source);
        let pipeline = PipelineHandle::spawn(
            &settings,
            &StreamConfig::default(),
            source.clone(),
            connector.clone(),
        );
        Self {
            pipeline,
            connector,
            source,
        }
    }

    /// Next message other than the periodic `stats`
    pub async fn next(&mut self) -> PipelineMessage {
        loop {
            match self.pipeline.recv().await {
                Some(PipelineMessage::Stats { .. }) => continue,
                Some(message) => return message,
                None => panic!("pipeline closed"),
            }
        }
    }

    /// Next `stats` message, skipping everything else
    pub async fn next_stats(&mut self) -> u64 {
        loop {
            match self.pipeline.recv().await {
                Some(PipelineMessage::Stats { updates }) => return updates,
                Some(_) => continue,
                None => panic!("pipeline closed"),
            }
        }
    }
}

pub fn coins(symbols: &[(&str, f64)]) -> Vec<AssetRecord> {
    symbols
        .iter()
        .enumerate()
        .map(|(i, (symbol, price))| AssetRecord::new(*symbol, *price).with_rank(i as u32 + 1))
        .collect()
}
