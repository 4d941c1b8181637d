//! Run command implementation
//!
//! The CLI plays the host: it prints pipeline messages, probes latency with
//! periodic pings and forwards `ping`/`refresh` typed on stdin.

use crate::boundary::{HostCommand, HostStats, LatencyProbe, PipelineMessage};
use crate::config::Config;
use crate::feed::Direction;
use crate::market::{CoinGeckoClient, CoinGeckoConfig};
use crate::pipeline::PipelineHandle;
use crate::telemetry;
use crate::ws::{TungsteniteConnector, WsConfig};
use clap::Args;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print every boundary message as a JSON line
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let source = Arc::new(CoinGeckoClient::with_config(CoinGeckoConfig::from(
            &config.snapshot,
        ))?);
        let connector = Arc::new(TungsteniteConnector::new(WsConfig::from(&config.stream)));
        let mut pipeline =
            PipelineHandle::spawn(&config.pipeline, &config.stream, source, connector);

        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        let mut ping = interval(config.host.ping_interval());
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut probe = LatencyProbe::default();
        let mut stats = HostStats::default();

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        tracing::info!(limit = config.snapshot.limit, "Price feed running, Ctrl-C to stop");

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                    }
                    tracing::info!("Shutting down");
                    break;
                }

                _ = ping.tick() => {
                    probe.mark_sent(now_ms());
                    if pipeline.ping().await.is_err() {
                        break;
                    }
                }

                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => match parse_host_command(&line) {
                        Some(command) => {
                            if command == HostCommand::Ping {
                                probe.mark_sent(now_ms());
                            }
                            if pipeline.send(command).await.is_err() {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => tracing::warn!(input = %line.trim(), "Unknown command"),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        tracing::warn!(error = %e, "Stdin closed");
                        stdin_open = false;
                    }
                },

                message = pipeline.recv() => match message {
                    Some(message) => self.present(&message, &mut stats, &mut probe)?,
                    None => {
                        tracing::warn!("Pipeline stopped unexpectedly");
                        break;
                    }
                },
            }
        }

        pipeline.shutdown().await;
        Ok(())
    }

    fn present(
        &self,
        message: &PipelineMessage,
        stats: &mut HostStats,
        probe: &mut LatencyProbe,
    ) -> anyhow::Result<()> {
        let transition = stats.apply(message, probe, now_ms());

        if let PipelineMessage::Pong { .. } = message {
            telemetry::record_latency(stats.latency_ms);
            tracing::debug!(latency_ms = stats.latency_ms, "Pong");
        }

        if self.json {
            println!("{}", serde_json::to_string(message)?);
            return Ok(());
        }

        match message {
            PipelineMessage::Coins { coins } => {
                let symbols: Vec<&str> = coins.iter().map(|c| c.symbol.as_str()).collect();
                println!("Tracking {} assets: {}", coins.len(), symbols.join(", "));
            }
            PipelineMessage::Price { update } => {
                let arrow = match update.direction {
                    Direction::Up => "▲",
                    Direction::Down => "▼",
                    Direction::Unchanged => "=",
                };
                println!("{:<8} {:>16.4} {}", update.symbol, update.price, arrow);
            }
            PipelineMessage::Stats { updates } => {
                tracing::debug!(
                    updates,
                    connected = stats.is_connected,
                    latency_ms = stats.latency_ms,
                    "Feed stats"
                );
            }
            PipelineMessage::Status { .. } => {
                if let Some(connected) = transition {
                    println!("{}", if connected { "Connected" } else { "Disconnected" });
                }
            }
            PipelineMessage::Error { message } => eprintln!("Error: {message}"),
            PipelineMessage::Pong { .. } => {}
        }
        Ok(())
    }
}

/// Parse one stdin line: a bare word (`ping`, `refresh`) or a JSON command
pub fn parse_host_command(line: &str) -> Option<HostCommand> {
    let line = line.trim();
    if line.starts_with('{') {
        return serde_json::from_str(line).ok();
    }
    match line.to_ascii_lowercase().as_str() {
        "ping" => Some(HostCommand::Ping),
        "refresh" => Some(HostCommand::Refresh),
        _ => None,
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
