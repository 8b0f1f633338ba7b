//! Long-lived streaming sessions for live container telemetry.
//!
//! Sessions are transport-agnostic: they read and write [`SessionFrame`]s
//! over any `Sink`/`Stream` pair, so the gateway can drive them from a
//! websocket while tests drive them from in-memory channels.
//!
//! - Stats: one sample per tick, derived metrics as JSON text frames
//! - Terminal: interactive exec bridged through a bounded queue

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dockhand_common::{ContainerEngine, DockhandError, Result, StatsSample};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::resolve_container;

/// Default delay between two stats samples.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Default capacity of the terminal output queue, in chunks.
pub const DEFAULT_TERMINAL_QUEUE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFrame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

impl SessionFrame {
    pub fn error(message: impl Display) -> Self {
        SessionFrame::Text(serde_json::json!({ "error": message.to_string() }).to_string())
    }
}

/// Sink wrapper that closes the underlying sink at most once.
pub struct CloseOnce<S> {
    sink: S,
    closed: bool,
}

impl<S> CloseOnce<S>
where
    S: Sink<SessionFrame> + Unpin,
    S::Error: Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn send(&mut self, frame: SessionFrame) -> Result<()> {
        if self.closed {
            return Err(DockhandError::Session("sink already closed".to_string()));
        }
        self.sink
            .send(frame)
            .await
            .map_err(|e| DockhandError::Session(e.to_string()))
    }

    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.sink.close().await {
            debug!(error = %e, "Closing session sink failed");
        }
    }
}

/// One stats tick as delivered to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsMessage {
    pub cpu_percent: f64,
    pub cpu_cores: usize,
    pub per_cpu_usage: Vec<u64>,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub blk_read: u64,
    pub blk_write: u64,
    pub uptime_seconds: Option<i64>,
}

impl StatsMessage {
    pub fn from_sample(sample: &StatsSample, uptime_seconds: Option<i64>) -> Self {
        let per_cpu_usage = sample
            .cpu_stats
            .cpu_usage
            .percpu_usage
            .clone()
            .unwrap_or_default();
        let cpu_cores = if per_cpu_usage.is_empty() {
            sample.cpu_stats.online_cpus.unwrap_or(0) as usize
        } else {
            per_cpu_usage.len()
        };
        let memory_usage = sample.memory_stats.usage.unwrap_or(0);
        let memory_limit = sample.memory_stats.limit.filter(|l| *l > 0).unwrap_or(1);
        let network = metrics::network_io(sample);
        let block = metrics::block_io(sample);

        Self {
            cpu_percent: metrics::sample_cpu_percent(sample),
            cpu_cores,
            per_cpu_usage,
            memory_usage,
            memory_limit,
            memory_percent: metrics::memory_percent(memory_usage, memory_limit),
            network_rx: network.rx,
            network_tx: network.tx,
            blk_read: block.read,
            blk_write: block.write,
            uptime_seconds,
        }
    }
}

/// Push one stats message per tick until the client goes away, the engine
/// stream ends, or a tick fails.
pub async fn run_stats_session<S, R>(
    engine: Arc<dyn ContainerEngine>,
    container: &str,
    interval: Duration,
    sink: S,
    mut inbound: R,
) -> Result<()>
where
    S: Sink<SessionFrame> + Unpin,
    S::Error: Display,
    R: Stream<Item = SessionFrame> + Unpin,
{
    let mut sink = CloseOnce::new(sink);

    let record = match resolve_container(engine.as_ref(), container).await {
        Ok(record) => record,
        Err(e) => {
            let message = if e.is_not_found() {
                "Container not found".to_string()
            } else {
                e.to_string()
            };
            warn!(%container, error = %e, "Stats session setup failed");
            let _ = sink.send(SessionFrame::error(message)).await;
            sink.close().await;
            return if e.is_not_found() { Ok(()) } else { Err(e) };
        }
    };

    info!(container = %record.name, "Stats session started");
    let mut samples = engine.stats_stream(&record.id);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Set once a tick elapsed and cleared when its sample arrives, so at
    // most one sample is in flight while the client stays observable.
    let mut sample_due = false;
    let outcome = loop {
        tokio::select! {
            frame = inbound.next() => match frame {
                None | Some(SessionFrame::Close) => {
                    debug!(container = %record.name, "Client left stats session");
                    break Ok(());
                }
                Some(_) => continue,
            },
            _ = ticker.tick(), if !sample_due => sample_due = true,
            next = samples.next(), if sample_due => {
                sample_due = false;
                match next {
                    None => {
                        debug!(container = %record.name, "Stats stream ended");
                        break Ok(());
                    }
                    Some(Err(e)) => {
                        warn!(container = %record.name, error = %e, "Stats error");
                        let _ = sink.send(SessionFrame::error(&e)).await;
                        break Err(e);
                    }
                    Some(Ok(sample)) => {
                        let uptime =
                            metrics::uptime_seconds(record.started_at.as_deref(), Utc::now());
                        let message = StatsMessage::from_sample(&sample, uptime);
                        let text = match serde_json::to_string(&message) {
                            Ok(text) => text,
                            Err(e) => break Err(DockhandError::Internal(e.to_string())),
                        };
                        if let Err(e) = sink.send(SessionFrame::Text(text)).await {
                            debug!(container = %record.name, error = %e, "Stats client went away");
                            break Ok(());
                        }
                    }
                }
            }
        }
    };

    info!(container = %record.name, "Stats stream stopped");
    sink.close().await;
    outcome
}

/// Bridge an interactive shell in the container to the client.
///
/// Output is read by a dedicated task into a bounded queue; input frames
/// are written to the exec's stdin in arrival order. Either side closing
/// ends the session, the reader task is aborted and the client sink is
/// closed exactly once.
pub async fn run_terminal_session<S, R>(
    engine: Arc<dyn ContainerEngine>,
    container: &str,
    shell: Vec<String>,
    queue_capacity: usize,
    sink: S,
    mut inbound: R,
) -> Result<()>
where
    S: Sink<SessionFrame> + Unpin,
    S::Error: Display,
    R: Stream<Item = SessionFrame> + Unpin,
{
    let mut sink = CloseOnce::new(sink);

    let exec = match resolve_container(engine.as_ref(), container).await {
        Ok(record) => engine
            .open_exec(&record.id, shell)
            .await
            .map(|exec| (record, exec)),
        Err(e) => Err(e),
    };
    let (record, exec) = match exec {
        Ok(pair) => pair,
        Err(e) => {
            warn!(%container, error = %e, "Terminal session setup failed");
            let _ = sink.send(SessionFrame::error(&e)).await;
            sink.close().await;
            return Err(e);
        }
    };

    info!(container = %record.name, "Terminal session started");
    let mut output = exec.output;
    let mut input = exec.input;
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(queue_capacity.max(1));

    let name = record.name.clone();
    let reader = tokio::spawn(async move {
        while let Some(chunk) = output.next().await {
            match chunk {
                Ok(bytes) => {
                    if tx.send(bytes).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(container = %name, error = %e, "Terminal output error");
                    break;
                }
            }
        }
    });

    let outcome = loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(bytes) => {
                    if let Err(e) = sink.send(SessionFrame::Binary(bytes)).await {
                        debug!(container = %record.name, error = %e, "Terminal client went away");
                        break Ok(());
                    }
                }
                None => {
                    debug!(container = %record.name, "Shell exited");
                    break Ok(());
                }
            },
            frame = inbound.next() => {
                let data = match frame {
                    Some(SessionFrame::Text(text)) => text.into_bytes(),
                    Some(SessionFrame::Binary(bytes)) => bytes,
                    None | Some(SessionFrame::Close) => {
                        debug!(container = %record.name, "Client left terminal session");
                        break Ok(());
                    }
                };
                let written = async {
                    input.write_all(&data).await?;
                    input.flush().await
                }
                .await;
                if let Err(e) = written {
                    warn!(container = %record.name, error = %e, "Terminal input error");
                    let _ = sink.send(SessionFrame::error(&e)).await;
                    break Err(DockhandError::Io(e));
                }
            }
        }
    };

    reader.abort();
    if let Err(e) = input.shutdown().await {
        debug!(container = %record.name, error = %e, "Closing exec stdin failed");
    }
    sink.close().await;
    info!(container = %record.name, "Terminal session closed");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_common::model::{CpuStats, CpuUsage, MemoryStats};

    #[test]
    fn test_error_frame_is_json() {
        let frame = SessionFrame::error("Container not found");
        assert_eq!(
            frame,
            SessionFrame::Text(r#"{"error":"Container not found"}"#.to_string())
        );
    }

    #[test]
    fn test_stats_message_defaults_memory_limit() {
        let sample = StatsSample {
            cpu_stats: CpuStats {
                cpu_usage: CpuUsage {
                    total_usage: 300,
                    percpu_usage: Some(vec![150, 150]),
                },
                system_cpu_usage: Some(2000),
                online_cpus: Some(2),
            },
            precpu_stats: CpuStats {
                cpu_usage: CpuUsage {
                    total_usage: 100,
                    percpu_usage: None,
                },
                system_cpu_usage: Some(1000),
                online_cpus: Some(2),
            },
            memory_stats: MemoryStats {
                usage: Some(0),
                limit: None,
            },
            ..Default::default()
        };
        let message = StatsMessage::from_sample(&sample, Some(5));
        assert_eq!(message.cpu_cores, 2);
        assert_eq!(message.cpu_percent, 40.0);
        assert_eq!(message.memory_limit, 1);
        assert_eq!(message.memory_percent, 0.0);
        assert_eq!(message.uptime_seconds, Some(5));
    }
}
