//! Mirrors the archiver's own log lines into the `logs` table.
//!
//! The layer only queues lines; a background task writes them once the
//! database is open. Lines emitted before that are buffered up to
//! [`QUEUE_CAPACITY`]. Lines that find the queue full, or the writer gone,
//! are dropped and counted. The table itself is pruned to the newest
//! [`LOG_RETENTION_ROWS`] entries.

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use archivist_shared::constants::LOG_RETENTION_ROWS;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::archive::Archive;

/// Lines from this module are never mirrored.
const SINK_TARGET: &str = module_path!();

/// Lines waiting for the writer.
pub const QUEUE_CAPACITY: usize = 1024;

/// Mirrored lines between two prune passes.
const PRUNE_INTERVAL: u64 = 500;

struct LogLine {
    level: String,
    target: String,
    message: String,
    timestamp: i64,
}

pub struct StoreLogLayer {
    tx: mpsc::Sender<LogLine>,
    dropped: Arc<AtomicU64>,
}

pub struct LogReceiver {
    rx: mpsc::Receiver<LogLine>,
    dropped: Arc<AtomicU64>,
}

#[cfg(test)]
impl LogReceiver {
    /// Lines the layer discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub fn channel() -> (StoreLogLayer, LogReceiver) {
    channel_with_capacity(QUEUE_CAPACITY)
}

fn channel_with_capacity(capacity: usize) -> (StoreLogLayer, LogReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        StoreLogLayer {
            tx,
            dropped: dropped.clone(),
        },
        LogReceiver { rx, dropped },
    )
}

fn mirrored(level: &Level, target: &str) -> bool {
    *level <= Level::INFO && target.starts_with("archivist") && !target.starts_with(SINK_TARGET)
}

impl<S: Subscriber> Layer<S> for StoreLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if !mirrored(meta.level(), meta.target()) {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let line = LogLine {
            level: meta.level().to_string(),
            target: meta.target().to_string(),
            message: visitor.finish(),
            timestamp: Utc::now().timestamp_millis(),
        };
        if self.tx.try_send(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// `message key=value key=value`
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Drain queued lines into the archive until every layer is dropped.
pub fn spawn_writer(rx: LogReceiver, archive: Archive) -> JoinHandle<()> {
    tokio::spawn(drain(rx, archive, LOG_RETENTION_ROWS))
}

async fn drain(rx: LogReceiver, archive: Archive, keep: u32) {
    let LogReceiver { mut rx, dropped } = rx;
    let mut written = 0u64;

    prune(&archive, keep).await;
    while let Some(line) = rx.recv().await {
        match archive
            .record_log(line.level, line.target, line.message, line.timestamp)
            .await
        {
            Ok(()) => written += 1,
            Err(e) => tracing::warn!(error = %e, "failed to mirror log line"),
        }
        if written > 0 && written % PRUNE_INTERVAL == 0 {
            prune(&archive, keep).await;
        }
    }
    prune(&archive, keep).await;

    tracing::debug!(
        written,
        dropped = dropped.load(Ordering::Relaxed),
        "log mirror stopped"
    );
}

async fn prune(archive: &Archive, keep: u32) {
    match archive.prune_logs(keep).await {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "pruned mirrored log lines"),
        Err(e) => tracing::warn!(error = %e, "failed to prune log lines"),
    }
}
