//! Background writer for JSON snapshot files.
//!
//! Visibility lists are persisted by handing a fully serialized snapshot to
//! this writer. A single task applies writes in submission order, so a later
//! snapshot can never be overwritten by an earlier one, even when a write
//! overruns [`WRITE_TIMEOUT`]. Callers never wait on a write; failures and
//! timeouts are logged and counted.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

/// A background write still running after this long is reported as failed.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-write suffix for temp file names.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

enum WriterMsg {
    Write { path: PathBuf, contents: String },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Default)]
struct WriterStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

#[derive(Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriterMsg>,
    stats: Arc<WriterStats>,
}

impl SnapshotWriter {
    /// Start the writer task on the current runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(WriterStats::default());
        tokio::spawn(run(rx, stats.clone()));
        Self { tx, stats }
    }

    /// Queue `contents` to replace the file at `path`.
    pub fn submit(&self, path: PathBuf, contents: String) {
        if self.tx.send(WriterMsg::Write { path, contents }).is_err() {
            error!("snapshot writer has stopped, dropping write");
            self.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Wait until every write submitted before this call has been attempted.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriterMsg::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub fn completed(&self) -> u64 {
        self.stats.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.stats.failed.load(Ordering::Relaxed)
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<WriterMsg>, stats: Arc<WriterStats>) {
    while let Some(msg) = rx.recv().await {
        match msg {
            WriterMsg::Write { path, contents } => {
                let target = path.clone();
                let mut job = tokio::task::spawn_blocking(move || write_atomic(&target, &contents));

                match tokio::time::timeout(WRITE_TIMEOUT, &mut job).await {
                    Ok(Ok(Ok(()))) => {
                        stats.completed.fetch_add(1, Ordering::Relaxed);
                        debug!(path = %path.display(), "snapshot written");
                    }
                    Ok(Ok(Err(e))) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        error!(path = %path.display(), error = %e, "failed to write snapshot");
                    }
                    Ok(Err(e)) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        error!(path = %path.display(), error = %e, "snapshot write task panicked");
                    }
                    Err(_) => {
                        stats.failed.fetch_add(1, Ordering::Relaxed);
                        error!(path = %path.display(), "snapshot write timed out");
                        // The blocking job cannot be cancelled. Let it finish
                        // before the next write so it cannot land after it.
                        let _ = job.await;
                    }
                }
            }
            WriterMsg::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

/// Write through a temporary sibling file and rename over the destination.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp_path = temp_path_for(parent, path);
    std::fs::write(&temp_path, contents)?;
    std::fs::rename(&temp_path, path)
}

fn temp_path_for(parent: &Path, path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    parent.join(format!(".{file_name}.tmp-{}-{seq}", std::process::id()))
}
