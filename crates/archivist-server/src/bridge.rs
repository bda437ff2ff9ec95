//! JSON-lines connection to the chat platform.
//!
//! Events arrive one per line on the input stream. Replies produced by the
//! console leave one per line on the output stream. Logging never touches
//! the output stream.

use archivist_shared::event::ChatEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::console::Console;
use crate::ingest::{IngestOutcome, Ingestor};
use crate::reply::Reply;

pub struct Bridge {
    ingestor: Ingestor,
    console: Console,
    replies: mpsc::UnboundedSender<Reply>,
}

impl Bridge {
    pub fn new(ingestor: Ingestor, console: Console, replies: mpsc::UnboundedSender<Reply>) -> Self {
        Self {
            ingestor,
            console,
            replies,
        }
    }

    /// Process events until the input ends.
    pub async fn run<R>(self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut processed = 0u64;

        while let Some(line) = lines.next_line().await? {
            match self.handle_line(&line) {
                Some(IngestOutcome::Stored { revision_key, .. }) => {
                    debug!(revision = %revision_key, "revision queued");
                    processed += 1;
                }
                Some(IngestOutcome::Dropped(_)) => processed += 1,
                None => {}
            }
        }

        info!(processed, "event stream closed");
        Ok(())
    }

    /// Archive the event on `line`, then run it through the console.
    ///
    /// Commands only run for newly posted messages; editing a command does
    /// not run it again.
    pub fn handle_line(&self, line: &str) -> Option<IngestOutcome> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let event: ChatEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping unreadable event");
                return None;
            }
        };
        if let Err(e) = event.validate() {
            warn!(error = %e, "skipping invalid event");
            return None;
        }

        let outcome = self.ingestor.ingest(&event);

        if let ChatEvent::Message { message } = &event {
            if let Some(reply) = self.console.handle(message) {
                if self.replies.send(reply).is_err() {
                    error!("reply writer has stopped, dropping reply");
                }
            }
        }

        Some(outcome)
    }
}

/// Serialize queued replies onto `output`, one JSON object per line, until
/// every sender is dropped. Returns the writer.
pub async fn write_replies<W>(
    mut replies: mpsc::UnboundedReceiver<Reply>,
    mut output: W,
) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    while let Some(reply) = replies.recv().await {
        let mut line = match serde_json::to_string(&reply) {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "failed to encode reply");
                continue;
            }
        };
        line.push('\n');

        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
        debug!(bytes = line.len(), "reply written");
    }
    Ok(output)
}
