//! Ingestion pipeline: chat event → archived revision.
//!
//! An event either ends `Dropped` (not archivable, or ignored) or `Stored`.
//! `Stored` means the record was handed to a background write; the write is
//! at-most-once and its failure is only logged.

use std::sync::Arc;

use archivist_shared::event::{ChatEvent, ChatMessage};
use archivist_shared::mentions;
use archivist_shared::record::MessageRecord;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::archive::Archive;
use crate::visibility::VisibilityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotGuildText,
    IgnoredChannel,
    IgnoredUser,
}

#[derive(Debug)]
pub enum IngestOutcome {
    Dropped(DropReason),
    Stored {
        revision_key: String,
        /// Handle of the background write. Callers normally drop it.
        write: JoinHandle<()>,
    },
}

#[derive(Clone)]
pub struct Ingestor {
    archive: Archive,
    visibility: Arc<VisibilityStore>,
}

impl Ingestor {
    pub fn new(archive: Archive, visibility: Arc<VisibilityStore>) -> Self {
        Self {
            archive,
            visibility,
        }
    }

    /// Why `message` must not be archived, if it must not.
    pub fn drop_reason(&self, message: &ChatMessage) -> Option<DropReason> {
        if !message.is_guild_text() {
            return Some(DropReason::NotGuildText);
        }
        if self.visibility.is_channel_ignored(&message.channel.id) {
            return Some(DropReason::IgnoredChannel);
        }
        if self.visibility.is_user_ignored(&message.author.id) {
            return Some(DropReason::IgnoredUser);
        }
        None
    }

    /// Build the record for the authoritative view of `event`.
    pub fn prepare(&self, event: &ChatEvent) -> Result<MessageRecord, DropReason> {
        let message = event.effective();
        if let Some(reason) = self.drop_reason(message) {
            return Err(reason);
        }

        let rewritten = mentions::rewrite(&message.content, &message.mentions);
        MessageRecord::assemble(message, rewritten).map_err(|e| {
            warn!(message_id = %message.id, error = %e, "message cannot be archived");
            DropReason::NotGuildText
        })
    }

    pub fn ingest(&self, event: &ChatEvent) -> IngestOutcome {
        let record = match self.prepare(event) {
            Ok(record) => record,
            Err(reason) => {
                debug!(
                    message_id = %event.effective().id,
                    ?reason,
                    "message dropped"
                );
                return IngestOutcome::Dropped(reason);
            }
        };

        let revision_key = record.revision_key.clone();
        let archive = self.archive.clone();
        let key = revision_key.clone();
        let write = tokio::spawn(async move {
            match archive.store_revision(record).await {
                Ok(()) => debug!(revision = %key, "message archived"),
                Err(e) => error!(revision = %key, error = %e, "failed to archive message"),
            }
        });

        IngestOutcome::Stored {
            revision_key,
            write,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{message_in, posted};
    use super::*;
    use crate::visibility::test_support::store_in;
    use crate::visibility::ForbiddenList;
    use archivist_shared::event::{ChannelKind, UserMention};
    use archivist_shared::types::RevisionKey;

    async fn stored(outcome: IngestOutcome) -> String {
        match outcome {
            IngestOutcome::Stored {
                revision_key,
                write,
            } => {
                write.await.unwrap();
                revision_key
            }
            IngestOutcome::Dropped(reason) => panic!("unexpected drop: {reason:?}"),
        }
    }

    #[tokio::test]
    async fn ignored_sources_are_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = Arc::new(store_in(dir.path(), ForbiddenList::default()));
        visibility.ignore_channels(&["9".to_string()]);
        visibility.ignore_users(&["66".to_string()]);
        let archive = Archive::in_memory();
        let ingestor = Ingestor::new(archive.clone(), visibility);

        let outcome = ingestor.ingest(&posted(message_in("9", "77", "1", 10)));
        assert!(matches!(
            outcome,
            IngestOutcome::Dropped(DropReason::IgnoredChannel)
        ));

        let outcome = ingestor.ingest(&posted(message_in("10", "66", "2", 10)));
        assert!(matches!(
            outcome,
            IngestOutcome::Dropped(DropReason::IgnoredUser)
        ));

        assert_eq!(archive.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn non_text_channels_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = Arc::new(store_in(dir.path(), ForbiddenList::default()));
        let archive = Archive::in_memory();
        let ingestor = Ingestor::new(archive.clone(), visibility);

        let mut dm = message_in("9", "77", "1", 10);
        dm.channel.kind = ChannelKind::Dm;
        dm.guild = None;

        assert!(matches!(
            ingestor.ingest(&posted(dm)),
            IngestOutcome::Dropped(DropReason::NotGuildText)
        ));
        assert_eq!(archive.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn edit_creates_a_second_revision() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = Arc::new(store_in(dir.path(), ForbiddenList::default()));
        let archive = Archive::in_memory();
        let ingestor = Ingestor::new(archive.clone(), visibility);

        let original = message_in("9", "77", "42", 1_000);
        let mut edited = original.clone();
        edited.content = "message 42, fixed".into();
        edited.edited_timestamp = Some(2_000);

        let first = stored(ingestor.ingest(&posted(original.clone()))).await;
        let second = stored(ingestor.ingest(&ChatEvent::MessageUpdate {
            before: Some(original),
            after: edited,
        }))
        .await;

        assert_eq!(first, "42-1000");
        assert_eq!(second, "42-2000");
        assert_eq!(archive.count().await.unwrap(), 2);

        let old = archive
            .find_revision(RevisionKey::new("42", 1_000))
            .await
            .unwrap()
            .unwrap();
        let new = archive
            .find_revision(RevisionKey::new("42", 2_000))
            .await
            .unwrap()
            .unwrap();
        assert!(!old.edited);
        assert!(new.edited);
        assert_eq!(new.content, "message 42, fixed");
    }

    #[tokio::test]
    async fn mentions_are_rewritten_before_storage() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = Arc::new(store_in(dir.path(), ForbiddenList::default()));
        let archive = Archive::in_memory();
        let ingestor = Ingestor::new(archive.clone(), visibility);

        let mut message = message_in("9", "77", "5", 10);
        message.content = "<@123> hi".into();
        message.mentions.users.push(UserMention {
            id: "123".into(),
            username: "Ann".into(),
            discriminator: "0001".into(),
        });

        stored(ingestor.ingest(&posted(message))).await;

        let record = archive
            .find_revision(RevisionKey::new("5", 10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.content, "<Ann#0001 [123]> hi");
        assert_eq!(record.raw_content, "<@123> hi");
        assert!(record.mentions.users.contains_key("123"));
    }

    #[tokio::test]
    async fn failed_write_still_reports_stored() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = Arc::new(store_in(dir.path(), ForbiddenList::default()));
        let archive = Archive::in_memory();
        let ingestor = Ingestor::new(archive.clone(), visibility);

        let message = message_in("9", "77", "42", 1_000);
        stored(ingestor.ingest(&posted(message.clone()))).await;
        // Same revision again: the store rejects the key, the pipeline moves on.
        stored(ingestor.ingest(&posted(message))).await;

        assert_eq!(archive.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stored_messages_populate_channel_directory() {
        let dir = tempfile::tempdir().unwrap();
        let visibility = Arc::new(store_in(dir.path(), ForbiddenList::default()));
        let archive = Archive::in_memory();
        let ingestor = Ingestor::new(archive.clone(), visibility);

        stored(ingestor.ingest(&posted(message_in("9", "77", "1", 10)))).await;

        let channels = archive.channels().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "channel-9");
        assert_eq!(channels[0].guild_id, "1");
    }
}
