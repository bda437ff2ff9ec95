//! The archived form of a message revision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::event::ChatMessage;
use crate::mentions::{MentionIndex, Rewritten};
use crate::types::RevisionKey;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRecord {
    pub id: String,
    pub name: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub name: String,
    pub url: String,
    pub size: u64,
}

/// One immutable revision of a message as stored in the archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub revision_key: String,
    /// Content with mention tokens rewritten to display form.
    pub content: String,
    pub raw_content: String,
    pub raw_clean_content: String,
    pub channel: ChannelRef,
    pub server: ServerRef,
    pub author: AuthorRecord,
    pub mentions: MentionIndex,
    pub attachments: BTreeMap<String, AttachmentRecord>,
    pub timestamp: i64,
    pub edited: bool,
}

impl MessageRecord {
    /// Build the record for `message` from its rewritten content.
    ///
    /// Only guild messages can be archived; a message without a guild is
    /// rejected with [`EventError::MissingGuild`].
    pub fn assemble(message: &ChatMessage, rewritten: Rewritten) -> Result<Self, EventError> {
        let guild = message
            .guild
            .as_ref()
            .ok_or_else(|| EventError::MissingGuild(message.channel.id.clone()))?;

        let attachments = message
            .attachments
            .iter()
            .map(|att| {
                (
                    att.id.clone(),
                    AttachmentRecord {
                        name: att.filename.clone(),
                        url: att.url.clone(),
                        size: att.size,
                    },
                )
            })
            .collect();

        let author = &message.author;

        Ok(Self {
            id: message.id.clone(),
            revision_key: message.revision_key().store_key(),
            content: rewritten.content,
            raw_content: message.content.clone(),
            raw_clean_content: message.clean_content.clone(),
            channel: ChannelRef {
                id: message.channel.id.clone(),
                name: message.channel.name.clone(),
            },
            server: ServerRef {
                id: guild.id.clone(),
                name: guild.name.clone(),
            },
            author: AuthorRecord {
                id: author.id.clone(),
                name: author.username.clone(),
                discriminator: author.discriminator.clone(),
                avatar: author.avatar.clone(),
                bot: author.bot,
                created_at: author.created_at,
            },
            mentions: rewritten.index,
            attachments,
            timestamp: message.effective_timestamp(),
            edited: message.is_edited(),
        })
    }

    pub fn revision(&self) -> RevisionKey {
        RevisionKey::new(self.id.clone(), self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::text_message;
    use crate::event::{Attachment, UserMention};
    use crate::mentions::rewrite;

    #[test]
    fn assembles_record_with_attachments_and_mentions() {
        let mut msg = text_message("42", "<@123> look");
        msg.mentions.users.push(UserMention {
            id: "123".into(),
            username: "Bob".into(),
            discriminator: "0002".into(),
        });
        msg.attachments.push(Attachment {
            id: "a1".into(),
            filename: "cat.png".into(),
            url: "https://cdn.example/cat.png".into(),
            size: 2048,
        });

        let rewritten = rewrite(&msg.content, &msg.mentions);
        let record = MessageRecord::assemble(&msg, rewritten).unwrap();

        assert_eq!(record.revision_key, "42-1500000000000");
        assert_eq!(record.content, "<Bob#0002 [123]> look");
        assert_eq!(record.raw_content, "<@123> look");
        assert_eq!(record.server.id, "1");
        assert_eq!(record.attachments["a1"].name, "cat.png");
        assert_eq!(record.attachments["a1"].size, 2048);
        assert!(!record.edited);
    }

    #[test]
    fn edited_view_gets_edit_timestamp() {
        let mut msg = text_message("42", "fixed");
        msg.edited_timestamp = Some(1_500_000_000_900);

        let record = MessageRecord::assemble(&msg, rewrite(&msg.content, &msg.mentions)).unwrap();
        assert_eq!(record.timestamp, 1_500_000_000_900);
        assert_eq!(record.revision(), RevisionKey::new("42", 1_500_000_000_900));
        assert!(record.edited);
    }

    #[test]
    fn serializes_camel_case() {
        let msg = text_message("42", "hi");
        let record = MessageRecord::assemble(&msg, rewrite(&msg.content, &msg.mentions)).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["revisionKey"], "42-1500000000000");
        assert_eq!(json["rawCleanContent"], "hi");
        assert_eq!(json["author"]["createdAt"], 1_400_000_000_000i64);
    }
}
