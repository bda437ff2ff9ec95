//! Inbound chat events.
//!
//! These are the only shapes the rest of the workspace sees from the chat
//! platform. The event bridge deserializes them from JSON and calls
//! [`ChatEvent::validate`] once; downstream code trusts the fields.

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::types::RevisionKey;

/// A message creation or edit delivered by the chat platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    /// A new message was posted.
    Message { message: ChatMessage },
    /// An existing message was edited. `after` is the authoritative view.
    MessageUpdate {
        #[serde(default)]
        before: Option<ChatMessage>,
        after: ChatMessage,
    },
}

impl ChatEvent {
    /// The view of the message that should be archived and acted upon.
    pub fn effective(&self) -> &ChatMessage {
        match self {
            ChatEvent::Message { message } => message,
            ChatEvent::MessageUpdate { after, .. } => after,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(self, ChatEvent::MessageUpdate { .. })
    }

    pub fn validate(&self) -> Result<(), EventError> {
        self.effective().validate()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Dm,
    Group,
    Voice,
    Category,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatChannel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Guild {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
    /// Account creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelMention {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoleMention {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default)]
    pub hex_color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserMention {
    pub id: String,
    pub username: String,
    pub discriminator: String,
}

/// Mention collections in the order the platform reported them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mentions {
    #[serde(default)]
    pub channels: Vec<ChannelMention>,
    #[serde(default)]
    pub roles: Vec<RoleMention>,
    #[serde(default)]
    pub users: Vec<UserMention>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

/// One view of a chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    /// Content with mentions flattened by the platform itself.
    #[serde(default)]
    pub clean_content: String,
    pub channel: ChatChannel,
    #[serde(default)]
    pub guild: Option<Guild>,
    pub author: Author,
    #[serde(default)]
    pub mentions: Mentions,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Milliseconds since the Unix epoch.
    pub created_timestamp: i64,
    #[serde(default)]
    pub edited_timestamp: Option<i64>,
}

impl ChatMessage {
    pub fn validate(&self) -> Result<(), EventError> {
        if self.id.is_empty() {
            return Err(EventError::EmptyField("id"));
        }
        if self.channel.id.is_empty() {
            return Err(EventError::EmptyField("channel.id"));
        }
        if self.author.id.is_empty() {
            return Err(EventError::EmptyField("author.id"));
        }
        if self.channel.kind == ChannelKind::Text && self.guild.is_none() {
            return Err(EventError::MissingGuild(self.channel.id.clone()));
        }
        Ok(())
    }

    /// Edit timestamp when present, otherwise the creation timestamp.
    pub fn effective_timestamp(&self) -> i64 {
        self.edited_timestamp.unwrap_or(self.created_timestamp)
    }

    pub fn is_edited(&self) -> bool {
        self.edited_timestamp.is_some()
    }

    pub fn revision_key(&self) -> RevisionKey {
        RevisionKey::new(self.id.clone(), self.effective_timestamp())
    }

    /// Guild text channels are the only ones that get archived, and the only
    /// ones where replies mention the requester.
    pub fn is_guild_text(&self) -> bool {
        self.channel.kind == ChannelKind::Text && self.guild.is_some()
    }
}
