//! Outbound reply instructions for the chat platform.

use archivist_shared::event::ChatMessage;
use serde::Serialize;

/// One line written to the event bridge's output.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Reply {
    /// Plain message to a channel.
    #[serde(rename_all = "camelCase")]
    Send { channel_id: String, content: String },
    /// Platform-native reply to a specific message.
    #[serde(rename_all = "camelCase")]
    Reply {
        channel_id: String,
        message_id: String,
        content: String,
    },
}

impl Reply {
    /// Answer `message` with `text`. Guild text channels get a mention prefix,
    /// everything else a direct reply.
    pub fn to(message: &ChatMessage, text: impl Into<String>) -> Self {
        let text = text.into();
        if message.is_guild_text() {
            Reply::Send {
                channel_id: message.channel.id.clone(),
                content: format!("<@{}> - {}", message.author.id, text),
            }
        } else {
            Reply::Reply {
                channel_id: message.channel.id.clone(),
                message_id: message.id.clone(),
                content: text,
            }
        }
    }
}

#[cfg(test)]
impl Reply {
    pub fn content(&self) -> &str {
        match self {
            Reply::Send { content, .. } | Reply::Reply { content, .. } => content,
        }
    }
}

/// `<@a>, <@b>` for a list of user IDs.
pub fn join_users<S: AsRef<str>>(ids: &[S]) -> String {
    join_tokens(ids, "<@")
}

/// `<#a>, <#b>` for a list of channel IDs.
pub fn join_channels<S: AsRef<str>>(ids: &[S]) -> String {
    join_tokens(ids, "<#")
}

fn join_tokens<S: AsRef<str>>(ids: &[S], open: &str) -> String {
    ids.iter()
        .map(|id| format!("{open}{}>", id.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}
