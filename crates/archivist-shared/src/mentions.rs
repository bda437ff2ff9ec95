//! Mention rewriting.
//!
//! Platform mention tokens (`<#id>`, `<@&id>`, `<@id>`, `<@!id>`) are replaced
//! with readable text, and every mentioned entity is collected into a
//! [`MentionIndex`] keyed by its ID. The token shapes of the three classes are
//! disjoint, so the classes can be processed in any order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{ChannelMention, Mentions, RoleMention, UserMention};

/// Mentioned entities keyed by platform ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MentionIndex {
    pub channels: BTreeMap<String, ChannelMention>,
    pub roles: BTreeMap<String, RoleMention>,
    pub users: BTreeMap<String, UserMention>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewritten {
    pub content: String,
    pub index: MentionIndex,
}

/// `username#discriminator`
pub fn user_tag(username: &str, discriminator: &str) -> String {
    format!("{username}#{discriminator}")
}

/// Rewrite `content` using the mention collections attached to its event.
pub fn rewrite(content: &str, mentions: &Mentions) -> Rewritten {
    let mut content = content.to_string();
    let mut index = MentionIndex::default();

    for channel in &mentions.channels {
        content = content.replace(&format!("<#{}>", channel.id), &format!("#{}", channel.name));
        index.channels.insert(channel.id.clone(), channel.clone());
    }

    for role in &mentions.roles {
        content = content.replace(&format!("<@&{}>", role.id), &format!("@{}", role.name));
        index.roles.insert(role.id.clone(), role.clone());
    }

    for user in &mentions.users {
        let display = format!(
            "<{} [{}]>",
            user_tag(&user.username, &user.discriminator),
            user.id
        );
        content = content
            .replace(&format!("<@{}>", user.id), &display)
            .replace(&format!("<@!{}>", user.id), &display);
        index.users.insert(user.id.clone(), user.clone());
    }

    Rewritten { content, index }
}
