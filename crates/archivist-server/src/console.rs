//! In-band admin commands.
//!
//! A message is a command when its author is an admin and its content is the
//! configured prefix immediately followed by a known command name. Anything
//! else (including unknown names) is ignored without a reply.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use archivist_shared::constants::bot_invite_url;
use archivist_shared::event::ChatMessage;
use archivist_shared::types::is_snowflake;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::reply::{join_channels, join_users, Reply};
use crate::visibility::{BatchOutcome, VisibilityStore};

/// Handler identity. Aliases map to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    AllowUsers,
    DisallowUsers,
    IgnoreChannels,
    UnignoreChannels,
    IgnoreUsers,
    UnignoreUsers,
    ListIgnoredChannels,
    ListIgnoredUsers,
    ListAllowedUsers,
    ListAdmins,
    ListCommands,
    Invite,
}

const COMMANDS: &[(&str, CommandId)] = &[
    ("adduser", CommandId::AllowUsers),
    ("addusers", CommandId::AllowUsers),
    ("deluser", CommandId::DisallowUsers),
    ("delusers", CommandId::DisallowUsers),
    ("ignorechannel", CommandId::IgnoreChannels),
    ("ic", CommandId::IgnoreChannels),
    ("unignorechannel", CommandId::UnignoreChannels),
    ("uic", CommandId::UnignoreChannels),
    ("ignoreuser", CommandId::IgnoreUsers),
    ("iu", CommandId::IgnoreUsers),
    ("unignoreuser", CommandId::UnignoreUsers),
    ("uiu", CommandId::UnignoreUsers),
    ("channels", CommandId::ListIgnoredChannels),
    ("ignoredusers", CommandId::ListIgnoredUsers),
    ("users", CommandId::ListAllowedUsers),
    ("admins", CommandId::ListAdmins),
    ("commands", CommandId::ListCommands),
    ("invite", CommandId::Invite),
];

/// Lower-cased command name → handler.
pub struct Registry {
    by_name: BTreeMap<&'static str, CommandId>,
}

impl Registry {
    pub fn standard() -> Self {
        Self {
            by_name: COMMANDS.iter().copied().collect(),
        }
    }

    pub fn resolve(&self, name: &str) -> Option<CommandId> {
        self.by_name.get(name.to_lowercase().as_str()).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

/// What a target-taking command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    User,
    Channel,
}

pub struct Console {
    registry: Registry,
    visibility: Arc<VisibilityStore>,
    admins: BTreeSet<String>,
    prefix: String,
    bot_client_id: String,
}

impl Console {
    pub fn new(config: &ServerConfig, visibility: Arc<VisibilityStore>) -> Self {
        Self {
            registry: Registry::standard(),
            visibility,
            admins: config.admins.clone(),
            prefix: config.command_prefix.clone(),
            bot_client_id: config.bot_client_id.clone(),
        }
    }

    /// Resolve `message` to a command and its whitespace-split tokens.
    /// Token 0 is the command name itself.
    pub fn parse<'a>(&self, message: &'a ChatMessage) -> Option<(CommandId, Vec<&'a str>)> {
        if !self.admins.contains(&message.author.id) {
            return None;
        }

        let rest = message.content.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return None;
        }

        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let command = self.registry.resolve(tokens.first()?)?;
        Some((command, tokens))
    }

    /// Run the command carried by `message`, if any.
    pub fn handle(&self, message: &ChatMessage) -> Option<Reply> {
        let (command, tokens) = self.parse(message)?;
        info!(
            author = %message.author.id,
            ?command,
            "running console command"
        );

        let text = self.execute(command, message, &tokens);
        Some(Reply::to(message, text))
    }

    fn execute(&self, command: CommandId, message: &ChatMessage, tokens: &[&str]) -> String {
        match command {
            CommandId::AllowUsers => self.apply(message, tokens, TargetKind::User, |ids| {
                let outcome = self.visibility.allow_users(ids);
                summarize(
                    &outcome,
                    |id| format!("<@{id}> is already an allowed user."),
                    |ids| format!("Added {} to the allowed users.", join_users(ids)),
                )
            }),
            CommandId::DisallowUsers => self.apply(message, tokens, TargetKind::User, |ids| {
                let outcome = self.visibility.disallow_users(ids);
                summarize(
                    &outcome,
                    |id| format!("<@{id}> is not an allowed user."),
                    |ids| format!("Removed {} from the allowed users.", join_users(ids)),
                )
            }),
            CommandId::IgnoreChannels => {
                self.apply(message, tokens, TargetKind::Channel, |ids| {
                    let outcome = self.visibility.ignore_channels(ids);
                    summarize(
                        &outcome,
                        |id| format!("<#{id}> is already ignored."),
                        |ids| format!("Now ignoring {}.", join_channels(ids)),
                    )
                })
            }
            CommandId::UnignoreChannels => {
                self.apply(message, tokens, TargetKind::Channel, |ids| {
                    let outcome = self.visibility.unignore_channels(ids);
                    summarize(
                        &outcome,
                        |id| format!("<#{id}> is not ignored."),
                        |ids| format!("No longer ignoring {}.", join_channels(ids)),
                    )
                })
            }
            CommandId::IgnoreUsers => self.apply(message, tokens, TargetKind::User, |ids| {
                let outcome = self.visibility.ignore_users(ids);
                summarize(
                    &outcome,
                    |id| format!("<@{id}> is already ignored."),
                    |ids| format!("Now ignoring {}.", join_users(ids)),
                )
            }),
            CommandId::UnignoreUsers => self.apply(message, tokens, TargetKind::User, |ids| {
                let outcome = self.visibility.unignore_users(ids);
                summarize(
                    &outcome,
                    |id| format!("<@{id}> is not ignored."),
                    |ids| format!("No longer ignoring {}.", join_users(ids)),
                )
            }),
            CommandId::ListIgnoredChannels => {
                let ids: Vec<String> = self.visibility.ignore_snapshot().channels.into_iter().collect();
                listing("Ignored channels", "No channels are ignored.", &join_channels(&ids))
            }
            CommandId::ListIgnoredUsers => {
                let ids: Vec<String> = self.visibility.ignore_snapshot().users.into_iter().collect();
                listing("Ignored users", "No users are ignored.", &join_users(&ids))
            }
            CommandId::ListAllowedUsers => {
                let ids: Vec<String> = self.visibility.allowed_users().into_iter().collect();
                listing("Allowed users", "There are no allowed users.", &join_users(&ids))
            }
            CommandId::ListAdmins => {
                let ids: Vec<&String> = self.admins.iter().collect();
                listing("Admins", "There are no admins.", &join_users(&ids))
            }
            CommandId::ListCommands => {
                let names: Vec<String> = self
                    .registry
                    .names()
                    .map(|name| format!("`{}{name}`", self.prefix))
                    .collect();
                format!("Commands: {}", names.join(", "))
            }
            CommandId::Invite => {
                if self.bot_client_id.is_empty() {
                    "No bot client ID is configured.".to_string()
                } else {
                    bot_invite_url(&self.bot_client_id)
                }
            }
        }
    }

    /// Resolve targets and run `mutate` on them, or return a usage hint.
    fn apply<F>(&self, message: &ChatMessage, tokens: &[&str], kind: TargetKind, mutate: F) -> String
    where
        F: FnOnce(&[String]) -> String,
    {
        let targets = resolve_targets(message, tokens, kind);
        if targets.is_empty() {
            debug!(command = tokens.first().copied().unwrap_or_default(), "no targets");
            return self.usage(tokens.first().copied().unwrap_or_default(), kind);
        }
        mutate(&targets)
    }

    fn usage(&self, name: &str, kind: TargetKind) -> String {
        let name = name.to_lowercase();
        match kind {
            TargetKind::User => format!(
                "Usage: `{p}{name} @user` or `{p}{name} <user ID>`",
                p = self.prefix
            ),
            TargetKind::Channel => format!(
                "Usage: `{p}{name} #channel` or `{p}{name} <channel ID>`",
                p = self.prefix
            ),
        }
    }
}

/// Mentions first; otherwise the token after the command, when numeric.
fn resolve_targets(message: &ChatMessage, tokens: &[&str], kind: TargetKind) -> Vec<String> {
    let mentioned: Vec<&str> = match kind {
        TargetKind::User => message.mentions.users.iter().map(|u| u.id.as_str()).collect(),
        TargetKind::Channel => message
            .mentions
            .channels
            .iter()
            .map(|c| c.id.as_str())
            .collect(),
    };

    let candidates: Vec<&str> = if mentioned.is_empty() {
        tokens
            .get(1)
            .copied()
            .filter(|token| is_snowflake(token))
            .into_iter()
            .collect()
    } else {
        mentioned
    };

    let mut seen = BTreeSet::new();
    candidates
        .into_iter()
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// Per-ID notices for the unchanged IDs, then one confirmation line.
fn summarize<N, C>(outcome: &BatchOutcome, notice: N, confirm: C) -> String
where
    N: Fn(&str) -> String,
    C: FnOnce(&[String]) -> String,
{
    let mut lines: Vec<String> = outcome.unchanged.iter().map(|id| notice(id.as_str())).collect();
    if !outcome.changed.is_empty() {
        lines.push(confirm(outcome.changed.as_slice()));
    }
    lines.join("\n")
}

fn listing(title: &str, empty: &str, joined: &str) -> String {
    if joined.is_empty() {
        empty.to_string()
    } else {
        format!("{title}: {joined}")
    }
}
