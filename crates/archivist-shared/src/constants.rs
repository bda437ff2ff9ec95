/// Application name
pub const APP_NAME: &str = "archivist";

/// Default prefix for admin console commands
pub const DEFAULT_COMMAND_PREFIX: &str = "!";

/// Store collection holding archived message revisions
pub const MESSAGES_COLLECTION: &str = "messages";

/// Store collection holding mirrored log entries
pub const LOGS_COLLECTION: &str = "logs";

/// Number of mirrored log entries kept; older rows are pruned
pub const LOG_RETENTION_ROWS: u32 = 10_000;

/// Default number of records returned by a list query
pub const DEFAULT_LIST_LIMIT: u32 = 25;

/// Default hard ceiling for the list query `limit`
pub const DEFAULT_MAX_LIST_LIMIT: u32 = 50;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Permissions bitfield requested by the bot invite link
pub const BOT_INVITE_PERMISSIONS: u64 = 84992;

/// Build the OAuth2 authorization URL used to invite the bot to a guild.
pub fn bot_invite_url(client_id: &str) -> String {
    format!(
        "https://discordapp.com/oauth2/authorize?client_id={client_id}&scope=bot&permissions={BOT_INVITE_PERMISSIONS}"
    )
}
