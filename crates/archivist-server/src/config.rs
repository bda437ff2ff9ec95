//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the archiver can start with zero
//! configuration for local development.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::PathBuf;

use archivist_shared::constants::{
    DEFAULT_COMMAND_PREFIX, DEFAULT_HTTP_PORT, DEFAULT_MAX_LIST_LIMIT,
};
use archivist_shared::types::is_snowflake;

use crate::visibility::ForbiddenList;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether the HTTP API is served at all.
    /// Env: `HTTP_ENABLED` (true/false)
    /// Default: `true`
    pub http_enabled: bool,

    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// SQLite archive file.
    /// Env: `DATABASE_PATH`
    /// Default: `None` (platform data directory).
    pub database_path: Option<PathBuf>,

    /// Ignore-list document.
    /// Env: `IGNORE_FILE`
    /// Default: `./data/ignore.json`
    pub ignore_file: PathBuf,

    /// Settings document (allowed users).
    /// Env: `SETTINGS_FILE`
    /// Default: `./data/settings.json`
    pub settings_file: PathBuf,

    /// Identities allowed to run console commands and read the API.
    /// Env: `ADMINS` (comma-separated IDs)
    pub admins: BTreeSet<String>,

    /// Channels and guilds hidden from API results.
    /// Env: `FORBIDDEN_CHANNELS`, `FORBIDDEN_GUILDS` (comma-separated IDs)
    pub forbidden: ForbiddenList,

    /// Static API tokens that need no other authentication.
    /// Env: `API_TOKENS` (comma-separated)
    pub api_tokens: Vec<String>,

    /// Prefix for admin console commands.
    /// Env: `CMD_PREFIX`
    /// Default: `!`
    pub command_prefix: String,

    /// Ceiling for the `limit` parameter of list queries.
    /// Env: `MAX_LIMIT`
    /// Default: `50`
    pub max_limit: u32,

    /// OAuth2 client ID of the bot, used for the `invite` command.
    /// Env: `BOT_CLIENT_ID`
    pub bot_client_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_enabled: true,
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            ignore_file: PathBuf::from("./data/ignore.json"),
            settings_file: PathBuf::from("./data/settings.json"),
            admins: BTreeSet::new(),
            forbidden: ForbiddenList::default(),
            api_tokens: Vec::new(),
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            max_limit: DEFAULT_MAX_LIST_LIMIT,
            bot_client_id: String::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("HTTP_ENABLED") {
            config.http_enabled = parse_flag(&val);
        }

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH").filter(|p| !p.is_empty()) {
            config.database_path = Some(PathBuf::from(path));
        }

        if let Some(path) = lookup("IGNORE_FILE").filter(|p| !p.is_empty()) {
            config.ignore_file = PathBuf::from(path);
        }

        if let Some(path) = lookup("SETTINGS_FILE").filter(|p| !p.is_empty()) {
            config.settings_file = PathBuf::from(path);
        }

        if let Some(val) = lookup("ADMINS") {
            config.admins = parse_id_list("ADMINS", &val);
        }

        if let Some(val) = lookup("FORBIDDEN_CHANNELS") {
            config.forbidden.channels = parse_id_list("FORBIDDEN_CHANNELS", &val);
        }

        if let Some(val) = lookup("FORBIDDEN_GUILDS") {
            config.forbidden.guilds = parse_id_list("FORBIDDEN_GUILDS", &val);
        }

        if let Some(val) = lookup("API_TOKENS") {
            config.api_tokens = split_list(&val).map(str::to_string).collect();
        }

        if let Some(prefix) = lookup("CMD_PREFIX") {
            if prefix.trim().is_empty() {
                tracing::warn!("Empty CMD_PREFIX, using default");
            } else {
                config.command_prefix = prefix.trim().to_string();
            }
        }

        if let Some(val) = lookup("MAX_LIMIT") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.max_limit = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_LIMIT, using default"),
            }
        }

        if let Some(id) = lookup("BOT_CLIENT_ID") {
            config.bot_client_id = id.trim().to_string();
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn parse_flag(val: &str) -> bool {
    val != "false" && val != "0"
}

fn split_list(val: &str) -> impl Iterator<Item = &str> {
    val.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_id_list(var: &str, val: &str) -> BTreeSet<String> {
    split_list(val)
        .inspect(|id| {
            if !is_snowflake(id) {
                tracing::warn!(var, id, "Configured ID is not numeric");
            }
        })
        .map(str::to_string)
        .collect()
}
