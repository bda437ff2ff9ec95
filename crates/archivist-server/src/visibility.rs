//! Visibility rules: what is not archived, what is not revealed, and who may
//! read the archive.
//!
//! - The **ignore list** keeps channels and users out of the archive.
//! - The **forbidden list** hides already archived channels and guilds from
//!   API results. It comes from static configuration.
//! - The **allowed users** may read the API without being admins.
//!
//! The ignore list and the allowed users are shared between the command
//! console and the HTTP API. Every read-modify-persist sequence runs under
//! one lock with no `.await` inside it; the snapshot taken under that lock is
//! handed to the [`SnapshotWriter`] before the lock is released, so files are
//! written in mutation order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::snapshot::SnapshotWriter;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Persisted as `{ "channels": [...], "users": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IgnoreList {
    #[serde(default)]
    pub channels: BTreeSet<String>,
    #[serde(default)]
    pub users: BTreeSet<String>,
}

/// Persisted as `{ "allowedUsers": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub allowed_users: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenList {
    pub channels: BTreeSet<String>,
    pub guilds: BTreeSet<String>,
}

impl ForbiddenList {
    /// Whether data from this channel/guild must be withheld from API results.
    pub fn hides(&self, channel_id: &str, guild_id: &str) -> bool {
        self.channels.contains(channel_id) || self.guilds.contains(guild_id)
    }
}

#[derive(Debug, Error)]
pub enum VisibilityError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Result of applying one batch of IDs to a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// IDs whose membership actually changed.
    pub changed: Vec<String>,
    /// IDs that were already in (or already absent from) the list.
    pub unchanged: Vec<String>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

struct Lists {
    ignore: IgnoreList,
    settings: Settings,
}

pub struct VisibilityStore {
    lists: Mutex<Lists>,
    forbidden: ForbiddenList,
    ignore_path: PathBuf,
    settings_path: PathBuf,
    writer: SnapshotWriter,
}

impl VisibilityStore {
    /// Load both documents. Missing files mean empty lists.
    pub fn load(
        ignore_path: PathBuf,
        settings_path: PathBuf,
        forbidden: ForbiddenList,
        writer: SnapshotWriter,
    ) -> Result<Self, VisibilityError> {
        let ignore = load_ignore(&ignore_path)?;
        let settings = load_settings(&settings_path)?;

        info!(
            ignored_channels = ignore.channels.len(),
            ignored_users = ignore.users.len(),
            allowed_users = settings.allowed_users.len(),
            forbidden_channels = forbidden.channels.len(),
            forbidden_guilds = forbidden.guilds.len(),
            "visibility lists loaded"
        );

        Ok(Self {
            lists: Mutex::new(Lists { ignore, settings }),
            forbidden,
            ignore_path,
            settings_path,
            writer,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Lists> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn is_channel_ignored(&self, channel_id: &str) -> bool {
        self.lock().ignore.channels.contains(channel_id)
    }

    pub fn is_user_ignored(&self, user_id: &str) -> bool {
        self.lock().ignore.users.contains(user_id)
    }

    pub fn is_allowed_user(&self, user_id: &str) -> bool {
        self.lock().settings.allowed_users.contains(user_id)
    }

    pub fn ignore_snapshot(&self) -> IgnoreList {
        self.lock().ignore.clone()
    }

    pub fn allowed_users(&self) -> BTreeSet<String> {
        self.lock().settings.allowed_users.clone()
    }

    pub fn forbidden(&self) -> &ForbiddenList {
        &self.forbidden
    }

    pub fn is_forbidden(&self, channel_id: &str, guild_id: &str) -> bool {
        self.forbidden.hides(channel_id, guild_id)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn ignore_channels(&self, ids: &[String]) -> BatchOutcome {
        self.mutate_ignore(ids, |list| &mut list.channels, true)
    }

    pub fn unignore_channels(&self, ids: &[String]) -> BatchOutcome {
        self.mutate_ignore(ids, |list| &mut list.channels, false)
    }

    pub fn ignore_users(&self, ids: &[String]) -> BatchOutcome {
        self.mutate_ignore(ids, |list| &mut list.users, true)
    }

    pub fn unignore_users(&self, ids: &[String]) -> BatchOutcome {
        self.mutate_ignore(ids, |list| &mut list.users, false)
    }

    pub fn allow_users(&self, ids: &[String]) -> BatchOutcome {
        self.mutate_settings(ids, true)
    }

    pub fn disallow_users(&self, ids: &[String]) -> BatchOutcome {
        self.mutate_settings(ids, false)
    }

    fn mutate_ignore<F>(&self, ids: &[String], select: F, insert: bool) -> BatchOutcome
    where
        F: FnOnce(&mut IgnoreList) -> &mut BTreeSet<String>,
    {
        let mut lists = self.lock();
        let outcome = apply_batch(select(&mut lists.ignore), ids, insert);
        if !outcome.changed.is_empty() {
            submit_snapshot(&self.writer, &self.ignore_path, &lists.ignore);
        }
        outcome
    }

    fn mutate_settings(&self, ids: &[String], insert: bool) -> BatchOutcome {
        let mut lists = self.lock();
        let outcome = apply_batch(&mut lists.settings.allowed_users, ids, insert);
        if !outcome.changed.is_empty() {
            submit_snapshot(&self.writer, &self.settings_path, &lists.settings);
        }
        outcome
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Queue a write of the current ignore list.
    pub fn save_ignore(&self) {
        let lists = self.lock();
        submit_snapshot(&self.writer, &self.ignore_path, &lists.ignore);
    }

    /// Queue a write of the current settings document.
    pub fn save_settings(&self) {
        let lists = self.lock();
        submit_snapshot(&self.writer, &self.settings_path, &lists.settings);
    }

    /// Wait for queued snapshot writes.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }
}

pub fn load_ignore(path: &Path) -> Result<IgnoreList, VisibilityError> {
    load_document(path)
}

pub fn load_settings(path: &Path) -> Result<Settings, VisibilityError> {
    load_document(path)
}

fn load_document<T>(path: &Path) -> Result<T, VisibilityError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if !path.exists() {
        info!(path = %path.display(), "no saved document, starting empty");
        return Ok(T::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| VisibilityError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let doc = serde_json::from_str(&raw).map_err(|source| VisibilityError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    info!(path = %path.display(), "successfully read document");
    Ok(doc)
}

fn submit_snapshot<T: Serialize>(writer: &SnapshotWriter, path: &Path, doc: &T) {
    match serde_json::to_string_pretty(doc) {
        Ok(contents) => writer.submit(path.to_path_buf(), contents),
        Err(e) => error!(path = %path.display(), error = %e, "failed to encode snapshot"),
    }
}

fn apply_batch(set: &mut BTreeSet<String>, ids: &[String], insert: bool) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for id in ids {
        if outcome.changed.contains(id) || outcome.unchanged.contains(id) {
            continue;
        }
        let changed = if insert {
            set.insert(id.clone())
        } else {
            set.remove(id)
        };
        if changed {
            outcome.changed.push(id.clone());
        } else {
            outcome.unchanged.push(id.clone());
        }
    }
    outcome
}


#[cfg(test)]
mod tests {
    use super::test_support::store_in;
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_files_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), ForbiddenList::default());

        assert_eq!(store.ignore_snapshot(), IgnoreList::default());
        assert!(store.allowed_users().is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignore.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            load_ignore(&path),
            Err(VisibilityError::Parse { .. })
        ));
    }

    #[test]
    fn existing_documents_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"allowedUsers": ["5", "6"]}"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.allowed_users.len(), 2);
    }

    #[tokio::test]
    async fn allow_twice_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), ForbiddenList::default());

        let first = store.allow_users(&ids(&["123"]));
        store.flush().await;
        assert_eq!(first.changed, ids(&["123"]));
        assert_eq!(store.writer().completed(), 1);

        let second = store.allow_users(&ids(&["123"]));
        store.flush().await;
        assert!(second.changed.is_empty());
        assert_eq!(second.unchanged, ids(&["123"]));
        assert_eq!(store.writer().completed(), 1);

        let raw = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["allowedUsers"], serde_json::json!(["123"]));
    }

    #[tokio::test]
    async fn batch_reports_each_id_and_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), ForbiddenList::default());
        store.allow_users(&ids(&["1"]));

        let outcome = store.allow_users(&ids(&["1", "2", "3", "2"]));
        store.flush().await;

        assert_eq!(outcome.changed, ids(&["2", "3"]));
        assert_eq!(outcome.unchanged, ids(&["1"]));
        assert_eq!(store.writer().completed(), 2);
        assert_eq!(store.allowed_users().len(), 3);
    }

    #[tokio::test]
    async fn removing_absent_id_is_reported_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), ForbiddenList::default());

        let outcome = store.unignore_channels(&ids(&["9"]));
        store.flush().await;

        assert_eq!(outcome.unchanged, ids(&["9"]));
        assert_eq!(store.writer().completed(), 0);
        assert!(!dir.path().join("ignore.json").exists());
    }

    #[tokio::test]
    async fn ignore_list_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), ForbiddenList::default());

        store.ignore_channels(&ids(&["9"]));
        store.ignore_users(&ids(&["77"]));
        store.flush().await;
        assert!(store.is_channel_ignored("9"));
        assert!(store.is_user_ignored("77"));

        let reloaded = load_ignore(&dir.path().join("ignore.json")).unwrap();
        assert_eq!(reloaded, store.ignore_snapshot());

        store.unignore_users(&ids(&["77"]));
        store.flush().await;
        let reloaded = load_ignore(&dir.path().join("ignore.json")).unwrap();
        assert!(reloaded.users.is_empty());
        assert!(reloaded.channels.contains("9"));
    }

    #[test]
    fn forbidden_hides_by_channel_or_guild() {
        let forbidden = ForbiddenList {
            channels: ["9".to_string()].into(),
            guilds: ["2".to_string()].into(),
        };
        assert!(forbidden.hides("9", "1"));
        assert!(forbidden.hides("10", "2"));
        assert!(!forbidden.hides("10", "1"));
    }
}
