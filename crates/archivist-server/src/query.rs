//! Read side of the archive: parameter validation, lookups and forbidden
//! redaction.

use archivist_shared::constants::DEFAULT_LIST_LIMIT;
use archivist_shared::record::MessageRecord;
use archivist_shared::types::RevisionKey;
use archivist_store::{ChannelEntry, MessageFilter};
use serde::Deserialize;

use crate::archive::Archive;
use crate::error::ApiError;
use crate::visibility::{ForbiddenList, VisibilityStore};

/// Raw query string of `GET /api/messages`. Numbers stay strings so bad
/// input surfaces as a 400 with a readable message.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub user: Option<String>,
    pub channel: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Validated list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub user: Option<String>,
    pub channel: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ListParams {
    pub fn validate(self, max_limit: u32) -> Result<ListQuery, ApiError> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LIST_LIMIT,
            Some(raw) => match raw.parse::<u32>() {
                Ok(0) | Err(_) => {
                    return Err(ApiError::BadRequest(format!(
                        "The \"limit\" specified ({raw}) is not a positive integer."
                    )))
                }
                Ok(n) if n > max_limit => {
                    return Err(ApiError::BadRequest(format!(
                        "The \"limit\" specified ({n}) is higher than maximum ({max_limit}) allowed."
                    )))
                }
                Ok(n) => n,
            },
        };

        let offset = match self.offset.as_deref().map(str::trim) {
            None | Some("") => 0,
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ApiError::BadRequest(format!(
                    "The \"offset\" specified ({raw}) is not a non-negative integer."
                ))
            })?,
        };

        let user = non_empty(self.user);
        let channel = non_empty(self.channel);
        if user.is_none() && channel.is_none() {
            return Err(ApiError::BadRequest(
                "Either a Discord channel ID or a Discord user ID (or both) has to be specified."
                    .into(),
            ));
        }

        Ok(ListQuery {
            user,
            channel,
            limit,
            offset,
        })
    }
}

impl ListQuery {
    pub fn filter(&self) -> MessageFilter {
        MessageFilter {
            user_id: self.user.clone(),
            channel_id: self.channel.clone(),
            limit: Some(self.limit),
            offset: self.offset,
            ..MessageFilter::default()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Filtered page of revisions, newest first, minus forbidden sources.
pub async fn list_messages(
    archive: &Archive,
    visibility: &VisibilityStore,
    query: &ListQuery,
) -> Result<Vec<MessageRecord>, ApiError> {
    let records = archive.query(query.filter()).await?;
    Ok(redact(records, visibility.forbidden()))
}

/// Exact lookup of one revision by `<messageId>_<timestamp>`.
///
/// Not redacted: a caller who already knows the key gets the record even
/// when its channel or guild is forbidden.
pub async fn lookup(archive: &Archive, id: &str) -> Result<Vec<MessageRecord>, ApiError> {
    let key = RevisionKey::parse_lookup(id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(archive.find_revision(key).await?.into_iter().collect())
}

/// Channel directory minus ignored and forbidden channels.
pub async fn list_channels(
    archive: &Archive,
    visibility: &VisibilityStore,
) -> Result<Vec<ChannelEntry>, ApiError> {
    let ignored = visibility.ignore_snapshot().channels;

    Ok(archive
        .channels()
        .await?
        .into_iter()
        .filter(|c| !ignored.contains(&c.id) && !visibility.is_forbidden(&c.id, &c.guild_id))
        .collect())
}

pub fn redact(records: Vec<MessageRecord>, forbidden: &ForbiddenList) -> Vec<MessageRecord> {
    records
        .into_iter()
        .filter(|r| !forbidden.hides(&r.channel.id, &r.server.id))
        .collect()
}
