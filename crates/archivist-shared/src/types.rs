use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Identity of one archived revision: a message ID plus the timestamp of the
/// view that was stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    pub id: String,
    pub timestamp: i64,
}

impl RevisionKey {
    pub fn new(id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }

    /// Parse the `<messageId>_<timestamp>` form accepted by the lookup API.
    pub fn parse_lookup(s: &str) -> Result<Self, EventError> {
        let malformed = || EventError::MalformedRevisionId(s.to_string());

        let (id, ts) = s.trim().rsplit_once('_').ok_or_else(malformed)?;
        if id.is_empty() {
            return Err(malformed());
        }
        let timestamp = ts.parse::<i64>().map_err(|_| malformed())?;

        Ok(Self::new(id, timestamp))
    }

    /// Store key, `<messageId>-<timestamp>`.
    pub fn store_key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.id, self.timestamp)
    }
}

/// Platform IDs are decimal snowflakes.
pub fn is_snowflake(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
