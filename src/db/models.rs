//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a site name.
pub const MAX_SITE_NAME_LEN: usize = 100;
/// Maximum length of a site URL.
pub const MAX_SITE_URL_LEN: usize = 255;

/// A monitored website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    /// Owning account. Accounts live outside this service.
    pub owner_id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration input for a site.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSite {
    pub owner_id: i64,
    pub name: String,
    pub url: String,
}

impl NewSite {
    /// Check field lengths before the row is written.
    pub fn validate(&self) -> Result<(), String> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > MAX_SITE_NAME_LEN {
            return Err(format!(
                "name must be between 1 and {} characters",
                MAX_SITE_NAME_LEN
            ));
        }

        let url = self.url.trim();
        if url.is_empty() || url.len() > MAX_SITE_URL_LEN {
            return Err(format!(
                "url must be between 1 and {} characters",
                MAX_SITE_URL_LEN
            ));
        }

        Ok(())
    }
}

/// A single recorded probe outcome. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutcome {
    pub id: i64,
    pub site_id: i64,
    /// HTTP status code, or 0 for a connection-level failure
    pub status_code: u16,
    /// Elapsed time in whole milliseconds
    pub response_time: i64,
    pub is_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// An outcome about to be appended.
#[derive(Debug, Clone)]
pub struct NewOutcome {
    pub site_id: i64,
    pub status_code: u16,
    pub response_time: i64,
    pub is_up: bool,
    pub error_message: Option<String>,
    pub checked_at: DateTime<Utc>,
}
