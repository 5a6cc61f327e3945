//! Database module for LiveCheck.
//!
//! Provides SQLite storage with automatic migrations, exposed to the
//! monitoring engine through the [`SiteDirectory`] and [`OutcomeLog`] traits.

mod models;
mod store;

pub use models::*;
pub use store::*;

use chrono::{DateTime, Utc};

/// Source of the sites to be probed.
pub trait SiteDirectory: Send + Sync {
    /// All registered sites.
    fn list_sites(&self) -> Result<Vec<Site>, DbError>;

    /// A single site, or [`DbError::NotFound`].
    fn get_site(&self, id: i64) -> Result<Site, DbError>;
}

/// Append-only log of probe outcomes.
///
/// Implementations serialize their own concurrent appends.
pub trait OutcomeLog: Send + Sync {
    fn append_outcome(&self, outcome: &NewOutcome) -> Result<ProbeOutcome, DbError>;

    /// Outcomes for a site in timestamp order, optionally only those at or
    /// after `since`.
    fn query_outcomes(
        &self,
        site_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ProbeOutcome>, DbError>;

    /// The outcome with the greatest timestamp.
    fn latest_outcome(&self, site_id: i64) -> Result<Option<ProbeOutcome>, DbError>;

    /// Up to `limit` outcomes, newest first.
    fn recent_outcomes(&self, site_id: i64, limit: u32) -> Result<Vec<ProbeOutcome>, DbError>;
}
