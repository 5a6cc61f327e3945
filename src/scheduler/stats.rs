//! Windowed uptime and latency statistics.

use super::cache::SiteCache;
use crate::db::{DbError, OutcomeLog, ProbeOutcome, Site, SiteDirectory};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Trailing windows reported per site, in days. Zero means lifetime.
pub const WINDOWS: [u32; 4] = [0, 7, 30, 90];

/// Uptime statistics over one window.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UptimeStats {
    pub total_checks: u64,
    pub successful_checks: u64,
    /// Percentage of up outcomes, 0 when there are none at all
    pub uptime_percentage: f64,
    /// Mean response time of up outcomes in milliseconds
    pub average_response_time: f64,
}

impl UptimeStats {
    /// Fold outcomes into window statistics in a single pass.
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a ProbeOutcome>,
    {
        let (total, successful, up_latency_sum) =
            outcomes
                .into_iter()
                .fold((0u64, 0u64, 0i128), |(total, up, sum), o| {
                    if o.is_up {
                        (total + 1, up + 1, sum + i128::from(o.response_time))
                    } else {
                        (total + 1, up, sum)
                    }
                });

        let uptime_percentage = if total > 0 {
            successful as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        let average_response_time = if successful > 0 {
            up_latency_sum as f64 / successful as f64
        } else {
            0.0
        };

        Self {
            total_checks: total,
            successful_checks: successful,
            uptime_percentage,
            average_response_time,
        }
    }
}

/// A site with its latest outcome and statistics for every window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteWithStats {
    pub site: Site,
    pub current_status: Option<ProbeOutcome>,
    pub lifetime_stats: UptimeStats,
    pub last_7_days_stats: UptimeStats,
    pub last_30_days_stats: UptimeStats,
    pub last_90_days_stats: UptimeStats,
}

/// Read-only statistics over persisted outcomes.
#[derive(Clone)]
pub struct StatsAggregator {
    cache: Arc<SiteCache>,
    directory: Arc<dyn SiteDirectory>,
    log: Arc<dyn OutcomeLog>,
}

impl StatsAggregator {
    pub fn new(
        cache: Arc<SiteCache>,
        directory: Arc<dyn SiteDirectory>,
        log: Arc<dyn OutcomeLog>,
    ) -> Self {
        Self {
            cache,
            directory,
            log,
        }
    }

    /// Statistics for the last `window_days` days, or all time when zero.
    pub fn stats_for(&self, site_id: i64, window_days: u32) -> Result<UptimeStats, DbError> {
        self.stats_at(site_id, window_days, Utc::now())
    }

    fn stats_at(
        &self,
        site_id: i64,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<UptimeStats, DbError> {
        // A cutoff older than the representable range covers all time.
        let since = match window_days {
            0 => None,
            days => ChronoDuration::try_days(i64::from(days))
                .and_then(|span| now.checked_sub_signed(span)),
        };
        let outcomes = self.log.query_outcomes(site_id, since)?;
        Ok(UptimeStats::from_outcomes(&outcomes))
    }

    /// Site, current status and all window statistics.
    ///
    /// Unknown sites yield [`DbError::NotFound`]; a site that has never been
    /// probed yields zeroed statistics.
    pub async fn site_snapshot(&self, site_id: i64) -> Result<SiteWithStats, DbError> {
        let site = match self.cache.get(site_id).await {
            Some(site) => site,
            None => self.directory.get_site(site_id)?,
        };

        let current_status = self.log.latest_outcome(site_id)?;
        if current_status.is_none() {
            return Ok(SiteWithStats {
                site,
                current_status,
                lifetime_stats: UptimeStats::default(),
                last_7_days_stats: UptimeStats::default(),
                last_30_days_stats: UptimeStats::default(),
                last_90_days_stats: UptimeStats::default(),
            });
        }

        let now = Utc::now();
        let [lifetime, week, month, quarter] = WINDOWS;

        Ok(SiteWithStats {
            site,
            current_status,
            lifetime_stats: self.stats_at(site_id, lifetime, now)?,
            last_7_days_stats: self.stats_at(site_id, week, now)?,
            last_30_days_stats: self.stats_at(site_id, month, now)?,
            last_90_days_stats: self.stats_at(site_id, quarter, now)?,
        })
    }
}
