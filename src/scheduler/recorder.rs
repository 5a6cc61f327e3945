//! Result recorder: persists probe reports as outcomes.

use crate::db::{NewOutcome, OutcomeLog};
use crate::probe::ProbeReport;

use chrono::Utc;
use std::sync::Arc;

/// Appends one outcome per probe. Write failures are logged and dropped.
#[derive(Clone)]
pub struct ResultRecorder {
    log: Arc<dyn OutcomeLog>,
}

impl ResultRecorder {
    pub fn new(log: Arc<dyn OutcomeLog>) -> Self {
        Self { log }
    }

    pub fn record(&self, site_id: i64, report: &ProbeReport) {
        let outcome = NewOutcome {
            site_id,
            status_code: report.status_code,
            response_time: report.elapsed_ms,
            is_up: report.up,
            error_message: report.error.clone(),
            checked_at: Utc::now(),
        };

        if let Err(e) = self.log.append_outcome(&outcome) {
            tracing::error!("Failed to record check result for site {}: {}", site_id, e);
        }
    }
}
