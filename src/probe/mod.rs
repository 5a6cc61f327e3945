//! Probe module for site monitoring.
//!
//! Runs HTTP(S) health checks behind a destination guard.

mod guard;
mod http;

pub use guard::*;
pub use http::*;

use thiserror::Error;

/// Probe error types.
///
/// Failures of an individual probe are never errors; they become a down
/// [`ProbeReport`]. Only setting up the executor can fail.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// One unit of work for the worker pool.
#[derive(Debug, Clone)]
pub struct ProbeTask {
    pub site_id: i64,
    pub site_name: String,
    pub url: String,
}

impl From<&crate::db::Site> for ProbeTask {
    fn from(site: &crate::db::Site) -> Self {
        Self {
            site_id: site.id,
            site_name: site.name.clone(),
            url: site.url.clone(),
        }
    }
}
