//! HTTP probe implementation.

use super::guard::{GuardedResolver, SsrfGuard};
use super::ProbeError;
use crate::config::MonitorConfig;

use regex::Regex;
use reqwest::{redirect, Client, Url};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// User agent sent with every probe.
pub const USER_AGENT: &str = "LiveCheck Monitoring/1.0";

const MAX_REDIRECTS: usize = 10;

/// Classified result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// Final HTTP status, or 0 when no response was received
    pub status_code: u16,
    /// Elapsed time in whole milliseconds
    pub elapsed_ms: i64,
    pub up: bool,
    pub error: Option<String>,
}

impl ProbeReport {
    fn response(status_code: u16, elapsed: Duration) -> Self {
        Self {
            status_code,
            elapsed_ms: whole_millis(elapsed),
            up: is_up_status(status_code),
            error: None,
        }
    }

    fn failed(elapsed: Duration, error: String) -> Self {
        Self {
            status_code: 0,
            elapsed_ms: whole_millis(elapsed),
            up: false,
            error: Some(error),
        }
    }
}

/// 2xx and 3xx count as up.
pub fn is_up_status(status_code: u16) -> bool {
    (200..400).contains(&status_code)
}

fn whole_millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// True when `raw` starts with `scheme://`. A `://` later in the path or
/// query does not count.
fn has_scheme(raw: &str) -> bool {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let re = SCHEME.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://").unwrap());
    re.is_match(raw)
}

/// Add `http://` to scheme-less targets and reject anything that is not a
/// usable HTTP(S) URL.
pub fn normalize_url(raw: &str) -> Result<Url, String> {
    let raw = raw.trim();
    let candidate = if has_scheme(raw) {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };

    let url = Url::parse(&candidate).map_err(|e| format!("invalid URL: {}", e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("invalid URL: unsupported scheme {:?}", other)),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("invalid URL: missing host".to_string());
    }

    Ok(url)
}

/// Executes probes through a shared, guarded HTTP client.
pub struct ProbeExecutor {
    client: Client,
    guard: SsrfGuard,
}

impl ProbeExecutor {
    /// Build an executor that refuses internal destinations.
    pub fn new(config: &MonitorConfig) -> Result<Self, ProbeError> {
        Self::with_guard(config, SsrfGuard::strict())
    }

    pub fn with_guard(config: &MonitorConfig, guard: SsrfGuard) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.probe_timeout)
            .connect_timeout(config.dial_timeout)
            .tcp_keepalive(config.keep_alive)
            .no_proxy()
            .dns_resolver(Arc::new(GuardedResolver::new(guard)))
            .redirect(redirect_policy(guard))
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self { client, guard })
    }

    /// Probe a target once. Never fails; problems are folded into the report.
    pub async fn probe(&self, target: &str) -> ProbeReport {
        let url = match normalize_url(target) {
            Ok(url) => url,
            Err(e) => return ProbeReport::failed(Duration::ZERO, e),
        };

        let start = Instant::now();

        if !url.host_str().map_or(false, |h| self.guard.permits_host(h)) {
            tracing::debug!("Refusing probe of {}", url);
            return ProbeReport::failed(
                start.elapsed(),
                format!("request failed: error sending request for url ({})", url),
            );
        }

        match self.client.get(url).send().await {
            Ok(response) => ProbeReport::response(response.status().as_u16(), start.elapsed()),
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", target, e);
                ProbeReport::failed(start.elapsed(), format!("request failed: {}", e))
            }
        }
    }
}

fn redirect_policy(guard: SsrfGuard) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let permitted = attempt
            .url()
            .host_str()
            .map_or(false, |h| guard.permits_host(h));
        if permitted {
            attempt.follow()
        } else {
            attempt.error("connection failed")
        }
    })
}
