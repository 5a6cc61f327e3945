//! Periodic dispatch of probe tasks.

use super::cache::SiteCache;
use crate::db::SiteDirectory;
use crate::probe::ProbeTask;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// Run the scheduling loop until the stop signal fires.
///
/// Each tick refreshes the site cache and enqueues one task per site. The
/// first tick fires immediately.
pub(crate) async fn run_dispatch_loop(
    interval: Duration,
    directory: Arc<dyn SiteDirectory>,
    cache: Arc<SiteCache>,
    tasks: mpsc::Sender<ProbeTask>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            _ = ticker.tick() => {
                if dispatch_tick(directory.as_ref(), &cache, &tasks, &mut stop_rx).await
                    == TickResult::Stopped
                {
                    break;
                }
            }
        }
    }

    tracing::info!("Scheduler stopped");
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum TickResult {
    Dispatched(usize),
    Skipped,
    Stopped,
}

/// One scheduling tick.
///
/// Enqueueing waits while the queue is full; the stop signal is checked
/// before every task so a shutdown does not wait for the whole burst.
pub(crate) async fn dispatch_tick(
    directory: &dyn SiteDirectory,
    cache: &SiteCache,
    tasks: &mpsc::Sender<ProbeTask>,
    stop_rx: &mut broadcast::Receiver<()>,
) -> TickResult {
    let sites = match directory.list_sites() {
        Ok(sites) => sites,
        Err(e) => {
            tracing::warn!("Skipping tick, failed to list sites: {}", e);
            return TickResult::Skipped;
        }
    };

    cache.refresh(&sites).await;
    tracing::debug!("Dispatching {} checks", sites.len());

    for site in &sites {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => return TickResult::Stopped,
            sent = tasks.send(ProbeTask::from(site)) => {
                if sent.is_err() {
                    // Every worker has gone away.
                    return TickResult::Stopped;
                }
            }
        }
    }

    TickResult::Dispatched(sites.len())
}
