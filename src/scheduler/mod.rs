//! Scheduler module: the monitoring engine.
//!
//! A single dispatch loop feeds a bounded task queue drained by a fixed pool
//! of probe workers; outcomes are appended to the outcome log and read back
//! by the stats aggregator.

mod cache;
mod dispatch;
mod recorder;
mod stats;
mod workers;

pub use cache::*;
pub use recorder::*;
pub use stats::*;

use crate::config::{ConfigError, MonitorConfig};
use crate::db::{DbError, OutcomeLog, SiteDirectory};
use crate::probe::{ProbeError, ProbeExecutor};

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Monitoring engine error types.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("database error: {0}")]
    Db(DbError),
    #[error("site {0} not found")]
    NotFound(i64),
    #[error("monitor is already running")]
    AlreadyRunning,
}

/// Handles of a started engine.
struct Running {
    stop_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

/// The monitoring engine.
pub struct Monitor {
    config: MonitorConfig,
    directory: Arc<dyn SiteDirectory>,
    cache: Arc<SiteCache>,
    executor: Arc<ProbeExecutor>,
    recorder: ResultRecorder,
    stats: StatsAggregator,
    running: Mutex<Option<Running>>,
}

impl Monitor {
    /// Create an engine. Invalid configuration is rejected here, before any
    /// worker exists.
    pub fn new(
        config: MonitorConfig,
        directory: Arc<dyn SiteDirectory>,
        log: Arc<dyn OutcomeLog>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let executor = ProbeExecutor::new(&config)?;
        Ok(Self::with_executor(config, directory, log, executor))
    }

    fn with_executor(
        config: MonitorConfig,
        directory: Arc<dyn SiteDirectory>,
        log: Arc<dyn OutcomeLog>,
        executor: ProbeExecutor,
    ) -> Self {
        let cache = Arc::new(SiteCache::new());
        let stats = StatsAggregator::new(cache.clone(), directory.clone(), log.clone());

        Self {
            config,
            directory,
            cache,
            executor: Arc::new(executor),
            recorder: ResultRecorder::new(log),
            stats,
            running: Mutex::new(None),
        }
    }

    /// Start the worker pool and the scheduler.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(MonitorError::AlreadyRunning);
        }

        tracing::info!(
            "Starting monitor with {} workers, checking every {:?}",
            self.config.workers,
            self.config.interval
        );

        let (stop_tx, _) = broadcast::channel(1);
        let (task_tx, task_rx) = mpsc::channel(self.config.queue_capacity);

        let mut tasks = workers::spawn_workers(
            self.config.workers,
            task_rx,
            self.executor.clone(),
            self.recorder.clone(),
            &stop_tx,
        );
        tasks.push(tokio::spawn(dispatch::run_dispatch_loop(
            self.config.interval,
            self.directory.clone(),
            self.cache.clone(),
            task_tx,
            stop_tx.subscribe(),
        )));

        *running = Some(Running { stop_tx, tasks });
        Ok(())
    }

    /// Stop scheduling and wait for the workers to finish their current
    /// probe. Queued tasks are discarded. Does nothing if not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        tracing::info!("Stopping monitor");
        let _ = running.stop_tx.send(());

        for task in running.tasks {
            if let Err(e) = task.await {
                tracing::error!("Monitor task failed: {}", e);
            }
        }

        tracing::info!("Monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Site snapshot with current status and window statistics.
    pub async fn get_site_stats(&self, site_id: i64) -> Result<SiteWithStats, MonitorError> {
        self.stats.site_snapshot(site_id).await.map_err(|e| match e {
            DbError::NotFound => MonitorError::NotFound(site_id),
            other => MonitorError::Db(other),
        })
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }
}
