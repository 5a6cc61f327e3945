//! Fixed-size pool of probe workers.

use super::recorder::ResultRecorder;
use crate::probe::{ProbeExecutor, ProbeTask};

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

/// Receiving end of the task queue, shared by all workers.
type SharedQueue = Arc<Mutex<mpsc::Receiver<ProbeTask>>>;

/// Spawn `count` workers draining `queue`.
///
/// Each worker runs one probe at a time, so at most `count` outbound
/// connections are open regardless of how many sites are registered.
pub(crate) fn spawn_workers(
    count: usize,
    queue: mpsc::Receiver<ProbeTask>,
    executor: Arc<ProbeExecutor>,
    recorder: ResultRecorder,
    stop_tx: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    let queue: SharedQueue = Arc::new(Mutex::new(queue));

    (0..count)
        .map(|worker_id| {
            tokio::spawn(run_worker(
                worker_id,
                queue.clone(),
                executor.clone(),
                recorder.clone(),
                stop_tx.subscribe(),
            ))
        })
        .collect()
}

async fn run_worker(
    worker_id: usize,
    queue: SharedQueue,
    executor: Arc<ProbeExecutor>,
    recorder: ResultRecorder,
    mut stop_rx: broadcast::Receiver<()>,
) {
    loop {
        // The stop signal wins over queued work; tasks left in the queue
        // are dropped without being recorded.
        let task = tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            task = next_task(&queue) => task,
        };

        let Some(task) = task else {
            break;
        };

        // In-flight probes are not cancelled; the client timeout bounds them.
        let report = executor.probe(&task.url).await;
        if !report.up {
            tracing::debug!(
                "Site {} ({}) is down: status {}, {:?}",
                task.site_name,
                task.site_id,
                report.status_code,
                report.error
            );
        }
        recorder.record(task.site_id, &report);
    }

    tracing::debug!("Worker {} exited", worker_id);
}

async fn next_task(queue: &SharedQueue) -> Option<ProbeTask> {
    queue.lock().await.recv().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::db::{NewSite, OutcomeLog, Store};
    use crate::probe::SsrfGuard;
    use axum::{routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Server that counts concurrent requests and remembers the peak.
    async fn spawn_counting_server(delay: Duration) -> (String, Arc<AtomicUsize>) {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let router = {
            let active = active.clone();
            let peak = peak.clone();
            Router::new().route(
                "/",
                get(move || {
                    let active = active.clone();
                    let peak = peak.clone();
                    async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(delay).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        "ok"
                    }
                }),
            )
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/", addr), peak)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_concurrency_and_records_everything() {
        let (url, peak) = spawn_counting_server(Duration::from_millis(50)).await;

        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let site = store
            .add_site(&NewSite {
                owner_id: 1,
                name: "pool".to_string(),
                url: url.clone(),
            })
            .unwrap();

        let executor = Arc::new(
            ProbeExecutor::with_guard(&MonitorConfig::default(), SsrfGuard::permissive()).unwrap(),
        );
        let recorder = ResultRecorder::new(store.clone());
        let (stop_tx, _) = broadcast::channel(1);
        let (task_tx, task_rx) = mpsc::channel(4);

        let handles = spawn_workers(3, task_rx, executor, recorder, &stop_tx);

        for _ in 0..12 {
            task_tx.send(ProbeTask::from(&site)).await.unwrap();
        }
        // Closing the queue lets the workers finish the backlog and exit.
        drop(task_tx);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count_outcomes(site.id).unwrap(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        let latest = store.latest_outcome(site.id).unwrap().unwrap();
        assert!(latest.is_up);
    }
}
