//! Web server module.

mod handlers;

pub use handlers::*;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::scheduler::Monitor;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, put},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub monitor: Arc<Monitor>,
}

/// Web server for LiveCheck.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, monitor: Arc<Monitor>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                monitor,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/health", get(handlers::handle_health))
            .route(
                "/api/sites",
                get(handlers::handle_list_sites).post(handlers::handle_create_site),
            )
            .route(
                "/api/sites/{id}",
                put(handlers::handle_update_site).delete(handlers::handle_delete_site),
            )
            .route("/api/sites/{id}/stats", get(handlers::handle_site_stats))
            .route(
                "/api/sites/{id}/stats/{days}",
                get(handlers::handle_site_window_stats),
            )
            .route("/api/sites/{id}/checks", get(handlers::handle_site_checks))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::db::{NewOutcome, NewSite, OutcomeLog, SiteDirectory};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tempfile::NamedTempFile;

    async fn spawn_app() -> (NamedTempFile, Arc<Store>, String) {
        let tmp = NamedTempFile::new().unwrap();
        let store = Arc::new(Store::new(tmp.path()).unwrap());
        let monitor = Arc::new(
            Monitor::new(MonitorConfig::default(), store.clone(), store.clone()).unwrap(),
        );
        let server = Server::new(ServerConfig::default(), store.clone(), monitor);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = server.routes();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (tmp, store, format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_health() {
        let (_tmp, _store, base) = spawn_app().await;
        let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn test_site_lifecycle_and_stats() {
        let (_tmp, store, base) = spawn_app().await;
        let client = reqwest::Client::new();

        let created: Value = client
            .post(format!("{}/api/sites", base))
            .json(&json!({"owner_id": 7, "name": "Example", "url": "example.com"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = created["id"].as_i64().unwrap();

        let dup = client
            .post(format!("{}/api/sites", base))
            .json(&json!({"owner_id": 7, "name": "Example", "url": "example.org"}))
            .send()
            .await
            .unwrap();
        assert_eq!(dup.status(), 409);

        let bad = client
            .post(format!("{}/api/sites", base))
            .json(&json!({"owner_id": 7, "name": "", "url": "example.org"}))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), 400);

        let stats: Value = client
            .get(format!("{}/api/sites/{}/stats", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats["site"]["name"], "Example");
        assert!(stats["current_status"].is_null());
        assert_eq!(stats["lifetime_stats"]["total_checks"], 0);

        store
            .append_outcome(&NewOutcome {
                site_id: id,
                status_code: 200,
                response_time: 120,
                is_up: true,
                error_message: None,
                checked_at: Utc::now(),
            })
            .unwrap();

        let checks: Value = client
            .get(format!("{}/api/sites/{}/checks?limit=5", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(checks.as_array().unwrap().len(), 1);
        assert_eq!(checks[0]["response_time"], 120);

        let week: Value = client
            .get(format!("{}/api/sites/{}/stats/7", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(week["total_checks"], 1);
        assert_eq!(week["uptime_percentage"], 100.0);
        assert_eq!(week["average_response_time"], 120.0);

        let deleted = client
            .delete(format!("{}/api/sites/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), 204);

        let missing = client
            .get(format!("{}/api/sites/{}/stats", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), 404);
    }

    #[tokio::test]
    async fn test_update_site() {
        let (_tmp, store, base) = spawn_app().await;
        let site = store
            .add_site(&NewSite {
                owner_id: 1,
                name: "Old".to_string(),
                url: "old.example".to_string(),
            })
            .unwrap();

        let updated: Value = reqwest::Client::new()
            .put(format!("{}/api/sites/{}", base, site.id))
            .json(&json!({"owner_id": 1, "name": "New", "url": "new.example"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(updated["name"], "New");
        assert_eq!(updated["url"], "new.example");

        let foreign = reqwest::Client::new()
            .put(format!("{}/api/sites/{}", base, site.id))
            .json(&json!({"owner_id": 2, "name": "Taken", "url": "evil.example"}))
            .send()
            .await
            .unwrap();
        assert_eq!(foreign.status(), 404);
        assert_eq!(store.get_site(site.id).unwrap().name, "New");
    }
}
