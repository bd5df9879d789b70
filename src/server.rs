//! HTTP surface for push-delivered triggers
//!
//! - `POST /scrape` takes a push envelope and answers with the scrape
//!   stage's status and message
//! - `POST /process` takes a storage notification; once the body parses it
//!   always answers 204 so the subscription does not redeliver
//! - `GET /healthz`

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::pipeline::Pipeline;
use crate::trigger::parse_storage_event;

/// Build the router over a shared pipeline
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/scrape", post(scrape))
        .route("/process", post(process))
        .route("/healthz", get(healthz))
        .with_state(pipeline)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, pipeline: Arc<Pipeline>, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

async fn scrape(State(pipeline): State<Arc<Pipeline>>, body: Bytes) -> (StatusCode, String) {
    let response = pipeline.scrape.handle_push(&body).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, response.message)
}

async fn process(
    State(pipeline): State<Arc<Pipeline>>,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, String)> {
    let object = parse_storage_event(&body).map_err(|e| {
        warn!(error = %e, error_type = "trigger", "Rejected storage notification");
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    pipeline.process.handle_object(&object).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn healthz() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::fetcher::Fetcher;
    use crate::storage::{MemoryObjectStore, ObjectStore};
    use tokio::sync::oneshot;

    struct TestServer {
        url: String,
        store: MemoryObjectStore,
        stop: Option<oneshot::Sender<()>>,
        handle: tokio::task::JoinHandle<io::Result<()>>,
    }

    impl TestServer {
        async fn start(config: PipelineConfig) -> Self {
            let store = MemoryObjectStore::new();
            let pipeline = Pipeline::with_parts(
                config,
                Fetcher::default(),
                Arc::new(store.clone()),
                None,
            );

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let (stop, stopped) = oneshot::channel::<()>();
            let handle = tokio::spawn(serve(listener, Arc::new(pipeline), async move {
                let _ = stopped.await;
            }));

            Self {
                url,
                store,
                stop: Some(stop),
                handle,
            }
        }

        async fn shutdown(mut self) {
            if let Some(stop) = self.stop.take() {
                let _ = stop.send(());
            }
            self.handle.await.unwrap().unwrap();
        }
    }

    fn config(rules: &std::path::Path) -> PipelineConfig {
        PipelineConfig::builder()
            .raw_bucket("raw")
            .processed_bucket("processed")
            .rules_path(rules)
            .build()
    }

    #[tokio::test]
    async fn test_healthz() {
        let dir = tempfile::tempdir().unwrap();
        let server = TestServer::start(config(&dir.path().join("config.json"))).await;

        let response = reqwest::get(format!("{}/healthz", server.url)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "ok");

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_scrape_rejects_bad_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let server = TestServer::start(config(&dir.path().join("config.json"))).await;

        let response = reqwest::Client::new()
            .post(format!("{}/scrape", server.url))
            .body("{}")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(
            response.text().await.unwrap(),
            "Invalid Pub/Sub message format: missing 'message' key."
        );
        assert!(server.store.is_empty());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_process_notification() {
        let dir = tempfile::tempdir().unwrap();
        let server = TestServer::start(config(&dir.path().join("config.json"))).await;
        server
            .store
            .put(
                "raw",
                "example.com/page.html",
                br#"<a href="/a.html">a</a>"#.to_vec(),
                "text/html",
            )
            .await
            .unwrap();

        let client = reqwest::Client::new();
        let response = client
            .post(format!("{}/process", server.url))
            .body(r#"{"bucket": "raw", "name": "example.com/page.html"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);
        assert!(server.store.object("processed", "example.com/page.json").is_some());

        // Failures after parsing are still acknowledged
        let response = client
            .post(format!("{}/process", server.url))
            .body(r#"{"bucket": "raw", "name": "example.com/missing.html"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 204);

        let response = client
            .post(format!("{}/process", server.url))
            .body("not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        server.shutdown().await;
    }
}
