//! Mock credential-health service that stores posted findings

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Mock of the `/errors` endpoint
pub struct MockHealthService {
    addr: SocketAddr,
    shutdown: CancellationToken,
    received: Arc<Mutex<Vec<Value>>>,
}

impl MockHealthService {
    pub async fn start() -> anyhow::Result<Self> {
        let received = Arc::new(Mutex::new(Vec::new()));

        let app = Router::new()
            .route("/v1/errors", routing::post(handle_error))
            .with_state(Arc::clone(&received));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            received,
        })
    }

    /// Base URL the reporter is configured with
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Bodies posted so far, in arrival order
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

impl Drop for MockHealthService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_error(State(received): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>) -> StatusCode {
    received.lock().unwrap().push(body);
    StatusCode::ACCEPTED
}
