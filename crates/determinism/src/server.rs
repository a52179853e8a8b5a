//! HTTP surface of the determinism service

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    routing::get,
    Router,
};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::error::{DeterminismError, DeterminismResult};
use crate::sequence::DeterminismState;

/// Route answering with the next synthetic clock reading.
pub const CLOCK_PATH: &str = "/clock/now";

/// Route answering with the next identifier.
pub const ID_PATH: &str = "/id/new";

/// Default listen address of the standalone service.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8029";

type SharedState = Arc<Mutex<DeterminismState>>;

/// Determinism service
#[derive(Clone)]
pub struct DeterminismServer {
    state: SharedState,
}

impl DeterminismServer {
    /// Create a service with freshly seeded sequences
    pub fn new() -> Self {
        Self::with_state(DeterminismState::default())
    }

    pub fn with_state(state: DeterminismState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Number of values handed out so far, as `(clock, id)`.
    pub fn reads(&self) -> (u64, u64) {
        self.state.lock().reads()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(CLOCK_PATH, get(next_timestamp))
            .route(ID_PATH, get(next_id))
            .fallback(not_mocked)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until the process is stopped
    pub async fn serve(self, addr: SocketAddr) -> DeterminismResult<()> {
        info!("Determinism service starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }

    /// Serve on a background task. Port 0 picks a free port.
    pub async fn spawn(self, addr: SocketAddr) -> DeterminismResult<ServiceHandle> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = self.router();

        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!("Determinism service listening on http://{}", local_addr);

        Ok(ServiceHandle {
            addr: local_addr,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

impl Default for DeterminismServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a service running on a background task
pub struct ServiceHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServiceHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the task to finish
    pub async fn shutdown(mut self) -> DeterminismResult<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| DeterminismError::Task(e.to_string()))??;
        }
        info!("Determinism service on http://{} stopped", self.addr);
        Ok(())
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn next_timestamp(State(state): State<SharedState>) -> String {
    let value = state.lock().next_timestamp();
    debug!(value, "handed out clock reading");
    value.to_string()
}

async fn next_id(State(state): State<SharedState>) -> String {
    let value = state.lock().next_id();
    debug!(%value, "handed out identifier");
    value.to_string()
}

async fn not_mocked(uri: Uri) -> (StatusCode, &'static str) {
    warn!("No determinism route for {}", uri.path());
    (StatusCode::NOT_FOUND, "function has not been mocked")
}
