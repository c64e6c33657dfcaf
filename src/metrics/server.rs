//! HTTP server for the Prometheus metrics endpoint.

use crate::config::{ConfigError, WebConfig};
use crate::metrics::MetricsRegistry;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    #[error("invalid server configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Path serving the exposition.
    pub telemetry_path: String,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 9100).into(),
            telemetry_path: "/metrics".to_string(),
        }
    }
}

impl TryFrom<&WebConfig> for MetricsServerConfig {
    type Error = ConfigError;

    fn try_from(web: &WebConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            bind_addr: web.socket_addr()?,
            telemetry_path: web.telemetry_path.clone(),
        })
    }
}

struct ServerState {
    registry: MetricsRegistry,
    telemetry_path: String,
}

/// HTTP server for exposing Prometheus metrics.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<ServerState>,
}

impl MetricsServer {
    /// Creates a new metrics server.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        let state = Arc::new(ServerState {
            registry,
            telemetry_path: config.telemetry_path.clone(),
        });
        Self { config, state }
    }

    /// Builds the request router.
    ///
    /// The landing page is only mounted when metrics are not served at `/`.
    pub fn router(&self) -> Router {
        let mut router = Router::new().route(&self.config.telemetry_path, get(metrics_handler));
        if self.config.telemetry_path != "/health" {
            router = router.route("/health", get(health_handler));
        }
        if self.config.telemetry_path != "/" {
            router = router.route("/", get(landing_handler));
        }
        router
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state))
    }

    /// Starts the HTTP server.
    ///
    /// This method runs the server until Ctrl-C is received.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(
            addr = %self.config.bind_addr,
            path = %self.config.telemetry_path,
            "Metrics server listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Server(e.to_string()))?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Handler for the metrics endpoint.
///
/// Collection hits SQLite synchronously, so it runs on the blocking pool.
async fn metrics_handler(State(state): State<Arc<ServerState>>) -> Response {
    let encoded = tokio::task::spawn_blocking(move || state.registry.encode()).await;

    match encoded {
        Ok(Ok(output)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        )
            .into_response(),
        Ok(Err(e)) => encode_failure(e.to_string()),
        Err(e) => encode_failure(e.to_string()),
    }
}

fn encode_failure(detail: String) -> Response {
    tracing::error!(error = %detail, "Failed to encode metrics");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("Failed to encode metrics: {}", detail),
    )
        .into_response()
}

/// Handler for the landing page.
async fn landing_handler(State(state): State<Arc<ServerState>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>traffic-exporter</title></head>\n<body>\n\
         <h1>traffic-exporter</h1>\n\
         <p>Per-account traffic counters from x-ui.</p>\n\
         <p>Version: {version}</p>\n\
         <ul><li><a href=\"{path}\">Metrics</a></li></ul>\n\
         </body>\n</html>\n",
        version = crate::VERSION,
        path = state.telemetry_path,
    ))
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
