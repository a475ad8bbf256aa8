use std::sync::Arc;

use error_stack::Report;
use poem::get;
use poem::listener::TcpListener;
use poem::middleware::Cors;
use poem::middleware::Tracing;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::handlers::export_csv;
use super::handlers::get_all_metrics;
use super::handlers::get_instance_metrics;
use super::handlers::health;
use super::ApiError;
use crate::domain::metrics::ConnectionRegistry;
use crate::domain::metrics::MetricsQuery;
use crate::domain::metrics::TimeSource;

/// Routes of the metrics API with CORS open to any origin
pub fn routes(
    query: MetricsQuery,
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn TimeSource>,
) -> impl Endpoint {
    Route::new()
        .at("/metrics", get(get_all_metrics))
        .at("/metrics/export/csv", get(export_csv))
        .at("/metrics/:instance_id", get(get_instance_metrics))
        .at("/healthz", get(health))
        .data(query)
        .data(registry)
        .data(clock)
        .with(Cors::new())
        .with(Tracing)
}

/// HTTP API server for querying retained metrics
pub struct ApiServer {
    query: MetricsQuery,
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn TimeSource>,
    listen_addr: String,
}

impl ApiServer {
    pub fn new(
        query: MetricsQuery,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<dyn TimeSource>,
        listen_addr: String,
    ) -> Self {
        Self {
            query,
            registry,
            clock,
            listen_addr,
        }
    }

    /// Serve until `token` is cancelled
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind to the address
    pub async fn run(self, token: CancellationToken) -> Result<(), Report<ApiError>> {
        info!("Starting HTTP API server on {}", self.listen_addr);

        let app = routes(self.query, self.registry, self.clock);
        let server = Server::new(TcpListener::bind(&self.listen_addr));

        tokio::select! {
            result = server.run(app) => {
                match result {
                    Ok(()) => {
                        info!("API server stopped normally");
                        Ok(())
                    }
                    Err(e) => {
                        error!("API server failed: {e}");
                        Err(Report::new(ApiError::ServerError {
                            message: format!("Server failed on {}: {e}", self.listen_addr),
                        }))
                    }
                }
            }
            _ = token.cancelled() => {
                info!("API server shutdown requested");
                Ok(())
            }
        }
    }
}
