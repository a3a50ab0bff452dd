//! # HTTP Server
//!
//! Main HTTP server combining the scenario and observability routers, plus
//! the background tasks that run alongside it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::EngineConfig;
use crate::observability::{LogEvent, Logger};
use crate::scenario::ScenarioService;

use super::observability_routes::{health_routes, metrics_routes};
use super::scenario_routes::scenario_routes;

/// Smallest interval between timeout sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// HTTP server over one scenario service
pub struct HttpServer {
    config: EngineConfig,
    service: Arc<ScenarioService>,
    router: Router,
}

impl HttpServer {
    pub fn new(config: EngineConfig, service: Arc<ScenarioService>) -> Self {
        let router = Self::build_router(&config, &service);
        Self {
            config,
            service,
            router,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(config: &EngineConfig, service: &Arc<ScenarioService>) -> Router {
        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .merge(health_routes())
            .merge(metrics_routes(Arc::clone(service.metrics())))
            .merge(scenario_routes(Arc::clone(service)))
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Start the availability refresher and the timeout sweep, as configured.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_background(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();

        if self.service.cache().is_enabled() {
            let service = Arc::clone(&self.service);
            tasks.push(
                self.service
                    .cache()
                    .spawn_refresher(move |key| service.recompute_availability(key)),
            );
        }

        if let Some(timeout) = self.config.scenario_timeout() {
            let service = Arc::clone(&self.service);
            let period = (timeout / 4).max(MIN_SWEEP_INTERVAL);
            tasks.push(tokio::spawn(async move {
                let mut timer = tokio::time::interval(period);
                loop {
                    timer.tick().await;
                    if let Err(e) = service.cancel_stale(Utc::now(), timeout) {
                        Logger::error(
                            LogEvent::ScenarioTimedOut,
                            &[("error", e.to_string().as_str()), ("code", e.code())],
                        );
                    }
                }
            }));
        }

        tasks
    }

    /// Start the HTTP server (async)
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid socket address: {}", e),
            )
        })?;

        let _tasks = self.spawn_background();

        Logger::info(
            LogEvent::Serving,
            &[
                ("addr", addr.to_string().as_str()),
                ("durable", self.service.log().is_durable().to_string().as_str()),
                ("cache", self.service.cache().is_enabled().to_string().as_str()),
            ],
        );

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_creation() {
        let server = HttpServer::new(EngineConfig::default(), Arc::new(ScenarioService::in_memory()));
        assert_eq!(server.socket_addr(), "0.0.0.0:54330");
    }

    #[test]
    fn test_server_with_custom_port() {
        let config = EngineConfig {
            port: 8080,
            ..EngineConfig::default()
        };
        let server = HttpServer::new(config, Arc::new(ScenarioService::in_memory()));
        assert_eq!(server.socket_addr(), "0.0.0.0:8080");
    }

    #[tokio::test]
    async fn test_background_tasks_follow_config() {
        let server = HttpServer::new(EngineConfig::default(), Arc::new(ScenarioService::in_memory()));
        // in-memory service without a cache, no timeout configured
        assert!(server.spawn_background().is_empty());

        let config = EngineConfig {
            scenario_timeout_secs: 60,
            ..EngineConfig::default()
        };
        let server = HttpServer::new(config, Arc::new(ScenarioService::in_memory()));
        let tasks = server.spawn_background();
        assert_eq!(tasks.len(), 1);
        tasks.iter().for_each(|t| t.abort());
    }
}
