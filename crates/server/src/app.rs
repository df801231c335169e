//! Axum application builder.
//!
//! Configures routes, middleware and state for the server.

use axum::Router;
use axum::routing::{get, post};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{api, health, ws};
use crate::state::ServerState;

/// Create the Axum application with all routes.
pub fn create_app(state: ServerState) -> Router {
    // CORS layer for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        // Health endpoints
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        // WebSocket endpoint
        .route("/ws", get(ws::ws_handler))
        // Reads
        .route("/api/state", get(api::get_state))
        .route("/api/lots", get(api::get_lots))
        .route("/api/bidders", get(api::get_bidders))
        // Bidding
        .route("/api/bid", post(api::post_bid))
        // Admin
        .route("/api/admin/advance", post(api::post_advance))
        .route("/api/admin/pause", post(api::post_pause))
        .route("/api/admin/resume", post(api::post_resume))
        .route("/api/admin/timer", post(api::post_timer))
        .route("/api/admin/force-end", post(api::post_force_end))
        .route("/api/admin/lots/{lot_id}/requeue", post(api::post_requeue))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // State
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Host to bind to.
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            host: "0.0.0.0".into(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Get bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8001);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.bind_addr(), "0.0.0.0:8001");
    }

    #[test]
    fn test_create_app() {
        let (state, _) = test_state();
        let _app = create_app(state);
    }
}
