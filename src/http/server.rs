//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, CORS)
//! - Build the token provider and forwarder from configuration
//! - Bind server to listener
//! - Serve the front end for every non-API path

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::{AmbientTokenProvider, TokenProvider};
use crate::config::ProxyConfig;
use crate::forward::{Forwarder, HttpForwarder};
use crate::http::cors::{cors_layer, preflight_no_content};
use crate::http::proxy::{api_not_found, chat_handler};
use crate::http::static_files;
use crate::lifecycle::signals::shutdown_signal;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub tokens: Arc<dyn TokenProvider>,
    pub forwarder: Arc<dyn Forwarder>,
}

/// HTTP server for the chat proxy.
pub struct HttpServer {
    router: Router,
    config: Arc<ProxyConfig>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let client = reqwest::Client::new();
        let tokens: Arc<dyn TokenProvider> = Arc::new(AmbientTokenProvider::new(client.clone(), &config.auth));
        let forwarder: Arc<dyn Forwarder> = Arc::new(HttpForwarder::new(client, tokens.clone()));
        Self::with_components(config, tokens, forwarder)
    }

    /// Create a server around explicit token provider and forwarder instances.
    pub fn with_components(
        config: ProxyConfig,
        tokens: Arc<dyn TokenProvider>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            config: config.clone(),
            tokens,
            forwarder,
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let api = Router::new()
            .route("/api/chat", get(chat_handler).post(chat_handler).options(chat_handler))
            .route("/api/{*path}", any(api_not_found))
            .layer(cors_layer(&config.cors))
            .layer(middleware::from_fn(preflight_no_content));

        Router::new()
            .route("/healthz", get(health))
            .merge(api)
            .fallback_service(static_files::service(&config.static_files))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until a
    /// shutdown is triggered or an OS signal arrives.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            auth_enabled = self.config.auth.enabled,
            "HTTP server starting"
        );

        // Dropping a connection drops its handler future, which cancels any
        // in-flight token fetch or upstream call.
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
