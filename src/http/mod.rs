//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, limits, tracing)
//!     → cors.rs (origin checks, preflight acknowledgement)
//!     → /api/chat: proxy.rs (token, parse, forward, relay)
//!     → /api/*:    404
//!     → /healthz:  liveness
//!     → anything else: static_files.rs (asset or entry document)
//!     → error.rs maps failures to {"detail": ...} responses
//! ```

use axum::http::HeaderName;

pub mod cors;
pub mod error;
pub mod proxy;
pub mod server;
pub mod static_files;

pub use error::ProxyError;
pub use server::{AppState, HttpServer};

/// Correlation header set on every request and propagated upstream.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
