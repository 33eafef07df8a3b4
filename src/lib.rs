//! Chat reverse proxy library.
//!
//! Serves a single-page front end and relays `/api/chat` calls to an
//! upstream chat service, attaching a Google-issued identity token when
//! authentication is enabled.

pub mod auth;
pub mod config;
pub mod forward;
pub mod http;
pub mod lifecycle;
pub mod observability;

#[cfg(test)]
pub(crate) mod testing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
