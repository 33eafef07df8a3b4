//! Authenticated request forwarding.
//!
//! # Data Flow
//! ```text
//! OutboundRequest (method, url, headers, payload, token/audience, timeout)
//!     → client.rs (resolve token via auth::TokenProvider)
//!     → client.rs (build + send one reqwest request)
//!     → UpstreamResponse (status, headers, buffered body)
//! ```
//!
//! # Design Decisions
//! - One attempt per call; no retries, no streaming
//! - Encoding and authentication errors are raised before any network I/O
//! - Upstream non-2xx statuses are data, not errors; the caller decides

pub mod client;
pub mod error;
pub mod request;

pub use client::{Forwarder, HttpForwarder};
pub use error::{ForwardError, ForwardResult};
pub use request::{OutboundRequest, Payload, UpstreamResponse, DEFAULT_TIMEOUT};
