//! Identity token subsystem.
//!
//! # Data Flow
//! ```text
//! audience (upstream URL)
//!     → ambient.rs (pick identity source for this call)
//!         → service_account.rs (key file → signed assertion → token endpoint)
//!         → metadata.rs (compute metadata server)
//!     → BearerCredential
//! ```
//!
//! # Security Constraints
//! - Tokens are fetched per call and never cached or persisted
//! - Never log full tokens or key material; use `redact`
//! - Each fetch is a single attempt with its own timeout

pub mod ambient;
pub mod metadata;
pub mod service_account;
pub mod token;

pub use ambient::AmbientTokenProvider;
pub use metadata::MetadataTokenProvider;
pub use service_account::{ServiceAccountKey, ServiceAccountTokenProvider};
pub use token::{redact, BearerCredential, TokenError, TokenErrorKind, TokenProvider};
