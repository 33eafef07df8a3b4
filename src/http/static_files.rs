//! Static asset serving for the single-page front end.
//!
//! Files under the static root are served directly; any other non-API path
//! gets the entry document so client-side routing can take over.

use tower_http::services::{ServeDir, ServeFile};

use crate::config::StaticFilesConfig;

/// Service for the router fallback.
pub fn service(config: &StaticFilesConfig) -> ServeDir<ServeFile> {
    let index = config.index_path();
    if !index.is_file() {
        tracing::warn!(
            path = %index.display(),
            "Entry document not found; unmatched paths will return 404"
        );
    }

    ServeDir::new(&config.root).fallback(ServeFile::new(index))
}
