//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Upstream chat service URL.
pub const ENV_UPSTREAM_URL: &str = "TARGET_CLOUD_RUN_URL";
/// `true` (any case) enables identity tokens; anything else disables them.
pub const ENV_AUTH_ENABLED: &str = "GOOGLE_AUTH_ENABLED";
/// Comma-separated CORS origins.
pub const ENV_ALLOWED_ORIGINS: &str = "ALLOWED_ORIGINS";
/// Port to listen on, on all interfaces.
pub const ENV_PORT: &str = "PORT";
/// Directory of the built front end.
pub const ENV_STATIC_DIR: &str = "STATIC_FILES_DIR";
/// Service account key file.
pub const ENV_CREDENTIALS_FILE: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Metadata server host override.
pub const ENV_METADATA_HOST: &str = "GCE_METADATA_HOST";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {var} is invalid: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let config = read_config_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build the startup configuration: optional TOML file, then environment
/// overrides, then validation.
pub fn load_with_env(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let base = match path {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };
    let config = apply_env_overrides(base, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
///
/// `lookup` returns the value of a variable, if set. Unset and empty
/// variables leave the file/default value untouched, except
/// `GOOGLE_AUTH_ENABLED`: any value other than `true` (empty included)
/// disables authentication.
pub fn apply_env_overrides<F>(mut config: ProxyConfig, lookup: F) -> Result<ProxyConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_UPSTREAM_URL) {
        config.upstream.url = url.trim().to_string();
    }

    if let Some(flag) = lookup(ENV_AUTH_ENABLED) {
        config.auth.enabled = flag.trim().eq_ignore_ascii_case("true");
    }

    if let Some(origins) = get(ENV_ALLOWED_ORIGINS) {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(port) = get(ENV_PORT) {
        let port: u16 = port.trim().parse().map_err(|e| ConfigError::Env {
            var: ENV_PORT,
            reason: format!("{}", e),
        })?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    if let Some(dir) = get(ENV_STATIC_DIR) {
        config.static_files.root = PathBuf::from(dir);
    }

    if let Some(file) = get(ENV_CREDENTIALS_FILE) {
        config.auth.credentials_file = Some(PathBuf::from(file));
    }

    if let Some(host) = get(ENV_METADATA_HOST) {
        config.auth.metadata_host = host.trim().to_string();
    }

    Ok(config)
}
