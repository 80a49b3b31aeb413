//! Server configuration.
//!
//! Every setting has a default so the server starts with no environment at all.
//! Override through environment variables:
//!
//! - `CERTVERIFY_HOST` (default: `127.0.0.1`)
//! - `CERTVERIFY_PORT` (default: `8080`)
//! - `CERTVERIFY_PUBLIC_ORIGIN` (default: `http://<host>:<port>`), the base of every
//!   verification link printed into a QR code
//! - `CERTVERIFY_DB_PATH` (default: `certverify.sqlite`)
//! - `CERTVERIFY_FONTS_DIR` (default: `./fonts`)
//! - `CERTVERIFY_OUTPUT_DIR` (default: `./pdfs`), where batch jobs write certificates
//! - `CERTVERIFY_ID_PREFIX` (default: `ICES`)
//! - `CERTVERIFY_OPEN_BROWSER` (default: `false`)

use common::model::record::DEFAULT_ID_PREFIX;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Scheme, host and port verification links point at, without a trailing `/`.
    pub public_origin: String,
    pub db_path: PathBuf,
    pub fonts_dir: PathBuf,
    pub output_dir: PathBuf,
    pub id_prefix: String,
    pub open_browser: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid port in CERTVERIFY_PORT: {0}")]
    InvalidPort(String),
    #[error("CERTVERIFY_ID_PREFIX must be non-empty and must not contain '-' or '/'")]
    InvalidPrefix,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let host = get("CERTVERIFY_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match get("CERTVERIFY_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => 8080,
        };
        let public_origin = get("CERTVERIFY_PUBLIC_ORIGIN")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let id_prefix = get("CERTVERIFY_ID_PREFIX").unwrap_or_else(|| DEFAULT_ID_PREFIX.to_string());
        if id_prefix.contains('-') || id_prefix.contains('/') {
            return Err(ConfigError::InvalidPrefix);
        }

        Ok(Config {
            host,
            port,
            public_origin,
            db_path: get("CERTVERIFY_DB_PATH")
                .unwrap_or_else(|| "certverify.sqlite".to_string())
                .into(),
            fonts_dir: get("CERTVERIFY_FONTS_DIR")
                .unwrap_or_else(|| "./fonts".to_string())
                .into(),
            output_dir: get("CERTVERIFY_OUTPUT_DIR")
                .unwrap_or_else(|| "./pdfs".to_string())
                .into(),
            id_prefix,
            open_browser: get("CERTVERIFY_OPEN_BROWSER")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }

    pub fn bind_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
