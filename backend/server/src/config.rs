use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

pub const PINATA_API_URL: &str = "https://api.pinata.cloud";

#[derive(Error, Debug)]
#[error("Invalid {key} value: {message}")]
pub struct ConfigError {
    key: String,
    message: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub pinata_api_url: String,
    pub pinata_jwt: Option<String>,
    pub seed: bool,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("RUST_PORT", "5000")?,
            upload_dir: try_load("UPLOAD_DIR", "uploads")?,
            pinata_api_url: try_load("PINATA_API_URL", PINATA_API_URL)?,
            pinata_jwt: var("PINATA_API_KEY")
                .ok()
                .or_else(|| read_secret("PINATA_API_KEY"))
                .filter(|key| !key.is_empty()),
            seed: true,
        })
    }

    /// Config for tests and embedding: no credentials, nothing read from the environment.
    pub fn local(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 0,
            upload_dir: upload_dir.into(),
            pinata_api_url: PINATA_API_URL.to_string(),
            pinata_jwt: None,
            seed: true,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError {
                key: key.to_string(),
                message: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|_| {
            warn!("{secret_name} not configured, pinning falls back to local storage");
        })
        .ok()
}
