use std::path::PathBuf;

use serde::Deserialize;

use crate::result::Result;

pub const ENV_PREFIX: &str = "FRESH_CONNECT_";

/// Byte size above which uploads go to the filesystem instead of the record.
pub const DEFAULT_STORAGE_THRESHOLD: u64 = 10 * 1024 * 1024;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_uri")]
    pub db_uri: String,
    #[serde(default = "default_db_database")]
    pub db_database: String,
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
    #[serde(default = "default_storage_threshold")]
    pub storage_threshold: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

// Plain `PORT` is what most hosting platforms inject.
fn default_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(5000)
}

fn default_db_uri() -> String {
    String::from("mongodb://localhost:27017")
}

fn default_db_database() -> String {
    String::from("freshconnect")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_storage_threshold() -> u64 {
    DEFAULT_STORAGE_THRESHOLD
}

fn default_max_upload_bytes() -> u64 {
    100 * 1024 * 1024
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Config>()?)
    }

    pub fn from_pairs<I>(pairs: I) -> Result<Config>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, Config>(pairs)?)
    }

    pub fn bind_name(&self) -> String {
        format!("{host}:{port}", host = self.host, port = self.port)
    }
}
