use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub tls: Option<TlsPaths>,
}

impl Config {
    /// Loads `.env` if present, then reads `RELAY_ADDR`, `RELAY_TLS_CERT`
    /// and `RELAY_TLS_KEY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_addr = lookup("RELAY_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = raw_addr.parse().map_err(|_| ConfigError::InvalidValue {
            name: "RELAY_ADDR",
            value: raw_addr.clone(),
        })?;

        let tls = match (lookup("RELAY_TLS_CERT"), lookup("RELAY_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => None,
        };

        Ok(Config { addr, tls })
    }
}
