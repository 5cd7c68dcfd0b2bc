//! Server configuration read from the environment.

use std::net::SocketAddr;

use crate::error::AppError;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Settings for one run of the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Without a database URL the server keeps events in memory.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Fixes the token-draw sequence when set.
    pub rng_seed: Option<u64>,
}

impl ApiConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an unparseable value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an unparseable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let host = lookup("HOST")
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_owned());
        let port = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        let database_max_connections =
            parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_MAX_CONNECTIONS);
        if database_max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_owned(),
            ));
        }
        let rng_seed = parse_var(&lookup, "RNG_SEED")?;

        Ok(Self {
            host,
            port,
            database_url,
            database_max_connections,
            rng_seed,
        })
    }

    /// The address the server listens on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        _ => Ok(None),
    }
}
