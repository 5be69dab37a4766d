use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use genhub_pipeline::rate_limit::{DEFAULT_PER_HOUR, DEFAULT_PER_MINUTE};
use genhub_pipeline::worker::{DEFAULT_POLL_TIMEOUT, DEFAULT_WORKERS};
use genhub_pipeline::RateLimitConfig;
use genhub_provider::api::DEFAULT_API_URL;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Which browser origins may call the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: CorsOrigins,
    pub request_timeout_secs: u64,
    /// How long shutdown waits for running jobs.
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    /// Provider API key. `None` leaves the provider inactive until a key is
    /// set at runtime.
    pub runware_api_key: Option<String>,
    pub runware_api_url: String,
    /// Directory downloaded assets are written to.
    pub storage_path: PathBuf,
    pub cache_ttl_secs: u64,
    pub rate_limit: RateLimitConfig,
    pub max_concurrent_generations: usize,
    pub queue_poll_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                      |
    /// |------------------------------|------------------------------|
    /// | `HOST`                       | `127.0.0.1`                  |
    /// | `PORT`                       | `8000`                       |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`      |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                         |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                         |
    /// | `DATABASE_URL`               | required                     |
    /// | `RUNWARE_API_KEY`            | unset                        |
    /// | `RUNWARE_API_URL`            | `https://api.runware.ai/v1`  |
    /// | `STORAGE_PATH`               | `./generated`                |
    /// | `CACHE_TTL`                  | `3600`                       |
    /// | `RATE_LIMIT_PER_MINUTE`      | `60`                         |
    /// | `RATE_LIMIT_PER_HOUR`        | `1000`                       |
    /// | `MAX_CONCURRENT_GENERATIONS` | `3`                          |
    /// | `QUEUE_POLL_SECS`            | `5`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".into());
        let port = parse_or(&var, "PORT", 8000u16)?;
        let cors_origins = parse_cors(var("CORS_ORIGINS"))?;
        let request_timeout_secs = parse_or(&var, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = parse_or(&var, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let runware_api_key = var("RUNWARE_API_KEY");
        let runware_api_url = var("RUNWARE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let storage_path = var("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./generated"));
        let cache_ttl_secs = parse_or(&var, "CACHE_TTL", 3600u64)?;
        let rate_limit = RateLimitConfig {
            requests_per_minute: parse_or(&var, "RATE_LIMIT_PER_MINUTE", DEFAULT_PER_MINUTE)?,
            requests_per_hour: parse_or(&var, "RATE_LIMIT_PER_HOUR", DEFAULT_PER_HOUR)?,
        };
        let max_concurrent_generations =
            parse_or(&var, "MAX_CONCURRENT_GENERATIONS", DEFAULT_WORKERS)?;
        let queue_poll_secs = parse_or(&var, "QUEUE_POLL_SECS", DEFAULT_POLL_TIMEOUT.as_secs())?;

        if max_concurrent_generations == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_CONCURRENT_GENERATIONS",
                value: "0".into(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            runware_api_key,
            runware_api_url,
            storage_path,
            cache_ttl_secs,
            rate_limit,
            max_concurrent_generations,
            queue_poll_secs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn queue_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_poll_secs)
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
    }
}

fn parse_cors(raw: Option<String>) -> Result<CorsOrigins, ConfigError> {
    let raw = raw.unwrap_or_else(|| "http://localhost:5173".into());
    if raw.trim() == "*" {
        return Ok(CorsOrigins::Any);
    }

    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    for origin in &origins {
        if HeaderValue::from_str(origin).is_err() {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                value: origin.clone(),
            });
        }
    }
    Ok(CorsOrigins::List(origins))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/genhub")]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(
            config.cors_origins,
            CorsOrigins::List(vec!["http://localhost:5173".into()])
        );
        assert_eq!(config.runware_api_key, None);
        assert_eq!(config.runware_api_url, DEFAULT_API_URL);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert_eq!(config.max_concurrent_generations, 3);
        assert_eq!(config.queue_poll_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_number_names_the_variable() {
        let err = load(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "PORT", ref value } if value == "eighty");
    }

    #[test]
    fn cors_wildcard_and_lists() {
        let any = load(&[("DATABASE_URL", "postgres://x"), ("CORS_ORIGINS", "*")]).unwrap();
        assert_eq!(any.cors_origins, CorsOrigins::Any);

        let list = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ])
        .unwrap();
        assert_eq!(
            list.cors_origins,
            CorsOrigins::List(vec!["http://a.test".into(), "http://b.test".into()])
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgres://x"),
            ("MAX_CONCURRENT_GENERATIONS", "0"),
        ])
        .unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "MAX_CONCURRENT_GENERATIONS", .. });
    }
}
