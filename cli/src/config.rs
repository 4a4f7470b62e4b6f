//! Configuration management for the operator tools.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use workshop_ledger_postgres::PostgresConfig;
use workshop_ledger_runtime::retry::RetryPolicy;

/// Errors from reading the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `LEDGER_BACKEND=postgres` without `DATABASE_URL`.
    #[error("DATABASE_URL must be set for the postgres backend")]
    MissingDatabaseUrl,
    /// A variable held a value that does not parse.
    #[error("invalid value for {var}: {value:?}")]
    Invalid {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Which storage engine the tools open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// `PostgreSQL` via `DATABASE_URL`.
    Postgres(PostgresConfig),
    /// JSON file in a data directory.
    Json {
        /// Directory holding `ledger.json`.
        data_dir: PathBuf,
    },
}

/// Operator tool configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Storage engine and its settings.
    pub backend: Backend,
    /// Retry policy for transient storage failures.
    pub retry: RetryPolicy,
    /// Prometheus scrape address; exporter disabled when `None`.
    pub metrics_addr: Option<SocketAddr>,
}

impl Config {
    /// Load `.env` if present, then read configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for unparseable values or a missing
    /// `DATABASE_URL` when the postgres backend is selected.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real deployments set variables directly.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read configuration through `lookup` instead of the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("LEDGER_BACKEND").as_deref().map(str::trim) {
            None | Some("" | "postgres") => {
                let url = lookup("DATABASE_URL")
                    .filter(|url| !url.trim().is_empty())
                    .ok_or(ConfigError::MissingDatabaseUrl)?;
                let mut postgres = PostgresConfig::new(url);
                postgres.max_connections =
                    parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", postgres.max_connections)?;
                postgres.min_connections =
                    parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", postgres.min_connections)?;
                postgres.connect_timeout = Duration::from_secs(parse_or(
                    &lookup,
                    "DATABASE_CONNECT_TIMEOUT",
                    postgres.connect_timeout.as_secs(),
                )?);
                postgres.run_migrations =
                    parse_or(&lookup, "DATABASE_RUN_MIGRATIONS", postgres.run_migrations)?;
                Backend::Postgres(postgres)
            }
            Some("json") => Backend::Json {
                data_dir: lookup("LEDGER_DATA_DIR")
                    .map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "LEDGER_BACKEND",
                    value: other.to_string(),
                });
            }
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::builder()
            .max_retries(parse_or(&lookup, "LEDGER_RETRY_MAX", defaults.max_retries)?)
            .initial_delay(Duration::from_millis(parse_or(
                &lookup,
                "LEDGER_RETRY_INITIAL_DELAY_MS",
                u64::try_from(defaults.initial_delay.as_millis()).unwrap_or(u64::MAX),
            )?))
            .build();

        let metrics_addr = match lookup("METRICS_ADDR").filter(|v| !v.trim().is_empty()) {
            Some(value) => Some(parse("METRICS_ADDR", &value)?),
            None => None,
        };

        Ok(Self {
            backend,
            retry,
            metrics_addr,
        })
    }
}

fn parse<T: FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(var).map_or(Ok(default), |value| parse(var, &value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn postgres_is_the_default_backend() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/ledger")]).unwrap();
        let Backend::Postgres(postgres) = config.backend else {
            unreachable!("expected postgres backend");
        };
        assert_eq!(postgres, PostgresConfig::new("postgres://localhost/ledger"));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.metrics_addr, None);
    }

    #[test]
    fn postgres_requires_a_url() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::MissingDatabaseUrl);
    }

    #[test]
    fn pool_settings_are_read() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/ledger"),
            ("DATABASE_MAX_CONNECTIONS", "25"),
            ("DATABASE_CONNECT_TIMEOUT", "5"),
            ("DATABASE_RUN_MIGRATIONS", "false"),
        ])
        .unwrap();
        let Backend::Postgres(postgres) = config.backend else {
            unreachable!("expected postgres backend");
        };
        assert_eq!(postgres.max_connections, 25);
        assert_eq!(postgres.min_connections, 1);
        assert_eq!(postgres.connect_timeout, Duration::from_secs(5));
        assert!(!postgres.run_migrations);
    }

    #[test]
    fn json_backend_uses_data_dir() {
        let config = load(&[("LEDGER_BACKEND", "json")]).unwrap();
        assert_eq!(
            config.backend,
            Backend::Json {
                data_dir: PathBuf::from("./data")
            }
        );

        let config = load(&[("LEDGER_BACKEND", "json"), ("LEDGER_DATA_DIR", "/var/ledger")]);
        assert_eq!(
            config.unwrap().backend,
            Backend::Json {
                data_dir: PathBuf::from("/var/ledger")
            }
        );
    }

    #[test]
    fn retry_and_metrics_are_read() {
        let config = load(&[
            ("LEDGER_BACKEND", "json"),
            ("LEDGER_RETRY_MAX", "7"),
            ("LEDGER_RETRY_INITIAL_DELAY_MS", "20"),
            ("METRICS_ADDR", "127.0.0.1:9090"),
        ])
        .unwrap();
        assert_eq!(config.retry.max_retries, 7);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(20));
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9090".parse().unwrap()));
    }

    #[test]
    fn bad_values_are_reported() {
        assert_eq!(
            load(&[("LEDGER_BACKEND", "mysql")]).unwrap_err(),
            ConfigError::Invalid {
                var: "LEDGER_BACKEND",
                value: "mysql".to_string()
            }
        );
        assert!(matches!(
            load(&[("LEDGER_BACKEND", "json"), ("LEDGER_RETRY_MAX", "many")]),
            Err(ConfigError::Invalid { var: "LEDGER_RETRY_MAX", .. })
        ));
    }
}
