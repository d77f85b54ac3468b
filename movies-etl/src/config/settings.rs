//! Runtime settings read from environment variables.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::orchestrator::OrchestratorConfig;
use crate::retry::RetryPolicy;
use crate::synchronizer::SynchronizerConfig;
use crate::IndexingError;
use movies_etl_repository::SearchIndexConfig;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default schema holding the content tables.
const DEFAULT_POSTGRES_SCHEMA: &str = "content";

/// Default size of the content database pool.
const DEFAULT_POSTGRES_MAX_CONNECTIONS: u32 = 5;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default location of the cursor state file.
const DEFAULT_STATE_FILE_PATH: &str = "state.json";

/// Connection mode for the content database and the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection every interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse the connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive)
    /// Defaults to "retry" if not set or invalid.
    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!("Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Every tunable of the ETL process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub postgres_schema: String,
    pub postgres_max_connections: u32,
    pub opensearch_url: String,
    pub connection_mode: ConnectionMode,
    pub connection_retry_interval: Duration,
    pub state_file_path: PathBuf,
    pub index: SearchIndexConfig,
    pub synchronizer: SynchronizerConfig,
    pub orchestrator: OrchestratorConfig,
    pub retry: RetryPolicy,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection string (required)
    /// - `POSTGRES_SCHEMA`: Schema of the content tables (default: content)
    /// - `POSTGRES_MAX_CONNECTIONS`: Pool size (default: 5)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `CONNECTION_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `MOVIES_INDEX`, `GENRES_INDEX`, `PERSONS_INDEX`: Index names
    ///   (default: movies, genres, persons)
    /// - `BULK_MAX_BATCH_SIZE`: Documents per bulk request (default: 1000)
    /// - `STATE_FILE_PATH`: Cursor state file (default: state.json)
    /// - `PERSONS_PER_RUN`, `GENRES_PER_RUN`, `FILM_WORKS_PER_RUN`: Changed
    ///   rows handled per cycle (default: 100, 1, 1000)
    /// - `FAN_OUT_BATCH_SIZE`: Film works per cascade chunk (default: 1000)
    /// - `PERSONS_RUN_INTERVAL_SECS`, `GENRES_RUN_INTERVAL_SECS`,
    ///   `FILM_WORKS_RUN_INTERVAL_SECS`: Cycle intervals (default: 60)
    /// - `PROGRESS_INTERVAL_SECS`: Progress log interval (default: 60)
    /// - `RETRY_MIN_DELAY_MS`, `RETRY_MAX_DELAY_MS`, `RETRY_MULTIPLIER`,
    ///   `RETRY_MAX_ELAPSED_SECS`: Backoff for transient failures
    ///   (default: 1000, 60000, 2, 300)
    ///
    /// Invalid values fall back to their default with a warning.
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - Parsed settings
    /// * `Err(IndexingError)` - If `DATABASE_URL` is missing
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read settings through `lookup` instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let database_url = vars
            .string("DATABASE_URL")
            .ok_or_else(|| IndexingError::config("DATABASE_URL must be set"))?;

        let index_defaults = SearchIndexConfig::default();
        let index = SearchIndexConfig {
            movies_index: vars
                .string("MOVIES_INDEX")
                .unwrap_or(index_defaults.movies_index),
            genres_index: vars
                .string("GENRES_INDEX")
                .unwrap_or(index_defaults.genres_index),
            persons_index: vars
                .string("PERSONS_INDEX")
                .unwrap_or(index_defaults.persons_index),
            max_batch_size: vars.positive("BULK_MAX_BATCH_SIZE", index_defaults.max_batch_size),
        };

        let sync_defaults = SynchronizerConfig::default();
        let synchronizer = SynchronizerConfig {
            persons_per_run: vars.positive("PERSONS_PER_RUN", sync_defaults.persons_per_run),
            genres_per_run: vars.positive("GENRES_PER_RUN", sync_defaults.genres_per_run),
            film_works_per_run: vars
                .positive("FILM_WORKS_PER_RUN", sync_defaults.film_works_per_run),
            fan_out_batch_size: vars
                .positive("FAN_OUT_BATCH_SIZE", sync_defaults.fan_out_batch_size),
        };

        let orchestrator_defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            persons_interval: vars.seconds(
                "PERSONS_RUN_INTERVAL_SECS",
                orchestrator_defaults.persons_interval,
            ),
            genres_interval: vars.seconds(
                "GENRES_RUN_INTERVAL_SECS",
                orchestrator_defaults.genres_interval,
            ),
            film_works_interval: vars.seconds(
                "FILM_WORKS_RUN_INTERVAL_SECS",
                orchestrator_defaults.film_works_interval,
            ),
            progress_interval: vars.seconds(
                "PROGRESS_INTERVAL_SECS",
                orchestrator_defaults.progress_interval,
            ),
            ..orchestrator_defaults
        };

        let retry_defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            min_delay: vars.millis("RETRY_MIN_DELAY_MS", retry_defaults.min_delay),
            max_delay: vars.millis("RETRY_MAX_DELAY_MS", retry_defaults.max_delay),
            multiplier: vars.positive("RETRY_MULTIPLIER", retry_defaults.multiplier),
            max_elapsed: vars.seconds("RETRY_MAX_ELAPSED_SECS", retry_defaults.max_elapsed),
        };

        Ok(Self {
            database_url,
            postgres_schema: vars
                .string("POSTGRES_SCHEMA")
                .unwrap_or_else(|| DEFAULT_POSTGRES_SCHEMA.to_string()),
            postgres_max_connections: vars
                .positive("POSTGRES_MAX_CONNECTIONS", DEFAULT_POSTGRES_MAX_CONNECTIONS),
            opensearch_url: vars
                .string("OPENSEARCH_URL")
                .unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
            connection_mode: ConnectionMode::parse(
                vars.string("OPENSEARCH_CONNECTION_MODE").as_deref(),
            ),
            connection_retry_interval: vars.seconds(
                "CONNECTION_RETRY_INTERVAL_SECS",
                Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            ),
            state_file_path: vars
                .string("STATE_FILE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE_PATH)),
            index,
            synchronizer,
            orchestrator,
            retry,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// A non-blank value, trimmed.
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn parsed<T>(&self, name: &str, default: T, valid: impl Fn(&T) -> bool) -> T
    where
        T: FromStr + Display + Copy,
    {
        let Some(raw) = self.string(name) else {
            return default;
        };

        match raw.parse::<T>() {
            Ok(value) if valid(&value) => value,
            _ => {
                warn!(
                    variable = name,
                    value = %raw,
                    default = %default,
                    "Invalid value, using default"
                );
                default
            }
        }
    }

    fn positive<T>(&self, name: &str, default: T) -> T
    where
        T: FromStr + Display + Copy + PartialOrd + Default,
    {
        self.parsed(name, default, |value| *value > T::default())
    }

    fn seconds(&self, name: &str, default: Duration) -> Duration {
        Duration::from_secs(self.positive(name, default.as_secs()))
    }

    fn millis(&self, name: &str, default: Duration) -> Duration {
        let default_millis = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.positive(name, default_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, IndexingError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("DATABASE_URL", "postgres://app@localhost/movies")]).unwrap();

        assert_eq!(settings.database_url, "postgres://app@localhost/movies");
        assert_eq!(settings.postgres_schema, "content");
        assert_eq!(settings.postgres_max_connections, 5);
        assert_eq!(settings.opensearch_url, "http://localhost:9200");
        assert_eq!(settings.connection_mode, ConnectionMode::Retry);
        assert_eq!(settings.connection_retry_interval, Duration::from_secs(15));
        assert_eq!(settings.state_file_path, PathBuf::from("state.json"));
        assert_eq!(settings.index.movies_index, "movies");
        assert_eq!(settings.index.max_batch_size, 1000);
        assert_eq!(settings.synchronizer.persons_per_run, 100);
        assert_eq!(settings.synchronizer.genres_per_run, 1);
        assert_eq!(settings.synchronizer.film_works_per_run, 1000);
        assert_eq!(settings.synchronizer.fan_out_batch_size, 1000);
        assert_eq!(settings.orchestrator.persons_interval, Duration::from_secs(60));
        assert_eq!(settings.orchestrator.progress_interval, Duration::from_secs(60));
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn test_missing_database_url_is_a_config_error() {
        let result = settings(&[("OPENSEARCH_URL", "http://search:9200")]);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));

        let result = settings(&[("DATABASE_URL", "   ")]);
        assert!(matches!(result, Err(IndexingError::ConfigError(_))));
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://db/movies"),
            ("POSTGRES_SCHEMA", "catalog"),
            ("OPENSEARCH_CONNECTION_MODE", "FAIL-FAST"),
            ("MOVIES_INDEX", "movies_v2"),
            ("GENRES_PER_RUN", "10"),
            ("FAN_OUT_BATCH_SIZE", "250"),
            ("GENRES_RUN_INTERVAL_SECS", "5"),
            ("RETRY_MIN_DELAY_MS", "200"),
            ("RETRY_MAX_ELAPSED_SECS", "30"),
            ("STATE_FILE_PATH", "/var/lib/etl/state.json"),
        ])
        .unwrap();

        assert_eq!(settings.postgres_schema, "catalog");
        assert_eq!(settings.connection_mode, ConnectionMode::FailFast);
        assert_eq!(settings.index.movies_index, "movies_v2");
        assert_eq!(settings.index.persons_index, "persons");
        assert_eq!(settings.synchronizer.genres_per_run, 10);
        assert_eq!(settings.synchronizer.fan_out_batch_size, 250);
        assert_eq!(settings.orchestrator.genres_interval, Duration::from_secs(5));
        assert_eq!(settings.retry.min_delay, Duration::from_millis(200));
        assert_eq!(settings.retry.max_elapsed, Duration::from_secs(30));
        assert_eq!(
            settings.state_file_path,
            PathBuf::from("/var/lib/etl/state.json")
        );
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://db/movies"),
            ("PERSONS_PER_RUN", "many"),
            ("FILM_WORKS_PER_RUN", "0"),
            ("POSTGRES_MAX_CONNECTIONS", "-3"),
            ("RETRY_MULTIPLIER", "2.5"),
        ])
        .unwrap();

        assert_eq!(settings.synchronizer.persons_per_run, 100);
        assert_eq!(settings.synchronizer.film_works_per_run, 1000);
        assert_eq!(settings.postgres_max_connections, 5);
        assert_eq!(settings.retry.multiplier, 2);
    }

    #[test]
    fn test_connection_mode_parsing() {
        assert_eq!(ConnectionMode::parse(None), ConnectionMode::Retry);
        assert_eq!(ConnectionMode::parse(Some("retry")), ConnectionMode::Retry);
        assert_eq!(ConnectionMode::parse(Some("fail_fast")), ConnectionMode::FailFast);
        assert_eq!(ConnectionMode::parse(Some("bogus")), ConnectionMode::Retry);
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("DATABASE_URL", "postgres://env/movies");
        env::set_var("PERSONS_INDEX", "people");

        let settings = Settings::from_env().unwrap();

        env::remove_var("DATABASE_URL");
        env::remove_var("PERSONS_INDEX");

        assert_eq!(settings.database_url, "postgres://env/movies");
        assert_eq!(settings.index.persons_index, "people");
    }

    #[test]
    #[serial]
    fn test_from_env_without_database_url() {
        env::remove_var("DATABASE_URL");
        assert!(Settings::from_env().is_err());
    }
}
