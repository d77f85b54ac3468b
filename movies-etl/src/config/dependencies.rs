//! Dependency initialization and wiring for the movies ETL.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::{ConnectionMode, Settings};
use crate::extractor::ContentExtractor;
use crate::loader::SearchLoader;
use crate::orchestrator::Orchestrator;
use crate::synchronizer::Synchronizer;
use crate::IndexingError;
use movies_etl_repository::{
    validate_identifier, CursorStore, JsonFileStorage, OpenSearchProvider,
    PostgresContentRepository,
};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`Settings::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the settings are invalid, or a connection
    ///   fails in fail-fast mode
    pub async fn new() -> Result<Self, IndexingError> {
        let settings = Settings::from_env()?;
        Self::from_settings(settings).await
    }

    /// Initialize all dependencies from already parsed settings.
    pub async fn from_settings(settings: Settings) -> Result<Self, IndexingError> {
        info!(
            opensearch_url = %settings.opensearch_url,
            postgres_schema = %settings.postgres_schema,
            state_file = %settings.state_file_path.display(),
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.connection_retry_interval.as_secs(),
            "Initializing dependencies"
        );

        // Reject a bad schema before connecting: retrying would not fix it.
        validate_identifier(&settings.postgres_schema).map_err(|e| {
            IndexingError::config(format!("Invalid POSTGRES_SCHEMA: {}", e))
        })?;

        let repository = connect_with_mode(
            "PostgreSQL",
            settings.connection_mode,
            settings.connection_retry_interval,
            || {
                PostgresContentRepository::connect(
                    &settings.database_url,
                    settings.postgres_max_connections,
                    &settings.postgres_schema,
                )
            },
        )
        .await
        .map_err(IndexingError::Database)?;

        info!("Content database connection established");

        let search_provider = OpenSearchProvider::new(&settings.opensearch_url)?;
        connect_with_mode(
            "OpenSearch",
            settings.connection_mode,
            settings.connection_retry_interval,
            || search_provider.ping(),
        )
        .await?;

        info!("OpenSearch connection established");

        let storage = JsonFileStorage::new(settings.state_file_path.clone());
        let cursors = Arc::new(CursorStore::open(Arc::new(storage)).await);

        let extractor = ContentExtractor::new(Arc::new(repository), settings.retry.clone())
            .with_fan_out_batch_size(settings.synchronizer.fan_out_batch_size);

        let loader = SearchLoader::with_config(
            Arc::new(search_provider),
            settings.index.clone(),
            settings.retry.clone(),
        );

        let synchronizer = Synchronizer::new(
            extractor,
            loader,
            cursors,
            settings.synchronizer.clone(),
        );

        let orchestrator =
            Orchestrator::with_config(Arc::new(synchronizer), settings.orchestrator.clone());

        Ok(Self { orchestrator })
    }
}

/// Run `connect` until it succeeds, honoring the connection mode.
async fn connect_with_mode<T, E, F, Fut>(
    service: &str,
    mode: ConnectionMode,
    retry_interval: Duration,
    mut connect: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match connect().await {
            Ok(connected) => return Ok(connected),
            Err(e) => match mode {
                ConnectionMode::FailFast => return Err(e),
                ConnectionMode::Retry => {
                    warn!(
                        service = %service,
                        error = %e,
                        retry_interval_secs = retry_interval.as_secs(),
                        "Failed to connect, retrying..."
                    );
                    sleep(retry_interval).await;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_fail_fast_returns_first_error() {
        let attempts = AtomicUsize::new(0);

        let result: Result<(), String> = connect_with_mode(
            "test",
            ConnectionMode::FailFast,
            Duration::from_millis(1),
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err("refused".to_string())
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "refused");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_mode_retries_until_connected() {
        let attempts = AtomicUsize::new(0);

        let result = connect_with_mode(
            "test",
            ConnectionMode::Retry,
            Duration::from_secs(15),
            || async {
                if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err("refused".to_string())
                } else {
                    Ok("connected")
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), "connected");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }
}
