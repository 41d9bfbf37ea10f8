use laburar::auth::{InMemoryIdentityProvider, SessionManager};
use laburar::config::DirectoryConfig;
use laburar::directory::{load_into, DirectoryService, InMemoryDocumentStore, SampleListings};
use laburar::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type MemoryDirectory = DirectoryService<InMemoryDocumentStore, InMemoryIdentityProvider>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn memory_directory() -> Arc<MemoryDirectory> {
    let store = Arc::new(InMemoryDocumentStore::new());
    let session = SessionManager::new(Arc::new(InMemoryIdentityProvider::new()));
    Arc::new(DirectoryService::new(store, session))
}

/// Load the sample listings when the configuration asks for them.
pub(crate) async fn seed_directory(
    directory: &MemoryDirectory,
    config: &DirectoryConfig,
) -> Result<usize, AppError> {
    if !config.seed_sample_data {
        return Ok(0);
    }

    let samples = match &config.seed_file {
        Some(path) => {
            info!(path = %path.display(), "loading sample listings from file");
            SampleListings::from_path(path)?
        }
        None => SampleListings::embedded()?,
    };
    Ok(load_into(directory.repository(), samples).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use laburar::directory::ListingFilter;

    #[tokio::test]
    async fn seeding_is_skipped_when_disabled() {
        let directory = memory_directory();
        let stored = seed_directory(&directory, &DirectoryConfig::default())
            .await
            .expect("seeding succeeds");

        assert_eq!(stored, 0);
        let listings = directory
            .browse(&ListingFilter::default())
            .await
            .expect("browse");
        assert!(listings.is_empty());
    }

    #[tokio::test]
    async fn embedded_samples_are_loaded_when_enabled() {
        let directory = memory_directory();
        let config = DirectoryConfig {
            seed_sample_data: true,
            seed_file: None,
        };

        let stored = seed_directory(&directory, &config)
            .await
            .expect("seeding succeeds");

        assert_eq!(stored, 5);
    }

    #[tokio::test]
    async fn missing_seed_file_is_an_error() {
        let directory = memory_directory();
        let config = DirectoryConfig {
            seed_sample_data: true,
            seed_file: Some("does/not/exist.csv".into()),
        };

        let outcome = seed_directory(&directory, &config).await;
        assert!(matches!(outcome, Err(AppError::Seed(_))));
    }
}
