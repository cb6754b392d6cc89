//! Metadata resolution: title→DOI, and DOI→registry record with a bounded
//! retry policy on the registry calls.

use async_trait::async_trait;
use tracing::{info, warn};

use prepair_common::error::{PrepairError, Result};
use prepair_common::retry::{retry_with_backoff, RetryPolicy};

use crate::models::RegistryRecord;
use crate::sources::crossref::CrossRefClient;
use crate::sources::registry::RegistryClient;

/// Seam used by the orchestrator; stubbed in pipeline tests.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Title→DOI. A miss is terminal for the document, never retried.
    async fn doi_for_title(&self, title: &str) -> Result<Option<String>>;

    /// DOI→preprint registry record. `None` means the registry has no
    /// record (including after retry exhaustion on transient errors).
    async fn preprint_record(&self, doi: &str) -> Result<Option<RegistryRecord>>;

    /// DOI→published registry record, same contract as `preprint_record`.
    async fn published_record(&self, doi: &str) -> Result<Option<RegistryRecord>>;
}

pub struct RegistryMetadataResolver {
    registry: RegistryClient,
    crossref: CrossRefClient,
    policy: RetryPolicy,
}

impl RegistryMetadataResolver {
    pub fn new(registry: RegistryClient, crossref: CrossRefClient) -> Self {
        Self {
            registry,
            crossref,
            policy: RetryPolicy::registry(),
        }
    }

    /// Retry transient faults per policy; exhaustion becomes a null record,
    /// anything non-transient propagates immediately.
    async fn lookup_with_retry<F, Fut>(&self, doi: &str, op: F) -> Result<Option<RegistryRecord>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<RegistryRecord>>,
    {
        match retry_with_backoff(&self.policy, PrepairError::is_transient, op).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_transient() => {
                info!(doi, error = %e, "Registry unreachable after retries, treating as no record");
                Ok(None)
            }
            Err(e) => {
                warn!(doi, error = %e, "Registry lookup failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MetadataResolver for RegistryMetadataResolver {
    async fn doi_for_title(&self, title: &str) -> Result<Option<String>> {
        self.crossref.doi_for_title(title).await
    }

    async fn preprint_record(&self, doi: &str) -> Result<Option<RegistryRecord>> {
        self.lookup_with_retry(doi, || self.registry.preprint_detail(doi))
            .await
    }

    async fn published_record(&self, doi: &str) -> Result<Option<RegistryRecord>> {
        self.lookup_with_retry(doi, || self.registry.published_detail(doi))
            .await
    }
}
