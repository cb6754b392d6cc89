//! bioRxiv preprint-registry client.
//!
//! Endpoints:
//!   detail lookup      https://api.biorxiv.org/details/biorxiv/{doi}
//!   published lookup   https://api.biorxiv.org/pubs/biorxiv/{doi}
//!   bulk listing       https://api.biorxiv.org/pubs/biorxiv/{interval}/{cursor}
//!
//! Bulk listing pages are a fixed 100 entries; the caller advances the
//! cursor until an empty page or the requested limit.

use tracing::{debug, info, instrument};

use prepair_common::error::Result;
use prepair_common::http::WebClient;

use crate::models::{RegistryEntry, RegistryRecord};

const DETAIL_BASE: &str = "https://api.biorxiv.org/details/biorxiv";
const PUBS_BASE:   &str = "https://api.biorxiv.org/pubs/biorxiv";
const PAGE_SIZE:   usize = 100;

pub struct RegistryClient {
    client: WebClient,
}

impl RegistryClient {
    pub fn new(client: WebClient) -> Self {
        Self { client }
    }

    /// Preprint detail record for a DOI. The collection may be empty.
    #[instrument(skip(self))]
    pub async fn preprint_detail(&self, doi: &str) -> Result<RegistryRecord> {
        let url = format!("{DETAIL_BASE}/{doi}");
        let record = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<RegistryRecord>()
            .await?;
        debug!(doi, entries = record.collection.len(), "Registry detail lookup");
        Ok(record)
    }

    /// Published record for a DOI. The collection may be empty.
    #[instrument(skip(self))]
    pub async fn published_detail(&self, doi: &str) -> Result<RegistryRecord> {
        let url = format!("{PUBS_BASE}/{doi}");
        let record = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<RegistryRecord>()
            .await?;
        debug!(doi, entries = record.collection.len(), "Registry published lookup");
        Ok(record)
    }

    /// Bulk-list publication entries for a date interval
    /// (e.g. "2017-06-01/2020-01-01"), advancing the page cursor until an
    /// empty page or `limit` entries.
    #[instrument(skip(self))]
    pub async fn list_publications(
        &self,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<RegistryEntry>> {
        let mut entries = Vec::new();
        let mut cursor = 0usize;

        loop {
            let url = format!("{PUBS_BASE}/{interval}/{cursor}");
            let record = self
                .client
                .get(&url)
                .send()
                .await?
                .json::<RegistryRecord>()
                .await?;

            if record.collection.is_empty() {
                break;
            }
            entries.extend(record.collection);

            if entries.len() >= limit {
                entries.truncate(limit);
                break;
            }
            cursor += PAGE_SIZE;
        }

        info!(interval, n = entries.len(), "Registry interval listing complete");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepair_common::http::WebClient;

    #[test]
    fn test_collection_parse() {
        let record: RegistryRecord = serde_json::from_str(
            r#"{
                "messages": [{"status": "ok"}],
                "collection": [
                    {
                        "doi": "10.1101/2019.12.11.873273",
                        "authors": "Doe, J.; Roe, R.",
                        "category": "neuroscience",
                        "date": "2019-12-12",
                        "published": "NA"
                    }
                ]
            }"#,
        )
        .unwrap();
        let latest = record.latest().unwrap();
        assert_eq!(latest.doi.as_deref(), Some("10.1101/2019.12.11.873273"));
        assert!(latest.is_unpublished());
    }

    #[test]
    fn test_empty_collection_parse() {
        let record: RegistryRecord =
            serde_json::from_str(r#"{"collection": []}"#).unwrap();
        assert!(record.latest().is_none());
        assert!(record.first().is_none());
    }

    #[tokio::test]
    #[ignore = "Hits the live bioRxiv API"]
    async fn test_live_preprint_detail() {
        let client = RegistryClient::new(WebClient::new().unwrap());
        let record = client
            .preprint_detail("10.1101/2020.03.03.972133")
            .await
            .unwrap();
        assert!(!record.collection.is_empty());
    }
}
