//! CrossRef title→DOI lookup.
//!
//! A single bibliographic query against https://api.crossref.org/works with
//! `query.title`; the first row's DOI is taken or the lookup is a miss.
//! Polite pool: User-Agent carries a mailto per CrossRef etiquette.

use tracing::{debug, instrument};

use prepair_common::error::Result;
use prepair_common::http::WebClient;

const CR_SEARCH_URL: &str = "https://api.crossref.org/works";
const USER_AGENT:    &str = "Prepair/0.1 (mailto:prepair@example.com)";

pub struct CrossRefClient {
    client: WebClient,
}

impl CrossRefClient {
    pub fn new(client: WebClient) -> Self {
        Self { client }
    }

    /// Resolve a paper title to its DOI. `None` means the lookup had no
    /// usable row — ambiguity in title text is not a transient fault and is
    /// never retried.
    #[instrument(skip(self))]
    pub async fn doi_for_title(&self, title: &str) -> Result<Option<String>> {
        let resp = self
            .client
            .get(CR_SEARCH_URL)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("query.title", title),
                ("rows", "1"),
                ("select", "DOI,title"),
            ])
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        let doi = resp["message"]["items"]
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item["DOI"].as_str())
            .map(String::from);

        debug!(title, doi = ?doi, "CrossRef title lookup");
        Ok(doi)
    }
}
