//! Data models for the corpus-building pipeline.

use serde::{Deserialize, Serialize};

/// Sentinel the registry uses for preprints with no published counterpart.
pub const NOT_PUBLISHED: &str = "NA";

/// One output record, serialized as a single JSON line into exactly one of
/// the three outcome buckets. Everything except the source PDF name is
/// optional; fields fill in stage by stage as the pipeline learns them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRecord {
    pub preprint_pdf_name: String,
    pub preprint_doi: Option<String>,
    pub published_doi: Option<String>,
    pub published_journal: Option<String>,
    pub preprint_title: Option<String>,
    pub preprint_authors: Option<String>,
    pub preprint_category: Option<String>,
    pub preprint_date: Option<String>,
    pub published_date: Option<String>,
    pub preprint_author_corresponding: Option<String>,
    pub preprint_author_corresponding_institution: Option<String>,
    pub preprint_paper: Option<String>,
    pub published_paper: Option<String>,
    /// Landing URL, populated only when published-document download failed.
    pub url: Option<String>,
}

impl PaperRecord {
    pub fn new(preprint_pdf_name: impl Into<String>) -> Self {
        Self {
            preprint_pdf_name: preprint_pdf_name.into(),
            preprint_doi: None,
            published_doi: None,
            published_journal: None,
            preprint_title: None,
            preprint_authors: None,
            preprint_category: None,
            preprint_date: None,
            published_date: None,
            preprint_author_corresponding: None,
            preprint_author_corresponding_institution: None,
            preprint_paper: None,
            published_paper: None,
            url: None,
        }
    }

    /// Fill preprint metadata from a registry *detail* entry.
    pub fn apply_preprint_detail(&mut self, entry: &RegistryEntry) {
        self.preprint_doi = entry.doi.clone();
        self.preprint_authors = entry.authors.clone();
        self.preprint_category = entry.category.clone();
        self.preprint_date = entry.date.clone();
        self.preprint_author_corresponding = entry.author_corresponding.clone();
        self.preprint_author_corresponding_institution =
            entry.author_corresponding_institution.clone();
    }

    /// Fill both sides' metadata from a registry *publication* entry.
    pub fn apply_published_listing(&mut self, entry: &RegistryEntry) {
        self.preprint_doi = entry.preprint_doi.clone();
        self.published_doi = entry.published_doi.clone();
        self.published_journal = entry.published_journal.clone();
        self.preprint_authors = entry.preprint_authors.clone();
        self.preprint_category = entry.preprint_category.clone();
        self.preprint_date = entry.preprint_date.clone();
        self.published_date = entry.published_date.clone();
        self.preprint_author_corresponding = entry.preprint_author_corresponding.clone();
        self.preprint_author_corresponding_institution =
            entry.preprint_author_corresponding_institution.clone();
    }
}

/// One entry of a registry `collection`. The detail endpoint and the
/// publication endpoint return different field sets; both are covered here
/// and absent fields simply stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryEntry {
    // Detail-endpoint shape
    pub doi: Option<String>,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub category: Option<String>,
    pub date: Option<String>,
    pub author_corresponding: Option<String>,
    pub author_corresponding_institution: Option<String>,
    /// Published DOI, or the `"NA"` sentinel when not yet published.
    pub published: Option<String>,
    // Publication-endpoint shape
    pub preprint_doi: Option<String>,
    pub published_doi: Option<String>,
    pub published_journal: Option<String>,
    pub preprint_title: Option<String>,
    pub preprint_authors: Option<String>,
    pub preprint_category: Option<String>,
    pub preprint_date: Option<String>,
    pub published_date: Option<String>,
    pub preprint_author_corresponding: Option<String>,
    pub preprint_author_corresponding_institution: Option<String>,
}

impl RegistryEntry {
    /// Whether this preprint entry still lacks a published counterpart.
    pub fn is_unpublished(&self) -> bool {
        match self.published.as_deref() {
            None => true,
            Some(doi) => doi == NOT_PUBLISHED,
        }
    }
}

/// A registry lookup result: a possibly-empty collection of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryRecord {
    pub collection: Vec<RegistryEntry>,
}

impl RegistryRecord {
    /// Most recently listed entry — the current preprint version.
    pub fn latest(&self) -> Option<&RegistryEntry> {
        self.collection.last()
    }

    /// First listed entry — used for published lookups.
    pub fn first(&self) -> Option<&RegistryEntry> {
        self.collection.first()
    }
}

/// Outcome of published-document resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Raw extracted text of the published PDF (not yet cleaned).
    Text(String),
    /// The document was located but could not be downloaded.
    Failure { landing_url: String },
}
