//! Per-document pipeline orchestration.
//!
//! Drives each local preprint PDF through the stage sequence
//! text extraction → title resolution → DOI lookup → registry linkage →
//! published-document resolution → cleaning, routing every document to
//! exactly one outcome bucket. Stage failures route immediately to their
//! terminal classification; an uncategorized error is caught at the
//! document boundary and the run continues with the next document. The
//! shared success counter stops the producer once the configured threshold
//! of fully-extracted pairs is reached.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use prepair_common::chunk::chunk_text;
use prepair_common::error::{PrepairError, Result};
use prepair_common::retry::{retry_with_backoff, RetryPolicy};
use prepair_ingestion::metadata::MetadataResolver;
use prepair_ingestion::models::{PaperRecord, Resolution};
use prepair_ingestion::pdf::PageTextExtractor;
use prepair_ingestion::resolver::PublishedDocumentResolver;
use prepair_llm::gate::{clean_chunks, InferenceGate};
use prepair_llm::prompts::TITLE_PROMPT;
use prepair_llm::title::{clean_title, is_unresolved, strip_newlines};

use crate::writers::{Bucket, BucketSinks};

// ── Run config and dependencies ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub corpus_dir: PathBuf,
    /// Fully-extracted pairs after which no new document is started.
    pub success_threshold: usize,
    pub chunk_chars: usize,
}

/// External collaborators, behind traits so pipeline tests can stub them.
pub struct PipelineDeps {
    pub extractor: Arc<dyn PageTextExtractor>,
    pub gate: Arc<InferenceGate>,
    pub metadata: Arc<dyn MetadataResolver>,
    pub resolver: Arc<dyn PublishedDocumentResolver>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub documents_processed: usize,
    pub extracted: usize,
    pub unextracted: usize,
    pub unknown: usize,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

// ── Run loop ──────────────────────────────────────────────────────────────────

/// Process every PDF in the corpus directory, one document at a time,
/// publishing each finished record to exactly one bucket before moving on.
pub async fn run_pipeline(
    opts: &PipelineOptions,
    deps: &PipelineDeps,
    sinks: &BucketSinks,
) -> anyhow::Result<RunSummary> {
    let run_id = Uuid::new_v4();
    let t0 = Instant::now();
    let successes = AtomicUsize::new(0);

    let mut summary = RunSummary {
        run_id,
        documents_processed: 0,
        extracted: 0,
        unextracted: 0,
        unknown: 0,
        duration_ms: 0,
        errors: Vec::new(),
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&opts.corpus_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    info!(run_id = %run_id, corpus = %opts.corpus_dir.display(), n_files = paths.len(), "Starting corpus run");

    for path in paths {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            debug!(file = %path.display(), "Skipping non-PDF file");
            continue;
        }

        if successes.load(Ordering::SeqCst) >= opts.success_threshold {
            info!(
                run_id = %run_id,
                threshold = opts.success_threshold,
                "Success threshold reached, not starting new documents"
            );
            break;
        }

        let pdf_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.pdf")
            .to_string();
        info!(run_id = %run_id, paper = %pdf_name, "Processing paper");

        let (bucket, record) = match process_document(&pdf_name, &path, deps, opts).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // No single document's failure terminates the run.
                warn!(paper = %pdf_name, error = %e, "Unexpected error, routing to unknown");
                summary.errors.push(format!("{pdf_name}: {e}"));
                (Bucket::Unknown, PaperRecord::new(pdf_name.clone()))
            }
        };

        match bucket {
            Bucket::Extracted => {
                let total = successes.fetch_add(1, Ordering::SeqCst) + 1;
                summary.extracted += 1;
                info!(paper = %pdf_name, total, "Paper pair extracted");
            }
            Bucket::Unextracted => summary.unextracted += 1,
            Bucket::Unknown => summary.unknown += 1,
        }

        if let Err(e) = sinks.publish(bucket, record) {
            summary.errors.push(format!("{pdf_name}: {e}"));
        }
        summary.documents_processed += 1;
    }

    summary.duration_ms = t0.elapsed().as_millis() as u64;
    info!(
        run_id      = %run_id,
        documents   = summary.documents_processed,
        extracted   = summary.extracted,
        unextracted = summary.unextracted,
        unknown     = summary.unknown,
        duration_ms = summary.duration_ms,
        errors      = summary.errors.len(),
        "Corpus run complete"
    );
    Ok(summary)
}

// ── Per-document state machine ────────────────────────────────────────────────

#[instrument(skip_all, fields(paper = %pdf_name))]
async fn process_document(
    pdf_name: &str,
    path: &Path,
    deps: &PipelineDeps,
    opts: &PipelineOptions,
) -> Result<(Bucket, PaperRecord)> {
    let mut record = PaperRecord::new(pdf_name);

    // Text extraction. An empty result (text layer and OCR both dry) is
    // undeterminable — no later stage can run.
    let pages = deps.extractor.extract_pages(path).await?;
    if pages.is_empty() {
        info!("No extractable text, routing to unknown");
        return Ok((Bucket::Unknown, record));
    }

    // Per-page cleaning through the gate. A chunk failure fails the stage
    // for this document only.
    let mut cleaned_pages = Vec::with_capacity(pages.len());
    for page in &pages {
        let chunks = chunk_text(page, opts.chunk_chars);
        match clean_chunks(&deps.gate, &chunks).await {
            Ok(cleaned) => cleaned_pages.push(cleaned),
            Err(e) => {
                warn!(error = %e, "Chunk cleaning failed, routing to unknown");
                return Ok((Bucket::Unknown, record));
            }
        }
    }
    record.preprint_paper = Some(cleaned_pages.join(" "));

    // Title resolution from the first page's cleaned text.
    let intro = strip_newlines(&cleaned_pages[0]);
    let raw_title = match deps.gate.complete_text(TITLE_PROMPT, &intro).await {
        Ok(t) => t,
        Err(e) => {
            warn!(error = %e, "Title extraction failed, routing to unknown");
            return Ok((Bucket::Unknown, record));
        }
    };
    let title = clean_title(&raw_title);
    if is_unresolved(title.as_deref()) {
        info!("Title not found, routing to unknown");
        record.preprint_title = title;
        return Ok((Bucket::Unknown, record));
    }
    let title = title.unwrap_or_default();
    record.preprint_title = Some(title.clone());
    info!(title = %title, "Title resolved");

    // Title → DOI. A miss is terminal, not a fault.
    let Some(doi) = deps.metadata.doi_for_title(&title).await? else {
        info!("No DOI for title, routing to unknown");
        return Ok((Bucket::Unknown, record));
    };
    debug!(doi, "Preprint DOI resolved");

    // Preprint registry record.
    let preprint = deps.metadata.preprint_record(&doi).await?;
    let Some(latest) = preprint.as_ref().and_then(|r| r.latest()) else {
        info!(doi, "Registry has no preprint record, routing to unknown");
        return Ok((Bucket::Unknown, record));
    };

    // Not yet published: a successful preprint-only outcome.
    if latest.is_unpublished() {
        info!(doi, "Preprint has no published counterpart yet");
        record.apply_preprint_detail(latest);
        return Ok((Bucket::Unextracted, record));
    }
    let published_doi = latest.published.clone().unwrap_or_default();

    // Published registry record.
    let published = deps.metadata.published_record(&published_doi).await?;
    let Some(listing) = published.as_ref().and_then(|r| r.first()) else {
        info!(doi = %published_doi, "Registry has no published record, keeping preprint only");
        record.apply_preprint_detail(latest);
        return Ok((Bucket::Unextracted, record));
    };
    record.apply_published_listing(listing);
    let confirmed_doi = listing
        .published_doi
        .clone()
        .unwrap_or_else(|| published_doi.clone());

    // Published-document resolution, retried only on transport-class
    // errors. A structured failure is a definitive outcome, never retried.
    let policy = RetryPolicy::resolver();
    let resolution = retry_with_backoff(&policy, PrepairError::is_transient, || {
        deps.resolver.resolve(&confirmed_doi)
    })
    .await;

    match resolution {
        Err(e) => {
            warn!(doi = %confirmed_doi, error = %e, "Published resolution failed, keeping preprint only");
            Ok((Bucket::Unextracted, record))
        }
        Ok(Resolution::Failure { landing_url }) => {
            info!(doi = %confirmed_doi, landing_url = %landing_url, "Could not download published document");
            record.url = Some(landing_url);
            Ok((Bucket::Unextracted, record))
        }
        Ok(Resolution::Text(raw)) => {
            let chunks = chunk_text(&raw, opts.chunk_chars);
            match clean_chunks(&deps.gate, &chunks).await {
                Ok(cleaned) => {
                    record.published_paper = Some(cleaned);
                    Ok((Bucket::Extracted, record))
                }
                Err(e) => {
                    warn!(error = %e, "Published text cleaning failed, keeping preprint only");
                    Ok((Bucket::Unextracted, record))
                }
            }
        }
    }
}
