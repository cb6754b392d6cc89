//! Bucketed JSONL writers.
//!
//! One unbounded queue and one writer task per outcome bucket. Records are
//! appended in publish order, one JSON object per line; writers never
//! reorder, batch, or deduplicate. Completion is signalled by closing the
//! channel — when every sink clone is dropped the writer drains what is
//! left and exits.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use prepair_ingestion::models::PaperRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Extracted,
    Unextracted,
    Unknown,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Extracted, Bucket::Unextracted, Bucket::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Extracted   => "extracted",
            Bucket::Unextracted => "unextracted",
            Bucket::Unknown     => "unknown",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Bucket::Extracted   => "extracted_papers.jsonl",
            Bucket::Unextracted => "unextracted_papers.jsonl",
            Bucket::Unknown     => "unknown_papers.jsonl",
        }
    }
}

/// Senders for the three bucket queues. Dropping the last clone of a sink
/// closes its queue and lets the writer finish.
#[derive(Clone)]
pub struct BucketSinks {
    extracted: UnboundedSender<PaperRecord>,
    unextracted: UnboundedSender<PaperRecord>,
    unknown: UnboundedSender<PaperRecord>,
}

impl BucketSinks {
    /// Hand a finished record to its bucket. The record is moved; nothing
    /// retains a reference after publish.
    pub fn publish(&self, bucket: Bucket, record: PaperRecord) -> anyhow::Result<()> {
        let sender = match bucket {
            Bucket::Extracted   => &self.extracted,
            Bucket::Unextracted => &self.unextracted,
            Bucket::Unknown     => &self.unknown,
        };
        sender
            .send(record)
            .map_err(|_| anyhow::anyhow!("{} writer is gone", bucket.as_str()))
    }
}

/// Create the storage root and spawn one writer task per bucket.
pub async fn spawn_writers(
    storage_root: &Path,
) -> anyhow::Result<(BucketSinks, Vec<JoinHandle<anyhow::Result<usize>>>)> {
    tokio::fs::create_dir_all(storage_root).await?;

    let mut senders = Vec::new();
    let mut tasks = Vec::new();
    for bucket in Bucket::ALL {
        let (tx, rx) = mpsc::unbounded_channel();
        let path = storage_root.join(bucket.file_name());
        tasks.push(tokio::spawn(write_bucket(bucket, path, rx)));
        senders.push(tx);
    }

    let mut it = senders.into_iter();
    let sinks = BucketSinks {
        extracted: it.next().unwrap(),
        unextracted: it.next().unwrap(),
        unknown: it.next().unwrap(),
    };
    Ok((sinks, tasks))
}

async fn write_bucket(
    bucket: Bucket,
    path: PathBuf,
    mut rx: UnboundedReceiver<PaperRecord>,
) -> anyhow::Result<usize> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await?;

    let mut written = 0usize;
    while let Some(record) = rx.recv().await {
        let line = serde_json::to_string(&record)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        written += 1;
        debug!(bucket = bucket.as_str(), written, "Record written");
    }

    info!(bucket = bucket.as_str(), written, path = %path.display(), "Writer finished");
    Ok(written)
}
