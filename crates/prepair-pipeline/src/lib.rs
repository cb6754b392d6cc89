//! prepair-pipeline — Configuration, bucketed writers, and the per-document
//! orchestrator that drives the corpus build end to end.

pub mod config;
pub mod orchestrator;
pub mod writers;

pub use orchestrator::{run_pipeline, PipelineDeps, PipelineOptions, RunSummary};
pub use writers::{spawn_writers, Bucket, BucketSinks};
