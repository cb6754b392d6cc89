//! Prepair — paired preprint/published corpus builder.
//! Entry point for the pipeline binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tracing::info;
use tracing_subscriber::EnvFilter;

use prepair_common::http::WebClient;
use prepair_ingestion::metadata::RegistryMetadataResolver;
use prepair_ingestion::pdf::PdfTextExtractor;
use prepair_ingestion::resolver::{ResolverConfig, WebPdfResolver};
use prepair_ingestion::sources::crossref::CrossRefClient;
use prepair_ingestion::sources::registry::RegistryClient;
use prepair_llm::{InferenceGate, OpenAiCompatibleBackend};
use prepair_pipeline::orchestrator::{run_pipeline, PipelineDeps, PipelineOptions};
use prepair_pipeline::{config, writers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("prepair=debug,info")),
        )
        .init();

    info!("Prepair starting up");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load()?;
    // Malformed or missing credentials abort before any document is touched.
    let proxy_creds = config::proxy_credentials(&config.resolver)?;

    let api_key = std::env::var(&config.inference.api_key_env).ok();
    let backend = Arc::new(OpenAiCompatibleBackend::new(
        &config.inference.base_url,
        &config.inference.model,
        api_key,
    ));
    let gate = Arc::new(InferenceGate::new(
        backend,
        config.pipeline.max_concurrent_inference,
    ));
    info!(
        model = %config.inference.model,
        max_concurrency = config.pipeline.max_concurrent_inference,
        "Inference gate ready"
    );

    let http = WebClient::new()?;
    let extractor = Arc::new(PdfTextExtractor::new(gate.clone()));
    let metadata = Arc::new(RegistryMetadataResolver::new(
        RegistryClient::new(http.clone()),
        CrossRefClient::new(http.clone()),
    ));
    let resolver_config = ResolverConfig {
        proxy_login_url: config.resolver.proxy_login_url.clone(),
        proxy_username: proxy_creds
            .as_ref()
            .map(|(user, _)| user.expose_secret().to_string()),
        proxy_password: proxy_creds
            .as_ref()
            .map(|(_, pass)| pass.expose_secret().to_string()),
        navigation_timeout: Duration::from_secs(config.resolver.navigation_timeout_secs),
        settle_delay: Duration::from_secs(config.resolver.settle_secs),
    };
    let resolver = Arc::new(WebPdfResolver::new(
        http,
        extractor.clone(),
        resolver_config,
    ));

    let storage_root = PathBuf::from(&config.storage.root);
    let (sinks, writer_tasks) = writers::spawn_writers(&storage_root).await?;
    info!(storage = %storage_root.display(), "Bucket writers ready");

    let opts = PipelineOptions {
        corpus_dir: PathBuf::from(&config.corpus.dir),
        success_threshold: config.pipeline.success_threshold,
        chunk_chars: config.pipeline.chunk_chars,
    };
    let deps = PipelineDeps {
        extractor,
        gate,
        metadata,
        resolver,
    };

    let summary = run_pipeline(&opts, &deps, &sinks).await?;

    // Closing the sinks lets each writer drain its queue and exit.
    drop(sinks);
    for task in writer_tasks {
        task.await??;
    }

    info!(
        documents   = summary.documents_processed,
        extracted   = summary.extracted,
        unextracted = summary.unextracted,
        unknown     = summary.unknown,
        "All writers finished, exiting"
    );
    Ok(())
}
