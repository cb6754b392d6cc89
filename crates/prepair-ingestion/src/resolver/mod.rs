//! Published-document resolution.
//!
//! Given a published DOI, drive a browser through the (optionally proxied)
//! DOI landing page, harvest the rendered markup and session cookies, close
//! the browser, and run the fetch-strategy cascade over the harvest. The
//! outcome is either the raw extracted text of the published PDF or a
//! structured failure carrying the best-known landing URL — the latter is
//! deliberate ("found where it lives, could not extract it") and must not
//! be retried by callers; only transport-class errors are.

pub mod browser;
pub mod strategies;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use url::Url;

use prepair_common::error::{PrepairError, Result};
use prepair_common::http::{random_user_agent, WebClient};

use crate::models::Resolution;
use crate::pdf::PdfTextExtractor;
use self::browser::BrowserSession;
use self::strategies::{default_strategies, run_cascade, LandingContext};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Authenticating proxy login endpoint (e.g. an EZProxy `/login` URL).
    /// When unset, navigation goes straight to the DOI landing page.
    pub proxy_login_url: Option<String>,
    pub proxy_username: Option<String>,
    pub proxy_password: Option<String>,
    pub navigation_timeout: Duration,
    /// Post-load wait for client-side redirects and bot checks to settle.
    pub settle_delay: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            proxy_login_url: None,
            proxy_username: None,
            proxy_password: None,
            navigation_timeout: Duration::from_secs(40),
            settle_delay: Duration::from_secs(5),
        }
    }
}

/// Seam used by the orchestrator; stubbed in pipeline tests.
#[async_trait]
pub trait PublishedDocumentResolver: Send + Sync {
    async fn resolve(&self, doi: &str) -> Result<Resolution>;
}

pub struct WebPdfResolver {
    http: WebClient,
    extractor: Arc<PdfTextExtractor>,
    config: ResolverConfig,
}

impl WebPdfResolver {
    pub fn new(http: WebClient, extractor: Arc<PdfTextExtractor>, config: ResolverConfig) -> Self {
        Self { http, extractor, config }
    }

    /// The URL the browser actually navigates to: the landing page itself,
    /// or the proxy login endpoint with credentials and target attached.
    fn navigation_target(&self, landing: &str) -> Result<String> {
        let Some(ref login) = self.config.proxy_login_url else {
            return Ok(landing.to_string());
        };
        let mut url = Url::parse(login)
            .map_err(|e| PrepairError::Config(format!("bad proxy login URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            if let (Some(user), Some(pass)) =
                (&self.config.proxy_username, &self.config.proxy_password)
            {
                pairs.append_pair("user", user).append_pair("pass", pass);
            }
            pairs.append_pair("url", landing);
        }
        Ok(url.into())
    }

    /// Browser phase: navigate, let the page settle, harvest markup and
    /// cookies. The caller closes the session before acting on the result.
    async fn harvest(&self, session: &BrowserSession, landing: &str) -> Result<LandingContext> {
        let target = self.navigation_target(landing)?;
        let page = session.open(&target, self.config.navigation_timeout).await?;
        tokio::time::sleep(self.config.settle_delay).await;

        let final_url = page
            .url()
            .await
            .map_err(|e| PrepairError::Browser(e.to_string()))?
            .unwrap_or_else(|| landing.to_string());
        let html = page
            .content()
            .await
            .map_err(|e| PrepairError::Browser(e.to_string()))?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| PrepairError::Browser(e.to_string()))?
            .into_iter()
            .map(|c| (c.name, c.value))
            .collect();

        Ok(LandingContext {
            landing_url: landing.to_string(),
            final_url,
            html,
            cookies,
            user_agent: session.user_agent().to_string(),
        })
    }
}

#[async_trait]
impl PublishedDocumentResolver for WebPdfResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, doi: &str) -> Result<Resolution> {
        let landing = format!("https://doi.org/{doi}");

        let session = BrowserSession::launch(random_user_agent()).await?;
        let harvested = self.harvest(&session, &landing).await;
        // Guaranteed close before any fallback path executes, errors included.
        session.close().await;
        let ctx = harvested?;

        let strategies = default_strategies();
        match run_cascade(&strategies, &ctx, &self.http).await {
            Some((strategy, bytes)) => {
                info!(doi, strategy, n_bytes = bytes.len(), "Published PDF downloaded");
                match self.extractor.text_from_bytes(bytes).await? {
                    Some(text) => Ok(Resolution::Text(text)),
                    None => {
                        warn!(doi, "Downloaded PDF yielded no text");
                        Ok(Resolution::Failure { landing_url: ctx.final_url })
                    }
                }
            }
            None => {
                info!(doi, landing_url = %ctx.final_url, "All strategies exhausted");
                Ok(Resolution::Failure { landing_url: ctx.final_url })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prepair_llm::{InferenceGate, OpenAiCompatibleBackend};

    fn resolver_with(config: ResolverConfig) -> WebPdfResolver {
        let backend = Arc::new(OpenAiCompatibleBackend::new("http://localhost:5000", "m", None));
        let gate = Arc::new(InferenceGate::new(backend, 2));
        WebPdfResolver::new(
            WebClient::new().unwrap(),
            Arc::new(PdfTextExtractor::new(gate)),
            config,
        )
    }

    #[test]
    fn test_navigation_target_without_proxy() {
        let r = resolver_with(ResolverConfig::default());
        assert_eq!(
            r.navigation_target("https://doi.org/10.1/x").unwrap(),
            "https://doi.org/10.1/x"
        );
    }

    #[test]
    fn test_navigation_target_with_proxy_credentials() {
        let r = resolver_with(ResolverConfig {
            proxy_login_url: Some("https://login.ezproxy.lib.example.edu/login".to_string()),
            proxy_username: Some("alice".to_string()),
            proxy_password: Some("s3cret".to_string()),
            ..Default::default()
        });
        let target = r.navigation_target("https://doi.org/10.1/x").unwrap();
        assert!(target.starts_with("https://login.ezproxy.lib.example.edu/login?"));
        assert!(target.contains("user=alice"));
        assert!(target.contains("pass=s3cret"));
        assert!(target.contains("url=https%3A%2F%2Fdoi.org%2F10.1%2Fx"));
    }
}
