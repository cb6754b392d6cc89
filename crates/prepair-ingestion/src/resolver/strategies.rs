//! Fetch strategies tried in fixed order over the harvested landing context.
//!
//! Every strategy validates acceptance strictly by the response
//! `content-type` containing "pdf" — never by URL shape alone. Strategy
//! failures fall through silently to the next one; only exhaustion of the
//! whole cascade is reported to the caller.

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use prepair_common::error::Result;
use prepair_common::http::WebClient;

/// Publisher path variants substituted for a preview (`epdf`) segment.
const PDF_PATH_VARIANTS: [&str; 3] = ["pdf", "pdfdirect", "pdfdownload"];

/// Everything the browser phase harvested before closing.
#[derive(Debug, Clone)]
pub struct LandingContext {
    /// The DOI landing URL the resolver started from.
    pub landing_url: String,
    /// Where navigation actually ended up after redirects.
    pub final_url: String,
    /// Rendered page markup at settle time.
    pub html: String,
    /// Session cookies harvested before the browser closed.
    pub cookies: Vec<(String, String)>,
    pub user_agent: String,
}

impl LandingContext {
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub fn is_pdf_content_type(content_type: &str) -> bool {
    content_type.to_ascii_lowercase().contains("pdf")
}

/// GET `url` replaying the harvested session identity. `None` when the
/// response is not a PDF by content type.
async fn fetch_pdf_bytes(
    http: &WebClient,
    url: &str,
    ctx: &LandingContext,
) -> Result<Option<Vec<u8>>> {
    let resp = http
        .get(url)
        .header(reqwest::header::USER_AGENT, &ctx.user_agent)
        .header(reqwest::header::ACCEPT, "application/pdf")
        .header(reqwest::header::REFERER, &ctx.landing_url)
        .header(reqwest::header::COOKIE, ctx.cookie_header())
        .send()
        .await?;

    if !resp.status().is_success() {
        debug!(url, status = %resp.status(), "Fetch rejected");
        return Ok(None);
    }
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !is_pdf_content_type(content_type) {
        debug!(url, content_type, "Not a PDF response");
        return Ok(None);
    }
    Ok(Some(resp.bytes().await?.to_vec()))
}

// ── Strategy trait and driver ────────────────────────────────────────────────

#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(Some(bytes))` on an accepted PDF, `Ok(None)` when this strategy
    /// finds nothing; errors fall through to the next strategy.
    async fn attempt(&self, ctx: &LandingContext, http: &WebClient) -> Result<Option<Vec<u8>>>;
}

/// Try each strategy in order, short-circuiting at the first accepted PDF.
pub async fn run_cascade(
    strategies: &[Box<dyn FetchStrategy>],
    ctx: &LandingContext,
    http: &WebClient,
) -> Option<(&'static str, Vec<u8>)> {
    for strategy in strategies {
        match strategy.attempt(ctx, http).await {
            Ok(Some(bytes)) => {
                debug!(strategy = strategy.name(), "PDF accepted");
                return Some((strategy.name(), bytes));
            }
            Ok(None) => debug!(strategy = strategy.name(), "No PDF, falling through"),
            Err(e) => debug!(strategy = strategy.name(), error = %e, "Strategy error, falling through"),
        }
    }
    None
}

pub fn default_strategies() -> Vec<Box<dyn FetchStrategy>> {
    vec![
        Box::new(DirectNavigation),
        Box::new(LabeledLinkScan),
        Box::new(DownloadGroupScan),
        Box::new(UrlRebuild),
        Box::new(CookieReplay),
    ]
}

// ── 1. Direct navigation landed on the PDF itself ────────────────────────────

pub struct DirectNavigation;

#[async_trait]
impl FetchStrategy for DirectNavigation {
    fn name(&self) -> &'static str { "direct_navigation" }

    async fn attempt(&self, ctx: &LandingContext, http: &WebClient) -> Result<Option<Vec<u8>>> {
        let lower = ctx.final_url.to_ascii_lowercase();
        if !lower.ends_with(".pdf") && !lower.contains("pdf") {
            return Ok(None);
        }
        fetch_pdf_bytes(http, &ctx.final_url, ctx).await
    }
}

// ── 2. Anchor labelled "PDF" ─────────────────────────────────────────────────

pub struct LabeledLinkScan;

fn scan_labeled_links(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let anchors = Selector::parse("a").unwrap();
    doc.select(&anchors)
        .filter(|a| {
            let text = a.text().collect::<String>();
            let label = a.value().attr("aria-label").unwrap_or("");
            text.trim().eq_ignore_ascii_case("pdf") || label.trim().eq_ignore_ascii_case("pdf")
        })
        .filter_map(|a| a.value().attr("href").map(String::from))
        .collect()
}

#[async_trait]
impl FetchStrategy for LabeledLinkScan {
    fn name(&self) -> &'static str { "labeled_link" }

    async fn attempt(&self, ctx: &LandingContext, http: &WebClient) -> Result<Option<Vec<u8>>> {
        for href in scan_labeled_links(&ctx.html) {
            let Some(target) = absolutize(&ctx.final_url, &href) else { continue };
            if let Some(bytes) = fetch_pdf_bytes(http, &target, ctx).await? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

// ── 3. Download-styled anchors in the known container structure ──────────────

pub struct DownloadGroupScan;

fn scan_download_group(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let selector =
        Selector::parse("div.grouped.right a.navbar-download.btn.btn--cta.roundedColored").unwrap();
    doc.select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("pdf"))
        .map(String::from)
        .collect()
}

#[async_trait]
impl FetchStrategy for DownloadGroupScan {
    fn name(&self) -> &'static str { "download_group" }

    async fn attempt(&self, ctx: &LandingContext, http: &WebClient) -> Result<Option<Vec<u8>>> {
        for href in scan_download_group(&ctx.html) {
            let Some(target) = absolutize(&ctx.final_url, &href) else { continue };
            if let Some(bytes) = fetch_pdf_bytes(http, &target, ctx).await? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

// ── 4. Sibling-URL reconstruction from a preview path ────────────────────────

pub struct UrlRebuild;

fn rebuild_preview_urls(landing: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(landing) else { return Vec::new() };
    let path = parsed.path().to_string();
    let Some((prefix, suffix)) = path.split_once("/epdf/") else { return Vec::new() };

    PDF_PATH_VARIANTS
        .iter()
        .map(|variant| {
            format!(
                "{}://{}{}/{}/{}?download=False",
                parsed.scheme(),
                parsed.authority(),
                prefix,
                variant,
                suffix
            )
        })
        .collect()
}

#[async_trait]
impl FetchStrategy for UrlRebuild {
    fn name(&self) -> &'static str { "url_rebuild" }

    async fn attempt(&self, ctx: &LandingContext, http: &WebClient) -> Result<Option<Vec<u8>>> {
        for rebuilt in rebuild_preview_urls(&ctx.final_url) {
            debug!(url = %rebuilt, "Trying reconstructed URL");
            if let Some(bytes) = fetch_pdf_bytes(http, &rebuilt, ctx).await? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

// ── 5. Cookie-replay fetch of the original landing URL ───────────────────────

pub struct CookieReplay;

#[async_trait]
impl FetchStrategy for CookieReplay {
    fn name(&self) -> &'static str { "cookie_replay" }

    async fn attempt(&self, ctx: &LandingContext, http: &WebClient) -> Result<Option<Vec<u8>>> {
        fetch_pdf_bytes(http, &ctx.landing_url, ctx).await
    }
}

fn absolutize(base: &str, href: &str) -> Option<String> {
    Url::parse(base).ok()?.join(href).ok().map(Into::into)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
