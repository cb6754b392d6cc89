//! Headless browser session for the resolver's navigation phase.
//!
//! The browser and its CDP handler task are scoped resources: `close` is
//! called on every exit path of the resolver before any post-browser
//! strategy runs, so publisher sessions never leak.

use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use prepair_common::error::{PrepairError, Result};

/// Spoofs the properties bot-detection scripts probe first.
const STEALTH_INIT_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3] });
"#;

pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_agent: String,
}

impl BrowserSession {
    /// Launch a headless browser with automation-detection disabled and the
    /// given user agent applied to every page.
    pub async fn launch(user_agent: &str) -> Result<Self> {
        let config = BrowserConfig::builder()
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-web-security")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .window_size(1280, 720)
            .build()
            .map_err(PrepairError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PrepairError::Browser(e.to_string()))?;

        // The handler must be polled for the CDP connection to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            user_agent: user_agent.to_string(),
        })
    }

    /// Open a page, apply the stealth patches before any site script runs,
    /// and navigate with a bounded wait.
    pub async fn open(&self, url: &str, nav_timeout: Duration) -> Result<Page> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PrepairError::Browser(e.to_string()))?;

        page.set_user_agent(SetUserAgentOverrideParams::new(self.user_agent.clone()))
            .await
            .map_err(|e| PrepairError::Browser(e.to_string()))?;
        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
            STEALTH_INIT_SCRIPT,
        ))
        .await
        .map_err(|e| PrepairError::Browser(e.to_string()))?;

        tokio::time::timeout(nav_timeout, async {
            page.goto(url)
                .await
                .map_err(|e| PrepairError::Browser(e.to_string()))?;
            page.wait_for_navigation()
                .await
                .map_err(|e| PrepairError::Browser(e.to_string()))?;
            Ok::<_, PrepairError>(())
        })
        .await
        .map_err(|_| PrepairError::Timeout(format!("navigation to {url}")))??;

        debug!(url, "Navigation complete");
        Ok(page)
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Tear the session down. Never fails: a close error only means the
    /// child process is already gone.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
    }
}
