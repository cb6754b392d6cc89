//! Shared HTTP client and the browser-identity pool.

use std::time::Duration;

use rand::seq::SliceRandom;
use reqwest::{Client, ClientBuilder};

use crate::error::PrepairError;

/// Desktop browser user agents rotated across resolver sessions.
pub const USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_2) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:123.0) Gecko/20100101 Firefox/123.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_1) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// Pick a random identity from the pool.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Shared reqwest wrapper used by every service client. Redirects are
/// followed (publisher landing pages chain through several hops); the
/// timeout applies per request.
#[derive(Debug, Clone)]
pub struct WebClient {
    client: Client,
}

impl WebClient {
    pub fn new() -> Result<Self, PrepairError> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(PrepairError::Http)?;
        Ok(Self { client })
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.get(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent_comes_from_pool() {
        for _ in 0..16 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn test_client_builds() {
        assert!(WebClient::new().is_ok());
    }
}
