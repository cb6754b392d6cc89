use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepairError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("PDF parse error: {0}")]
    Pdf(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PrepairError {
    /// Whether this error is a transient network-class fault worth retrying.
    /// Content mismatches and lookup misses are never transient.
    pub fn is_transient(&self) -> bool {
        match self {
            PrepairError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            PrepairError::Browser(_) | PrepairError::Timeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepairError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient() {
        assert!(PrepairError::Timeout("navigation".into()).is_transient());
        assert!(PrepairError::Browser("cdp closed".into()).is_transient());
    }

    #[test]
    fn test_config_is_not_transient() {
        assert!(!PrepairError::Config("missing credentials".into()).is_transient());
        assert!(!PrepairError::Pdf("no trailer".into()).is_transient());
    }
}
