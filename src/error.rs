use thiserror::Error;

/// Failures surfaced by the async loaders and the backend client.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("storage unavailable: {0}")]
    Storage(String),
}

impl ViewerError {
    pub fn network(url: &str, err: impl std::fmt::Display) -> Self {
        ViewerError::Network {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
