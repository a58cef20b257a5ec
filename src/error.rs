//! Error types for catalog scraping and source resolution

/// Result type for scraper operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Error types for scraper operations.
///
/// Errors are `Clone` because one in-flight cache production hands the same
/// failure to every caller waiting on it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("HTTP error {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("No servers available for episode {0}")]
    NoServersAvailable(String),

    #[error("Missing required parameters: contentType, episodeId, or serverId")]
    MissingParameters,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ScrapeError {
    /// Map a reqwest failure for `url` into a scraper error
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ScrapeError::Timeout { url: url.to_string() };
        }

        if let Some(status) = err.status() {
            return ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            };
        }

        if err.is_decode() {
            return ScrapeError::InvalidResponse {
                url: url.to_string(),
                message: err.to_string(),
            };
        }

        ScrapeError::Fetch {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    /// True for failures that came from talking to the origin
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ScrapeError::Timeout { .. } | ScrapeError::Fetch { .. } | ScrapeError::HttpStatus { .. }
        )
    }
}
