use thiserror::Error;

use crate::http_client::HttpError;

/// Errors raised while bootstrapping the access token or calling the REST API.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("failed to fetch bootstrap page: {0}")]
    TokenAcquisition(#[source] HttpError),

    #[error("access token not found in bootstrap page")]
    TokenNotFound,

    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: HttpError,
    },

    #[error("request to '{url}' returned status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The entropy source could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("random source unavailable: {message}")]
pub struct RandomSourceError {
    message: String,
}

impl RandomSourceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<rand::Error> for RandomSourceError {
    fn from(error: rand::Error) -> Self {
        Self::new(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_source_error_names_the_failure() {
        let error = RandomSourceError::new("getrandom: EAGAIN");

        assert_eq!(error.message(), "getrandom: EAGAIN");
        assert_eq!(error.to_string(), "random source unavailable: getrandom: EAGAIN");
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(error);
        assert!(boxed.source().is_none());
    }
}
