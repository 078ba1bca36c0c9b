//! Access-token bootstrap.
//!
//! The provider embeds a bearer token in the HTML of its landing page. One
//! unauthenticated GET is issued, the body is searched for
//! `"accessToken":"<value>"`, and the first match becomes the [`AccessToken`]
//! used by every authenticated call. Nothing here retries.

use std::fmt::{Debug, Formatter};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::http_client::{HttpClient, HttpRequest};

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""accessToken":"([^"]+)""#).expect("access token pattern compiles")
});

/// Opaque bearer credential scraped from the bootstrap page.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Returns the first `"accessToken":"..."` value in `body`.
pub fn extract_token(body: &str) -> Option<AccessToken> {
    TOKEN_PATTERN
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|value| AccessToken::new(value.as_str()))
}

/// Fetches `config.base_url` with the default headers and scrapes the token.
pub async fn bootstrap_token(
    http: &dyn HttpClient,
    config: &ClientConfig,
) -> Result<AccessToken, CoreError> {
    let request = HttpRequest::get(config.base_url.as_str())
        .with_headers(&config.default_headers)
        .with_timeout_ms(config.timeout_ms);

    tracing::debug!(url = %config.base_url, "fetching bootstrap page");
    let response = http
        .execute(request)
        .await
        .map_err(CoreError::TokenAcquisition)?;

    if !response.is_success() {
        tracing::warn!(
            url = %config.base_url,
            status = response.status,
            "bootstrap page returned non-success status"
        );
    }

    let token = extract_token(&response.body).ok_or(CoreError::TokenNotFound)?;
    tracing::debug!(url = %config.base_url, "access token acquired");
    Ok(token)
}
