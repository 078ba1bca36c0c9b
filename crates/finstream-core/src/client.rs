use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::bootstrap::{bootstrap_token, AccessToken};
use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};

/// Authenticated request layer for the provider's REST API.
///
/// Construction scrapes the access token; a client without a token cannot exist.
#[derive(Clone)]
pub struct ProviderClient {
    http: Arc<dyn HttpClient>,
    config: ClientConfig,
    token: AccessToken,
}

impl std::fmt::Debug for ProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderClient")
            .field("config", &self.config)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl ProviderClient {
    /// Runs the token bootstrap against `config.base_url` and returns a ready client.
    pub async fn bootstrap(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
    ) -> Result<Self, CoreError> {
        let token = bootstrap_token(http.as_ref(), &config).await?;
        Ok(Self {
            http,
            config,
            token,
        })
    }

    /// Bootstraps with [`ClientConfig::from_env`] and a reqwest transport.
    pub async fn bootstrap_default() -> Result<Self, CoreError> {
        Self::bootstrap(ClientConfig::from_env(), Arc::new(ReqwestHttpClient::new())).await
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET request carrying default headers, bearer auth, `Referer` and `User-Agent`.
    pub fn authorized_request(&self, url: impl Into<String>) -> HttpRequest {
        HttpRequest::get(url)
            .with_headers(&self.config.default_headers)
            .with_bearer_token(self.token.as_str())
            .with_header("referer", self.config.referer.as_str())
            .with_header("user-agent", self.config.user_agent.as_str())
            .with_timeout_ms(self.config.timeout_ms)
    }

    /// Issues an authenticated GET and returns status and body regardless of status.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, CoreError> {
        tracing::trace!(url, "GET");
        self.http
            .execute(self.authorized_request(url))
            .await
            .map_err(|source| CoreError::Request {
                url: url.to_owned(),
                source,
            })
    }

    /// Issues an authenticated GET and decodes a 2xx JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CoreError> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(CoreError::Status {
                url: url.to_owned(),
                status: response.status,
            });
        }
        Ok(serde_json::from_str(&response.body)?)
    }
}
