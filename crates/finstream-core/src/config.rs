use std::collections::BTreeMap;

/// Default page scraped for the access token.
pub const DEFAULT_BASE_URL: &str = "https://www.investing.com/";

pub const DEFAULT_REFERER: &str = "https://www.investing.com/";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/142.0.7444.265 Safari/537.36";

/// Settings for the token bootstrap and the authenticated REST calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub referer: String,
    pub user_agent: String,
    /// Sent on every request, including the unauthenticated bootstrap call.
    pub default_headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            referer: String::from(DEFAULT_REFERER),
            user_agent: String::from(DEFAULT_USER_AGENT),
            default_headers: BTreeMap::new(),
            timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `FINSTREAM_BASE_URL` and `FINSTREAM_USER_AGENT` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("FINSTREAM_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(user_agent) = std::env::var("FINSTREAM_USER_AGENT") {
            config.user_agent = user_agent;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_default_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.default_headers = headers;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}
