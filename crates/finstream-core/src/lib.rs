//! # Finstream Core
//!
//! Shared foundations for the finstream provider client.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bootstrap`] | Access-token scraping from the provider landing page |
//! | [`client`] | Authenticated REST request layer |
//! | [`config`] | Client configuration and environment overrides |
//! | [`error`] | Core error types |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`identifiers`] | Random connection ids and signatures |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use finstream_core::ProviderClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ProviderClient::bootstrap_default().await?;
//!     let response = client.get("https://endpoints.investing.com/holidays/v1/holidays").await?;
//!     println!("{} {}", response.status, response.body.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Security
//!
//! - The access token is redacted from `Debug` output and never logged
//! - The bootstrap call sends only the caller's default headers

pub mod bootstrap;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod identifiers;

pub use bootstrap::{bootstrap_token, extract_token, AccessToken};

pub use client::ProviderClient;

pub use config::ClientConfig;

pub use error::{CoreError, RandomSourceError};

pub use http_client::{
    HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse, ReqwestHttpClient,
    StaticHttpClient,
};

pub use identifiers::{EntropySource, IdentifierGenerator, OsEntropy, SIGNATURE_ALPHABET};
