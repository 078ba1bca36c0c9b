//! # Finstream Socket
//!
//! Push-update channel for economic-calendar events.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Connection manager with keep-alive and read tasks |
//! | [`codec`] | Frame encoding, marker classification and payload unescaping |
//! | [`config`] | Endpoint and timing settings |
//! | [`dispatch`] | Event-type handler registry |
//! | [`error`] | Stream errors and the error policy |
//! | [`messages`] | Requests, events and economic-news records |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use finstream_socket::{ErrorPolicy, EventType, StreamClient, StreamConfig, SubscriptionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = StreamClient::new(StreamConfig::from_env(), ErrorPolicy::Log);
//!     client.add_handler(EventType::Update, |event| {
//!         let update = event.economic_news_update()?;
//!         println!("{} actual={}", update.event_id, update.actual);
//!         Ok(())
//!     });
//!
//!     client.connect().await?;
//!     client
//!         .subscribe(&SubscriptionRequest::bulk(8).with_message_from_events([469245]))
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod messages;

pub use client::{ConnectionState, StreamClient};

pub use codec::{FrameKind, HEARTBEAT_FRAME};

pub use config::{StreamConfig, DEFAULT_STREAM_ENDPOINT};

pub use dispatch::{EventHandler, HandlerRegistry};

pub use error::{ErrorPolicy, FrameDecodeError, HandlerError, StreamError};

pub use messages::{Color, EconomicNewsUpdate, Event, EventType, SubscriptionRequest};
