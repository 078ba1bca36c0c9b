//! Stream message types.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::FrameDecodeError;

/// Joins subscribed event tokens inside a subscription message.
pub const EVENT_SEPARATOR: &str = ":%%";

/// Event tag carried by requests and decoded frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    Update,
    Heartbeat,
    BulkSubscribe,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Heartbeat => "heartbeat",
            Self::BulkSubscribe => "bulk-subscribe",
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound subscription request.
///
/// Field order matches the provider's expected `_event`, `tzID`, `message` layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(rename = "_event")]
    pub event: EventType,
    #[serde(rename = "tzID")]
    pub tz_id: i32,
    pub message: String,
}

impl SubscriptionRequest {
    pub fn new(event: EventType, tz_id: i32) -> Self {
        Self {
            event,
            tz_id,
            message: String::new(),
        }
    }

    /// Bulk subscription with no events yet.
    pub fn bulk(tz_id: i32) -> Self {
        Self::new(EventType::BulkSubscribe, tz_id)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the message to `event-<id>` tokens joined by `:%%`, plus a trailing `:`.
    pub fn with_message_from_events<I>(mut self, occurrence_ids: I) -> Self
    where
        I: IntoIterator<Item = u64>,
    {
        let events: Vec<String> = occurrence_ids
            .into_iter()
            .map(|id| format!("event-{id}"))
            .collect();
        self.message = format!("{}:", events.join(EVENT_SEPARATOR));
        self
    }

    /// Wire frame for this request.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        codec::encode_request(self)
    }
}

/// Inbound event: a type tag and the raw frame text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event")]
    pub event_type: EventType,
    pub data: String,
}

impl Event {
    pub fn new(event_type: EventType, data: impl Into<String>) -> Self {
        Self {
            event_type,
            data: data.into(),
        }
    }

    /// Decodes the payload of an `update` frame into an economic-news record.
    pub fn economic_news_update(&self) -> Result<EconomicNewsUpdate, FrameDecodeError> {
        codec::decode_economic_news(&self.data)
    }
}

/// Classification tag the provider attaches to released figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Color {
    /// Released in line with the forecast.
    #[serde(rename = "blackFont")]
    Black,
    /// Beat the forecast, or revised upwards.
    #[serde(rename = "greenFont")]
    Green,
    /// Missed the forecast, or revised downwards.
    #[serde(rename = "redFont")]
    Red,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Economic calendar release pushed over the stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicNewsUpdate {
    #[serde(rename = "event_ID")]
    pub event_id: String,
    pub actual_color: Color,
    #[serde(rename = "rev_from_col")]
    pub rev_from_color: Color,
    pub previous: String,
    pub forecast: String,
    pub actual: String,
    pub rev_from: String,
}
