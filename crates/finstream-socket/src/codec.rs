//! Wire codec for the provider's stream framing.
//!
//! Outbound frames are a JSON array holding one string, and that string is
//! itself a serialized JSON object. Inbound frames start with a one-byte
//! marker; only `a` (array) frames carry data. Data frames wrap the payload in
//! up to three layers of backslash escaping, which [`unescape`] peels in a
//! fixed order.

use crate::error::FrameDecodeError;
use crate::messages::{EconomicNewsUpdate, Event, EventType, SubscriptionRequest};

/// Marker byte of frames carrying data.
pub const ARRAY_MARKER: u8 = b'a';

/// Keep-alive frame written by the heartbeat task.
pub const HEARTBEAT_FRAME: &str = r#"["{\"_event\": \"heartbeat\", \"data\": \"h\"}"]"#;

const CLOSING_MARKER: &str = r#"\"}"]"#;
const HEADER_SEPARATOR: &str = "::";
const HEARTBEAT_TAG: &str = r#""_event":"heartbeat""#;

/// Frame intent derived from the marker byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Open,
    Heartbeat,
    Array,
    Close,
    Other(u8),
}

impl FrameKind {
    /// Returns `None` for an empty frame.
    pub fn classify(frame: &[u8]) -> Option<Self> {
        let kind = match *frame.first()? {
            b'o' => Self::Open,
            b'h' => Self::Heartbeat,
            ARRAY_MARKER => Self::Array,
            b'c' => Self::Close,
            other => Self::Other(other),
        };
        Some(kind)
    }
}

/// Serializes `request` as `["<escaped json object>"]`.
pub fn encode_request(request: &SubscriptionRequest) -> Result<String, serde_json::Error> {
    let inner = serde_json::to_string(request)?;
    serde_json::to_string(&[inner])
}

/// Parses an outbound frame produced by [`encode_request`].
pub fn decode_request(frame: &str) -> Result<SubscriptionRequest, FrameDecodeError> {
    let inner = frame
        .strip_prefix("[\"")
        .and_then(|rest| rest.strip_suffix("\"]"))
        .ok_or(FrameDecodeError::MissingEnvelope)?;
    Ok(serde_json::from_str(&unescape(inner))?)
}

/// Turns an inbound frame into an event, or `None` when it carries no data.
pub fn decode_frame(frame: &[u8]) -> Option<Event> {
    if FrameKind::classify(frame)? != FrameKind::Array {
        return None;
    }

    let data = String::from_utf8_lossy(frame).into_owned();
    let event_type = if is_heartbeat(&data) {
        EventType::Heartbeat
    } else {
        EventType::Update
    };
    Some(Event::new(event_type, data))
}

/// True when the payload is a heartbeat, whatever its escaping or spacing.
pub fn is_heartbeat(payload: &str) -> bool {
    let compact: String = payload
        .chars()
        .filter(|c| *c != '\\' && !c.is_whitespace())
        .collect();
    compact.contains(HEARTBEAT_TAG)
}

/// Removes the escaping layers: `\\\"`, then `\\\\"`, then `\"`, each becoming `"`.
pub fn unescape(payload: &str) -> String {
    payload
        .replace(r#"\\\""#, "\"")
        .replace(r#"\\\\""#, "\"")
        .replace(r#"\""#, "\"")
}

/// Strips the closing marker and the `...::` envelope, unescapes and decodes.
pub fn decode_economic_news(data: &str) -> Result<EconomicNewsUpdate, FrameDecodeError> {
    let mut cleaned = data.replace(CLOSING_MARKER, "");
    if let Some(index) = cleaned.find(HEADER_SEPARATOR) {
        cleaned = cleaned.split_off(index + HEADER_SEPARATOR.len());
    }
    Ok(serde_json::from_str(&unescape(&cleaned))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Color;

    const NEWS_FRAME: &str = r#"a["{\"message\":\"event-469245::{\\\"event_ID\\\":\\\"469245\\\",\\\"actual_color\\\":\\\"greenFont\\\",\\\"rev_from_col\\\":\\\"redFont\\\",\\\"previous\\\":\\\"1.2%\\\",\\\"forecast\\\":\\\"1.0%\\\",\\\"actual\\\":\\\"1.4%\\\",\\\"rev_from\\\":\\\"1.1%\\\"}\"}"]"#;

    #[test]
    fn subscription_frame_matches_wire_layout() {
        let request = SubscriptionRequest::bulk(8).with_message_from_events([469245, 470001]);

        let frame = encode_request(&request).expect("encode");

        assert_eq!(
            frame,
            r#"["{\"_event\":\"bulk-subscribe\",\"tzID\":8,\"message\":\"event-469245:%%event-470001:\"}"]"#
        );
    }

    #[test]
    fn subscription_frame_survives_unescape_pipeline() {
        let request = SubscriptionRequest::bulk(55).with_message_from_events([1, 22, 333]);

        let frame = encode_request(&request).expect("encode");
        let decoded = decode_request(&frame).expect("decode");

        assert_eq!(decoded, request);
    }

    #[test]
    fn request_without_envelope_is_rejected() {
        let error = decode_request(r#"{"_event":"update"}"#).expect_err("no envelope");
        assert!(matches!(error, FrameDecodeError::MissingEnvelope));
    }

    #[test]
    fn only_array_frames_become_events() {
        assert!(decode_frame(b"").is_none());
        assert!(decode_frame(b"o").is_none());
        assert!(decode_frame(b"h").is_none());
        assert!(decode_frame(br#"c[3000,"Go away!"]"#).is_none());
        assert!(decode_frame(br#"["{\"a\":1}"]"#).is_none());

        let event = decode_frame(NEWS_FRAME.as_bytes()).expect("array frame");
        assert_eq!(event.event_type, EventType::Update);
        assert_eq!(event.data, NEWS_FRAME);
    }

    #[test]
    fn heartbeat_frames_are_reclassified() {
        let inbound = r#"a["{\"_event\":\"heartbeat\",\"data\":\"h\"}"]"#;
        let event = decode_frame(inbound.as_bytes()).expect("array frame");
        assert_eq!(event.event_type, EventType::Heartbeat);

        let echoed = format!("a{HEARTBEAT_FRAME}");
        let event = decode_frame(echoed.as_bytes()).expect("array frame");
        assert_eq!(event.event_type, EventType::Heartbeat);
    }

    #[test]
    fn frame_kinds_follow_marker_byte() {
        assert_eq!(FrameKind::classify(b""), None);
        assert_eq!(FrameKind::classify(b"o"), Some(FrameKind::Open));
        assert_eq!(FrameKind::classify(b"a[]"), Some(FrameKind::Array));
        assert_eq!(FrameKind::classify(b"x"), Some(FrameKind::Other(b'x')));
    }

    #[test]
    fn economic_news_payload_decodes_all_fields() {
        let update = decode_economic_news(NEWS_FRAME).expect("decode");

        assert_eq!(
            update,
            EconomicNewsUpdate {
                event_id: String::from("469245"),
                actual_color: Color::Green,
                rev_from_color: Color::Red,
                previous: String::from("1.2%"),
                forecast: String::from("1.0%"),
                actual: String::from("1.4%"),
                rev_from: String::from("1.1%"),
            }
        );
    }

    #[test]
    fn malformed_news_payload_reports_decode_error() {
        let error = decode_economic_news(r#"a["{\"message\":\"event-1::{not json\"}"]"#)
            .expect_err("garbage");
        assert!(matches!(error, FrameDecodeError::Json(_)));
    }

    #[test]
    fn unescape_applies_passes_in_order() {
        assert_eq!(unescape(r#"\\\"x\\\""#), r#""x""#);
        assert_eq!(unescape(r#"\"y\""#), r#""y""#);
        assert_eq!(unescape(r#"\\\\"z"#), r#""z"#);
    }
}
