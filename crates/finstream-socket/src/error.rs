use std::sync::Arc;

use finstream_core::RandomSourceError;
use thiserror::Error;

use crate::messages::EventType;

/// Error returned by a caller-supplied event handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// An inbound or round-tripped frame could not be decoded.
#[derive(Debug, Error)]
pub enum FrameDecodeError {
    #[error("frame is not wrapped in a single-element array")]
    MissingEnvelope,

    #[error("failed to decode frame payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the stream client and surfaced to the error policy.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("could not generate connection identifier: {0}")]
    Identifier(#[from] RandomSourceError),

    #[error("failed to open stream channel: {0}")]
    ChannelOpen(String),

    #[error("stream channel is already connected")]
    AlreadyConnected,

    #[error("stream channel is not connected")]
    NotConnected,

    #[error("stream channel closed by peer")]
    ChannelClosed,

    #[error("stream channel already has an active reader")]
    ReaderBusy,

    #[error("failed to read from stream channel: {0}")]
    Read(String),

    #[error("failed to write to stream channel: {0}")]
    Write(String),

    #[error("failed to write heartbeat: {0}")]
    Heartbeat(#[source] Box<StreamError>),

    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    #[error(transparent)]
    Decode(#[from] FrameDecodeError),

    #[error("handler for '{event_type}' failed: {source}")]
    Handler {
        event_type: EventType,
        #[source]
        source: HandlerError,
    },
}

/// What the client does with errors raised inside its background tasks.
///
/// Every reported error marks the client unhealthy before the policy runs.
#[derive(Clone)]
pub enum ErrorPolicy {
    /// Log at error level and keep running.
    Log,
    /// Log, then exit the process with status 1.
    Terminate,
    /// Hand the error to a caller callback.
    Custom(Arc<dyn Fn(&StreamError) + Send + Sync>),
}

impl ErrorPolicy {
    pub fn custom<F>(callback: F) -> Self
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(callback))
    }

    pub(crate) fn handle(&self, error: &StreamError) {
        match self {
            Self::Log => tracing::error!(%error, "stream error"),
            Self::Terminate => {
                tracing::error!(%error, "stream error, terminating process");
                std::process::exit(1);
            }
            Self::Custom(callback) => callback(error),
        }
    }
}

impl std::fmt::Debug for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => f.write_str("Log"),
            Self::Terminate => f.write_str("Terminate"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn custom_policy_receives_error() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let policy = ErrorPolicy::custom(move |error| {
            sink.lock().expect("sink lock").push(error.to_string());
        });

        policy.handle(&StreamError::ChannelClosed);

        assert_eq!(
            *seen.lock().expect("sink lock"),
            vec![String::from("stream channel closed by peer")]
        );
    }

    #[test]
    fn heartbeat_error_keeps_write_context() {
        let error = StreamError::Heartbeat(Box::new(StreamError::Write(String::from("broken pipe"))));
        assert_eq!(
            error.to_string(),
            "failed to write heartbeat: failed to write to stream channel: broken pipe"
        );
    }
}
