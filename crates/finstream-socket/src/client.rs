//! Connection manager for the push-update channel.
//!
//! A [`StreamClient`] owns one websocket at a time. `connect` dials the
//! endpoint and spawns two tasks sharing a cancellation token: a keep-alive
//! task writing [`HEARTBEAT_FRAME`] on a fixed period, and a read task that
//! owns the receiving half, decodes frames and hands them to the
//! [`HandlerRegistry`]. `close` fires the token and returns without waiting for
//! the tasks; reads are raced against the token, so the read task stops at its
//! next poll and drops the receiving half.
//!
//! [`StreamClient::read`] never competes with the read task for the socket. It
//! waits for the next frame the task receives and gets a copy, while the task
//! still dispatches that frame.
//!
//! Errors from the background tasks go to the [`ErrorPolicy`] chosen at
//! construction and mark the client unhealthy. Nothing reconnects on its own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use finstream_core::IdentifierGenerator;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::codec::{self, HEARTBEAT_FRAME};
use crate::config::{StreamConfig, CONNECTION_ID_RANGE, SIGNATURE_LENGTH};
use crate::dispatch::HandlerRegistry;
use crate::error::{ErrorPolicy, FrameDecodeError, HandlerError, StreamError};
use crate::messages::{Event, EventType, SubscriptionRequest};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

// `tokio::time::interval` panics on a zero period.
const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(1);

const TAP_CAPACITY: usize = 64;

/// What the read task publishes to direct readers.
#[derive(Debug, Clone)]
enum FrameTap {
    Frame(Arc<[u8]>),
    Ended,
}

/// Lifecycle of the channel owned by a [`StreamClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

#[derive(Debug)]
struct Session {
    state: ConnectionState,
    cancel: Option<CancellationToken>,
}

struct Shared {
    config: StreamConfig,
    identifiers: IdentifierGenerator,
    policy: ErrorPolicy,
    registry: HandlerRegistry,
    session: Mutex<Session>,
    health: AtomicBool,
    writer: tokio::sync::Mutex<Option<WsWriter>>,
    tap: broadcast::Sender<FrameTap>,
    channel_ended: AtomicBool,
    read_slot: tokio::sync::Mutex<()>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .expect("stream session lock is not poisoned")
    }

    fn state(&self) -> ConnectionState {
        self.session().state
    }

    fn report(&self, error: StreamError) {
        self.health.store(false, Ordering::SeqCst);
        self.policy.handle(&error);
    }

    async fn write_text(&self, text: String) -> Result<(), StreamError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(StreamError::NotConnected)?;
        writer
            .send(Message::text(text))
            .await
            .map_err(|e| StreamError::Write(e.to_string()))
    }

    fn publish(&self, tap: FrameTap) {
        if self.tap.receiver_count() > 0 {
            let _ = self.tap.send(tap);
        }
    }

    fn handle_frame(&self, frame: &[u8]) {
        if frame.is_empty() {
            return;
        }
        self.publish(FrameTap::Frame(Arc::from(frame)));

        let Some(event) = codec::decode_frame(frame) else {
            if let Some(marker) = frame.first() {
                tracing::trace!(marker = %char::from(*marker), "ignoring non-data frame");
            }
            return;
        };

        if event.event_type == EventType::Heartbeat {
            tracing::trace!("heartbeat consumed");
            return;
        }

        if let Err(error) = self.registry.dispatch(&event) {
            self.report(error);
        }
    }
}

/// Next frame payload; control frames come back empty.
async fn next_frame<S>(reader: &mut S) -> Result<Vec<u8>, StreamError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    match reader.next().await {
        None => Err(StreamError::ChannelClosed),
        Some(Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)) => {
            Err(StreamError::ChannelClosed)
        }
        Some(Err(e)) => Err(StreamError::Read(e.to_string())),
        Some(Ok(Message::Text(text))) => Ok(text.as_bytes().to_vec()),
        Some(Ok(Message::Binary(bytes))) => Ok(bytes.to_vec()),
        Some(Ok(Message::Close(frame))) => {
            tracing::debug!(?frame, "peer sent close frame");
            Err(StreamError::ChannelClosed)
        }
        Some(Ok(_)) => Ok(Vec::new()),
    }
}

/// Client for the provider's push-update channel.
///
/// Cloning is cheap; clones share the channel, handlers and health flag.
#[derive(Clone)]
pub struct StreamClient {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("config", &self.shared.config)
            .field("policy", &self.shared.policy)
            .field("state", &self.state())
            .field("healthy", &self.health())
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    /// Creates an unconnected client. The error policy has no implicit default.
    pub fn new(config: StreamConfig, policy: ErrorPolicy) -> Self {
        Self::with_identifiers(config, policy, IdentifierGenerator::default())
    }

    pub fn with_identifiers(
        config: StreamConfig,
        policy: ErrorPolicy,
        identifiers: IdentifierGenerator,
    ) -> Self {
        let (tap, _) = broadcast::channel(TAP_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                config,
                identifiers,
                policy,
                registry: HandlerRegistry::new(),
                session: Mutex::new(Session {
                    state: ConnectionState::Unconnected,
                    cancel: None,
                }),
                health: AtomicBool::new(false),
                writer: tokio::sync::Mutex::new(None),
                tap,
                channel_ended: AtomicBool::new(false),
                read_slot: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// True between a successful `connect` and the first reported error or `close`.
    pub fn health(&self) -> bool {
        self.shared.health.load(Ordering::SeqCst)
    }

    /// Opens the channel and starts the keep-alive and read tasks.
    ///
    /// Fails with [`StreamError::AlreadyConnected`] while a channel is open;
    /// call [`close`](Self::close) first to replace it.
    pub async fn connect(&self) -> Result<(), StreamError> {
        let previous = {
            let mut session = self.shared.session();
            match session.state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    return Err(StreamError::AlreadyConnected);
                }
                state => {
                    session.state = ConnectionState::Connecting;
                    state
                }
            }
        };

        let (writer, reader) = match self.open_channel().await {
            Ok(halves) => halves,
            Err(error) => {
                self.shared.session().state = previous;
                return Err(error);
            }
        };

        *self.shared.writer.lock().await = Some(writer);
        self.shared.channel_ended.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let still_connecting = {
            let mut session = self.shared.session();
            let connecting = session.state == ConnectionState::Connecting;
            if connecting {
                session.state = ConnectionState::Connected;
                session.cancel = Some(cancel.clone());
            }
            connecting
        };
        if !still_connecting {
            // closed while the handshake was in flight
            self.shared.writer.lock().await.take();
            return Err(StreamError::NotConnected);
        }
        self.shared.health.store(true, Ordering::SeqCst);

        tokio::spawn(run_keepalive(Arc::clone(&self.shared), cancel.clone()));
        tokio::spawn(run_reader(Arc::clone(&self.shared), reader, cancel));

        tracing::info!(endpoint = %self.shared.config.endpoint, "stream channel connected");
        Ok(())
    }

    async fn open_channel(&self) -> Result<(WsWriter, SplitStream<WsStream>), StreamError> {
        let connection_id = self
            .shared
            .identifiers
            .random_decimal_string(CONNECTION_ID_RANGE)?;
        let signature = self.shared.identifiers.random_alphanumeric(SIGNATURE_LENGTH)?;
        let url = self.shared.config.channel_url(&connection_id, &signature);

        tracing::debug!(%url, "opening stream channel");
        let timeout = self.shared.config.handshake_timeout;
        let (stream, _response) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| StreamError::ChannelOpen(format!("handshake timed out after {timeout:?}")))?
            .map_err(|e| StreamError::ChannelOpen(e.to_string()))?;

        Ok(stream.split())
    }

    /// Tears the channel down. Safe to call repeatedly or before `connect`.
    ///
    /// Both tasks are signalled but not awaited. The read task drops the
    /// receiving half as soon as it observes the token, a pending `read`
    /// returns [`StreamError::NotConnected`], and so does every later
    /// `read`/`write`.
    pub async fn close(&self) {
        let cancel = {
            let mut session = self.shared.session();
            if session.state != ConnectionState::Unconnected {
                session.state = ConnectionState::Closed;
            }
            session.cancel.take()
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        self.shared.health.store(false, Ordering::SeqCst);

        let writer = self.shared.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(error) = writer.close().await {
                tracing::debug!(%error, "stream writer did not close cleanly");
            }
        }

        tracing::info!("stream channel closed");
    }

    fn ensure_connected(&self) -> Result<(), StreamError> {
        if self.state() == ConnectionState::Connected {
            Ok(())
        } else {
            Err(StreamError::NotConnected)
        }
    }

    /// Writes one text frame, serialized with the keep-alive task.
    pub async fn write(&self, text: impl Into<String>) -> Result<(), StreamError> {
        self.ensure_connected()?;
        self.shared.write_text(text.into()).await
    }

    /// Waits for the next non-empty frame the read task receives and returns a copy.
    ///
    /// The frame is still decoded and dispatched to handlers. Only one direct
    /// reader may wait at a time; a second concurrent call fails with
    /// [`StreamError::ReaderBusy`]. Fails with [`StreamError::ChannelClosed`]
    /// once the peer has ended the channel and with
    /// [`StreamError::NotConnected`] if the client is closed while waiting.
    pub async fn read(&self) -> Result<Vec<u8>, StreamError> {
        let _slot = self
            .shared
            .read_slot
            .try_lock()
            .map_err(|_| StreamError::ReaderBusy)?;

        let (cancel, mut frames) = {
            let session = self.shared.session();
            match (&session.state, &session.cancel) {
                (ConnectionState::Connected, Some(cancel)) => {
                    (cancel.clone(), self.shared.tap.subscribe())
                }
                _ => return Err(StreamError::NotConnected),
            }
        };
        // Checked after subscribing: the read task sets the flag before publishing `Ended`.
        if self.shared.channel_ended.load(Ordering::SeqCst) {
            return Err(StreamError::ChannelClosed);
        }

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(StreamError::NotConnected),
                tap = frames.recv() => match tap {
                    Ok(FrameTap::Frame(frame)) => return Ok(frame.to_vec()),
                    Ok(FrameTap::Ended) => return Err(StreamError::ChannelClosed),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "direct reader lagged behind the read task");
                    }
                    Err(RecvError::Closed) => return Err(StreamError::NotConnected),
                },
            }
        }
    }

    /// Reads one frame and decodes it as JSON.
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, StreamError> {
        let frame = self.read().await?;
        serde_json::from_slice(&frame).map_err(|e| FrameDecodeError::Json(e).into())
    }

    /// Encodes `request` and writes it.
    pub async fn send_request(&self, request: &SubscriptionRequest) -> Result<(), StreamError> {
        let frame = codec::encode_request(request).map_err(StreamError::Encode)?;
        tracing::debug!(event = %request.event, tz_id = request.tz_id, "sending request");
        self.write(frame).await
    }

    pub async fn subscribe(&self, request: &SubscriptionRequest) -> Result<(), StreamError> {
        self.send_request(request).await
    }

    /// Registers the handler for `event_type`, replacing any previous one.
    ///
    /// Handlers run on the read task; a slow handler delays later frames.
    pub fn add_handler<F>(&self, event_type: EventType, handler: F)
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.shared.registry.insert(event_type, Arc::new(handler));
    }

    pub fn remove_handler(&self, event_type: EventType) -> bool {
        self.shared.registry.remove(event_type)
    }

    pub fn handlers(&self) -> Vec<EventType> {
        self.shared.registry.registered()
    }
}

async fn run_keepalive(shared: Arc<Shared>, cancel: CancellationToken) {
    let period = shared.config.heartbeat_interval.max(MIN_HEARTBEAT_INTERVAL);
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!(?period, "keep-alive task started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                tracing::trace!("writing heartbeat");
                if let Err(error) = shared.write_text(HEARTBEAT_FRAME.to_owned()).await {
                    shared.report(StreamError::Heartbeat(Box::new(error)));
                }
            }
        }
    }
    tracing::debug!("keep-alive task stopped");
}

async fn run_reader<S>(shared: Arc<Shared>, mut reader: S, cancel: CancellationToken)
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    tracing::debug!("read task started");
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = next_frame(&mut reader) => result,
        };

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(frame) => shared.handle_frame(&frame),
            Err(StreamError::ChannelClosed) => {
                // The stream yields nothing more; park instead of spinning on errors.
                shared.channel_ended.store(true, Ordering::SeqCst);
                shared.publish(FrameTap::Ended);
                shared.report(StreamError::ChannelClosed);
                cancel.cancelled().await;
                break;
            }
            Err(error) => shared.report(error),
        }
    }
    tracing::debug!("read task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::mpsc;

    use super::*;

    fn reset() -> Result<Message, tungstenite::Error> {
        Err(tungstenite::Error::Io(std::io::Error::other("connection reset")))
    }

    fn collecting_client() -> (StreamClient, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let policy = ErrorPolicy::custom(move |error| {
            let _ = tx.send(error.to_string());
        });
        (StreamClient::new(StreamConfig::default(), policy), rx)
    }

    async fn next_report(reports: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), reports.recv())
            .await
            .expect("report within deadline")
            .expect("policy sender alive")
    }

    #[tokio::test]
    async fn read_errors_are_reported_each_time_and_channel_end_once() {
        let (client, mut reports) = collecting_client();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        client.add_handler(EventType::Update, move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let script: Vec<Result<Message, tungstenite::Error>> = vec![
            reset(),
            Ok(Message::text(String::from("o"))),
            reset(),
            Ok(Message::text(String::from(r#"a["{\"message\":\"event-1::{}\"}"]"#))),
        ];
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_reader(
            Arc::clone(&client.shared),
            futures::stream::iter(script),
            cancel.clone(),
        ));

        for _ in 0..2 {
            let report = next_report(&mut reports).await;
            assert!(
                report.starts_with("failed to read from stream channel"),
                "unexpected report {report}"
            );
        }
        assert_eq!(next_report(&mut reports).await, "stream channel closed by peer");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(reports.try_recv().is_err(), "channel end reported more than once");
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(!task.is_finished(), "read task should park until cancelled");
        assert!(client.shared.channel_ended.load(Ordering::SeqCst));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("read task stops after cancellation")
            .expect("read task does not panic");
    }

    #[tokio::test]
    async fn cancelled_read_task_stops_without_reporting() {
        let (client, mut reports) = collecting_client();
        let cancel = CancellationToken::new();
        cancel.cancel();

        run_reader(
            Arc::clone(&client.shared),
            futures::stream::pending::<Result<Message, tungstenite::Error>>(),
            cancel,
        )
        .await;

        assert!(reports.try_recv().is_err());
    }
}
