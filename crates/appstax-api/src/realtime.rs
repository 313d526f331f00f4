//! Real-time channel hub with auto-reconnect.
//!
//! Holds one WebSocket connection to the server's real-time endpoint and
//! multiplexes any number of channel subscriptions over it. Each
//! [`Subscription`] receives the events of its channel and filter, in the
//! order the server sent them. A filtered subscription is announced under
//! its own wire id (`objects/todos?filter=done = false`) so that events for
//! different filters on the same channel never cross. Reconnection uses exponential backoff + jitter, and
//! every live subscription is re-announced after a reconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use appstax_api::realtime::{RealtimeHub, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let url = Url::parse("wss://appstax.com/api/latest/messaging/realtime")?;
//! let hub = RealtimeHub::connect(url, Vec::new(), ReconnectConfig::default(), CancellationToken::new());
//! let mut sub = hub.subscribe("objects/todos", "")?;
//!
//! while let Some(event) = sub.recv().await {
//!     println!("{} on {}", event.event, event.channel);
//! }
//!
//! hub.shutdown();
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Wire frames ──────────────────────────────────────────────────────

/// A parsed event delivered on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    /// Channel name, e.g. `"objects/todos"`.
    pub channel: String,

    /// Event type, e.g. `"object.created"`.
    pub event: String,

    /// Event payload. Object events carry the object here.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// Commands the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
enum ClientFrame {
    Subscribe { channel: String, filter: String },
    Unsubscribe { channel: String },
}

/// Wire id of a subscription: the channel name, qualified by the filter
/// when there is one.
fn wire_channel(channel: &str, filter: &str) -> String {
    if filter.is_empty() {
        channel.to_owned()
    } else {
        format!("{channel}?filter={filter}")
    }
}

/// Wire ids announced on the current connection.
#[derive(Debug, Default)]
struct Announced(HashSet<String>);

impl Announced {
    /// Whether `frame` still has to go out on this connection.
    fn admit(&mut self, frame: &ClientFrame) -> bool {
        match frame {
            ClientFrame::Subscribe { channel, .. } => self.0.insert(channel.clone()),
            ClientFrame::Unsubscribe { channel } => self.0.remove(channel),
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── Hub state ────────────────────────────────────────────────────────

struct Subscriber {
    channel: String,
    filter: String,
    wire: String,
    tx: mpsc::UnboundedSender<Arc<RealtimeEvent>>,
}

struct HubInner {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    outgoing: mpsc::UnboundedSender<ClientFrame>,
    cancel: CancellationToken,
}

impl HubInner {
    fn new(cancel: CancellationToken) -> (Arc<Self>, mpsc::UnboundedReceiver<ClientFrame>) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            outgoing,
            cancel,
        });
        (inner, outgoing_rx)
    }

    fn subscribe(self: &Arc<Self>, channel: &str, filter: &str) -> Result<Subscription, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::HubClosed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wire = wire_channel(channel, filter);
        self.subscribers.insert(
            id,
            Subscriber {
                channel: channel.to_owned(),
                filter: filter.to_owned(),
                wire: wire.clone(),
                tx,
            },
        );
        self.outgoing
            .send(ClientFrame::Subscribe {
                channel: wire,
                filter: filter.to_owned(),
            })
            .map_err(|_| Error::HubClosed)?;

        tracing::debug!(channel, filter, id, "channel subscribed");
        Ok(Subscription {
            id,
            channel: channel.to_owned(),
            rx,
            hub: Arc::clone(self),
        })
    }

    /// Drop subscriber `id`; tell the server once nobody listens to the
    /// channel with that filter anymore.
    fn release(&self, id: u64) {
        let Some((_, removed)) = self.subscribers.remove(&id) else {
            return;
        };
        let still_used = self
            .subscribers
            .iter()
            .any(|s| s.value().wire == removed.wire);
        if !still_used {
            // Send errors mean the loop is gone; nothing left to unsubscribe.
            let _ = self.outgoing.send(ClientFrame::Unsubscribe {
                channel: removed.wire.clone(),
            });
        }
        tracing::debug!(
            channel = %removed.channel,
            filter = %removed.filter,
            id,
            "channel released"
        );
    }

    /// Subscribe frames for every live subscription, deduplicated.
    fn resubscribe_frames(&self) -> Vec<ClientFrame> {
        let mut frames: Vec<ClientFrame> = Vec::new();
        for entry in &self.subscribers {
            let frame = ClientFrame::Subscribe {
                channel: entry.value().wire.clone(),
                filter: entry.value().filter.clone(),
            };
            if !frames.contains(&frame) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Route an event to every subscriber of its wire id. Subscribers see
    /// the plain channel name.
    fn route(&self, event: &Arc<RealtimeEvent>) {
        let mut delivered: Option<Arc<RealtimeEvent>> = None;
        let mut closed = Vec::new();
        for entry in &self.subscribers {
            let sub = entry.value();
            if sub.wire != event.channel {
                continue;
            }
            let out = delivered.get_or_insert_with(|| {
                if sub.channel == event.channel {
                    Arc::clone(event)
                } else {
                    Arc::new(RealtimeEvent {
                        channel: sub.channel.clone(),
                        ..RealtimeEvent::clone(event)
                    })
                }
            });
            if sub.tx.send(Arc::clone(out)).is_err() {
                closed.push(*entry.key());
            }
        }
        for id in closed {
            self.release(id);
        }
    }
}

// ── RealtimeHub ──────────────────────────────────────────────────────

/// Handle to a running real-time connection.
///
/// Cheaply cloneable. Call [`shutdown`](Self::shutdown) to tear down the
/// background task; outstanding subscriptions then yield `None`.
#[derive(Clone)]
pub struct RealtimeHub {
    inner: Arc<HubInner>,
}

impl RealtimeHub {
    /// Spawn the connection loop for `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously. Subscriptions made before the socket is up are
    /// announced as soon as it connects.
    pub fn connect(
        ws_url: Url,
        headers: Vec<(&'static str, String)>,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (inner, outgoing_rx) = HubInner::new(cancel);

        let task_inner = Arc::clone(&inner);
        tokio::spawn(async move {
            ws_loop(ws_url, headers, task_inner, outgoing_rx, reconnect).await;
        });

        Self { inner }
    }

    /// Subscribe to `channel` with a server-side `filter` expression
    /// (empty for none).
    pub fn subscribe(&self, channel: &str, filter: &str) -> Result<Subscription, Error> {
        self.inner.subscribe(channel, filter)
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.subscribers.clear();
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// One live channel subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    channel: String,
    rx: mpsc::UnboundedReceiver<Arc<RealtimeEvent>>,
    hub: Arc<HubInner>,
}

impl Subscription {
    /// The subscribed channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next event. Returns `None` once the hub shuts down.
    pub async fn recv(&mut self) -> Option<Arc<RealtimeEvent>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.release(self.id);
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump frames → on error, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    headers: Vec<(&'static str, String)>,
    hub: Arc<HubInner>,
    mut outgoing_rx: mpsc::UnboundedReceiver<ClientFrame>,
    reconnect: ReconnectConfig,
) {
    let cancel = hub.cancel.clone();
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_pump(&ws_url, &headers, &hub, &mut outgoing_rx) => {
                match result {
                    // Clean disconnect: reset the attempt counter and reconnect immediately.
                    Ok(()) => {
                        tracing::info!("real-time socket disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "real-time socket error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "real-time reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = calculate_backoff(attempt, &reconnect);
                        tracing::info!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(delay) => {}
                        }

                        attempt += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("real-time loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection, re-announce subscriptions, then
/// pump frames both ways until it drops.
async fn connect_and_pump(
    url: &Url,
    headers: &[(&'static str, String)],
    hub: &HubInner,
    outgoing_rx: &mut mpsc::UnboundedReceiver<ClientFrame>,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting real-time socket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    for (name, value) in headers {
        request = request.with_header(*name, value.clone());
    }

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("real-time socket connected");

    let (mut write, mut read) = ws_stream.split();

    // Frames queued before this point are either covered here or skipped
    // below.
    let mut announced = Announced::default();
    for frame in hub.resubscribe_frames() {
        if announced.admit(&frame) {
            send_frame(&mut write, &frame).await?;
        }
    }

    loop {
        tokio::select! {
            biased;
            () = hub.cancel.cancelled() => return Ok(()),
            frame = outgoing_rx.recv() => {
                let Some(frame) = frame else { return Ok(()) };
                if announced.admit(&frame) {
                    send_frame(&mut write, &frame).await?;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(event) = parse_frame(&text) {
                            hub.route(&Arc::new(event));
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings itself
                        tracing::trace!("real-time ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "real-time close frame received"
                            );
                        } else {
                            tracing::info!("real-time close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("real-time stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

async fn send_frame<S>(write: &mut S, frame: &ClientFrame) -> Result<(), Error>
where
    S: futures_util::Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(frame).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: String::new(),
    })?;
    write
        .send(tungstenite::Message::text(text))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame into an event. Malformed frames are logged and
/// skipped.
fn parse_frame(text: &str) -> Option<RealtimeEvent> {
    match serde_json::from_str::<RealtimeEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse real-time frame");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
