// ── Real-time channels ──
//
// A channel is a named, filtered subscription yielding object events.
// The model never talks to a transport directly: it asks a
// `ChannelFactory` for channels, so tests and alternative transports can
// plug in behind the same seam.

use std::fmt;

use appstax_api::{RealtimeEvent, RealtimeHub};
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::convert::object_from_json;
use crate::error::CoreError;
use crate::object::Object;

/// Prefix of every object channel name.
const OBJECTS_PREFIX: &str = "objects/";

/// Channel name for live events on `collection`.
pub fn objects_channel(collection: &str) -> String {
    format!("{OBJECTS_PREFIX}{collection}")
}

/// Collection a channel name refers to (`objects/todos` → `todos`).
pub fn channel_collection(name: &str) -> &str {
    name.strip_prefix(OBJECTS_PREFIX).unwrap_or(name)
}

// ── Events ───────────────────────────────────────────────────────────

/// Kind of an object event, rendered as its wire name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
pub enum ChannelEventKind {
    #[strum(serialize = "object.created")]
    Created,
    #[strum(serialize = "object.updated")]
    Updated,
    #[strum(serialize = "object.deleted")]
    Deleted,
}

/// An event delivered on a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    pub kind: ChannelEventKind,
    /// `None` when the payload carried no object.
    pub object: Option<Object>,
}

impl ChannelEvent {
    pub fn created(object: Object) -> Self {
        Self {
            kind: ChannelEventKind::Created,
            object: Some(object),
        }
    }

    pub fn updated(object: Object) -> Self {
        Self {
            kind: ChannelEventKind::Updated,
            object: Some(object),
        }
    }

    pub fn deleted(object: Object) -> Self {
        Self {
            kind: ChannelEventKind::Deleted,
            object: Some(object),
        }
    }

    /// Translate a raw hub event. Unknown event types yield `None`.
    pub fn from_realtime(event: &RealtimeEvent) -> Option<Self> {
        let kind: ChannelEventKind = match event.event.parse() {
            Ok(kind) => kind,
            Err(_) => {
                debug!(channel = %event.channel, event = %event.event, "ignoring event type");
                return None;
            }
        };
        let collection = channel_collection(&event.channel);
        let object = match event.data.clone() {
            Some(data) => match object_from_json(collection, data) {
                Ok(object) => Some(object),
                Err(e) => {
                    debug!(channel = %event.channel, error = %e, "event payload is not an object");
                    None
                }
            },
            None => None,
        };
        Some(Self { kind, object })
    }
}

// ── Channel ──────────────────────────────────────────────────────────

/// A live subscription. Dropping it unsubscribes.
pub struct Channel {
    name: String,
    filter: String,
    events: BoxStream<'static, ChannelEvent>,
}

impl Channel {
    pub fn new(
        name: impl Into<String>,
        filter: impl Into<String>,
        events: impl Stream<Item = ChannelEvent> + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            filter: filter.into(),
            events: events.boxed(),
        }
    }

    /// Channel fed by an in-process sender.
    pub fn from_receiver(
        name: impl Into<String>,
        filter: impl Into<String>,
        rx: mpsc::UnboundedReceiver<ChannelEvent>,
    ) -> Self {
        Self::new(name, filter, UnboundedReceiverStream::new(rx))
    }

    /// Channel that never yields.
    pub fn idle(name: impl Into<String>, filter: impl Into<String>) -> Self {
        Self::new(name, filter, stream::pending())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Next event, or `None` once the channel has ended.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.next().await
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

// ── Factories ────────────────────────────────────────────────────────

/// Opens channels for the model.
pub trait ChannelFactory: Send + Sync + 'static {
    fn open(&self, name: &str, filter: &str) -> Result<Channel, CoreError>;
}

/// Channels multiplexed over one real-time WebSocket connection.
#[derive(Clone)]
pub struct RealtimeChannels {
    hub: RealtimeHub,
}

impl RealtimeChannels {
    pub fn new(hub: RealtimeHub) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }
}

impl ChannelFactory for RealtimeChannels {
    fn open(&self, name: &str, filter: &str) -> Result<Channel, CoreError> {
        let subscription = self
            .hub
            .subscribe(name, filter)
            .map_err(|e| CoreError::Channel {
                name: name.to_owned(),
                reason: e.to_string(),
            })?;

        let events = stream::unfold(subscription, |mut subscription| async move {
            loop {
                let raw = subscription.recv().await?;
                if let Some(event) = ChannelEvent::from_realtime(&raw) {
                    return Some((event, subscription));
                }
            }
        });
        Ok(Channel::new(name, filter, events))
    }
}

/// Factory for when real-time updates are disabled: every channel opens
/// successfully and stays silent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChannels;

impl ChannelFactory for NoChannels {
    fn open(&self, name: &str, filter: &str) -> Result<Channel, CoreError> {
        Ok(Channel::idle(name, filter))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(ChannelEventKind::Created.to_string(), "object.created");
        assert_eq!(
            "object.deleted".parse::<ChannelEventKind>().unwrap(),
            ChannelEventKind::Deleted
        );
        assert!("object.renamed".parse::<ChannelEventKind>().is_err());
    }

    #[test]
    fn channel_names() {
        assert_eq!(objects_channel("todos"), "objects/todos");
        assert_eq!(channel_collection("objects/todos"), "todos");
        assert_eq!(channel_collection("presence"), "presence");
    }

    #[test]
    fn realtime_event_takes_collection_from_channel() {
        let raw = RealtimeEvent {
            channel: "objects/todos".into(),
            event: "object.updated".into(),
            data: Some(json!({ "sysObjectId": "a1", "title": "x" })),
        };

        let event = ChannelEvent::from_realtime(&raw).unwrap();

        assert_eq!(event.kind, ChannelEventKind::Updated);
        let object = event.object.unwrap();
        assert_eq!(object.collection(), "todos");
        assert_eq!(object.id().unwrap().as_str(), "a1");
    }

    #[test]
    fn realtime_event_without_payload_keeps_kind() {
        let raw = RealtimeEvent {
            channel: "objects/todos".into(),
            event: "object.deleted".into(),
            data: None,
        };
        let event = ChannelEvent::from_realtime(&raw).unwrap();
        assert!(event.object.is_none());
    }

    #[test]
    fn unknown_realtime_event_is_dropped() {
        let raw = RealtimeEvent {
            channel: "objects/todos".into(),
            event: "presence.joined".into(),
            data: None,
        };
        assert!(ChannelEvent::from_realtime(&raw).is_none());
    }

    #[tokio::test]
    async fn receiver_channel_yields_then_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut channel = Channel::from_receiver("objects/todos", "", rx);

        tx.send(ChannelEvent::created(Object::with_id("todos", "a1")))
            .unwrap();
        drop(tx);

        let event = channel.next_event().await.unwrap();
        assert_eq!(event.kind, ChannelEventKind::Created);
        assert!(channel.next_event().await.is_none());
    }
}
