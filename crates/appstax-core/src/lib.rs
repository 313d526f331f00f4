//! Reactive, normalized live views over Appstax collections.
//!
//! This crate owns the domain model and the reactive data layer that sits
//! between `appstax-api` and applications:
//!
//! - **[`Model`]** -- Façade over a set of named watches. Each
//!   [`watch()`](Model::watch) loads a collection (optionally filtered,
//!   ordered and relation-expanded) and keeps it current from real-time
//!   channels. Reads via [`get()`](Model::get) / [`results()`](Model::results)
//!   never wait on the background task.
//!
//! - **[`NormalizationStore`]** -- Identity map that keeps exactly one
//!   canonical copy of every object with an id, so an update to a related
//!   object shows up in every watch that reaches it.
//!
//! - **[`ResultStream`]** -- Subscription handle for one watch's results.
//!   Exposes `current()` / `latest()` / `changed()` and a `Stream` adapter.
//!
//! - **Seams** -- [`ObjectSource`] (queries and expansion) and
//!   [`ChannelFactory`] (real-time channels). [`Model::connect`] wires in
//!   the REST and WebSocket implementations; tests plug in their own.
//!
//! - **Domain model** ([`object`]) -- Schema-less [`Object`]s with tagged
//!   [`Value`]s and JSON conversion in [`convert`].

pub mod channel;
pub mod config;
pub mod convert;
pub mod error;
pub mod hub;
pub mod model;
pub mod object;
pub mod source;
pub mod store;
pub mod stream;
pub mod watch;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channel::{
    Channel, ChannelEvent, ChannelEventKind, ChannelFactory, NoChannels, RealtimeChannels,
};
pub use config::{ClientConfig, DEFAULT_BASE_URL, ModelConfig, TlsVerification};
pub use convert::{object_from_json, object_to_json};
pub use error::CoreError;
pub use hub::{EventHub, ListenerId, ModelEvent, ModelEventKind};
pub use model::{Model, WatchHandle};
pub use object::{Object, ObjectId, ObjectRef, Related, Value};
pub use source::{FindOptions, ObjectSource, RestObjectSource};
pub use store::{NormalizationStore, Normalized, Snapshot};
pub use stream::{ResultStream, ResultWatchStream};
pub use watch::{OrderSpec, WatchOptions};
