// appstax-api: Async Rust client for the Appstax object API and real-time channels

pub mod error;
pub mod realtime;
pub mod rest;
pub mod transport;

pub use error::Error;
pub use realtime::{RealtimeEvent, RealtimeHub, ReconnectConfig, Subscription};
pub use rest::ObjectClient;
pub use transport::{TlsMode, TransportConfig};
