// ── Core error types ──
//
// User-facing errors from appstax-core. Consumers never see HTTP status
// codes or JSON parse failures directly; the `From<appstax_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to Appstax at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Object not found: {collection}/{identifier}")]
    NotFound {
        collection: String,
        identifier: String,
    },

    #[error("Invalid object: {reason}")]
    InvalidObject { reason: String },

    // ── Live-model errors ────────────────────────────────────────────
    #[error("Cannot open channel {name}: {reason}")]
    Channel { name: String, reason: String },

    #[error("Model has shut down")]
    ModelClosed,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<appstax_api::Error> for CoreError {
    fn from(err: appstax_api::Error) -> Self {
        match err {
            appstax_api::Error::InvalidAppKey => CoreError::AuthenticationFailed {
                message: "Invalid app key".into(),
            },
            appstax_api::Error::SessionExpired => CoreError::AuthenticationFailed {
                message: "Session expired -- log in again".into(),
            },
            appstax_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            appstax_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            appstax_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            appstax_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            appstax_api::Error::Api { status: 404, message } => CoreError::NotFound {
                collection: String::new(),
                identifier: message,
            },
            appstax_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            appstax_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            appstax_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            appstax_api::Error::HubClosed => CoreError::ModelClosed,
            appstax_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
