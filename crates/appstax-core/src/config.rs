// ── Runtime connection configuration ──
//
// These types describe *how* to reach an Appstax backend. They carry
// credential data and connection tuning, but never touch disk. The CLI
// constructs a `ClientConfig` and hands it in.

use std::time::Duration;

use appstax_api::{TlsMode, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Hosted API root used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://appstax.com/api/latest/";

/// Path of the real-time endpoint, relative to the API root.
const REALTIME_PATH: &str = "messaging/realtime";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-hosted backends with self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for connecting to one Appstax app.
///
/// Built by the CLI, passed to `Model::connect` -- core never reads
/// config files.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root (e.g., `https://appstax.com/api/latest/`).
    pub base_url: Url,
    /// Application key sent on every request.
    pub app_key: SecretString,
    /// Session token of an already logged-in user, if any.
    pub session_id: Option<SecretString>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Open real-time channels. When off, watches load once and stay put.
    pub realtime_enabled: bool,
    /// Override for the WebSocket endpoint. Derived from `base_url` when
    /// unset.
    pub realtime_url: Option<Url>,
    /// Give up reconnecting after this many attempts. `None` retries
    /// forever.
    pub reconnect_max_retries: Option<u32>,
}

impl ClientConfig {
    pub fn new(base_url: Url, app_key: SecretString) -> Self {
        Self {
            base_url,
            app_key,
            session_id: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            realtime_enabled: true,
            realtime_url: None,
            reconnect_max_retries: None,
        }
    }

    /// Transport settings for the REST client and the WebSocket handshake.
    pub(crate) fn transport(&self) -> TransportConfig {
        let mut transport = TransportConfig::new(self.app_key.clone());
        if let Some(session) = &self.session_id {
            transport = transport.with_session(session.clone());
        }
        transport.timeout = self.timeout;
        transport.tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        transport
    }

    /// WebSocket endpoint: the explicit override, or `base_url` with its
    /// scheme switched to `ws`/`wss` and the real-time path appended.
    pub fn realtime_endpoint(&self) -> Result<Url, CoreError> {
        if let Some(url) = &self.realtime_url {
            return Ok(url.clone());
        }

        let scheme = match self.base_url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(CoreError::Config {
                    message: format!("cannot derive a WebSocket URL from scheme '{other}'"),
                });
            }
        };

        let mut root = self.base_url.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let mut url = root.join(REALTIME_PATH).map_err(|e| CoreError::Config {
            message: format!("invalid real-time URL: {e}"),
        })?;
        url.set_scheme(scheme).map_err(|()| CoreError::Config {
            message: format!("cannot switch {url} to {scheme}"),
        })?;
        Ok(url)
    }
}

/// Tuning for the model's internal channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Capacity of the actor's command queue.
    pub command_buffer: usize,
    /// Capacity of the broadcast channel behind `Model::events`.
    pub event_buffer: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            command_buffer: 256,
            event_buffer: 64,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(base: &str) -> ClientConfig {
        ClientConfig::new(base.parse().unwrap(), SecretString::from("key".to_owned()))
    }

    #[test]
    fn realtime_endpoint_from_https_root() {
        let url = config("https://appstax.com/api/latest/")
            .realtime_endpoint()
            .unwrap();
        assert_eq!(url.as_str(), "wss://appstax.com/api/latest/messaging/realtime");
    }

    #[test]
    fn realtime_endpoint_adds_missing_slash() {
        let url = config("http://localhost:3000/api").realtime_endpoint().unwrap();
        assert_eq!(url.as_str(), "ws://localhost:3000/api/messaging/realtime");
    }

    #[test]
    fn realtime_override_wins() {
        let mut cfg = config("https://appstax.com/api/latest/");
        cfg.realtime_url = Some("wss://rt.example.com/socket".parse().unwrap());
        assert_eq!(
            cfg.realtime_endpoint().unwrap().as_str(),
            "wss://rt.example.com/socket"
        );
    }

    #[test]
    fn unsupported_scheme_is_config_error() {
        let err = config("ftp://example.com/").realtime_endpoint().unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
