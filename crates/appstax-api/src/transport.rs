// Shared transport configuration for building reqwest::Client instances.
//
// The object client and the real-time hub share TLS, timeout and
// credential settings through this module.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Header carrying the application key on every request.
pub const APP_KEY_HEADER: &str = "x-appstax-appkey";

/// Header carrying the signed-in user's session id, when there is one.
pub const SESSION_HEADER: &str = "x-appstax-sessionid";

const USER_AGENT: &str = concat!("appstax-rs/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode (api-level mirror of core's `TlsVerification`).
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (local development servers).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    pub app_key: SecretString,
    pub session_id: Option<SecretString>,
}

impl TransportConfig {
    pub fn new(app_key: SecretString) -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
            app_key,
            session_id: None,
        }
    }

    /// Attach a session id obtained from the (external) sign-in flow.
    pub fn with_session(mut self, session_id: SecretString) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Credential headers sent on every HTTP request and on the
    /// WebSocket upgrade.
    pub fn auth_headers(&self) -> Result<Vec<(&'static str, String)>, Error> {
        let mut headers = vec![(APP_KEY_HEADER, self.app_key.expose_secret().to_owned())];
        if let Some(ref session) = self.session_id {
            headers.push((SESSION_HEADER, session.expose_secret().to_owned()));
        }
        if headers.iter().any(|(_, v)| v.is_empty()) {
            return Err(Error::InvalidAppKey);
        }
        Ok(headers)
    }

    /// Build a `reqwest::Client` with the credential headers installed
    /// as defaults.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut defaults = HeaderMap::new();
        for (name, value) in self.auth_headers()? {
            let value = HeaderValue::from_str(&value).map_err(|_| Error::InvalidAppKey)?;
            defaults.insert(HeaderName::from_static(name), value);
        }

        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .default_headers(defaults);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}
