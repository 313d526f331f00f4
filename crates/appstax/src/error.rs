//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use appstax_config::ConfigError;
use appstax_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(appstax::connection_failed),
        help(
            "Check that the backend is reachable.\n\
             Reason: {reason}\n\
             Use --insecure (-k) for self-signed certificates."
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(appstax::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── Auth ─────────────────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(appstax::auth_failed),
        help(
            "Check the app key of the profile.\n\
             Run: appstax config set-key"
        )
    )]
    AuthFailed { message: String },

    #[error("No app key configured for profile '{profile}'")]
    #[diagnostic(
        code(appstax::no_app_key),
        help(
            "Create a profile with: appstax config init --key <KEY>\n\
             Or set the APPSTAX_APP_KEY environment variable."
        )
    )]
    NoAppKey { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("Object '{identifier}' not found in '{collection}'")]
    #[diagnostic(
        code(appstax::not_found),
        help("Run: appstax list {collection} to see what is there")
    )]
    NotFound {
        collection: String,
        identifier: String,
    },

    #[error("API error: {message}")]
    #[diagnostic(code(appstax::api_error))]
    ApiError { message: String },

    #[error("The model stopped before the command finished")]
    #[diagnostic(code(appstax::model_closed))]
    ModelClosed,

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(appstax::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(appstax::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: appstax config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(appstax::config),
        help("Check the config file shown by: appstax config show")
    )]
    Config { message: String },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(appstax::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(appstax::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoAppKey { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::NotFound {
                collection,
                identifier,
            } => CliError::NotFound {
                collection,
                identifier,
            },

            CoreError::ModelClosed => CliError::ModelClosed,

            CoreError::Config { message } => CliError::Config { message },

            CoreError::Api { message, status } => CliError::ApiError {
                message: match status {
                    Some(status) => format!("{message} (HTTP {status})"),
                    None => message,
                },
            },

            CoreError::InvalidObject { reason } => CliError::ApiError { message: reason },

            CoreError::Channel { name, reason } => CliError::ApiError {
                message: format!("channel {name}: {reason}"),
            },

            CoreError::Internal(message) => CliError::ApiError { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoAppKey { profile } => CliError::NoAppKey { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
