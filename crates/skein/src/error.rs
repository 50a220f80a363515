//! CLI error types with miette diagnostics.
//!
//! Maps `skein_api::Error` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use skein_api::Error as ApiError;
use skein_config::ConfigError;

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
        code(skein::connection_failed),
        help("Check that the server is running and the base URL is correct.")
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(skein::tls_error),
        help("Use --insecure (-k) to accept invalid certificates, or set ca_cert in your config.")
    )]
    TlsError { reason: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(skein::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── HTTP status ──────────────────────────────────────────────────

    #[error("Authentication failed (HTTP {status}): {message}")]
    #[diagnostic(
        code(skein::auth_failed),
        help("Pass --token, set SKEIN_API_TOKEN, or configure api_token_env.")
    )]
    AuthFailed { status: u16, message: String },

    #[error("Not found: {url}")]
    #[diagnostic(code(skein::not_found), help("Server said: {message}"))]
    NotFound { url: String, message: String },

    #[error("{message}")]
    #[diagnostic(code(skein::api_error))]
    Api { status: Option<u16>, message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("No base URL configured")]
    #[diagnostic(
        code(skein::no_base_url),
        help(
            "Pass --base-url, set SKEIN_BASE_URL, or run:\n  \
             skein config set base_url https://api.example.com\n\
             Config file: {path}"
        )
    )]
    NoBaseUrl { path: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(skein::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(skein::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(skein::json), help("Check the --data argument and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(skein::render))]
    Render(String),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingBaseUrl { path } => Self::NoBaseUrl { path },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoBaseUrl { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Translate a request failure for `url`. Takes a reference because
    /// collection callbacks only lend the error.
    pub fn from_api(err: &ApiError, url: &str) -> Self {
        match err {
            ApiError::Transport(e) if e.is_connect() => Self::ConnectionFailed {
                url: url.to_owned(),
                reason: e.to_string(),
            },
            ApiError::Timeout { timeout_secs } => Self::Timeout {
                seconds: *timeout_secs,
            },
            ApiError::Tls(reason) => Self::TlsError {
                reason: reason.clone(),
            },
            ApiError::InvalidUrl(e) => Self::Validation {
                field: "path".into(),
                reason: e.to_string(),
            },
            ApiError::Api {
                status: status @ (401 | 403),
                ..
            } => Self::AuthFailed {
                status: *status,
                message: err.user_message(),
            },
            _ if err.is_not_found() => Self::NotFound {
                url: url.to_owned(),
                message: err.user_message(),
            },
            other => Self::Api {
                status: other.status(),
                message: other.user_message(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ApiError {
        ApiError::Api {
            status,
            message: Some("nope".into()),
            body: String::new(),
        }
    }

    #[test]
    fn status_codes_map_to_exit_codes() {
        assert_eq!(CliError::from_api(&api(401), "x").exit_code(), exit_code::AUTH);
        assert_eq!(CliError::from_api(&api(403), "x").exit_code(), exit_code::AUTH);
        assert_eq!(CliError::from_api(&api(404), "x").exit_code(), exit_code::NOT_FOUND);
        assert_eq!(CliError::from_api(&api(500), "x").exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn api_message_is_surfaced() {
        let err = CliError::from_api(&api(422), "things");
        assert_eq!(err.to_string(), "nope");
    }

    #[test]
    fn missing_base_url_is_usage_error() {
        let err = CliError::from(ConfigError::MissingBaseUrl { path: "p".into() });
        assert!(matches!(err, CliError::NoBaseUrl { .. }));
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
