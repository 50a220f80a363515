use thiserror::Error;

/// Message surfaced when neither the response body nor the error itself
/// carries anything readable.
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Top-level error type for the `skein-api` crate.
///
/// Every fetch failure lands here. The collection layer never rethrows
/// these; it turns them into a state message via [`Error::user_message`]
/// and hands the original to the consumer's `on_error` callback.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing or joining failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The request was superseded or torn down before it settled.
    #[error("Request cancelled")]
    Cancelled,

    // ── Server ──────────────────────────────────────────────────────
    /// Non-success HTTP status. `message` is the body's `message` field
    /// when the server sent one.
    #[error("HTTP {status}{}", message.as_deref().map(|m| format!(": {m}")).unwrap_or_default())]
    Api {
        status: u16,
        message: Option<String>,
        body: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Anything raised by a caller-supplied request function.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Human-readable message for display in state.
    ///
    /// Priority: server-supplied body message, then the error's own
    /// message, then [`FALLBACK_MESSAGE`].
    pub fn user_message(&self) -> String {
        if let Self::Api {
            message: Some(message),
            ..
        } = self
        {
            if !message.trim().is_empty() {
                return message.clone();
            }
        }

        let own = self.to_string();
        if own.trim().is_empty() {
            FALLBACK_MESSAGE.to_owned()
        } else {
            own
        }
    }

    /// Returns `true` for the superseded-request path, which callers treat
    /// as a silent no-op rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the server answered 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Api { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status code, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_message_wins() {
        let err = Error::Api {
            status: 404,
            message: Some("Not found".into()),
            body: r#"{"message":"Not found"}"#.into(),
        };
        assert_eq!(err.user_message(), "Not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn blank_body_message_falls_back_to_display() {
        let err = Error::Api {
            status: 500,
            message: Some("  ".into()),
            body: String::new(),
        };
        assert_eq!(err.user_message(), "HTTP 500:   ");
    }

    #[test]
    fn missing_body_message_uses_display() {
        let err = Error::Api {
            status: 502,
            message: None,
            body: "<html>".into(),
        };
        assert_eq!(err.user_message(), "HTTP 502");
    }

    #[test]
    fn empty_error_uses_fallback() {
        let err = Error::Other(String::new());
        assert_eq!(err.user_message(), FALLBACK_MESSAGE);
    }

    #[test]
    fn cancelled_is_flagged() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::Other("x".into()).is_cancelled());
    }
}
