// Fetch client
//
// `FetchClient` is the seam the collection layer talks through.
// `HttpClient` implements it over `reqwest::Client` with base-URL joining,
// envelope decoding, and cooperative cancellation.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::envelope::Envelope;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Boxed future returned by [`FetchClient`] methods.
pub type FetchFuture<'a> = BoxFuture<'a, Result<Envelope, Error>>;

/// Transport used by collections to load remote lists.
///
/// A call whose `cancel` token fires before the response arrives resolves
/// to [`Error::Cancelled`]. Implementations that cannot abort mid-flight
/// may ignore the token; callers never rely on it for correctness.
pub trait FetchClient: Send + Sync {
    /// Read-shaped fetch.
    fn get<'a>(&'a self, url: &'a str, cancel: CancellationToken) -> FetchFuture<'a>;

    /// Write-shaped fetch carrying a JSON body.
    fn post<'a>(&'a self, url: &'a str, body: &'a Value, cancel: CancellationToken)
    -> FetchFuture<'a>;
}

/// Error bodies carry a human-readable `message` when the server has one.
#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP implementation of [`FetchClient`].
///
/// Relative paths such as `me/appointments` are joined onto `base_url`;
/// absolute `http(s)://` URLs are used as-is.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: Url,
    /// Known when built from a `TransportConfig`; turns reqwest timeouts
    /// into [`Error::Timeout`].
    timeout: Option<Duration>,
}

impl HttpClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            timeout: Some(transport.timeout),
            ..Self::with_client(http, base_url)
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            timeout: None,
        }
    }

    /// The base URL relative paths are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, Error> {
        if let Ok(url) = Url::parse(path) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(url);
            }
        }
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// GET returning the raw JSON body instead of an envelope.
    pub async fn get_json(&self, path: &str, cancel: CancellationToken) -> Result<Value, Error> {
        let url = self.resolve(path)?;
        debug!("GET {}", url);
        let body = self.send(self.http.get(url), cancel).await?;
        decode_json(&body)
    }

    /// POST returning the raw JSON body instead of an envelope.
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
        cancel: CancellationToken,
    ) -> Result<Value, Error> {
        let url = self.resolve(path)?;
        debug!("POST {}", url);
        let body = self.send(self.http.post(url).json(body), cancel).await?;
        decode_json(&body)
    }

    async fn fetch_envelope(
        &self,
        builder: reqwest::RequestBuilder,
        cancel: CancellationToken,
    ) -> Result<Envelope, Error> {
        let body = self.send(builder, cancel).await?;
        Envelope::from_body(&body)
    }

    /// Send the request, racing it against the cancellation token.
    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        cancel: CancellationToken,
    ) -> Result<String, Error> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                trace!("request cancelled before completion");
                Err(Error::Cancelled)
            }
            result = self.execute(builder) => result,
        }
    }

    async fn execute(&self, builder: reqwest::RequestBuilder) -> Result<String, Error> {
        let resp = builder.send().await.map_err(|e| match self.timeout {
            Some(timeout) if e.is_timeout() => Error::Timeout {
                timeout_secs: timeout.as_secs(),
            },
            _ => Error::Transport(e),
        })?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
                body,
            });
        }

        resp.text().await.map_err(Error::Transport)
    }
}

impl FetchClient for HttpClient {
    fn get<'a>(&'a self, url: &'a str, cancel: CancellationToken) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = self.resolve(url)?;
            debug!("GET {}", url);
            self.fetch_envelope(self.http.get(url), cancel).await
        })
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a Value,
        cancel: CancellationToken,
    ) -> FetchFuture<'a> {
        Box::pin(async move {
            let url = self.resolve(url)?;
            debug!("POST {}", url);
            self.fetch_envelope(self.http.post(url).json(body), cancel)
                .await
        })
    }
}

fn decode_json(body: &str) -> Result<Value, Error> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: body.to_owned(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpClient {
        HttpClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn relative_path_joins_under_base_path() {
        let c = client("https://api.example.com/v2");
        let url = c.resolve("me/appointments?page=2").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/me/appointments?page=2");
    }

    #[test]
    fn leading_slash_does_not_escape_base_path() {
        let c = client("https://api.example.com/v2/");
        let url = c.resolve("/me/appointments").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v2/me/appointments");
    }

    #[test]
    fn absolute_url_passes_through() {
        let c = client("https://api.example.com/v2/");
        let url = c.resolve("http://other.test/items").unwrap();
        assert_eq!(url.as_str(), "http://other.test/items");
    }

    #[test]
    fn empty_body_decodes_to_null() {
        assert_eq!(decode_json("").unwrap(), Value::Null);
    }
}
