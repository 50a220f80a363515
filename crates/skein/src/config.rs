//! CLI configuration: a thin wrapper around `skein_config` that applies
//! `GlobalOpts` flag overrides (--base-url, --token, etc.).

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::ExposeSecret;

use skein_api::{HttpClient, TlsMode};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use skein_config::{Config, config_path, save_config_to};

/// The file the CLI reads and writes: `--config` if given, else the default.
pub fn active_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load config from the active path. Flag overrides are not applied.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(skein_config::load_config_from(&active_path(global))?)
}

/// Load config and fold CLI flags on top (flag > env > file).
pub fn resolve(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load(global)?;
    if let Some(ref base_url) = global.base_url {
        cfg.base_url = Some(base_url.clone());
    }
    if let Some(ref token) = global.token {
        cfg.api_token = Some(token.clone());
        cfg.api_token_env = None;
    }
    if global.insecure {
        cfg.insecure = true;
    }
    if let Some(timeout) = global.timeout {
        cfg.timeout = timeout;
    }
    Ok(cfg)
}

/// Build the HTTP client the commands fetch through.
pub fn build_client(cfg: &Config) -> Result<Arc<HttpClient>, CliError> {
    let base_url = cfg.base_url()?;
    let transport = cfg.transport();
    tracing::debug!(
        base_url = %base_url,
        insecure = matches!(transport.tls, TlsMode::DangerAcceptInvalid),
        authenticated = transport.bearer_token.is_some(),
        "building client"
    );
    let client = HttpClient::new(base_url.clone(), &transport)
        .map_err(|e| CliError::from_api(&e, base_url.as_str()))?;
    Ok(Arc::new(client))
}

/// Apply a `config set` key. Keys mirror the TOML layout.
pub fn set_key(cfg: &mut Config, key: &str, value: &str) -> Result<(), CliError> {
    match key {
        "base_url" => cfg.base_url = Some(value.to_owned()),
        "timeout" => cfg.timeout = parse(key, value)?,
        "insecure" => cfg.insecure = parse(key, value)?,
        "ca_cert" => cfg.ca_cert = Some(PathBuf::from(value)),
        "api_token" => cfg.api_token = Some(value.to_owned()),
        "api_token_env" => cfg.api_token_env = Some(value.to_owned()),
        "collection.auto_fetch" => cfg.collection.auto_fetch = parse(key, value)?,
        "collection.enable_cache" => cfg.collection.enable_cache = parse(key, value)?,
        "collection.cache_ttl_secs" => cfg.collection.cache_ttl_secs = parse(key, value)?,
        other => {
            return Err(CliError::Validation {
                field: "key".into(),
                reason: format!("unknown config key '{other}'"),
            });
        }
    }
    if key == "base_url" {
        cfg.base_url()?;
    }
    Ok(())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CliError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| CliError::Validation {
        field: key.into(),
        reason: e.to_string(),
    })
}

/// A copy of `cfg` that is safe to print.
pub fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    if shown.api_token.is_some() {
        shown.api_token = Some("********".into());
    }
    shown
}

/// Whether a bearer token would be sent, for display.
pub fn has_token(cfg: &Config) -> bool {
    cfg.resolve_token()
        .is_some_and(|token| !token.expose_secret().is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn set_key_parses_typed_values() {
        let mut cfg = Config::default();
        set_key(&mut cfg, "timeout", "9").unwrap();
        set_key(&mut cfg, "collection.enable_cache", "true").unwrap();
        set_key(&mut cfg, "base_url", "https://api.example.com").unwrap();
        assert_eq!(cfg.timeout, 9);
        assert!(cfg.collection.enable_cache);
        assert_eq!(cfg.base_url.as_deref(), Some("https://api.example.com"));
    }

    #[test]
    fn set_key_rejects_bad_input() {
        let mut cfg = Config::default();
        assert!(set_key(&mut cfg, "timeout", "soon").is_err());
        assert!(set_key(&mut cfg, "colour", "red").is_err());
        assert!(set_key(&mut cfg, "base_url", "ftp://x").is_err());
    }

    #[test]
    fn redaction_hides_token() {
        let cfg = Config {
            api_token: Some("secret".into()),
            ..Config::default()
        };
        assert_eq!(redacted(&cfg).api_token.as_deref(), Some("********"));
        assert!(has_token(&cfg));
    }
}
