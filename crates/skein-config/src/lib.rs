//! Shared configuration for skein tools.
//!
//! A single TOML file plus `SKEIN_` environment overrides, bearer token
//! resolution, and translation into `skein_api::TransportConfig` and
//! `skein_core::CollectionOptions`. The CLI layers its flag overrides on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use skein_api::{TlsMode, TransportConfig};
use skein_core::CollectionOptions;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no base URL configured (set `base_url` in {path} or SKEIN_BASE_URL)")]
    MissingBaseUrl { path: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// API root that relative collection URLs are joined onto.
    pub base_url: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Bearer token (plaintext, prefer `api_token_env`).
    pub api_token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub api_token_env: Option<String>,

    #[serde(default)]
    pub collection: CollectionDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            api_token: None,
            api_token_env: None,
            collection: CollectionDefaults::default(),
        }
    }
}

/// Defaults applied to every collection the tools build.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionDefaults {
    #[serde(default = "default_true")]
    pub auto_fetch: bool,

    #[serde(default)]
    pub enable_cache: bool,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        Self {
            auto_fetch: true,
            enable_cache: false,
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_cache_ttl() -> u64 {
    300
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("rs", "skein", "skein").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("skein");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file is not an error.
///
/// Nested keys use a double underscore in the environment, e.g.
/// `SKEIN_COLLECTION__ENABLE_CACHE=true`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SKEIN_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Resolve the bearer token: `api_token_env` lookup first, then the
    /// plaintext `api_token`. `None` means unauthenticated requests.
    pub fn resolve_token(&self) -> Option<SecretString> {
        if let Some(ref env_name) = self.api_token_env {
            if let Ok(val) = std::env::var(env_name) {
                return Some(SecretString::from(val));
            }
        }
        self.api_token.clone().map(SecretString::from)
    }

    /// Parse `base_url`. Errors if unset or not an absolute http(s) URL.
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let raw = self
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingBaseUrl {
                path: config_path().display().to_string(),
            })?;

        let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "base_url".into(),
                reason: format!("expected http or https, got '{}'", url.scheme()),
            });
        }
        Ok(url)
    }

    /// Build the transport settings, token included.
    pub fn transport(&self) -> TransportConfig {
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        let transport = TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout),
            ..TransportConfig::default()
        };
        match self.resolve_token() {
            Some(token) => transport.with_bearer_token(token),
            None => transport,
        }
    }

    /// Collection options seeded from the `[collection]` table.
    pub fn collection_options<T>(&self) -> CollectionOptions<T> {
        CollectionOptions {
            auto_fetch: self.collection.auto_fetch,
            enable_cache: self.collection.enable_cache,
            cache_duration: Duration::from_secs(self.collection.cache_ttl_secs),
            ..CollectionOptions::default()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("absent.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg, Config::default());
            assert!(cfg.collection.auto_fetch);
            assert_eq!(cfg.collection.cache_ttl_secs, 300);
            Ok(())
        });
    }

    #[test]
    fn file_values_and_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                base_url = "https://api.example.com/v1"
                timeout = 5

                [collection]
                enable_cache = true
                cache_ttl_secs = 60
                "#,
            )?;
            jail.set_env("SKEIN_TIMEOUT", "12");
            jail.set_env("SKEIN_COLLECTION__AUTO_FETCH", "false");

            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.base_url.as_deref(), Some("https://api.example.com/v1"));
            assert_eq!(cfg.timeout, 12);
            assert_eq!(
                cfg.collection,
                CollectionDefaults {
                    auto_fetch: false,
                    enable_cache: true,
                    cache_ttl_secs: 60,
                }
            );
            Ok(())
        });
    }

    #[test]
    fn token_env_takes_precedence_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("SKEIN_TEST_TOKEN_VAR", "from-env");
            let mut cfg = Config {
                api_token: Some("plain".into()),
                api_token_env: Some("SKEIN_TEST_TOKEN_VAR".into()),
                ..Config::default()
            };
            assert_eq!(cfg.resolve_token().unwrap().expose_secret(), "from-env");

            cfg.api_token_env = Some("SKEIN_TEST_TOKEN_UNSET".into());
            assert_eq!(cfg.resolve_token().unwrap().expose_secret(), "plain");

            cfg.api_token = None;
            assert!(cfg.resolve_token().is_none());
            Ok(())
        });
    }

    #[test]
    fn base_url_validation() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.base_url(), Err(ConfigError::MissingBaseUrl { .. })));

        cfg.base_url = Some("not a url".into());
        assert!(matches!(cfg.base_url(), Err(ConfigError::Validation { .. })));

        cfg.base_url = Some("ftp://files.example.com".into());
        assert!(matches!(cfg.base_url(), Err(ConfigError::Validation { .. })));

        cfg.base_url = Some("https://api.example.com/v1/".into());
        assert_eq!(cfg.base_url().unwrap().path(), "/v1/");
    }

    #[test]
    fn transport_reflects_tls_and_timeout() {
        let cfg = Config {
            insecure: true,
            ca_cert: Some("/etc/ca.pem".into()),
            timeout: 7,
            ..Config::default()
        };
        let transport = cfg.transport();
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
        assert_eq!(transport.timeout, Duration::from_secs(7));
        assert!(transport.bearer_token.is_none());

        let cfg = Config {
            ca_cert: Some("/etc/ca.pem".into()),
            ..Config::default()
        };
        assert!(matches!(cfg.transport().tls, TlsMode::CustomCa(_)));
    }

    #[test]
    fn collection_options_follow_table() {
        let cfg = Config {
            collection: CollectionDefaults {
                auto_fetch: false,
                enable_cache: true,
                cache_ttl_secs: 42,
            },
            ..Config::default()
        };
        let options = cfg.collection_options::<u32>();
        assert!(!options.auto_fetch);
        assert!(options.enable_cache);
        assert_eq!(options.cache_duration, Duration::from_secs(42));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            base_url: Some("http://localhost:8080".into()),
            api_token_env: Some("MY_TOKEN".into()),
            ..Config::default()
        };

        save_config_to(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("base_url = \"http://localhost:8080\""));
        assert!(text.contains("[collection]"));
    }
}
