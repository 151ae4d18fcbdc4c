//! # Gateway Configuration
//!
//! Process-level settings, read from a YAML file and then overridden from the
//! environment. Every field has a default, so an empty file (or no file) is a
//! valid configuration.
//!
//! ```yaml
//! routes_file: config/routes.yaml
//! caching:
//!   enabled: true
//!   ttl_secs: 120
//! request_id_header: X-Request-Id
//! expose_debug_info: false
//! cors:
//!   allowed_origins: ["https://app.example.com"]
//!   allow_credentials: true
//! server_banner: "routegate/0.1"
//! logging:
//!   level: info
//!   format: json
//! ```
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |---|---|
//! | `ROUTEGATE_ROUTES_FILE` | `routes_file` |
//! | `ROUTEGATE_CACHING` | `caching.enabled` |
//! | `ROUTEGATE_CACHE_TTL_SECS` | `caching.ttl_secs` |
//! | `ROUTEGATE_EXPOSE_DEBUG` | `expose_debug_info` |
//! | `ROUTEGATE_LOG_LEVEL` | `logging.level` |
//! | `ROUTEGATE_LOG_FORMAT` | `logging.format` |

use crate::logging::{LogConfig, LogFormat};
use crate::spec::LoadOptions;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Process-wide switch; route-level caching only applies when this is on.
    pub enabled: bool,
    /// TTL for routes that enable caching without naming one.
    pub ttl_secs: u64,
    /// Entry limit of the in-memory store.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 300,
            capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Empty means any origin: the request `Origin` is echoed, or `*`
    /// when there is none.
    pub allowed_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    /// Extra headers exposed to browsers. The request-id header is always
    /// added when the gateway is built.
    pub expose_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: Vec::new(),
            allow_methods: ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS"]
                .map(String::from)
                .to_vec(),
            allow_headers: ["Content-Type", "Authorization", "X-Requested-With"]
                .map(String::from)
                .to_vec(),
            expose_headers: Vec::new(),
            allow_credentials: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub routes_file: PathBuf,
    pub caching: CacheSettings,
    pub request_id_header: String,
    pub request_id_prefix: String,
    /// Include the debug payload of internal errors in client documents.
    pub expose_debug_info: bool,
    /// Topic for internal-error events; `None` disables them.
    pub error_event_topic: Option<String>,
    pub cors: CorsConfig,
    pub server_banner: Option<String>,
    pub logging: LogConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            routes_file: PathBuf::from("routes.yaml"),
            caching: CacheSettings::default(),
            request_id_header: "X-Request-Id".to_string(),
            request_id_prefix: "req".to_string(),
            expose_debug_info: true,
            error_event_topic: Some("internal_error".to_string()),
            cors: CorsConfig::default(),
            server_banner: None,
            logging: LogConfig::default(),
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl GatewayConfig {
    /// Read a YAML configuration file. Environment overrides are not applied.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply `ROUTEGATE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparsable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("ROUTEGATE_ROUTES_FILE") {
            self.routes_file = PathBuf::from(path);
        }
        if let Some(raw) = lookup("ROUTEGATE_CACHING") {
            match parse_flag(&raw) {
                Some(flag) => self.caching.enabled = flag,
                None => warn!(value = %raw, "Ignoring invalid ROUTEGATE_CACHING"),
            }
        }
        if let Some(raw) = lookup("ROUTEGATE_CACHE_TTL_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.caching.ttl_secs = secs,
                Err(_) => warn!(value = %raw, "Ignoring invalid ROUTEGATE_CACHE_TTL_SECS"),
            }
        }
        if let Some(raw) = lookup("ROUTEGATE_EXPOSE_DEBUG") {
            match parse_flag(&raw) {
                Some(flag) => self.expose_debug_info = flag,
                None => warn!(value = %raw, "Ignoring invalid ROUTEGATE_EXPOSE_DEBUG"),
            }
        }
        if let Some(level) = lookup("ROUTEGATE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ROUTEGATE_LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&format);
        }
    }

    /// Route loader options implied by this configuration.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            caching_enabled: self.caching.enabled,
            default_cache_ttl: Duration::from_secs(self.caching.ttl_secs),
        }
    }
}
