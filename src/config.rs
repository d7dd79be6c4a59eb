use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path the WFS endpoint is served on
    #[serde(default = "default_wfs_path")]
    pub wfs_path: String,
    /// Request header carrying the caller's identity
    #[serde(default = "default_identity_header")]
    pub identity_header: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_wfs_path() -> String {
    "/service/wfs".to_string()
}

fn default_identity_header() -> String {
    "uuid".to_string()
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterConfig {
    /// Feature property holding the owner of an observation
    #[serde(default = "default_identity_property")]
    pub identity_property: String,
    /// CRS used for `bbox` values that don't name one
    #[serde(default = "default_bbox_crs")]
    pub default_bbox_crs: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            identity_property: default_identity_property(),
            default_bbox_crs: default_bbox_crs(),
        }
    }
}

fn default_identity_property() -> String {
    "userid".to_string()
}

fn default_bbox_crs() -> String {
    "EPSG:4326".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamMode {
    /// Forward rewritten requests to the configured WFS
    #[default]
    Http,
    /// Answer with the rewritten request itself (development backend)
    Echo,
}

#[derive(Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub mode: UpstreamMode,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mode: UpstreamMode::default(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

// Custom Debug implementation to redact credentials embedded in the upstream URL,
// either as userinfo or as query parameters (e.g. a GeoServer `authkey`)
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("mode", &self.mode)
            .field("url", &self.url.as_deref().map(redact_url))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn redact_url(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return "[UNPARSABLE]".to_string();
    };

    if parsed.password().is_some() {
        let _ = parsed.set_password(Some("[REDACTED]"));
    }

    // Query values are hidden wholesale, only the keys stay readable
    let keys: Vec<String> = parsed.query_pairs().map(|(k, _)| k.into_owned()).collect();
    if !keys.is_empty() {
        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(keys.iter().map(|k| (k.as_str(), "REDACTED")));
    }

    parsed.to_string()
}

impl Config {
    pub fn load() -> AppResult<Arc<Self>> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("WFSPEP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let settings: Config = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(Arc::new(settings))
    }

    pub fn validate(&self) -> AppResult<()> {
        if !self.wfs_path.starts_with('/') {
            return Err(AppError::Config(format!(
                "wfs_path must start with '/': {}",
                self.wfs_path
            )));
        }

        if self.identity_header.trim().is_empty() {
            return Err(AppError::Config("identity_header must not be empty".to_string()));
        }

        if self.upstream.mode == UpstreamMode::Http {
            let url = self.upstream.url.as_deref().ok_or_else(|| {
                AppError::Config("upstream.url is required in http mode".to_string())
            })?;
            url::Url::parse(url)
                .map_err(|e| AppError::Config(format!("Invalid upstream.url: {}", e)))?;
        }

        Ok(())
    }
}
