//! YAML configuration shape, mirrored field-for-field from the external
//! interface (`server`, `upstreams`, `routes`, `observability`, `plugins`).
//!
//! Unknown keys are ignored rather than rejected, matching a plain
//! `yaml.Unmarshal` into a typed struct: this config format predates strict
//! schema validation and nothing downstream depends on rejecting typos.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: String,
    #[serde(default = "default_admin_addr")]
    pub admin_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            admin_addr: default_admin_addr(),
        }
    }
}

fn default_http_addr() -> String {
    ":8080".to_string()
}

fn default_admin_addr() -> String {
    ":9000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub name: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub rps: i64,
    #[serde(default)]
    pub burst: i64,
}

/// An opaque, per-plugin-instance configuration blob: each plugin parses its
/// own slice out of this map rather than the gateway knowing plugin shapes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginRef {
    pub name: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(rename = "upstream")]
    pub upstream_ref: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub plugins: Vec<PluginRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub log_level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    #[serde(default)]
    pub available: Vec<PluginRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub plugins: PluginsConfig,
}

impl GatewayConfig {
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::ConfigLoad(anyhow::anyhow!("read {path:?}: {e}")))?;
        let cfg: Self = serde_yaml::from_str(&data)
            .map_err(|e| GatewayError::ConfigLoad(anyhow::anyhow!("parse yaml: {e}")))?;
        Ok(cfg)
    }
}
