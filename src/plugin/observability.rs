use std::collections::HashMap;
use std::time::Instant;

use http::HeaderValue;
use rand::RngCore;
use serde::Deserialize;

use crate::domain::model::RequestContext;

use super::{Plugin, PluginError};

fn default_request_id_header() -> String {
    "X-Request-ID".to_string()
}

fn default_correlation_id_header() -> String {
    "X-Correlation-ID".to_string()
}

fn default_log() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    #[serde(default = "default_request_id_header")]
    request_id_header: String,
    #[serde(default = "default_correlation_id_header")]
    correlation_id_header: String,
    #[serde(default = "default_log")]
    log: bool,
    #[serde(default)]
    metrics_labels: HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            request_id_header: default_request_id_header(),
            correlation_id_header: default_correlation_id_header(),
            log: default_log(),
            metrics_labels: HashMap::new(),
        }
    }
}

fn random_id() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Stamps request/correlation IDs, records a start time, and on `after`
/// emits a structured log line plus the total-request/total-failure counts.
#[derive(Default)]
pub struct ObservabilityPlugin {
    config: ObservabilityConfig,
}

impl Plugin for ObservabilityPlugin {
    fn name(&self) -> &'static str {
        "observability"
    }

    fn init(&mut self, config: &HashMap<String, serde_json::Value>) -> Result<(), PluginError> {
        self.config = serde_json::from_value(
            serde_json::to_value(config).map_err(|e| PluginError::Init(e.to_string()))?,
        )
        .map_err(|e| PluginError::Init(e.to_string()))?;
        Ok(())
    }

    fn before(&self, ctx: &mut RequestContext) -> Result<bool, PluginError> {
        let request_id = header_value(&ctx.headers, &self.config.request_id_header).unwrap_or_else(random_id);
        let correlation_id =
            header_value(&ctx.headers, &self.config.correlation_id_header).unwrap_or_else(|| request_id.clone());

        set_header(&mut ctx.headers, &self.config.request_id_header, &request_id);
        set_header(&mut ctx.headers, &self.config.correlation_id_header, &correlation_id);
        ctx.start_time = Some(Instant::now());
        Ok(false)
    }

    fn after(&self, ctx: &mut RequestContext) {
        let elapsed_ms = ctx
            .start_time
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();
        let status = ctx.response.as_ref().map(|r| r.status.as_u16()).unwrap_or(0);

        if self.config.log {
            tracing::info!(
                method = %ctx.method,
                path = %ctx.path,
                status,
                duration_ms = elapsed_ms,
                upstream = ctx.upstream_name.as_deref().unwrap_or(""),
                target = ctx.target_url.as_ref().map(ToString::to_string).unwrap_or_default(),
                labels = ?self.config.metrics_labels,
                "request handled"
            );
        }

        ctx.metrics.inc_requests();
        if status >= 400 {
            ctx.metrics.inc_failures();
        }
    }
}

fn header_value(headers: &http::HeaderMap, name: &str) -> Option<String> {
    let header_name = http::HeaderName::from_bytes(name.to_lowercase().as_bytes()).ok()?;
    headers.get(header_name)?.to_str().ok().map(str::to_string)
}

fn set_header(headers: &mut http::HeaderMap, name: &str, value: &str) {
    if let (Ok(n), Ok(v)) = (
        http::HeaderName::from_bytes(name.to_lowercase().as_bytes()),
        HeaderValue::from_str(value),
    ) {
        headers.insert(n, v);
    }
}
