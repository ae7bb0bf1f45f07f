use std::collections::HashMap;

use http::{HeaderName, HeaderValue};
use serde::Deserialize;

use crate::domain::model::RequestContext;

use super::{Plugin, PluginError};

#[derive(Debug, Default, Deserialize)]
struct RewriteConfig {
    #[serde(default)]
    strip_prefix: String,
    #[serde(default)]
    add_prefix: String,
    #[serde(default)]
    set_path: String,
    #[serde(default)]
    add_headers: HashMap<String, String>,
    #[serde(default)]
    set_upstream: String,
}

/// Rewrites the request path, sets static headers, and may redirect
/// dispatch to a different upstream. `after` is a no-op.
#[derive(Default)]
pub struct RewritePlugin {
    config: RewriteConfig,
}

impl Plugin for RewritePlugin {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    fn init(&mut self, config: &HashMap<String, serde_json::Value>) -> Result<(), PluginError> {
        self.config = serde_json::from_value(
            serde_json::to_value(config).map_err(|e| PluginError::Init(e.to_string()))?,
        )
        .map_err(|e| PluginError::Init(e.to_string()))?;
        Ok(())
    }

    fn before(&self, ctx: &mut RequestContext) -> Result<bool, PluginError> {
        let mut path = ctx.path.clone();

        if !self.config.strip_prefix.is_empty() && path.starts_with(&self.config.strip_prefix) {
            path = path[self.config.strip_prefix.len()..].to_string();
            if !path.starts_with('/') {
                path = format!("/{path}");
            }
        }

        if !self.config.add_prefix.is_empty() {
            let mut add_prefix = self.config.add_prefix.clone();
            if !add_prefix.starts_with('/') {
                add_prefix = format!("/{add_prefix}");
            }
            path = match (add_prefix.ends_with('/'), path.starts_with('/')) {
                (true, true) => format!("{add_prefix}{}", &path[1..]),
                (false, false) => format!("{add_prefix}/{path}"),
                _ => format!("{add_prefix}{path}"),
            };
        }

        if !self.config.set_path.is_empty() {
            path = self.config.set_path.replace("${path}", &path);
        }

        ctx.path = path;

        for (name, value) in &self.config.add_headers {
            if let (Ok(n), Ok(v)) = (
                HeaderName::from_bytes(name.to_lowercase().as_bytes()),
                HeaderValue::from_str(value),
            ) {
                ctx.headers.insert(n, v);
            }
        }

        if !self.config.set_upstream.is_empty() {
            ctx.upstream_override = Some(self.config.set_upstream.clone());
        }

        Ok(false)
    }

    fn after(&self, _ctx: &mut RequestContext) {}
}
