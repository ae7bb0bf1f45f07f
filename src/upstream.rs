//! The upstream registry: name → `{targets, client}`. Built once at startup
//! from config and never mutated afterward; reads may run concurrently from
//! any number of request tasks.

use std::collections::HashMap;
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::domain::model::{Target, Upstream};
use crate::error::GatewayError;

pub struct UpstreamRegistry {
    upstreams: HashMap<String, Upstream>,
}

impl UpstreamRegistry {
    /// Each entry requires a non-empty name and at least one target; every
    /// target must parse as an absolute URL with scheme and host. A timeout
    /// of zero means no timeout.
    pub fn build(configs: &[UpstreamConfig]) -> Result<Self, GatewayError> {
        let mut upstreams = HashMap::with_capacity(configs.len());
        for cfg in configs {
            if cfg.name.is_empty() || cfg.targets.is_empty() {
                return Err(GatewayError::UpstreamInit(
                    "upstream name and targets required".to_string(),
                ));
            }
            let mut targets = Vec::with_capacity(cfg.targets.len());
            for raw in &cfg.targets {
                targets.push(Target::parse(raw).map_err(GatewayError::UpstreamInit)?);
            }
            let mut builder = reqwest::Client::builder();
            if cfg.timeout_ms > 0 {
                builder = builder.timeout(Duration::from_millis(cfg.timeout_ms));
            }
            let client = builder
                .build()
                .map_err(|e| GatewayError::UpstreamInit(format!("build client for {}: {e}", cfg.name)))?;
            upstreams.insert(
                cfg.name.clone(),
                Upstream {
                    name: cfg.name.clone(),
                    targets,
                    client,
                },
            );
        }
        Ok(Self { upstreams })
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Upstream> {
        self.upstreams.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_name() {
        let cfgs = vec![UpstreamConfig {
            name: String::new(),
            targets: vec!["http://example.com".into()],
            timeout_ms: 0,
        }];
        assert!(UpstreamRegistry::build(&cfgs).is_err());
    }

    #[test]
    fn rejects_no_targets() {
        let cfgs = vec![UpstreamConfig {
            name: "u".into(),
            targets: vec![],
            timeout_ms: 0,
        }];
        assert!(UpstreamRegistry::build(&cfgs).is_err());
    }

    #[test]
    fn rejects_unparsable_target() {
        let cfgs = vec![UpstreamConfig {
            name: "u".into(),
            targets: vec!["not a url".into()],
            timeout_ms: 0,
        }];
        assert!(UpstreamRegistry::build(&cfgs).is_err());
    }

    #[test]
    fn get_returns_built_upstream() {
        let cfgs = vec![UpstreamConfig {
            name: "u".into(),
            targets: vec!["http://example.com".into()],
            timeout_ms: 1000,
        }];
        let reg = UpstreamRegistry::build(&cfgs).unwrap();
        let u = reg.get("u").unwrap();
        assert_eq!(u.targets.len(), 1);
        assert!(reg.get("missing").is_none());
    }
}
