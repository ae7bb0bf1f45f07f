pub mod observability;
pub mod rewrite;
pub mod transform;

use std::collections::HashMap;

use crate::config::PluginRef;
use crate::domain::model::RequestContext;

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("{0}")]
    Init(String),
    #[error("{0}")]
    Before(String),
}

/// A named, configured unit with before/after hooks over the request
/// lifecycle. Instances are constructed once at config load and shared
/// across all subsequent requests; their configuration fields never mutate
/// post-init, so implementations only need to be safe for concurrent reads.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parses `config` (the opaque per-route or per-registration map) into
    /// this plugin's own settings.
    fn init(&mut self, config: &HashMap<String, serde_json::Value>) -> Result<(), PluginError>;

    /// Returns `handled = true` when this plugin has produced a complete
    /// response and the router must not dispatch upstream or run the rest
    /// of the before-chain.
    fn before(&self, ctx: &mut RequestContext) -> Result<bool, PluginError>;

    /// Runs after the upstream response has been buffered into
    /// `ctx.response`. Errors are logged and swallowed by the chain.
    fn after(&self, ctx: &mut RequestContext);
}

type Constructor = fn() -> Box<dyn Plugin>;

/// Process-wide name→constructor map, populated once before config load.
pub struct PluginRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl PluginRegistry {
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut constructors: HashMap<&'static str, Constructor> = HashMap::new();
        constructors.insert("rewrite", || Box::new(rewrite::RewritePlugin::default()));
        constructors.insert("transform", || Box::new(transform::TransformPlugin::default()));
        constructors.insert("observability", || Box::new(observability::ObservabilityPlugin::default()));
        Self { constructors }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Constructor> {
        self.constructors.get(name).copied()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// The ordered, active list of plugins for the data plane. Read-only after
/// `init`.
#[derive(Default)]
pub struct Chain {
    plugins: Vec<Box<dyn Plugin>>,
}

impl Chain {
    /// Builds an instance for each reference, skipping (with a warning) any
    /// unknown name or any instance whose `init` fails. Neither failure
    /// aborts startup.
    #[must_use]
    pub fn init(registry: &PluginRegistry, refs: &[PluginRef]) -> Self {
        let mut plugins = Vec::with_capacity(refs.len());
        for pref in refs {
            let Some(ctor) = registry.get(&pref.name) else {
                tracing::warn!(plugin = %pref.name, "unknown plugin, skipping");
                continue;
            };
            let mut instance = ctor();
            if let Err(e) = instance.init(&pref.config) {
                tracing::error!(plugin = %pref.name, error = %e, "plugin init failed, skipping");
                continue;
            }
            tracing::info!(plugin = %pref.name, "plugin loaded");
            plugins.push(instance);
        }
        Self { plugins }
    }

    /// Runs before-hooks in configuration order. Returns `true` as soon as
    /// any plugin reports `handled`. Errors without `handled` are logged and
    /// the chain continues.
    pub fn run_before(&self, ctx: &mut RequestContext) -> bool {
        for plugin in &self.plugins {
            match plugin.before(ctx) {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(plugin = plugin.name(), error = %e, "plugin before-hook error");
                }
            }
        }
        false
    }

    /// Runs after-hooks in configuration order; errors would be swallowed,
    /// but `after` has no error return by design (§4.4).
    pub fn run_after(&self, ctx: &mut RequestContext) {
        for plugin in &self.plugins {
            plugin.after(ctx);
        }
    }
}
