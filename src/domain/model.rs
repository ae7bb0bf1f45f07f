use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::config::PluginRef;
use crate::metrics::Metrics;

/// An absolute URL a request may be proxied to. `url` carries scheme, host,
/// port, and an optional base path used when joining the inbound path.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,
}

impl Target {
    /// Parses `raw` as an absolute URL, requiring a scheme and a host.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let url = Url::parse(raw).map_err(|e| format!("invalid target url {raw:?}: {e}"))?;
        if url.host_str().is_none() {
            return Err(format!("target url {raw:?} has no host"));
        }
        Ok(Self { url })
    }
}

/// A named aggregate of targets sharing one HTTP client configuration.
/// Immutable after construction; safe to read concurrently.
pub struct Upstream {
    pub name: String,
    pub targets: Vec<Target>,
    pub client: reqwest::Client,
}

/// `{rps, burst}` as carried by a route; `rps <= 0` means unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitParams {
    pub rps: i64,
    pub burst: i64,
}

/// One entry in the ordered route list; first prefix-and-method match wins.
pub struct Route {
    pub path_prefix: String,
    pub methods: Vec<Method>,
    pub upstream_ref: String,
    pub rate_limit: RateLimitParams,
    pub plugins: Vec<PluginRef>,
}

impl Route {
    /// Empty prefix matches any path; empty method list matches any method.
    #[must_use]
    pub fn matches(&self, path: &str, method: &Method) -> bool {
        let path_ok = self.path_prefix.is_empty() || path.starts_with(&self.path_prefix);
        let method_ok = self.methods.is_empty()
            || self
                .methods
                .iter()
                .any(|m| m.as_str().eq_ignore_ascii_case(method.as_str()));
        path_ok && method_ok
    }
}

/// The buffered `{status, headers, body, trailers}` view of an upstream
/// response, mutable by the plugin after-chain before it is written
/// downstream.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub trailers: HeaderMap,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            trailers: HeaderMap::new(),
        }
    }
}

/// Per-request mutable envelope threaded through the plugin chain. Owned
/// exclusively by the task handling the request; never shared across
/// requests.
pub struct RequestContext {
    pub method: Method,
    /// Request path, possibly rewritten by a plugin before dispatch.
    pub path: String,
    /// Raw query string (unmodified by plugins), forwarded verbatim.
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// Client IP as extracted from the peer address (§4.5 step 3).
    pub client_ip: String,
    /// The route's configured path prefix, used in the rate-limit key.
    pub route_path: String,
    pub is_grpc: bool,

    /// Set by the `rewrite` plugin to redirect dispatch to a different
    /// upstream; a typed field rather than an opaque side channel.
    pub upstream_override: Option<String>,
    /// Stamped by the `observability` plugin's before-hook.
    pub start_time: Option<Instant>,

    pub upstream_name: Option<String>,
    pub target_url: Option<Url>,

    /// Populated once the upstream has responded; `None` during the
    /// before-chain.
    pub response: Option<ResponseEnvelope>,

    /// Shared counters, so plugins (e.g. `observability`) can record
    /// requests/failures themselves rather than only through the router.
    pub metrics: Arc<Metrics>,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        method: Method,
        path: String,
        headers: HeaderMap,
        client_ip: String,
        route_path: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            method,
            path,
            query: None,
            headers,
            client_ip,
            route_path,
            is_grpc: false,
            upstream_override: None,
            start_time: None,
            upstream_name: None,
            target_url: None,
            response: None,
            metrics,
        }
    }
}
