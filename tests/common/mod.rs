//! Shared harness for integration tests: loopback echo servers standing in
//! for upstreams, and a loopback gateway instance built from real `agw`
//! config types.

use std::net::SocketAddr;
use std::sync::Arc;

use agw::config::{PluginRef, RateLimitConfig, RouteConfig, UpstreamConfig};
use agw::metrics::Metrics;
use agw::proxy::{into_axum_router, Router};
use agw::upstream::UpstreamRegistry;

/// Spawns a server that replies `body` to every request, reflecting any
/// inbound `X-Test` header back onto the response.
pub async fn spawn_echo_server(body: &'static str) -> SocketAddr {
    let app = axum::Router::new().fallback(move |req: axum::extract::Request| async move {
        let mut response = axum::response::Response::new(axum::body::Body::from(body));
        if let Some(v) = req.headers().get("x-test") {
            response.headers_mut().insert("x-test", v.clone());
        }
        response
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind echo server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("echo server crashed");
    });
    addr
}

#[derive(Default)]
pub struct GatewayBuilder {
    upstreams: Vec<UpstreamConfig>,
    routes: Vec<RouteConfig>,
    global_plugins: Vec<PluginRef>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn upstream(mut self, name: &str, target: SocketAddr) -> Self {
        self.upstreams.push(UpstreamConfig {
            name: name.to_string(),
            targets: vec![format!("http://{target}")],
            timeout_ms: 0,
        });
        self
    }

    #[must_use]
    pub fn route(
        mut self,
        path: &str,
        methods: &[&str],
        upstream: &str,
        rate_limit: RateLimitConfig,
        plugins: Vec<PluginRef>,
    ) -> Self {
        self.routes.push(RouteConfig {
            path: path.to_string(),
            methods: methods.iter().map(|m| (*m).to_string()).collect(),
            upstream_ref: upstream.to_string(),
            rate_limit,
            plugins,
        });
        self
    }

    /// Binds the gateway on a loopback port and returns its base URL.
    pub async fn spawn(self) -> String {
        let upstreams = UpstreamRegistry::build(&self.upstreams).expect("build upstream registry");
        let router = Router::new(self.routes, &self.global_plugins, upstreams, Arc::new(Metrics::new()))
            .expect("build router");
        let app = into_axum_router(Arc::new(router));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind gateway");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("gateway server crashed");
        });
        format!("http://{addr}")
    }
}

pub fn plugin_ref(name: &str, config: serde_json::Value) -> PluginRef {
    let config = match config {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        serde_json::Value::Null => std::collections::HashMap::new(),
        other => std::collections::HashMap::from([("value".to_string(), other)]),
    };
    PluginRef {
        name: name.to_string(),
        config,
    }
}
