//! The router/proxy engine: route matching, pipeline orchestration, outbound
//! assembly, response buffering, and header/trailer handling (§4.5).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use http::{HeaderMap, HeaderValue, Request, StatusCode};
use http_body_util::{BodyExt, StreamBody};

use crate::domain::model::{RequestContext, ResponseEnvelope, Route};
use crate::error::GatewayError;
use crate::metrics::Metrics;
use crate::plugin::{Chain, PluginRegistry};
use crate::ratelimit::{self, RateLimiter};
use crate::scheduler::RoundRobin;
use crate::upstream::UpstreamRegistry;

struct RouteEntry {
    route: Route,
    chain: Chain,
}

pub struct Router {
    routes: Vec<RouteEntry>,
    upstreams: UpstreamRegistry,
    scheduler: RoundRobin,
    rate_limiter: RateLimiter,
    metrics: Arc<Metrics>,
}

impl Router {
    /// Builds the per-route chains by concatenating the global
    /// `plugins.available` references ahead of each route's own `plugins`
    /// list, so global plugins (e.g. `observability`) run for every route
    /// while a route may add or differently configure its own.
    #[must_use]
    pub fn new(
        route_configs: Vec<crate::config::RouteConfig>,
        global_plugins: &[crate::config::PluginRef],
        upstreams: UpstreamRegistry,
        metrics: Arc<Metrics>,
    ) -> Result<Self, String> {
        let registry = PluginRegistry::with_builtins();
        let mut routes = Vec::with_capacity(route_configs.len());
        for rc in route_configs {
            let methods = rc
                .methods
                .iter()
                .map(|m| m.parse::<http::Method>().map_err(|e| format!("invalid method {m:?}: {e}")))
                .collect::<Result<Vec<_>, _>>()?;
            let refs: Vec<_> = global_plugins.iter().cloned().chain(rc.plugins).collect();
            let chain = Chain::init(&registry, &refs);
            let route = Route {
                path_prefix: rc.path,
                methods,
                upstream_ref: rc.upstream_ref,
                rate_limit: crate::domain::model::RateLimitParams {
                    rps: rc.rate_limit.rps,
                    burst: rc.rate_limit.burst,
                },
                plugins: refs,
            };
            routes.push(RouteEntry { route, chain });
        }
        Ok(Self {
            routes,
            upstreams,
            scheduler: RoundRobin::new(),
            rate_limiter: RateLimiter::new(),
            metrics,
        })
    }

    fn find_route(&self, path: &str, method: &http::Method) -> Option<&RouteEntry> {
        self.routes.iter().find(|e| e.route.matches(path, method))
    }

    /// Runs the full pipeline for one inbound request (§4.5 steps 1-12).
    pub async fn serve(&self, req: Request<Body>, remote_addr: SocketAddr) -> Response {
        self.metrics.inc_requests();

        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_string();
        let query = parts.uri.query().map(str::to_string);

        let Some(entry) = self.find_route(&path, &parts.method) else {
            return error_response(&GatewayError::NotMatched);
        };
        let route = &entry.route;

        if route.rate_limit.rps > 0 {
            let key = format!("{}|{}", ratelimit::client_ip(&remote_addr.to_string()), route.path_prefix);
            if !self.rate_limiter.allow(&key, route.rate_limit.rps, route.rate_limit.burst) {
                return error_response(&GatewayError::RateLimited);
            }
        }

        let is_grpc = crate::proxy::headers::is_grpc(parts.version, &parts.headers);
        let mut ctx = RequestContext::new(
            parts.method.clone(),
            path,
            parts.headers.clone(),
            remote_addr.to_string(),
            route.path_prefix.clone(),
            self.metrics.clone(),
        );
        ctx.query = query;
        ctx.is_grpc = is_grpc;

        if entry.chain.run_before(&mut ctx) {
            if let Some(envelope) = ctx.response.take() {
                return build_downstream_response(envelope);
            }
            return StatusCode::OK.into_response();
        }

        let upstream_name = ctx
            .upstream_override
            .clone()
            .unwrap_or_else(|| route.upstream_ref.clone());
        let Some(upstream) = self.upstreams.get(&upstream_name) else {
            return error_response(&GatewayError::UpstreamNotFound);
        };
        ctx.upstream_name = Some(upstream_name);

        let raw_idx = self.scheduler.next(upstream.targets.len() as i64);
        let Ok(idx) = usize::try_from(raw_idx) else {
            return error_response(&GatewayError::NoBackend);
        };
        let target = &upstream.targets[idx];
        ctx.target_url = Some(target.url.clone());

        let outbound_url = crate::proxy::request_builder::build_upstream_url(&target.url, &ctx.path, ctx.query.as_deref());

        let mut outbound_headers = ctx.headers.clone();
        crate::proxy::headers::strip_hop_by_hop(&mut outbound_headers);
        if is_grpc {
            outbound_headers.insert("te", HeaderValue::from_static("trailers"));
        }

        let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(b) => b,
            Err(e) => return (StatusCode::BAD_GATEWAY, format!("failed to read request body: {e}")).into_response(),
        };

        let outbound = upstream
            .client
            .request(reqwest_method(&parts.method), outbound_url.as_str())
            .headers(outbound_headers)
            .body(body_bytes);

        let resp = match outbound.send().await {
            Ok(r) => r,
            Err(e) => {
                self.metrics.inc_failures();
                return error_response(&GatewayError::UpstreamDispatch(e.to_string()));
            }
        };

        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let mut headers = HeaderMap::new();
        for (name, value) in resp.headers() {
            headers.append(name.clone(), value.clone());
        }
        let response_body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                self.metrics.inc_failures();
                return error_response(&GatewayError::UpstreamDispatch(e.to_string()));
            }
        };

        let mut envelope = ResponseEnvelope::new(status);
        envelope.headers = headers;
        envelope.body = response_body;
        // Trailers are not exposed by the HTTP client for a regular buffered
        // response; plugins that need `grpc-status`-style trailers populate
        // `envelope.trailers` themselves from whatever signal is available.
        ctx.response = Some(envelope);

        if status.as_u16() >= 400 {
            self.metrics.inc_failures();
        }

        entry.chain.run_after(&mut ctx);

        let Some(mut envelope) = ctx.response.take() else {
            return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
        };
        crate::proxy::headers::strip_hop_by_hop(&mut envelope.headers);
        envelope.headers.remove(http::header::CONTENT_LENGTH);
        build_downstream_response(envelope)
    }
}

/// The single point where a [`GatewayError`] variant becomes a downstream
/// response (§7): one match from variant to `(status, body)`.
fn error_response(err: &GatewayError) -> Response {
    let (status, body) = err.response();
    (status, body).into_response()
}

fn reqwest_method(method: &http::Method) -> reqwest::Method {
    reqwest::Method::from_bytes(method.as_str().as_bytes()).unwrap_or(reqwest::Method::GET)
}

/// Writes status, headers, and body; if trailers are present, announces
/// them via a `Trailer` header before the body and attaches the values as a
/// trailing frame.
fn build_downstream_response(envelope: ResponseEnvelope) -> Response {
    let mut headers = envelope.headers;
    headers.remove(http::header::TRAILER);

    if envelope.trailers.is_empty() {
        let mut response = Response::builder().status(envelope.status).body(Body::from(envelope.body)).unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .expect("static response is valid")
        });
        *response.headers_mut() = headers;
        return response;
    }

    let trailer_names: Vec<String> = envelope
        .trailers
        .keys()
        .map(|k| k.as_str().to_string())
        .collect();
    if let Ok(v) = HeaderValue::from_str(&trailer_names.join(", ")) {
        headers.insert(http::header::TRAILER, v);
    }

    let trailers = envelope.trailers;
    let frames = vec![
        Ok::<_, std::convert::Infallible>(http_body::Frame::data(envelope.body)),
        Ok::<_, std::convert::Infallible>(http_body::Frame::trailers(trailers)),
    ];
    let body = Body::new(StreamBody::new(stream::iter(frames)).boxed_unsync());

    let mut response = Response::builder()
        .status(envelope.status)
        .body(body)
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::empty())
                .expect("static response is valid")
        });
    *response.headers_mut() = headers;
    response
}

/// axum entry point: delegates to [`Router::serve`] with the peer address
/// extracted from `ConnectInfo`.
pub async fn handler(
    State(router): State<Arc<Router>>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    router.serve(req, remote_addr).await
}

#[must_use]
pub fn into_axum_router(router: Arc<Router>) -> axum::Router {
    axum::Router::new().fallback(handler).with_state(router)
}
