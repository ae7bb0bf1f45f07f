//! [`GatewayError`] covers both request-path failures (§7 of the design doc)
//! and startup failures. Request-path variants carry just enough data to
//! render the fixed response body; `response()` is the single place that
//! turns a variant into `(StatusCode, body)`.

use http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no route matched")]
    NotMatched,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("upstream not found")]
    UpstreamNotFound,

    #[error("no backend")]
    NoBackend,

    #[error("upstream dispatch failed: {0}")]
    UpstreamDispatch(String),

    #[error("failed to load config: {0}")]
    ConfigLoad(#[source] anyhow::Error),

    #[error("failed to initialize upstream registry: {0}")]
    UpstreamInit(String),
}

impl GatewayError {
    /// Maps a dispatch-path error to its fixed `(status, body)` response.
    ///
    /// Only meaningful for the variants the router can actually produce at
    /// request time; startup-only variants are never passed here.
    #[must_use]
    pub fn response(&self) -> (StatusCode, String) {
        match self {
            Self::NotMatched => (StatusCode::NOT_FOUND, "not found".to_string()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
            ),
            Self::UpstreamNotFound => (StatusCode::BAD_GATEWAY, "upstream not found".to_string()),
            Self::NoBackend => (StatusCode::SERVICE_UNAVAILABLE, "no backend".to_string()),
            Self::UpstreamDispatch(detail) => (StatusCode::BAD_GATEWAY, detail.clone()),
            Self::ConfigLoad(_) | Self::UpstreamInit(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_maps_to_429_with_fixed_body() {
        let (status, body) = GatewayError::RateLimited.response();
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, "rate limit exceeded");
    }

    #[test]
    fn upstream_not_found_maps_to_502() {
        let (status, body) = GatewayError::UpstreamNotFound.response();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, "upstream not found");
    }

    #[test]
    fn no_backend_maps_to_503() {
        let (status, body) = GatewayError::NoBackend.response();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, "no backend");
    }
}
