//! Hop-by-hop header stripping and gRPC detection.

use http::{HeaderMap, HeaderName};

/// Fixed hop-by-hop set (§4.5 step 8), plus whatever names the `Connection`
/// header itself lists (RFC 7230 §6.1).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    if let Some(conn_value) = headers.get("connection").and_then(|v| v.to_str().ok()) {
        let named: Vec<String> = conn_value
            .split(',')
            .map(|token| token.trim().to_lowercase())
            .filter(|token| !token.is_empty())
            .collect();
        for name in &named {
            if let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) {
                headers.remove(header_name);
            }
        }
    }

    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// gRPC detection: HTTP/2+ and a `Content-Type` beginning with
/// `application/grpc`.
#[must_use]
pub fn is_grpc(version: http::Version, headers: &HeaderMap) -> bool {
    let proto_major_at_least_2 = matches!(version, http::Version::HTTP_2 | http::Version::HTTP_3);
    proto_major_at_least_2 && is_grpc_content_type(headers)
}

#[must_use]
pub fn is_grpc_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/grpc"))
}
