use std::collections::HashMap;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use http::{HeaderName, HeaderValue, StatusCode};
use serde::Deserialize;

use crate::domain::model::RequestContext;
use crate::proxy::headers::is_grpc_content_type;

use super::{Plugin, PluginError};

#[derive(Debug, Default, Deserialize)]
struct TransformConfig {
    #[serde(default)]
    json_to_xml: bool,
    #[serde(default)]
    xml_to_json: bool,
    #[serde(default)]
    mask_fields: Vec<String>,
    #[serde(default)]
    gzip_compress: bool,
    #[serde(default)]
    gzip_decompress: bool,
    #[serde(default)]
    grpc_status_map: HashMap<String, u16>,
    #[serde(default)]
    add_grpc_metadata: HashMap<String, String>,
}

/// Body and trailer transforms applied to the buffered response envelope.
/// Each step in `after` operates on the body produced by the previous one.
#[derive(Default)]
pub struct TransformPlugin {
    config: TransformConfig,
}

fn content_type_contains(headers: &http::HeaderMap, needle: &str) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains(needle))
}

fn mask_json_fields(body: &[u8], fields: &[String]) -> Vec<u8> {
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return body.to_vec();
    };
    let Some(obj) = value.as_object_mut() else {
        return body.to_vec();
    };
    for field in fields {
        if obj.contains_key(field) {
            obj.insert(field.clone(), serde_json::Value::String("***".to_string()));
        }
    }
    serde_json::to_vec(&value).unwrap_or_else(|_| body.to_vec())
}

fn json_escape(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn gzip_compress(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

fn gzip_decompress(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(body);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

impl Plugin for TransformPlugin {
    fn name(&self) -> &'static str {
        "transform"
    }

    fn init(&mut self, config: &HashMap<String, serde_json::Value>) -> Result<(), PluginError> {
        self.config = serde_json::from_value(
            serde_json::to_value(config).map_err(|e| PluginError::Init(e.to_string()))?,
        )
        .map_err(|e| PluginError::Init(e.to_string()))?;
        Ok(())
    }

    fn before(&self, ctx: &mut RequestContext) -> Result<bool, PluginError> {
        if !self.config.add_grpc_metadata.is_empty() && is_grpc_content_type(&ctx.headers) {
            for (name, value) in &self.config.add_grpc_metadata {
                if let (Ok(n), Ok(v)) = (
                    HeaderName::from_bytes(name.to_lowercase().as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    ctx.headers.insert(n, v);
                }
            }
        }
        Ok(false)
    }

    fn after(&self, ctx: &mut RequestContext) {
        let Some(envelope) = ctx.response.as_mut() else {
            return;
        };

        if !self.config.grpc_status_map.is_empty()
            && let Some(grpc_status) = envelope
                .trailers
                .get("grpc-status")
                .and_then(|v| v.to_str().ok())
            && let Some(&http_status) = self.config.grpc_status_map.get(grpc_status)
            && let Ok(status) = StatusCode::from_u16(http_status)
        {
            envelope.status = status;
        }

        if self.config.gzip_decompress
            && envelope
                .headers
                .get(http::header::CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("gzip"))
            && let Ok(decompressed) = gzip_decompress(&envelope.body)
        {
            envelope.body = decompressed.into();
            envelope.headers.remove(http::header::CONTENT_ENCODING);
        }

        if !self.config.mask_fields.is_empty() && content_type_contains(&envelope.headers, "application/json") {
            envelope.body = mask_json_fields(&envelope.body, &self.config.mask_fields).into();
        }

        if self.config.json_to_xml && content_type_contains(&envelope.headers, "application/json") {
            let mut wrapped = Vec::with_capacity(envelope.body.len() + 13);
            wrapped.extend_from_slice(b"<json>");
            wrapped.extend_from_slice(&envelope.body);
            wrapped.extend_from_slice(b"</json>");
            envelope.body = wrapped.into();
            envelope.headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/xml"),
            );
        }

        if self.config.xml_to_json && content_type_contains(&envelope.headers, "application/xml") {
            let xml = String::from_utf8_lossy(&envelope.body);
            envelope.body = format!("{{\"xml\":{}}}", json_escape(&xml)).into_bytes().into();
            envelope.headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        if self.config.gzip_compress
            && let Ok(compressed) = gzip_compress(&envelope.body)
        {
            envelope.body = compressed.into();
            envelope
                .headers
                .insert(http::header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::{HeaderMap, Method};

    use crate::domain::model::ResponseEnvelope;
    use crate::metrics::Metrics;

    use super::*;

    fn ctx_with_response(body: &[u8], content_type: &str) -> RequestContext {
        let mut ctx = RequestContext::new(
            Method::GET,
            "/".into(),
            HeaderMap::new(),
            "1.2.3.4".into(),
            "/".into(),
            Arc::new(Metrics::new()),
        );
        let mut envelope = ResponseEnvelope::new(StatusCode::OK);
        envelope.headers.insert(http::header::CONTENT_TYPE, content_type.parse().unwrap());
        envelope.body = body.to_vec().into();
        ctx.response = Some(envelope);
        ctx
    }

    fn plugin_with(config: serde_json::Value) -> TransformPlugin {
        let map: HashMap<String, serde_json::Value> = serde_json::from_value(config).unwrap();
        let mut p = TransformPlugin::default();
        p.init(&map).unwrap();
        p
    }

    #[test]
    fn masks_top_level_json_fields() {
        let plugin = plugin_with(serde_json::json!({"mask_fields": ["secret"]}));
        let mut ctx = ctx_with_response(br#"{"secret":"x","keep":"y"}"#, "application/json");
        plugin.after(&mut ctx);
        let body: serde_json::Value = serde_json::from_slice(&ctx.response.unwrap().body).unwrap();
        assert_eq!(body["secret"], "***");
        assert_eq!(body["keep"], "y");
    }

    #[test]
    fn invalid_json_left_unchanged() {
        let plugin = plugin_with(serde_json::json!({"mask_fields": ["secret"]}));
        let mut ctx = ctx_with_response(b"not json", "application/json");
        plugin.after(&mut ctx);
        assert_eq!(&ctx.response.unwrap().body[..], b"not json");
    }

    #[test]
    fn json_to_xml_wraps_body() {
        let plugin = plugin_with(serde_json::json!({"json_to_xml": true}));
        let mut ctx = ctx_with_response(b"{}", "application/json");
        plugin.after(&mut ctx);
        let envelope = ctx.response.unwrap();
        assert_eq!(&envelope.body[..], b"<json>{}</json>");
        assert_eq!(envelope.headers.get(http::header::CONTENT_TYPE).unwrap(), "application/xml");
    }

    #[test]
    fn xml_to_json_escapes_body() {
        let plugin = plugin_with(serde_json::json!({"xml_to_json": true}));
        let mut ctx = ctx_with_response(b"<a>b</a>", "application/xml");
        plugin.after(&mut ctx);
        let envelope = ctx.response.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&envelope.body).unwrap();
        assert_eq!(parsed["xml"], "<a>b</a>");
        assert_eq!(envelope.headers.get(http::header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn json_to_xml_then_xml_to_json_both_apply_in_sequence() {
        let plugin = plugin_with(serde_json::json!({"json_to_xml": true, "xml_to_json": true}));
        let mut ctx = ctx_with_response(b"{}", "application/json");
        plugin.after(&mut ctx);
        let envelope = ctx.response.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&envelope.body).unwrap();
        assert_eq!(parsed["xml"], "<json>{}</json>");
        assert_eq!(envelope.headers.get(http::header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn gzip_round_trips() {
        let plugin = plugin_with(serde_json::json!({"gzip_compress": true}));
        let mut ctx = ctx_with_response(b"hello world", "text/plain");
        plugin.after(&mut ctx);
        let compressed_body = ctx.response.as_ref().unwrap().body.clone();
        assert_ne!(&compressed_body[..], b"hello world");

        let decompress_plugin = plugin_with(serde_json::json!({"gzip_decompress": true}));
        let mut ctx2 = ctx_with_response(&compressed_body, "text/plain");
        ctx2.response
            .as_mut()
            .unwrap()
            .headers
            .insert(http::header::CONTENT_ENCODING, "gzip".parse().unwrap());
        decompress_plugin.after(&mut ctx2);
        assert_eq!(&ctx2.response.unwrap().body[..], b"hello world");
    }

    #[test]
    fn grpc_status_map_overwrites_status() {
        let plugin = plugin_with(serde_json::json!({"grpc_status_map": {"5": 404}}));
        let mut ctx = ctx_with_response(b"", "text/plain");
        ctx.response.as_mut().unwrap().trailers.insert("grpc-status", "5".parse().unwrap());
        plugin.after(&mut ctx);
        assert_eq!(ctx.response.unwrap().status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn add_grpc_metadata_only_for_grpc_requests() {
        let plugin = plugin_with(serde_json::json!({"add_grpc_metadata": {"x-meta": "1"}}));
        let mut ctx = RequestContext::new(
            Method::POST,
            "/svc/Method".into(),
            HeaderMap::new(),
            "1.2.3.4".into(),
            "/".into(),
            Arc::new(Metrics::new()),
        );
        ctx.headers.insert(http::header::CONTENT_TYPE, "application/grpc".parse().unwrap());
        ctx.is_grpc = true;
        plugin.before(&mut ctx).unwrap();
        assert_eq!(ctx.headers.get("x-meta").unwrap(), "1");
    }
}
