//! HTTP response building module
//!
//! Every gateway answer is JSON; builders here turn envelopes and protocol
//! errors into hyper responses.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, SERVER};
use hyper::{Response, StatusCode};
use serde_json::{json, Value};

use crate::gateway::ProxyEnvelope;

/// Marker header on responses served from the fallback catalog
pub const FALLBACK_HEADER: &str = "X-Using-Fallback";

/// Methods the gateway answers
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";

/// Build a JSON response
pub fn build_json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let payload = serde_json::to_vec(body).unwrap_or_else(|e| {
        crate::logger::log_error(&format!("Failed to serialize response body: {e}"));
        b"null".to_vec()
    });
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Content-Length", payload.len())
        .body(Full::new(Bytes::from(payload)))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Gateway envelope → response; the marker header is set only for fallback bodies
pub fn build_envelope_response(envelope: &ProxyEnvelope) -> Response<Full<Bytes>> {
    let mut response = build_json_response(envelope.status(), envelope.body());
    if envelope.using_fallback() {
        response
            .headers_mut()
            .insert(FALLBACK_HEADER, HeaderValue::from_static("true"));
    }
    response
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_json_response(StatusCode::NOT_FOUND, &json!({ "error": "Not Found" }))
}

/// Build 405 Method Not Allowed response
pub fn build_405_response(allow: &str) -> Response<Full<Bytes>> {
    let mut response = build_json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({ "error": "Method Not Allowed" }),
    );
    if let Ok(value) = HeaderValue::from_str(allow) {
        response.headers_mut().insert("Allow", value);
    }
    response
}

/// Build 413 Payload Too Large response
pub fn build_413_response(max_body_size: u64) -> Response<Full<Bytes>> {
    build_json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &json!({ "error": "Payload Too Large", "maxBodySize": max_body_size }),
    )
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Expose-Headers", FALLBACK_HEADER)
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build health check response
pub fn build_health_response(status: &str) -> Response<Full<Bytes>> {
    build_json_response(StatusCode::OK, &json!({ "status": status }))
}

/// Headers every response carries: `Server`, and CORS when enabled
pub fn finalize_response(
    response: &mut Response<Full<Bytes>>,
    server_name: &str,
    enable_cors: bool,
) {
    if let Ok(value) = HeaderValue::from_str(server_name) {
        response.headers_mut().insert(SERVER, value);
    }
    if enable_cors {
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(
            "Access-Control-Expose-Headers",
            HeaderValue::from_static(FALLBACK_HEADER),
        );
    }
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
