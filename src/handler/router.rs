//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, health probes,
//! route matching, body limits and dispatch to the gateway.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE, REFERER, USER_AGENT};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::error::ValidationError;
use crate::gateway::{RouteDescriptor, RouteKind, SubmitRoute};
use crate::http;
use crate::logger::{self, AccessLogEntry};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What the dispatcher produced, plus what the access log needs to know
struct Dispatched {
    response: Response<Full<Bytes>>,
    route: Option<&'static str>,
}

impl From<Response<Full<Bytes>>> for Dispatched {
    fn from(response: Response<Full<Bytes>>) -> Self {
        Self {
            response,
            route: None,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let access_log = state.cached_access_log.load(Ordering::Relaxed);

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header_string(&req, REFERER);
    entry.user_agent = header_string(&req, USER_AGENT);

    logger::log_request_received(&entry.method, &entry.path);

    let head = req.method() == Method::HEAD;
    let Dispatched {
        mut response,
        route,
    } = dispatch(req, &state).await;

    http::finalize_response(
        &mut response,
        &state.config.http.server_name,
        state.config.http.enable_cors,
    );

    // HEAD: same headers as GET, no body
    if head {
        *response.body_mut() = Full::new(Bytes::new());
    }

    if access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.route = route.map(ToString::to_string);
        entry.fallback = response.headers().contains_key(http::FALLBACK_HEADER);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

async fn dispatch<B>(req: Request<B>, state: &AppState) -> Dispatched
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<BoxError>,
{
    let path = req.uri().path().to_string();

    // 1. Preflight
    if req.method() == Method::OPTIONS {
        return http::build_options_response(state.config.http.enable_cors).into();
    }

    // 2. Health check endpoints (highest priority, always fast)
    let health = &state.config.routes.health;
    if health.enabled && (path == health.liveness_path || path == health.readiness_path) {
        return if req.method() == Method::GET || req.method() == Method::HEAD {
            http::build_health_response("ok").into()
        } else {
            http::build_405_response("GET, HEAD, OPTIONS").into()
        };
    }

    // 3. Gateway routes
    let gateway = Arc::clone(&state.gateway);
    let Some((route, key)) = gateway.find(&path) else {
        return http::build_404_response().into();
    };

    if !route.accepts(req.method()) {
        logger::log_warning(&format!(
            "Method not allowed: {} {path} (route {})",
            req.method(),
            route.name
        ));
        return Dispatched {
            response: http::build_405_response(route.allow()),
            route: Some(route.name),
        };
    }

    let response = match route.kind {
        RouteKind::Read => {
            let query = decode_query(req.uri().query());
            let envelope = gateway.serve_read(route, key, &query).await;
            http::build_envelope_response(&envelope)
        }
        RouteKind::Submit(submit) => serve_submit(req, state, route, &submit).await,
    };

    Dispatched {
        response,
        route: Some(route.name),
    }
}

async fn serve_submit<B>(
    req: Request<B>,
    state: &AppState,
    route: &RouteDescriptor,
    submit: &SubmitRoute,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send,
    B::Error: Into<BoxError>,
{
    let max_body_size = state.config.http.max_body_size;
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return resp;
    }

    let content_type = header_string(&req, CONTENT_TYPE);
    let submission = match read_body(req.into_body(), max_body_size).await {
        Ok(body) => http::parse_form(content_type.as_deref(), body).await,
        Err(BodyError::TooLarge) => return http::build_413_response(max_body_size),
        Err(BodyError::Read(cause)) => Err(ValidationError::MalformedForm(cause)),
    };

    let envelope = state.gateway.serve_submit(route, submit, submission).await;
    http::build_envelope_response(&envelope)
}

enum BodyError {
    TooLarge,
    Read(String),
}

/// Buffer the body, refusing anything over the limit
async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, BodyError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!(
                "Request body too large (max: {max_body_size} bytes)"
            ));
            Err(BodyError::TooLarge)
        }
        Err(err) => Err(BodyError::Read(err.to_string())),
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get(CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response(max_body_size))
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', relying on body limit"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Decoded query pairs, in order
fn decode_query(query: Option<&str>) -> Vec<(String, String)> {
    query
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

fn header_string<B>(req: &Request<B>, name: hyper::header::HeaderName) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

const fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
