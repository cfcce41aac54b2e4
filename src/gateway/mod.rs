//! Fallback-resilient data-fetch gateway
//!
//! One state machine for every route:
//!
//! ```text
//! VALIDATE --fail--> 400
//!    | ok
//! CALL_UPSTREAM --success--> TRANSFORM --ok--> upstream body
//!    | failure                  | shape error
//!    v                          v
//! SELECT_FALLBACK --found--> 200 + X-Using-Fallback
//!    | keyed miss
//!    v
//!   404
//! ```
//!
//! The write route has no fallback; a failed upstream call is a 500.

pub mod fallback;
pub mod outcome;
pub mod routes;
pub mod transform;
pub mod upstream;
pub mod validate;

use hyper::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

pub use fallback::{FallbackCatalog, FallbackChoice};
pub use outcome::{FetchOutcome, ProxyEnvelope};
pub use routes::{RouteDescriptor, RouteKind, SubmitRoute};
pub use upstream::{HttpUpstream, Upstream, UpstreamRequest};
pub use validate::FormSubmission;

use crate::error::{FallbackLoadError, TransportError, ValidationError};
use crate::logger;

/// Route table, upstream client and fallback catalog, shared read-only
pub struct Gateway {
    routes: Vec<RouteDescriptor>,
    upstream: Arc<dyn Upstream>,
    catalog: Arc<FallbackCatalog>,
}

impl Gateway {
    /// Fails when a read route lacks a usable fallback
    pub fn new(
        routes: Vec<RouteDescriptor>,
        upstream: Arc<dyn Upstream>,
        catalog: Arc<FallbackCatalog>,
    ) -> Result<Self, FallbackLoadError> {
        routes::check_catalog(&routes, &catalog)?;
        Ok(Self {
            routes,
            upstream,
            catalog,
        })
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    pub fn find<'p>(&self, path: &'p str) -> Option<(&RouteDescriptor, Option<&'p str>)> {
        routes::find_route(&self.routes, path)
    }

    /// Serve a read route
    ///
    /// `key` is the raw captured path segment for keyed routes, decoded
    /// before use; `query` the decoded inbound query pairs (the first
    /// occurrence of a name wins).
    pub async fn serve_read(
        &self,
        route: &RouteDescriptor,
        key: Option<&str>,
        query: &[(String, String)],
    ) -> ProxyEnvelope {
        let key = match route.inbound.key_param() {
            Some(param) => match validate::require_key(param, key) {
                Ok(key) => Some(key),
                Err(err) => {
                    logger::log_validation_failure(route.name, &err);
                    return ProxyEnvelope::read_rejected(&err);
                }
            },
            None => None,
        };
        let key = key.as_deref();

        let request = UpstreamRequest::get(
            route.upstream_segments(key),
            route.upstream_query(|name| {
                query
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.as_str())
            }),
        );
        let outcome = self.upstream.fetch(request).await;

        match shape(route, key.is_some(), outcome) {
            FetchOutcome::Success(body) => ProxyEnvelope::upstream(route.success_status, body),
            FetchOutcome::UpstreamError(_) | FetchOutcome::TransportError(_) => {
                self.select_fallback(route, key)
            }
        }
    }

    /// Serve a write route
    ///
    /// `submission` is the decoded form, or the reason the body could not be
    /// decoded. Upstream is contacted only for a valid form.
    pub async fn serve_submit(
        &self,
        route: &RouteDescriptor,
        submit: &SubmitRoute,
        submission: Result<FormSubmission, ValidationError>,
    ) -> ProxyEnvelope {
        let validated = submission
            .and_then(|form| validate::validate_submission(&form, &submit.rules));
        let form = match validated {
            Ok(form) => form,
            Err(err) => {
                logger::log_validation_failure(route.name, &err);
                return ProxyEnvelope::submit_rejected(&err);
            }
        };

        let request = UpstreamRequest::post_form(route.upstream_segments(None), form);
        match self.upstream.fetch(request).await {
            FetchOutcome::Success(application) => ProxyEnvelope::upstream(
                route.success_status,
                json!({
                    "success": true,
                    "message": submit.success_message,
                    "application": application,
                }),
            ),
            failed => {
                logger::log_submit_failed(route.name, &failed);
                ProxyEnvelope::submit_failed(submit.failure_message)
            }
        }
    }

    fn select_fallback(&self, route: &RouteDescriptor, key: Option<&str>) -> ProxyEnvelope {
        match self.catalog.select(route.fallback, key) {
            FallbackChoice::Found(body) => {
                logger::log_fallback_served(route.name, key);
                ProxyEnvelope::fallback(body)
            }
            FallbackChoice::NotFound(message) => {
                logger::log_not_found(route.name, key.unwrap_or_default());
                ProxyEnvelope::not_found(&message)
            }
            FallbackChoice::Unavailable => {
                // check_catalog rules this out at startup
                logger::log_error(&format!("route '{}' has no fallback to serve", route.name));
                ProxyEnvelope::not_found("Not Found")
            }
        }
    }
}

/// Turn a raw upstream outcome into the route's outbound body
///
/// A keyed lookup answered with `null` means "no such resource" and is
/// treated as an upstream 404; a payload the transform rejects is malformed.
fn shape(route: &RouteDescriptor, keyed: bool, outcome: FetchOutcome) -> FetchOutcome {
    match outcome {
        FetchOutcome::Success(Value::Null) if keyed => FetchOutcome::UpstreamError(StatusCode::NOT_FOUND),
        FetchOutcome::Success(payload) => match route.transform.apply(payload) {
            Ok(body) => FetchOutcome::Success(body),
            Err(err) => {
                let cause = TransportError::Malformed(err.to_string());
                logger::log_transform_failed(route.name, &cause);
                FetchOutcome::TransportError(cause)
            }
        },
        failed => failed,
    }
}
