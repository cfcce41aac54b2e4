//! Per-request result types: what upstream said, and what we answer

use hyper::StatusCode;
use serde_json::{json, Value};

use crate::error::{TransportError, ValidationError};

/// Result of a single upstream call
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// 2xx with a JSON body
    Success(Value),
    /// Upstream answered with a non-2xx status; its body is not inspected
    UpstreamError(StatusCode),
    /// Upstream unreachable, too slow, or its 2xx body was unusable
    TransportError(TransportError),
}

/// The final HTTP-level answer of the gateway
///
/// Only [`ProxyEnvelope::fallback`] sets the degraded marker, so the marker
/// is true exactly when the body came from the fallback catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyEnvelope {
    status: StatusCode,
    body: Value,
    using_fallback: bool,
}

impl ProxyEnvelope {
    /// Body derived from a successful upstream payload
    pub const fn upstream(status: StatusCode, body: Value) -> Self {
        Self {
            status,
            body,
            using_fallback: false,
        }
    }

    /// Static fallback payload served in place of upstream data
    pub const fn fallback(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            using_fallback: true,
        }
    }

    /// Keyed lookup with neither an upstream nor a fallback match
    pub fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: json!({ "error": message }),
            using_fallback: false,
        }
    }

    /// Read-route validation failure: `{"error": ...}`
    pub fn read_rejected(err: &ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "error": err.to_string() }),
            using_fallback: false,
        }
    }

    /// Write-route validation failure: `{"success": false, "message": ...}`
    pub fn submit_rejected(err: &ValidationError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: json!({ "success": false, "message": err.to_string() }),
            using_fallback: false,
        }
    }

    /// Write-route failure after validation passed
    pub fn submit_failed(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: json!({ "success": false, "message": message }),
            using_fallback: false,
        }
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub const fn body(&self) -> &Value {
        &self.body
    }

    pub const fn using_fallback(&self) -> bool {
        self.using_fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttachmentProblem;

    #[test]
    fn only_fallback_sets_marker() {
        assert!(ProxyEnvelope::fallback(json!([])).using_fallback());
        assert!(!ProxyEnvelope::upstream(StatusCode::OK, json!([])).using_fallback());
        assert!(!ProxyEnvelope::not_found("x").using_fallback());
        assert!(!ProxyEnvelope::submit_failed("x").using_fallback());
    }

    #[test]
    fn rejection_bodies_follow_route_kind() {
        let read = ProxyEnvelope::read_rejected(&ValidationError::MissingParameter("slug"));
        assert_eq!(read.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read.body()["error"], "Slug no proporcionado");

        let submit = ProxyEnvelope::submit_rejected(&ValidationError::InvalidAttachment(
            AttachmentProblem::NotAFile,
        ));
        assert_eq!(submit.body()["success"], false);
        assert_eq!(submit.body()["message"], "CV inválido");
    }
}
