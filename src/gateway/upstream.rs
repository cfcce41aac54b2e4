//! Upstream invoker
//!
//! One call per request, no retry. The [`Upstream`] trait is the seam the
//! gateway talks through; [`HttpUpstream`] is the reqwest-backed version.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use url::Url;

use super::outcome::FetchOutcome;
use super::validate::ValidatedForm;
use crate::error::TransportError;
use crate::logger;

/// What to ask upstream for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Path segments appended to the base URL, unencoded
    pub segments: Vec<String>,
    /// Query pairs, unencoded
    pub query: Vec<(String, String)>,
    /// `Some` turns the call into a multipart `POST`
    pub form: Option<ValidatedForm>,
}

impl UpstreamRequest {
    pub fn get(segments: Vec<String>, query: Vec<(String, String)>) -> Self {
        Self {
            segments,
            query,
            form: None,
        }
    }

    pub fn post_form(segments: Vec<String>, form: ValidatedForm) -> Self {
        Self {
            segments,
            query: Vec::new(),
            form: Some(form),
        }
    }

    pub const fn method(&self) -> &'static str {
        if self.form.is_some() {
            "POST"
        } else {
            "GET"
        }
    }

    /// `/a/b?x=1` form, for log lines
    pub fn display_path(&self) -> String {
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        if !self.query.is_empty() {
            let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
            path.push('?');
            path.push_str(&query.join("&"));
        }
        path
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> FetchOutcome;
}

/// reqwest client bound to one base URL
pub struct HttpUpstream {
    client: reqwest::Client,
    base: Url,
    timeout_secs: u64,
}

impl HttpUpstream {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, TransportError> {
        let base = Url::parse(base_url)
            .map_err(|e| TransportError::Request(format!("invalid base url '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::Request(format!(
                "base url '{base_url}' cannot carry a path"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base,
            timeout_secs,
        })
    }

    /// Base URL + percent-encoded segments + percent-encoded query
    fn url_for(&self, request: &UpstreamRequest) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Request("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(&request.segments);
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    async fn call(&self, request: UpstreamRequest) -> Result<FetchOutcome, TransportError> {
        let url = self.url_for(&request)?;
        let builder = match request.form {
            None => self.client.get(url),
            Some(form) => self.client.post(url).multipart(multipart_body(form)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(FetchOutcome::UpstreamError(status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout_secs))?;
        let payload =
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Malformed(e.to_string()))?;
        Ok(FetchOutcome::Success(payload))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, request: UpstreamRequest) -> FetchOutcome {
        let method = request.method();
        let path = request.display_path();
        let outcome = self
            .call(request)
            .await
            .unwrap_or_else(FetchOutcome::TransportError);
        logger::log_upstream_outcome(method, &path, &outcome);
        outcome
    }
}

/// Re-serialize a validated form: text fields in order, then the attachment
fn multipart_body(form: ValidatedForm) -> Result<Form, TransportError> {
    let mut body = Form::new();
    for (name, value) in form.fields {
        body = body.text(name, value);
    }

    let attachment = form.attachment;
    let mut part = Part::bytes(attachment.data.to_vec());
    if let Some(file_name) = attachment.file_name {
        part = part.file_name(file_name);
    }
    if let Some(content_type) = attachment.content_type {
        part = part
            .mime_str(&content_type)
            .map_err(|e| TransportError::Request(e.to_string()))?;
    }
    Ok(body.part(form.attachment_field, part))
}
