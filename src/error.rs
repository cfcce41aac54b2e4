//! Error types shared across the gateway
//!
//! Validation errors carry their user-facing message through `Display`, so the
//! HTTP layer can put `err.to_string()` straight into the response body.

use thiserror::Error;

/// Reasons an inbound request is rejected before any upstream call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required path parameter (e.g. the lookup slug) is absent or empty
    #[error("Slug no proporcionado")]
    MissingParameter(&'static str),

    /// One of the required form fields is absent or empty
    #[error("Todos los campos son requeridos")]
    MissingField(&'static str),

    /// The attachment exists but is unacceptable
    #[error("{0}")]
    InvalidAttachment(AttachmentProblem),

    /// The body could not be read as `multipart/form-data`
    #[error("Formulario inválido")]
    MalformedForm(String),
}

impl ValidationError {
    /// The parameter or field at fault, or the decoder's complaint
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::MissingParameter(name) | Self::MissingField(name) => Some(name),
            Self::MalformedForm(detail) => Some(detail),
            Self::InvalidAttachment(_) => None,
        }
    }
}

/// What is wrong with the submitted attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachmentProblem {
    #[error("CV inválido")]
    NotAFile,
    #[error("El CV debe ser un archivo PDF")]
    WrongContentType,
    #[error("El tamaño del CV no debe exceder 10MB")]
    TooLarge,
}

/// Why an upstream call produced no usable payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection to upstream failed: {0}")]
    Connect(String),

    #[error("upstream did not answer within {0} seconds")]
    Timeout(u64),

    #[error("upstream request could not be built: {0}")]
    Request(String),

    #[error("upstream response is malformed: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Classify a reqwest failure
    pub fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout_secs)
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::Request(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::Malformed(err.to_string())
        } else {
            Self::Connect(err.to_string())
        }
    }
}

/// Errors raised while loading the fallback catalog at startup
#[derive(Debug, Error)]
pub enum FallbackLoadError {
    #[error("failed to read fallback file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fallback JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse fallback TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("read route '{route}' has no fallback")]
    NoFallback { route: String },

    #[error("route '{route}' needs fallback collection '{name}', which the catalog does not define")]
    MissingCollection { route: String, name: String },
}
