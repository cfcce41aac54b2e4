//! HTTP protocol layer module
//!
//! JSON response builders and inbound multipart decoding, decoupled from the
//! gateway's route logic.

pub mod multipart;
pub mod response;

// Re-export commonly used types
pub use multipart::parse_form;
pub use response::{
    build_404_response, build_405_response, build_413_response, build_envelope_response,
    build_health_response, build_options_response, finalize_response, FALLBACK_HEADER,
};
