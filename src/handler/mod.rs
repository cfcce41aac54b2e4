//! Request handler module
//!
//! Responsible for request routing dispatch: health probes, preflight, body
//! limits, and handing gateway routes to the gateway.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
