//! Shared plumbing: HTTP transport, lenient JSON number handling, logging

pub mod http;
mod json;
pub mod logging;

pub use http::*;
pub use json::*;
