//! HTTP protocol layer module
//!
//! Request/response data structures decoupled from the hyper binding.

pub mod request;
pub mod response;

// Re-export commonly used types
pub use request::{carries_body, check_content_length, read_body, ApiRequest};
pub use response::ApiResponse;
