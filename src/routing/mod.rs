//! Routing module
//!
//! Resolves request paths to resource collections.

pub mod matcher;

pub use matcher::match_route;
