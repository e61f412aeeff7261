//! # HTTP Middleware
//!
//! - `metrics`: atomic request, error and divergence counters.
//! - `tracing_layer`: `tower_http` request spans.

pub mod metrics;
pub mod tracing_layer;
