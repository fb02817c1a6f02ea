//! Structured tracing spans and in-process metrics for provider walks.
//!
//! The crate only emits `tracing` events and spans; installing a subscriber
//! is left to the application.

mod metrics;
mod spans;

pub use metrics::{Counter, Histogram, MetricsRegistry, ProviderMetrics, ProviderStats};
pub use spans::{AttemptSpan, RequestSpan};
