//! Structured span definitions for tracing.

use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{Level, Span, field, span};
use uuid::Uuid;

use crate::provider::{CostTier, Operation};

/// Span covering one orchestrated request from first attempt to result.
pub struct RequestSpan {
    span: Span,
    request_id: Uuid,
    start: Instant,
}

impl RequestSpan {
    pub fn new(operation: Operation) -> Self {
        let request_id = Uuid::new_v4();
        let span = span!(
            Level::INFO,
            "orchestrator.request",
            request_id = %request_id,
            operation = operation.as_str(),
            otel.name = "orchestrator.request",
            provider = field::Empty,
            cost = field::Empty,
            attempts = field::Empty,
            latency_ms = field::Empty,
        );
        Self {
            span,
            request_id,
            start: Instant::now(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn record_success(&self, provider: &str, cost: Decimal, attempts: usize) {
        self.span.record("provider", provider);
        self.span.record("cost", field::display(cost));
        self.span.record("attempts", attempts);
    }

    pub fn record_attempts(&self, attempts: usize) {
        self.span.record("attempts", attempts);
    }

    pub fn finish(self) {
        let latency_ms = self.start.elapsed().as_millis() as u64;
        self.span.record("latency_ms", latency_ms);
    }
}

/// Span around a single provider invocation.
pub struct AttemptSpan {
    span: Span,
    start: Instant,
}

impl AttemptSpan {
    pub fn new(provider: &str, service: &str, tier: CostTier, estimate: Decimal) -> Self {
        let span = span!(
            Level::DEBUG,
            "provider.invoke",
            provider = provider,
            service = service,
            tier = tier.as_str(),
            estimate = %estimate,
            otel.name = format!("provider.{}", provider),
            success = field::Empty,
            actual_cost = field::Empty,
            latency_ms = field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn finish(self, success: bool, actual_cost: Decimal) {
        self.span.record("success", success);
        self.span.record("actual_cost", field::display(actual_cost));
        self.span
            .record("latency_ms", self.start.elapsed().as_millis() as u64);
    }
}
