//! One provider attempt: availability, affordability, invocation, record.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use rust_decimal::Decimal;
use tracing::Instrument;

use super::SelectionPolicy;
use crate::budget::{BudgetViolation, UsageLedger};
use crate::observability::{AttemptSpan, MetricsRegistry};
use crate::provider::{Capability, CostTier, Envelope, Provider};

/// Why a single provider did not serve the request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptError {
    /// Credentials or dependencies missing; nothing was checked or billed.
    #[error("unavailable")]
    Unavailable,

    /// Affordability check failed; the provider was not invoked.
    #[error("{0}")]
    BudgetExceeded(#[from] BudgetViolation),

    /// Invocation returned a failed envelope or panicked.
    #[error("provider failed: {message}")]
    ProviderFailure { message: String },
}

impl AttemptError {
    pub fn is_skip(&self) -> bool {
        !matches!(self, AttemptError::ProviderFailure { .. })
    }
}

/// Diagnostic entry for one provider in a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub provider: String,
    pub service: String,
    pub tier: CostTier,
    pub error: AttemptError,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.provider, self.tier, self.error)
    }
}

#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Succeeded(Envelope<T>),
    Skipped(AttemptError),
    Failed(AttemptError),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) async fn attempt<C: Capability>(
    provider: &dyn Provider<C>,
    input: &C::Input,
    options: &C::Options,
    ledger: &UsageLedger,
    policy: &SelectionPolicy,
    metrics: &MetricsRegistry,
) -> AttemptOutcome<C::Output> {
    let name = provider.name();
    let service = provider.service();
    tracing::debug!(provider = name, service, tier = %provider.cost_tier(), "trying provider");

    if !provider.is_available().await {
        tracing::info!(provider = name, "skipping provider: unavailable");
        metrics.record_unavailable(name);
        return AttemptOutcome::Skipped(AttemptError::Unavailable);
    }

    let estimate = provider.estimate_cost(input, options).max(Decimal::ZERO);
    let reservation = match ledger.reserve(service, estimate) {
        Ok(r) => r,
        Err(violation) => {
            tracing::info!(provider = name, reason = %violation, "skipping provider: over budget");
            metrics.record_over_budget(name);
            return AttemptOutcome::Skipped(AttemptError::BudgetExceeded(violation));
        }
    };

    let span = AttemptSpan::new(name, service, provider.cost_tier(), estimate);
    let start = Instant::now();
    let result = AssertUnwindSafe(provider.invoke(input, options))
        .catch_unwind()
        .instrument(span.span().clone())
        .await;

    let mut envelope = match result {
        Ok(envelope) => envelope,
        Err(payload) => {
            let message = format!("provider panicked: {}", panic_message(payload.as_ref()));
            tracing::error!(provider = name, %message, "provider invoke panicked");
            Envelope::failed(name, message)
        }
    };
    if envelope.duration.is_zero() {
        envelope.duration = start.elapsed();
    }
    let actual_cost = envelope.actual_cost.max(Decimal::ZERO);
    let success = envelope.is_success();
    span.finish(success, actual_cost);

    if success {
        reservation.commit(actual_cost, envelope.label());
        metrics.record_invocation(name, true, actual_cost, envelope.duration);
        tracing::info!(
            provider = name,
            cost = %actual_cost,
            duration_ms = envelope.duration.as_millis() as u64,
            "provider succeeded"
        );
        return AttemptOutcome::Succeeded(envelope);
    }

    let message = envelope.error().unwrap_or("unknown error").to_string();
    let billed = policy.record_billed_failures && actual_cost > Decimal::ZERO;
    if billed {
        reservation.commit(actual_cost, envelope.label());
    } else {
        reservation.release();
    }
    metrics.record_invocation(
        name,
        false,
        if billed { actual_cost } else { Decimal::ZERO },
        envelope.duration,
    );
    tracing::warn!(provider = name, error = %message, billed, "provider failed");
    AttemptOutcome::Failed(AttemptError::ProviderFailure { message })
}
