//! Ordered fallback walk over a provider chain.
//!
//! Each request walks its chain strictly sequentially:
//! `Pending -> Trying(i) -> {Succeeded | next provider | Exhausted}`.
//! For every provider, availability is checked first, then affordability
//! (which also holds the estimate against the ledger), then the provider is
//! invoked. Only a successful invocation is recorded, except that a failed
//! envelope reporting a billed cost is recorded too when the policy says so.

mod attempt;

use serde::{Deserialize, Serialize};

pub use attempt::{AttemptError, AttemptOutcome, AttemptRecord};

use crate::budget::UsageLedger;
use crate::observability::MetricsRegistry;
use crate::provider::{Capability, Envelope, SharedProvider};

/// How a provider chain is ordered before walking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionOrder {
    /// Cheapest tier first; caller order is kept within a tier. Terminal
    /// fallbacks always come last, whatever their tier.
    #[default]
    CostAscending,
    /// Exactly the order the caller supplied.
    AsGiven,
}

impl std::str::FromStr for SelectionOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cost_ascending" | "cost" => Ok(SelectionOrder::CostAscending),
            "as_given" | "priority" => Ok(SelectionOrder::AsGiven),
            other => Err(format!("unknown selection order '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub order: SelectionOrder,
    /// Record the cost of failed envelopes that report one.
    pub record_billed_failures: bool,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            order: SelectionOrder::default(),
            record_billed_failures: true,
        }
    }
}

impl SelectionPolicy {
    pub fn as_given() -> Self {
        Self {
            order: SelectionOrder::AsGiven,
            ..Self::default()
        }
    }

    pub fn order(mut self, order: SelectionOrder) -> Self {
        self.order = order;
        self
    }

    pub fn record_billed_failures(mut self, record: bool) -> Self {
        self.record_billed_failures = record;
        self
    }

    /// Order `providers` for a walk. Under [`SelectionOrder::CostAscending`]
    /// the sort is stable and keyed on `(is_terminal, cost_tier)`, so a free
    /// terminal fallback never shadows the paid providers ahead of it.
    pub fn arrange<C: Capability>(&self, providers: &[SharedProvider<C>]) -> Vec<SharedProvider<C>> {
        let mut ordered: Vec<SharedProvider<C>> = providers.to_vec();
        if self.order == SelectionOrder::CostAscending {
            ordered.sort_by_key(|p| (p.is_terminal(), p.cost_tier()));
        }
        ordered
    }

    /// Walk `providers` until one succeeds.
    ///
    /// Attempts are sequential; at most one provider's cost is recorded per
    /// successful walk. Dropping the returned future mid-invocation releases
    /// the in-flight budget hold without recording anything.
    pub async fn walk<C: Capability>(
        &self,
        providers: &[SharedProvider<C>],
        input: &C::Input,
        options: &C::Options,
        ledger: &UsageLedger,
        metrics: &MetricsRegistry,
    ) -> WalkOutcome<C::Output> {
        let mut attempts = Vec::new();

        for provider in self.arrange(providers) {
            let outcome =
                attempt::attempt(provider.as_ref(), input, options, ledger, self, metrics).await;
            let error = match outcome {
                AttemptOutcome::Succeeded(envelope) => {
                    return WalkOutcome::Succeeded { envelope, attempts };
                }
                AttemptOutcome::Skipped(error) | AttemptOutcome::Failed(error) => error,
            };
            attempts.push(AttemptRecord {
                provider: provider.name().to_string(),
                service: provider.service().to_string(),
                tier: provider.cost_tier(),
                error,
            });
        }

        tracing::error!(
            operation = %C::OPERATION,
            attempts = attempts.len(),
            "all providers exhausted; no terminal fallback in chain"
        );
        WalkOutcome::Exhausted { attempts }
    }
}

#[derive(Debug)]
pub enum WalkOutcome<T> {
    Succeeded {
        envelope: Envelope<T>,
        /// Providers skipped or failed before the one that succeeded.
        attempts: Vec<AttemptRecord>,
    },
    Exhausted {
        attempts: Vec<AttemptRecord>,
    },
}

/// True when at least one provider in the chain is a terminal fallback.
pub fn has_terminal<C: Capability>(providers: &[SharedProvider<C>]) -> bool {
    providers.iter().any(|p| p.is_terminal())
}
