//! Scripted provider for exercising selection behavior without a vendor.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{Capability, CostTier, Envelope, Provider};

#[derive(Debug, Clone)]
enum Script<T> {
    Succeed { payload: T, cost: Decimal },
    Fail { message: String, cost: Decimal },
    Panic(String),
}

/// Provider whose availability, estimate, and outcome are fixed up front.
#[derive(Debug)]
pub struct ScriptedProvider<C: Capability> {
    name: String,
    service: String,
    tier: CostTier,
    available: AtomicBool,
    estimate: Decimal,
    delay: Option<Duration>,
    script: Script<C::Output>,
    terminal: bool,
    calls: AtomicUsize,
}

impl<C: Capability> ScriptedProvider<C>
where
    C::Output: Clone,
{
    /// Succeeds with `payload`, billing `cost`.
    pub fn succeeding(name: impl Into<String>, payload: C::Output, cost: Decimal) -> Self {
        Self::new(name, Script::Succeed { payload, cost })
    }

    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            name,
            Script::Fail {
                message: message.into(),
                cost: Decimal::ZERO,
            },
        )
    }

    /// Fails but reports a non-zero billed cost.
    pub fn billed_failure(name: impl Into<String>, message: impl Into<String>, cost: Decimal) -> Self {
        Self::new(
            name,
            Script::Fail {
                message: message.into(),
                cost,
            },
        )
    }

    pub fn panicking(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, Script::Panic(message.into()))
    }

    fn new(name: impl Into<String>, script: Script<C::Output>) -> Self {
        let name = name.into();
        Self {
            service: name.clone(),
            name,
            tier: CostTier::Medium,
            available: AtomicBool::new(true),
            estimate: Decimal::ZERO,
            delay: None,
            script,
            terminal: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn tier(mut self, tier: CostTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn estimate(mut self, estimate: Decimal) -> Self {
        self.estimate = estimate;
        self
    }

    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of times `invoke` was entered.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Capability> Provider<C> for ScriptedProvider<C>
where
    C::Output: Clone + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn service(&self) -> &str {
        &self.service
    }

    fn cost_tier(&self) -> CostTier {
        self.tier
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn estimate_cost(&self, _input: &C::Input, _options: &C::Options) -> Decimal {
        self.estimate
    }

    async fn invoke(&self, _input: &C::Input, _options: &C::Options) -> Envelope<C::Output> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Succeed { payload, cost } => Envelope::ok(self.name.clone(), payload.clone())
                .with_model(format!("{}-model", self.name))
                .with_cost(*cost),
            Script::Fail { message, cost } => {
                Envelope::failed(self.name.clone(), message.clone()).with_cost(*cost)
            }
            Script::Panic(message) => panic!("{}", message),
        }
    }

    fn is_terminal(&self) -> bool {
        self.terminal
    }
}
