//! Typed settings read from any [`ConfigProvider`].
//!
//! | Key | Value |
//! |-----|-------|
//! | `budget.<service>.<daily\|weekly\|monthly>` | decimal limit |
//! | `selection.order` | `cost_ascending` or `as_given` |
//! | `selection.record_billed_failures` | `true` / `false` |
//! | `credentials.<service>` | API key |

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use super::provider::{ConfigProvider, ConfigProviderExt};
use super::{ConfigError, ConfigResult};
use crate::budget::{BudgetLimit, UsageLedger, WindowKind};
use crate::provider::ApiKeyGate;
use crate::selection::{SelectionOrder, SelectionPolicy};

const BUDGET_PREFIX: &str = "budget.";
const CREDENTIALS_PREFIX: &str = "credentials.";

/// Per-service limits and selection policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSettings {
    limits: BTreeMap<String, BTreeMap<WindowKind, Decimal>>,
    pub order: SelectionOrder,
    pub record_billed_failures: bool,
}

impl Default for BudgetSettings {
    /// The stock monthly plan for the three metered vendors.
    fn default() -> Self {
        Self::empty()
            .limit("openai", dec!(1.00), dec!(6.00), dec!(25.00))
            .limit("claude", dec!(0.75), dec!(4.50), dec!(15.00))
            .limit("elevenlabs", dec!(0.50), dec!(3.00), dec!(10.00))
    }
}

impl BudgetSettings {
    /// No limits at all: every service is always affordable.
    pub fn empty() -> Self {
        Self {
            limits: BTreeMap::new(),
            order: SelectionOrder::default(),
            record_billed_failures: true,
        }
    }

    /// Daily, weekly and monthly limits for `service`.
    pub fn limit(
        mut self,
        service: impl Into<String>,
        daily: Decimal,
        weekly: Decimal,
        monthly: Decimal,
    ) -> Self {
        let windows = self.limits.entry(service.into()).or_default();
        windows.insert(WindowKind::Daily, daily);
        windows.insert(WindowKind::Weekly, weekly);
        windows.insert(WindowKind::Monthly, monthly);
        self
    }

    pub fn set(&mut self, service: impl Into<String>, kind: WindowKind, amount: Decimal) {
        self.limits.entry(service.into()).or_default().insert(kind, amount);
    }

    /// Defaults overlaid with whatever `provider` holds.
    pub async fn load(provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        Self::default().overlay(provider).await
    }

    pub async fn overlay(mut self, provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        for key in provider.list_keys(BUDGET_PREFIX).await? {
            let (service, kind) = parse_budget_key(&key)?;
            let Some(amount) = provider.get_parsed::<Decimal>(&key).await? else {
                continue;
            };
            if amount.is_sign_negative() {
                return Err(ConfigError::InvalidValue {
                    key: key.clone(),
                    message: format!("budget limit must not be negative, got {}", amount),
                });
            }
            self.set(service, kind, amount);
        }

        if let Some(order) = provider.get_parsed::<SelectionOrder>("selection.order").await? {
            self.order = order;
        }
        if let Some(record) = provider
            .get_parsed::<bool>("selection.record_billed_failures")
            .await?
        {
            self.record_billed_failures = record;
        }

        tracing::debug!(
            provider = provider.name(),
            services = self.limits.len(),
            order = ?self.order,
            "budget settings loaded"
        );
        Ok(self)
    }

    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.limits.keys().map(String::as_str)
    }

    pub fn limits_for(&self, service: &str) -> Vec<BudgetLimit> {
        self.limits
            .get(service)
            .map(|w| w.iter().map(|(k, a)| BudgetLimit::new(*k, *a)).collect())
            .unwrap_or_default()
    }

    /// `(service, limits)` pairs in the shape [`UsageLedger::with_limits`] takes.
    pub fn limits(&self) -> Vec<(String, Vec<BudgetLimit>)> {
        self.limits
            .keys()
            .map(|service| (service.clone(), self.limits_for(service)))
            .collect()
    }

    pub fn policy(&self) -> SelectionPolicy {
        SelectionPolicy::default()
            .order(self.order)
            .record_billed_failures(self.record_billed_failures)
    }

    pub fn apply(&self, ledger: &UsageLedger) {
        for (service, limits) in self.limits() {
            for limit in limits {
                ledger.set_limit(&service, limit.kind, limit.amount);
            }
        }
    }
}

fn parse_budget_key(key: &str) -> ConfigResult<(&str, WindowKind)> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    };
    let rest = key
        .strip_prefix(BUDGET_PREFIX)
        .ok_or_else(|| invalid("not a budget key".into()))?;
    let (service, kind) = rest
        .rsplit_once('.')
        .ok_or_else(|| invalid("expected budget.<service>.<window>".into()))?;
    if service.is_empty() {
        return Err(invalid("missing service name".into()));
    }
    let kind = kind.parse::<WindowKind>().map_err(|e| invalid(e.to_string()))?;
    Ok((service, kind))
}

/// API keys by service name.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    keys: HashMap<String, SecretString>,
}

impl ProviderCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load(provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        let mut credentials = Self::new();
        for key in provider.list_keys(CREDENTIALS_PREFIX).await? {
            let Some(service) = key.strip_prefix(CREDENTIALS_PREFIX) else {
                continue;
            };
            if let Some(value) = provider.get_raw(&key).await? {
                credentials.insert(service, value);
            }
        }
        tracing::debug!(
            provider = provider.name(),
            count = credentials.keys.len(),
            "provider credentials loaded"
        );
        Ok(credentials)
    }

    pub fn insert(&mut self, service: impl Into<String>, key: impl Into<String>) {
        self.keys
            .insert(service.into(), SecretString::from(key.into()));
    }

    pub fn get(&self, service: &str) -> Option<&SecretString> {
        self.keys.get(service)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.gate(service).is_present()
    }

    pub fn gate(&self, service: &str) -> ApiKeyGate {
        ApiKeyGate::new(self.keys.get(service).cloned())
    }
}
