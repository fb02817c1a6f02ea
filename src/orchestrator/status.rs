use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::budget::ServiceStatus;
use crate::observability::ProviderStats;
use crate::provider::CostTier;

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub service: String,
    pub tier: CostTier,
    pub available: bool,
    pub terminal: bool,
    /// `None` until the provider has been considered at least once.
    pub stats: Option<ProviderStats>,
}

/// Point-in-time view of every registered provider and every metered service.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub text: Vec<ProviderStatus>,
    pub speech: Vec<ProviderStatus>,
    pub budgets: BTreeMap<String, ServiceStatus>,
}

impl OrchestratorStatus {
    pub fn available_text(&self) -> impl Iterator<Item = &ProviderStatus> {
        self.text.iter().filter(|p| p.available)
    }

    pub fn available_speech(&self) -> impl Iterator<Item = &ProviderStatus> {
        self.speech.iter().filter(|p| p.available)
    }
}

fn write_providers(f: &mut fmt::Formatter<'_>, title: &str, providers: &[ProviderStatus]) -> fmt::Result {
    writeln!(f, "{}:", title)?;
    for p in providers {
        let mark = if p.available { "+" } else { "-" };
        write!(f, "  {} {} ({})", mark, p.name, p.tier)?;
        if p.terminal {
            write!(f, " [fallback]")?;
        }
        if let Some(stats) = &p.stats {
            write!(
                f,
                " {}/{} ok, ${:.4}",
                stats.successes, stats.attempts, stats.total_cost
            )?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl fmt::Display for OrchestratorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_providers(f, "text", &self.text)?;
        write_providers(f, "speech", &self.speech)?;
        for status in self.budgets.values() {
            write!(f, "{}", status)?;
        }
        Ok(())
    }
}
