use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use super::window::WindowKind;

/// Coarse health of a window by share of its limit already spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

impl HealthLevel {
    pub fn from_usage_percent(percent: Decimal) -> Self {
        if percent < dec!(70) {
            HealthLevel::Healthy
        } else if percent < dec!(90) {
            HealthLevel::Warning
        } else {
            HealthLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Warning => "warning",
            HealthLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WindowStatus {
    pub kind: WindowKind,
    pub limit: Decimal,
    pub accumulated: Decimal,
    /// Estimates held by in-flight requests, not yet recorded.
    pub reserved: Decimal,
    pub remaining: Decimal,
    pub period_start: DateTime<Utc>,
}

impl WindowStatus {
    pub fn usage_percent(&self) -> Decimal {
        if self.limit.is_zero() {
            return if self.accumulated.is_zero() {
                Decimal::ZERO
            } else {
                dec!(100)
            };
        }
        self.accumulated
            .checked_div(self.limit)
            .and_then(|ratio| ratio.checked_mul(dec!(100)))
            .unwrap_or(Decimal::MAX)
    }

    pub fn health(&self) -> HealthLevel {
        HealthLevel::from_usage_percent(self.usage_percent())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub windows: Vec<WindowStatus>,
}

impl ServiceStatus {
    pub fn window(&self, kind: WindowKind) -> Option<&WindowStatus> {
        self.windows.iter().find(|w| w.kind == kind)
    }

    /// Worst health across configured windows.
    pub fn health(&self) -> HealthLevel {
        self.windows
            .iter()
            .map(WindowStatus::health)
            .max()
            .unwrap_or(HealthLevel::Healthy)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} [{}]", self.service, self.health().as_str())?;
        for w in &self.windows {
            writeln!(
                f,
                "  {:<8} ${:.4} / ${:.2} ({:.1}%), ${:.4} remaining",
                w.kind.as_str(),
                w.accumulated,
                w.limit,
                w.usage_percent(),
                w.remaining,
            )?;
        }
        Ok(())
    }
}
