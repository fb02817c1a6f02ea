use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared price class of a provider, used only for ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Free,
    Low,
    #[default]
    Medium,
    Premium,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Free => "free",
            CostTier::Low => "low",
            CostTier::Medium => "medium",
            CostTier::Premium => "premium",
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cost tier '{0}'")]
pub struct UnknownCostTier(pub String);

impl FromStr for CostTier {
    type Err = UnknownCostTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(CostTier::Free),
            "low" => Ok(CostTier::Low),
            "medium" | "mid" => Ok(CostTier::Medium),
            "premium" | "high" => Ok(CostTier::Premium),
            _ => Err(UnknownCostTier(s.to_string())),
        }
    }
}
