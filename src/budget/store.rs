//! Ledger persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use super::ledger::UsageRecord;
use super::window::BudgetWindow;
use crate::Result;

const DATA_DIR: &str = "assistant-orchestrator";
const USAGE_FILE: &str = "usage.json";

/// Point-in-time copy of every open window and the usage log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub taken_at: DateTime<Utc>,
    pub windows: Vec<BudgetWindow>,
    #[serde(default)]
    pub records: Vec<UsageRecord>,
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> Result<Option<LedgerSnapshot>>;

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()>;
}

/// Stores the snapshot as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/assistant-orchestrator/usage.json` for the current user.
    pub fn default_location() -> Option<Self> {
        BaseDirs::new().map(|dirs| Self::new(dirs.data_dir().join(DATA_DIR).join(USAGE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl UsageStore for JsonFileStore {
    async fn load(&self) -> Result<Option<LedgerSnapshot>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let snapshot = serde_json::from_str(&content).map_err(|e| {
            crate::Error::Store(format!(
                "failed to parse usage snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(
            path = %self.path.display(),
            windows = snapshot.windows.len(),
            records = snapshot.records.len(),
            "usage snapshot saved"
        );
        Ok(())
    }
}
