//! JSON file configuration.
//!
//! The file is a JSON object; dotted keys walk nested objects, so
//! `budget.openai.daily` reads `{"budget": {"openai": {"daily": 1.0}}}`.
//! String leaves come back unquoted, other leaves as their JSON text.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

pub struct FileConfigProvider {
    path: PathBuf,
    data: RwLock<Option<Map<String, Value>>>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drop the cached contents; the next read goes back to disk.
    pub async fn reload(&self) {
        *self.data.write().await = None;
    }

    async fn read_file(&self) -> ConfigResult<Map<String, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(ConfigError::Provider {
                message: format!("{} must contain a JSON object", self.path.display()),
            }),
        }
    }

    async fn ensure_loaded(&self) -> ConfigResult<()> {
        if self.data.read().await.is_some() {
            return Ok(());
        }
        let map = self.read_file().await?;
        let mut data = self.data.write().await;
        if data.is_none() {
            tracing::debug!(path = %self.path.display(), keys = map.len(), "config file loaded");
            *data = Some(map);
        }
        Ok(())
    }

    async fn persist(&self, map: &Map<String, Value>) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(map)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

fn lookup<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = map.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn insert(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), value);
        }
        Some((head, rest)) => {
            let child = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(child) = child {
                insert(child, rest, value);
            }
        }
    }
}

fn remove(map: &mut Map<String, Value>, key: &str) -> bool {
    match key.split_once('.') {
        None => map.remove(key).is_some(),
        Some((head, rest)) => match map.get_mut(head) {
            Some(Value::Object(child)) => remove(child, rest),
            _ => false,
        },
    }
}

fn flatten(prefix: &str, map: &Map<String, Value>, out: &mut Vec<String>) {
    for (k, v) in map {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{}.{}", prefix, k)
        };
        match v {
            Value::Object(child) => flatten(&key, child, out),
            _ => out.push(key),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait::async_trait]
impl ConfigProvider for FileConfigProvider {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        self.ensure_loaded().await?;
        let data = self.data.read().await;
        Ok(data.as_ref().and_then(|map| lookup(map, key)).map(render))
    }

    /// Stores JSON text as its parsed value, anything else as a string.
    async fn set_raw(&self, key: &str, value: &str) -> ConfigResult<()> {
        self.ensure_loaded().await?;
        let parsed =
            serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));

        let mut data = self.data.write().await;
        let map = data.get_or_insert_with(Map::new);
        insert(map, key, parsed);
        self.persist(map).await
    }

    async fn delete(&self, key: &str) -> ConfigResult<bool> {
        self.ensure_loaded().await?;
        let mut data = self.data.write().await;
        let Some(map) = data.as_mut() else {
            return Ok(false);
        };
        if !remove(map, key) {
            return Ok(false);
        }
        self.persist(map).await?;
        Ok(true)
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        self.ensure_loaded().await?;
        let data = self.data.read().await;
        let mut keys = Vec::new();
        if let Some(map) = data.as_ref() {
            flatten("", map, &mut keys);
        }
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .finish()
    }
}
