//! Environment variable configuration.
//!
//! Keys map to variables by uppercasing and replacing `.` with `_`, after an
//! optional prefix: `budget.openai.daily` reads `ORCH_BUDGET_OPENAI_DAILY`
//! with prefix `ORCH_`. Aliases map a key to a fixed variable name so vendor
//! conventions such as `OPENAI_API_KEY` work unprefixed.

use std::collections::HashMap;

use super::provider::ConfigProvider;
use super::{ConfigError, ConfigResult};

/// Vendor key variables understood by [`EnvConfigProvider::standard`].
pub const STANDARD_ALIASES: &[(&str, &str)] = &[
    ("credentials.openai", "OPENAI_API_KEY"),
    ("credentials.claude", "ANTHROPIC_API_KEY"),
    ("credentials.elevenlabs", "ELEVENLABS_API_KEY"),
];

/// Read-only view of the process environment.
///
/// Setting variables at runtime is not thread-safe, so writes are rejected.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    prefix: Option<String>,
    aliases: HashMap<String, String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            aliases: HashMap::new(),
        }
    }

    /// `ORCH_`-prefixed variables plus [`STANDARD_ALIASES`].
    pub fn standard() -> Self {
        STANDARD_ALIASES
            .iter()
            .fold(Self::prefixed("ORCH_"), |p, (key, var)| p.with_alias(*key, *var))
    }

    pub fn with_alias(mut self, key: impl Into<String>, variable: impl Into<String>) -> Self {
        self.aliases.insert(key.into(), variable.into());
        self
    }

    fn env_key(&self, key: &str) -> String {
        let base = key.to_uppercase().replace('.', "_");
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, base),
            None => base,
        }
    }

    fn key_from_env(&self, env_name: &str) -> Option<String> {
        let rest = match &self.prefix {
            Some(prefix) => env_name.strip_prefix(prefix.as_str())?,
            None => env_name,
        };
        Some(rest.to_lowercase().replace('_', "."))
    }

    fn read(variable: &str) -> ConfigResult<Option<String>> {
        match std::env::var(variable) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(ConfigError::Env(e)),
        }
    }

    fn read_only() -> ConfigError {
        ConfigError::Provider {
            message: "Environment variables are read-only at runtime".into(),
        }
    }
}

#[async_trait::async_trait]
impl ConfigProvider for EnvConfigProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get_raw(&self, key: &str) -> ConfigResult<Option<String>> {
        if let Some(value) = Self::read(&self.env_key(key))? {
            return Ok(Some(value));
        }
        match self.aliases.get(key) {
            Some(variable) => Self::read(variable),
            None => Ok(None),
        }
    }

    async fn set_raw(&self, _key: &str, _value: &str) -> ConfigResult<()> {
        Err(Self::read_only())
    }

    async fn delete(&self, _key: &str) -> ConfigResult<bool> {
        Err(Self::read_only())
    }

    async fn list_keys(&self, prefix: &str) -> ConfigResult<Vec<String>> {
        let env_prefix = self.env_key(prefix);
        let mut keys: Vec<String> = std::env::vars()
            .filter(|(k, _)| k.starts_with(&env_prefix))
            .filter_map(|(k, _)| self.key_from_env(&k))
            .collect();
        for (key, variable) in &self.aliases {
            if key.starts_with(prefix) && std::env::var_os(variable).is_some() {
                keys.push(key.clone());
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_conversion() {
        let provider = EnvConfigProvider::new();
        assert_eq!(provider.env_key("budget.openai.daily"), "BUDGET_OPENAI_DAILY");

        let provider = EnvConfigProvider::prefixed("ORCH_");
        assert_eq!(provider.env_key("selection.order"), "ORCH_SELECTION_ORDER");
        assert_eq!(
            provider.key_from_env("ORCH_SELECTION_ORDER").as_deref(),
            Some("selection.order")
        );
        assert_eq!(provider.key_from_env("HOME"), None);
    }

    #[tokio::test]
    async fn test_prefixed_get() {
        let provider = EnvConfigProvider::prefixed("ORCH_TEST_ENV_GET_");

        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("ORCH_TEST_ENV_GET_BUDGET_CLAUDE_DAILY", "0.25") };
        let value = provider.get_raw("budget.claude.daily").await.unwrap();
        assert_eq!(value, Some("0.25".to_string()));
        unsafe { std::env::remove_var("ORCH_TEST_ENV_GET_BUDGET_CLAUDE_DAILY") };
    }

    #[tokio::test]
    async fn test_alias_fallback() {
        let provider = EnvConfigProvider::prefixed("ORCH_TEST_ALIAS_")
            .with_alias("credentials.vendor", "ORCH_TEST_VENDOR_API_KEY");

        // SAFETY: variable name is unique to this test
        unsafe { std::env::set_var("ORCH_TEST_VENDOR_API_KEY", "sk-alias") };
        assert_eq!(
            provider.get_raw("credentials.vendor").await.unwrap(),
            Some("sk-alias".to_string())
        );
        assert_eq!(
            provider.list_keys("credentials.").await.unwrap(),
            vec!["credentials.vendor"]
        );
        unsafe { std::env::remove_var("ORCH_TEST_VENDOR_API_KEY") };
    }

    #[test]
    fn test_standard_aliases() {
        let provider = EnvConfigProvider::standard();
        assert_eq!(
            provider.aliases.get("credentials.claude").map(String::as_str),
            Some("ANTHROPIC_API_KEY")
        );
    }

    #[tokio::test]
    async fn test_read_only() {
        let provider = EnvConfigProvider::new();
        assert!(provider.set_raw("key", "value").await.is_err());
        assert!(provider.delete("key").await.is_err());
    }
}
