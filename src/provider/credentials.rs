use secrecy::{ExposeSecret, SecretString};

/// Availability gate for providers that need an API key.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyGate {
    key: Option<SecretString>,
}

impl ApiKeyGate {
    pub fn new(key: Option<SecretString>) -> Self {
        Self { key }
    }

    pub fn from_key(key: impl Into<String>) -> Self {
        Self::new(Some(SecretString::from(key.into())))
    }

    pub fn missing() -> Self {
        Self::default()
    }

    /// Present and not blank.
    pub fn is_present(&self) -> bool {
        self.key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    pub fn expose(&self) -> Option<&str> {
        self.key
            .as_ref()
            .map(|k| k.expose_secret())
            .filter(|k| !k.trim().is_empty())
    }
}
