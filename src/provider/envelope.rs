use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

/// Uniform result of one provider invocation.
///
/// A failed envelope carries no payload, only the error description. It may
/// still carry a non-zero `actual_cost` for vendors that bill failed calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub outcome: Result<T, String>,
    pub provider: String,
    /// Model or voice that served the call; used as the usage record label.
    pub model: Option<String>,
    pub actual_cost: Decimal,
    pub duration: Duration,
    pub metadata: Map<String, Value>,
}

impl<T> Envelope<T> {
    pub fn ok(provider: impl Into<String>, payload: T) -> Self {
        Self::new(provider, Ok(payload))
    }

    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(provider, Err(error.into()))
    }

    fn new(provider: impl Into<String>, outcome: Result<T, String>) -> Self {
        Self {
            outcome,
            provider: provider.into(),
            model: None,
            actual_cost: Decimal::ZERO,
            duration: Duration::ZERO,
            metadata: Map::new(),
        }
    }

    pub fn with_cost(mut self, cost: Decimal) -> Self {
        self.actual_cost = cost;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn payload(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn into_payload(self) -> Option<T> {
        self.outcome.ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }

    pub fn label(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_success_envelope() {
        let env = Envelope::ok("openai", "hi".to_string())
            .with_model("gpt-4o")
            .with_cost(dec!(0.0021))
            .with_metadata("input_tokens", 12);

        assert!(env.is_success());
        assert_eq!(env.payload().map(String::as_str), Some("hi"));
        assert_eq!(env.error(), None);
        assert_eq!(env.label(), "gpt-4o");
        assert_eq!(env.metadata["input_tokens"], 12);
    }

    #[test]
    fn test_failed_envelope() {
        let env: Envelope<String> = Envelope::failed("claude", "HTTP 529: overloaded");
        assert!(!env.is_success());
        assert!(env.payload().is_none());
        assert_eq!(env.error(), Some("HTTP 529: overloaded"));
        assert_eq!(env.actual_cost, Decimal::ZERO);
        assert_eq!(env.label(), "claude");
    }
}
