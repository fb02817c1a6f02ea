//! # assistant-orchestrator
//!
//! Budget-aware provider orchestration for assistant applications.
//!
//! A request for a text response or a synthesized utterance is walked across
//! an ordered list of interchangeable providers. Each provider is checked for
//! availability, then for affordability against per-service daily, weekly and
//! monthly spending limits, and only then invoked. Cost is recorded for the
//! provider that served the request and for nobody else.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use assistant_orchestrator::{ChatMessage, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), assistant_orchestrator::Error> {
//!     let orchestrator = Orchestrator::builder()
//!         .with_builtin_fallbacks()
//!         .build()?;
//!
//!     let envelope = orchestrator
//!         .generate(&[ChatMessage::user("what time is it?")], Default::default())
//!         .await?;
//!     println!("{} answered: {:?}", envelope.provider, envelope.payload());
//!     Ok(())
//! }
//! ```
//!
//! ## Budgets
//!
//! ```rust
//! use assistant_orchestrator::budget::{UsageLedger, WindowKind};
//! use rust_decimal_macros::dec;
//!
//! let ledger = UsageLedger::new();
//! ledger.set_limit("openai", WindowKind::Daily, dec!(10.00));
//! ledger.record_usage("openai", dec!(9.50), "gpt-4o");
//!
//! assert!(ledger.can_afford("openai", dec!(0.50)).is_ok());
//! assert!(ledger.can_afford("openai", dec!(0.51)).is_err());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod budget;
pub mod config;
pub mod context;
pub mod observability;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod registry;
pub mod selection;
pub mod types;

pub use budget::{
    BudgetLimit, BudgetViolation, BudgetWindow, Clock, HealthLevel, JsonFileStore,
    LedgerSnapshot, ManualClock, PricingTable, Reservation, ServiceStatus, SystemClock,
    UsageLedger, UsageRecord, UsageStore, WindowKind, WindowStatus,
};
pub use config::{
    BudgetSettings, CompositeConfigProvider, ConfigBuilder, ConfigError, ConfigProvider,
    ConfigProviderExt, EnvConfigProvider, FileConfigProvider, MemoryConfigProvider,
    ProviderCredentials,
};
pub use context::Conversation;
pub use observability::{MetricsRegistry, ProviderStats};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorStatus, RequestOptions};
pub use provider::{
    ApiKeyGate, Capability, CostTier, EmergencyResponder, Envelope, GenerateOptions, HttpProbe,
    Operation, Provider, SharedProvider, SpeechSynthesis, SynthesisOptions, TextGeneration,
    TextOnlyVoice, TextProvider, VoiceProvider,
};
pub use registry::ProviderRegistry;
pub use selection::{AttemptError, AttemptRecord, SelectionOrder, SelectionPolicy};
pub use types::{ChatMessage, Role, Utterance};

/// Error type for orchestration operations.
///
/// Individual provider skips and failures are not errors: they are
/// [`AttemptError`]s collected while walking the chain, and only reach the
/// caller inside [`Error::FallbackExhausted`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request parameters are invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// File system operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Request deadline elapsed while a provider was in flight.
    #[error("Operation timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(std::time::Duration),

    /// Caller cancelled the request while a provider was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// A provider name was requested that is not registered.
    #[error("No {operation} provider named '{name}' is registered")]
    UnknownProvider { operation: Operation, name: String },

    /// Every provider in the chain was skipped or failed.
    ///
    /// A registered terminal fallback always succeeds, so reaching this means
    /// the chain had none.
    #[error(
        "All {operation} providers exhausted ({} attempted); no terminal fallback registered{}",
        attempts.len(),
        format_attempts(attempts)
    )]
    FallbackExhausted {
        operation: Operation,
        attempts: Vec<AttemptRecord>,
    },

    /// Usage store could not load or save a snapshot.
    #[error("Usage store error: {0}")]
    Store(String),
}

fn format_attempts(attempts: &[AttemptRecord]) -> String {
    if attempts.is_empty() {
        return String::new();
    }
    let reasons: Vec<String> = attempts.iter().map(|a| a.to_string()).collect();
    format!(": {}", reasons.join("; "))
}

/// Error category for unified error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Configuration, setup, or misuse errors
    Configuration,
    /// Deadline or cancellation; may succeed if re-issued
    Transient,
    /// Internal errors (IO, JSON, storage)
    Internal,
    /// Resource limits (timeouts)
    ResourceLimit,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::InvalidRequest(_)
            | Error::UnknownProvider { .. }
            | Error::FallbackExhausted { .. } => ErrorCategory::Configuration,

            Error::Cancelled => ErrorCategory::Transient,

            Error::Timeout(_) => ErrorCategory::ResourceLimit,

            Error::Io(_) | Error::Json(_) | Error::Store(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// True only for an exhausted chain, the signal that no terminal
    /// fallback was registered.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Error::FallbackExhausted { .. })
    }

    pub fn is_resource_limit(&self) -> bool {
        self.category() == ErrorCategory::ResourceLimit
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::Cancelled)
    }

    /// Per-provider skip and failure reasons of an exhausted chain.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Error::FallbackExhausted { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound { key } => {
                Error::Config(format!("Key not found: {}", key))
            }
            config::ConfigError::InvalidValue { key, message } => {
                Error::Config(format!("Invalid value for {}: {}", key, message))
            }
            config::ConfigError::Serialization(e) => Error::Json(e),
            config::ConfigError::Io(e) => Error::Io(e),
            config::ConfigError::Env(e) => Error::Config(e.to_string()),
            config::ConfigError::Provider { message } => Error::Config(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
