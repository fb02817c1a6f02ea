//! Commonly used types and traits.
//!
//! ```rust
//! use assistant_orchestrator::prelude::*;
//! ```

pub use crate::Error;
pub use crate::Result;

// Orchestration
pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorStatus, RequestOptions};
pub use crate::selection::{AttemptError, AttemptRecord, SelectionOrder, SelectionPolicy};

// Providers
pub use crate::provider::{
    ApiKeyGate, Capability, CostTier, EmergencyResponder, Envelope, GenerateOptions, HttpProbe,
    Provider, SpeechSynthesis, SynthesisOptions, TextGeneration, TextOnlyVoice, TextProvider,
    VoiceProvider,
};

// Budgets
pub use crate::budget::{
    BudgetLimit, JsonFileStore, PricingTable, ServiceStatus, UsageLedger, UsageStore, WindowKind,
};

// Configuration
pub use crate::config::{BudgetSettings, ConfigBuilder, ConfigProvider, ProviderCredentials};

// Types
pub use crate::context::Conversation;
pub use crate::types::{ChatMessage, Role, Utterance};
