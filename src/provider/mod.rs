//! Provider capability contract.
//!
//! A provider is anything that can serve one [`Capability`]: text generation
//! or speech synthesis. Concrete vendor integrations implement [`Provider`]
//! for the capability they serve and are registered by name; the selection
//! walk depends only on this trait and the declared [`CostTier`].
//!
//! Every chain should end in a terminal fallback (see
//! [`Provider::is_terminal`]): always available, free, and always
//! successful. [`EmergencyResponder`] and [`TextOnlyVoice`] are the built-in
//! ones.

mod credentials;
mod emergency;
mod envelope;
mod probe;
pub mod testing;
mod text_only;
mod tier;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use credentials::ApiKeyGate;
pub use emergency::{EmergencyResponder, Intent};
pub use envelope::Envelope;
pub use probe::HttpProbe;
pub use text_only::{OutputSink, TextOnlyVoice, TextStyle};
pub use tier::{CostTier, UnknownCostTier};

use crate::budget::{PricingTable, estimate_tokens};
use crate::types::{ChatMessage, Utterance};

/// Operation kind served by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    TextGeneration,
    SpeechSynthesis,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::TextGeneration => "text generation",
            Operation::SpeechSynthesis => "speech synthesis",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-level description of one operation kind.
pub trait Capability: Send + Sync + 'static {
    type Input: Send + Sync;
    type Options: Clone + Default + fmt::Debug + Send + Sync;
    type Output: Send + 'static;

    const OPERATION: Operation;
}

/// Chat completion over a list of messages.
#[derive(Debug, Clone, Copy)]
pub enum TextGeneration {}

impl Capability for TextGeneration {
    type Input = Vec<ChatMessage>;
    type Options = GenerateOptions;
    type Output = String;

    const OPERATION: Operation = Operation::TextGeneration;
}

/// Text to speech.
#[derive(Debug, Clone, Copy)]
pub enum SpeechSynthesis {}

impl Capability for SpeechSynthesis {
    type Input = String;
    type Options = SynthesisOptions;
    type Output = Utterance;

    const OPERATION: Operation = Operation::SpeechSynthesis;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Provider default when unset.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerateOptions {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Vendor voice id, or output style for text-only fallbacks.
    pub voice: Option<String>,
    #[serde(default)]
    pub uppercase: bool,
    /// How many times text-only output is written. Zero means once.
    #[serde(default)]
    pub repeat: u8,
}

impl SynthesisOptions {
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn uppercase(mut self) -> Self {
        self.uppercase = true;
        self
    }

    pub fn repeat(mut self, times: u8) -> Self {
        self.repeat = times;
        self
    }
}

/// Uniform contract every provider satisfies for capability `C`.
///
/// `invoke` must translate every failure into a failed [`Envelope`]; a
/// panic escaping it is a defect in the adapter and is caught and reported
/// as a provider failure by the selection walk.
#[async_trait]
pub trait Provider<C: Capability>: Send + Sync {
    fn name(&self) -> &str;

    /// Ledger key the provider's spend is metered under.
    fn service(&self) -> &str {
        self.name()
    }

    fn cost_tier(&self) -> CostTier;

    /// Cheap, side-effect-free check. Never performs the billable call.
    async fn is_available(&self) -> bool;

    /// Pure function of the input and the provider's own prices.
    fn estimate_cost(&self, input: &C::Input, options: &C::Options) -> Decimal;

    async fn invoke(&self, input: &C::Input, options: &C::Options) -> Envelope<C::Output>;

    /// Always available, free, and always successful.
    fn is_terminal(&self) -> bool {
        false
    }
}

pub type SharedProvider<C> = Arc<dyn Provider<C>>;
pub type TextProvider = SharedProvider<TextGeneration>;
pub type VoiceProvider = SharedProvider<SpeechSynthesis>;

/// Pre-flight estimate for a chat request: input tokens from message text,
/// output tokens assumed to be half the input.
pub fn estimate_generation_cost(
    pricing: &PricingTable,
    model: &str,
    messages: &[ChatMessage],
) -> Decimal {
    let input_tokens: u64 = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
    let output_tokens = input_tokens / 2;
    pricing.calculate_tokens(model, input_tokens, output_tokens)
}

/// Pre-flight estimate for a synthesis request, billed per character.
pub fn estimate_synthesis_cost(pricing: &PricingTable, voice: &str, text: &str) -> Decimal {
    pricing.calculate_characters(voice, text.chars().count() as u64)
}
