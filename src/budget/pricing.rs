//! Vendor price lists used for pre-flight cost estimates.
//!
//! Token-metered models are priced per million tokens, character-metered
//! voices per thousand characters. Default prices mirror the vendors'
//! published list prices at the time they were added.

use std::collections::HashMap;
use std::sync::LazyLock;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const TOKENS_PER_MTOK: Decimal = dec!(1_000_000);
const CHARS_PER_KCHAR: Decimal = dec!(1_000);

/// Rough token count for free-form text: four characters per token, at least one.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64 / 4).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPricing {
    pub input_per_mtok: Decimal,
    pub output_per_mtok: Decimal,
}

impl TokenPricing {
    pub const fn new(input_per_mtok: Decimal, output_per_mtok: Decimal) -> Self {
        Self {
            input_per_mtok,
            output_per_mtok,
        }
    }

    pub fn calculate(&self, input_tokens: u64, output_tokens: u64) -> Decimal {
        (Decimal::from(input_tokens) * self.input_per_mtok
            + Decimal::from(output_tokens) * self.output_per_mtok)
            / TOKENS_PER_MTOK
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterPricing {
    pub per_kchar: Decimal,
}

impl CharacterPricing {
    pub const fn new(per_kchar: Decimal) -> Self {
        Self { per_kchar }
    }

    pub fn calculate(&self, characters: u64) -> Decimal {
        Decimal::from(characters) * self.per_kchar / CHARS_PER_KCHAR
    }
}

#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, TokenPricing>,
    voices: HashMap<String, CharacterPricing>,
    default_model: TokenPricing,
    default_voice: CharacterPricing,
}

impl PricingTable {
    pub fn builder() -> PricingTableBuilder {
        PricingTableBuilder::new()
    }

    /// Pricing for `model`: exact match first, then the longest known prefix
    /// (so dated snapshots like `gpt-4o-2024-08-06` resolve to `gpt-4o`).
    pub fn model(&self, model: &str) -> &TokenPricing {
        let normalized = model.trim().to_lowercase();
        if let Some(pricing) = self.models.get(&normalized) {
            return pricing;
        }
        self.models
            .iter()
            .filter(|(name, _)| normalized.starts_with(name.as_str()))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, pricing)| pricing)
            .unwrap_or(&self.default_model)
    }

    pub fn voice(&self, voice: &str) -> &CharacterPricing {
        self.voices
            .get(&voice.trim().to_lowercase())
            .unwrap_or(&self.default_voice)
    }

    pub fn calculate_tokens(&self, model: &str, input_tokens: u64, output_tokens: u64) -> Decimal {
        self.model(model).calculate(input_tokens, output_tokens)
    }

    pub fn calculate_characters(&self, voice: &str, characters: u64) -> Decimal {
        self.voice(voice).calculate(characters)
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        global_pricing_table().clone()
    }
}

#[derive(Debug, Default)]
pub struct PricingTableBuilder {
    models: HashMap<String, TokenPricing>,
    voices: HashMap<String, CharacterPricing>,
    default_model: Option<TokenPricing>,
    default_voice: Option<CharacterPricing>,
}

impl PricingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(self) -> Self {
        self.model("gpt-4.1", dec!(15), dec!(60))
            .model("gpt-4o", dec!(5), dec!(15))
            .model("gpt-4o-mini", dec!(1.5), dec!(6))
            .model("gpt-4-turbo", dec!(10), dec!(30))
            .model("gpt-4", dec!(30), dec!(60))
            .model("gpt-3.5-turbo", dec!(1.5), dec!(2))
            .model("claude-3-sonnet", dec!(3), dec!(15))
            .model("claude-3-haiku", dec!(0.25), dec!(1.25))
            .voice("standard", dec!(0.18))
            .voice("premium", dec!(0.30))
    }

    pub fn model(mut self, name: impl Into<String>, input: Decimal, output: Decimal) -> Self {
        self.models
            .insert(name.into().to_lowercase(), TokenPricing::new(input, output));
        self
    }

    pub fn voice(mut self, name: impl Into<String>, per_kchar: Decimal) -> Self {
        self.voices
            .insert(name.into().to_lowercase(), CharacterPricing::new(per_kchar));
        self
    }

    pub fn default_model(mut self, pricing: TokenPricing) -> Self {
        self.default_model = Some(pricing);
        self
    }

    pub fn default_voice(mut self, pricing: CharacterPricing) -> Self {
        self.default_voice = Some(pricing);
        self
    }

    pub fn build(self) -> PricingTable {
        let default_model = self
            .default_model
            .or_else(|| self.models.get("claude-3-sonnet").copied())
            .unwrap_or(TokenPricing::new(dec!(3), dec!(15)));
        let default_voice = self
            .default_voice
            .or_else(|| self.voices.get("standard").copied())
            .unwrap_or(CharacterPricing::new(dec!(0.18)));

        PricingTable {
            models: self.models,
            voices: self.voices,
            default_model,
            default_voice,
        }
    }
}

static GLOBAL_PRICING: LazyLock<PricingTable> =
    LazyLock::new(|| PricingTableBuilder::new().with_defaults().build());

pub fn global_pricing_table() -> &'static PricingTable {
    &GLOBAL_PRICING
}
