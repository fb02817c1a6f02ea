use std::sync::Arc;

use super::Orchestrator;
use crate::budget::{Clock, UsageLedger};
use crate::config::{BudgetSettings, ConfigProvider};
use crate::observability::MetricsRegistry;
use crate::provider::{
    EmergencyResponder, Provider, SpeechSynthesis, TextGeneration, TextOnlyVoice, TextProvider,
    VoiceProvider,
};
use crate::registry::ProviderRegistry;
use crate::selection::SelectionPolicy;

/// Assembles an [`Orchestrator`] from a ledger, settings and providers.
#[derive(Default)]
pub struct OrchestratorBuilder {
    ledger: Option<Arc<UsageLedger>>,
    clock: Option<Arc<dyn Clock>>,
    settings: Option<BudgetSettings>,
    policy: Option<SelectionPolicy>,
    text: Vec<TextProvider>,
    speech: Vec<VoiceProvider>,
    builtin_fallbacks: bool,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing ledger instead of creating one.
    pub fn ledger(mut self, ledger: Arc<UsageLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Clock for a ledger created by the builder. Ignored with [`Self::ledger`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn budget_settings(mut self, settings: BudgetSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Load [`BudgetSettings`] from `config`, on top of the stock limits.
    pub async fn configure(self, config: &dyn ConfigProvider) -> crate::Result<Self> {
        let settings = BudgetSettings::load(config).await?;
        Ok(self.budget_settings(settings))
    }

    /// Overrides the policy derived from budget settings.
    pub fn policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn text_provider(mut self, provider: impl Provider<TextGeneration> + 'static) -> Self {
        self.text.push(Arc::new(provider));
        self
    }

    pub fn shared_text_provider(mut self, provider: TextProvider) -> Self {
        self.text.push(provider);
        self
    }

    pub fn voice_provider(mut self, provider: impl Provider<SpeechSynthesis> + 'static) -> Self {
        self.speech.push(Arc::new(provider));
        self
    }

    pub fn shared_voice_provider(mut self, provider: VoiceProvider) -> Self {
        self.speech.push(provider);
        self
    }

    /// Register [`EmergencyResponder`] and [`TextOnlyVoice`] as terminal
    /// fallbacks unless providers with those names are already present.
    pub fn with_builtin_fallbacks(mut self) -> Self {
        self.builtin_fallbacks = true;
        self
    }

    pub fn build(self) -> crate::Result<Orchestrator> {
        let ledger = match self.ledger {
            Some(ledger) => ledger,
            None => Arc::new(match self.clock {
                Some(clock) => UsageLedger::with_clock(clock),
                None => UsageLedger::new(),
            }),
        };

        if let Some(settings) = &self.settings {
            settings.apply(&ledger);
        }
        let policy = self.policy.unwrap_or_else(|| {
            self.settings
                .as_ref()
                .map(BudgetSettings::policy)
                .unwrap_or_default()
        });

        let mut text = ProviderRegistry::new();
        for provider in self.text {
            text.register(provider)?;
        }
        let mut speech = ProviderRegistry::new();
        for provider in self.speech {
            speech.register(provider)?;
        }

        if self.builtin_fallbacks {
            let emergency = EmergencyResponder::new();
            if text.get(Provider::<TextGeneration>::name(&emergency)).is_none() {
                text.register_provider(emergency)?;
            }
            let text_only = TextOnlyVoice::new();
            if speech.get(Provider::<SpeechSynthesis>::name(&text_only)).is_none() {
                speech.register_provider(text_only)?;
            }
        }

        if !text.has_terminal() {
            tracing::warn!("no terminal text fallback registered; exhausted walks will fail");
        }
        if !speech.has_terminal() {
            tracing::warn!("no terminal speech fallback registered; exhausted walks will fail");
        }

        tracing::info!(
            text_providers = ?text.names(),
            speech_providers = ?speech.names(),
            order = ?policy.order,
            "orchestrator ready"
        );

        Ok(Orchestrator {
            ledger,
            policy,
            text,
            speech,
            metrics: Arc::new(MetricsRegistry::new()),
        })
    }
}
