//! The façade applications call.
//!
//! An [`Orchestrator`] owns the usage ledger, one provider registry per
//! capability and the selection policy. Every request walks a provider
//! chain through the policy and either returns the first successful
//! envelope or [`Error::FallbackExhausted`].

mod builder;
mod request;
mod status;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::Instrument;

pub use builder::OrchestratorBuilder;
pub use request::RequestOptions;
pub use status::{OrchestratorStatus, ProviderStatus};

use crate::budget::{ServiceStatus, UsageLedger, UsageStore, WindowKind};
use crate::context::Conversation;
use crate::observability::{MetricsRegistry, RequestSpan};
use crate::provider::{
    Capability, Envelope, GenerateOptions, SharedProvider, SpeechSynthesis, SynthesisOptions,
    TextGeneration, TextProvider, VoiceProvider,
};
use crate::registry::ProviderRegistry;
use crate::selection::{SelectionPolicy, WalkOutcome};
use crate::types::{ChatMessage, Utterance};
use crate::{Error, Result};

pub struct Orchestrator {
    ledger: Arc<UsageLedger>,
    policy: SelectionPolicy,
    text: ProviderRegistry<TextGeneration>,
    speech: ProviderRegistry<SpeechSynthesis>,
    metrics: Arc<MetricsRegistry>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    pub fn text_providers(&self) -> &ProviderRegistry<TextGeneration> {
        &self.text
    }

    pub fn voice_providers(&self) -> &ProviderRegistry<SpeechSynthesis> {
        &self.speech
    }

    /// Generate a response using every registered text provider.
    pub async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerateOptions,
    ) -> Result<Envelope<String>> {
        self.generate_with(messages, self.text.all(), options, RequestOptions::default())
            .await
    }

    /// Generate a response walking an explicit provider chain.
    pub async fn generate_with(
        &self,
        messages: &[ChatMessage],
        providers: &[TextProvider],
        options: GenerateOptions,
        request: RequestOptions,
    ) -> Result<Envelope<String>> {
        if messages.is_empty() {
            return Err(Error::InvalidRequest("no messages to respond to".into()));
        }
        self.run(providers, &messages.to_vec(), &options, &request)
            .await
    }

    /// Generate a response walking registered providers picked by name.
    pub async fn generate_registered(
        &self,
        names: &[&str],
        messages: &[ChatMessage],
        options: GenerateOptions,
        request: RequestOptions,
    ) -> Result<Envelope<String>> {
        let chain = self.text.chain(names)?;
        self.generate_with(messages, &chain, options, request).await
    }

    /// Synthesize `text` using every registered voice provider.
    pub async fn synthesize(
        &self,
        text: &str,
        options: SynthesisOptions,
    ) -> Result<Envelope<Utterance>> {
        self.synthesize_with(text, self.speech.all(), options, RequestOptions::default())
            .await
    }

    pub async fn synthesize_with(
        &self,
        text: &str,
        providers: &[VoiceProvider],
        options: SynthesisOptions,
        request: RequestOptions,
    ) -> Result<Envelope<Utterance>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidRequest("nothing to synthesize".into()));
        }
        self.run(providers, &text.to_string(), &options, &request)
            .await
    }

    pub async fn synthesize_registered(
        &self,
        names: &[&str],
        text: &str,
        options: SynthesisOptions,
        request: RequestOptions,
    ) -> Result<Envelope<Utterance>> {
        let chain = self.speech.chain(names)?;
        self.synthesize_with(text, &chain, options, request).await
    }

    /// Answer `input` in the context of `conversation`, appending the
    /// exchange once a provider has answered.
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        input: &str,
        options: GenerateOptions,
    ) -> Result<Envelope<String>> {
        if input.trim().is_empty() {
            return Err(Error::InvalidRequest("empty user input".into()));
        }
        let (messages, compressed) = conversation.build_messages(input);
        if compressed {
            tracing::debug!(messages = messages.len(), "conversation context compressed");
        }

        let envelope = self.generate(&messages, options).await?;
        if let Some(reply) = envelope.payload() {
            conversation.record_exchange(input, reply.clone());
        }
        Ok(envelope)
    }

    async fn run<C: Capability>(
        &self,
        providers: &[SharedProvider<C>],
        input: &C::Input,
        options: &C::Options,
        request: &RequestOptions,
    ) -> Result<Envelope<C::Output>> {
        self.metrics.requests_total.inc();
        let span = RequestSpan::new(C::OPERATION);

        let walk = self
            .policy
            .walk(providers, input, options, &self.ledger, &self.metrics)
            .instrument(span.span().clone());

        let bounded = async {
            match request.deadline {
                Some(deadline) => tokio::time::timeout(deadline, walk)
                    .await
                    .map_err(|_| Error::Timeout(deadline)),
                None => Ok(walk.await),
            }
        };

        let cancel = request.cancel.clone().unwrap_or_default();
        let outcome = tokio::select! {
            outcome = bounded => outcome,
            _ = cancel.cancelled() => Err(Error::Cancelled),
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.metrics.requests_aborted.inc();
                tracing::warn!(
                    parent: span.span(),
                    request_id = %span.request_id(),
                    error = %e,
                    "request aborted; in-flight budget hold released"
                );
                span.finish();
                return Err(e);
            }
        };

        match outcome {
            WalkOutcome::Succeeded { envelope, attempts } => {
                self.metrics.requests_success.inc();
                span.record_success(&envelope.provider, envelope.actual_cost, attempts.len() + 1);
                for attempt in &attempts {
                    tracing::debug!(parent: span.span(), %attempt, "passed over");
                }
                span.finish();
                Ok(envelope)
            }
            WalkOutcome::Exhausted { attempts } => {
                self.metrics.requests_exhausted.inc();
                span.record_attempts(attempts.len());
                span.finish();
                Err(Error::FallbackExhausted {
                    operation: C::OPERATION,
                    attempts,
                })
            }
        }
    }

    /// Budget status of one service, or of every metered service.
    pub fn get_budget_status(&self, service: Option<&str>) -> BTreeMap<String, ServiceStatus> {
        match service {
            Some(service) => self
                .ledger
                .status(service)
                .map(|status| BTreeMap::from([(service.to_string(), status)]))
                .unwrap_or_default(),
            None => self.ledger.status_all(),
        }
    }

    /// Replace or create one limit. Spend already accumulated is kept.
    pub fn set_budget_limit(&self, service: &str, kind: WindowKind, amount: Decimal) -> Result<()> {
        if service.trim().is_empty() {
            return Err(Error::InvalidRequest("service name is empty".into()));
        }
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(Error::InvalidRequest(format!(
                "budget limit for {} {} must not be negative, got {}",
                service, kind, amount
            )));
        }
        self.ledger.set_limit(service, kind, amount);
        Ok(())
    }

    /// Probe every registered provider concurrently.
    pub async fn status(&self) -> OrchestratorStatus {
        let (text, speech) = futures::join!(
            self.provider_statuses(self.text.all()),
            self.provider_statuses(self.speech.all()),
        );
        OrchestratorStatus {
            text,
            speech,
            budgets: self.ledger.status_all(),
        }
    }

    async fn provider_statuses<C: Capability>(
        &self,
        providers: &[SharedProvider<C>],
    ) -> Vec<ProviderStatus> {
        let availability = join_all(providers.iter().map(|p| p.is_available())).await;
        providers
            .iter()
            .zip(availability)
            .map(|(p, available)| ProviderStatus {
                name: p.name().to_string(),
                service: p.service().to_string(),
                tier: p.cost_tier(),
                available,
                terminal: p.is_terminal(),
                stats: self.metrics.stats(p.name()),
            })
            .collect()
    }

    /// Save the ledger to `store`.
    pub async fn flush(&self, store: &dyn UsageStore) -> Result<()> {
        let snapshot = self.ledger.snapshot();
        store.save(&snapshot).await?;
        tracing::info!(
            windows = snapshot.windows.len(),
            records = snapshot.records.len(),
            "usage flushed"
        );
        Ok(())
    }

    /// Load a previously flushed ledger. Returns false when `store` was empty.
    pub async fn restore(&self, store: &dyn UsageStore) -> Result<bool> {
        match store.load().await? {
            Some(snapshot) => {
                self.ledger.restore(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("text", &self.text.names())
            .field("speech", &self.speech.names())
            .field("policy", &self.policy)
            .finish()
    }
}
