//! End-to-end provider walks through the public orchestrator API.

use std::sync::Arc;
use std::time::Duration;

use assistant_orchestrator::prelude::*;
use assistant_orchestrator::provider::testing::ScriptedProvider;
use assistant_orchestrator::{MemoryConfigProvider, Operation};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type ScriptedText = ScriptedProvider<TextGeneration>;
type ScriptedVoice = ScriptedProvider<SpeechSynthesis>;

fn question() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are a helpful assistant."),
        ChatMessage::user("what time is it?"),
    ]
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn quiet_voice() -> TextOnlyVoice {
    TextOnlyVoice::new().with_sink(|_| {})
}

#[tokio::test]
async fn test_only_serving_provider_is_billed() {
    init_tracing();
    let a = Arc::new(ScriptedText::succeeding("a", "from a".into(), dec!(0.01)).unavailable());
    let b = Arc::new(
        ScriptedText::succeeding("b", "from b".into(), dec!(0.01)).estimate(dec!(0.02)),
    );
    let c = Arc::new(
        ScriptedText::succeeding("c", "from c".into(), dec!(0.004)).estimate(dec!(0.003)),
    );

    let orchestrator = Orchestrator::builder()
        .policy(SelectionPolicy::as_given())
        .shared_text_provider(a.clone())
        .shared_text_provider(b.clone())
        .shared_text_provider(c.clone())
        .with_builtin_fallbacks()
        .build()
        .unwrap();
    orchestrator
        .set_budget_limit("b", WindowKind::Daily, dec!(0.01))
        .unwrap();

    let envelope = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(envelope.provider, "c");
    assert_eq!(envelope.payload().map(String::as_str), Some("from c"));
    assert_eq!((a.calls(), b.calls(), c.calls()), (0, 0, 1));

    let ledger = orchestrator.ledger();
    let records = ledger.records(None);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].service, "c");
    assert_eq!(records[0].amount, dec!(0.004));
    assert_eq!(ledger.accumulated("b", WindowKind::Daily), Decimal::ZERO);

    let stats = orchestrator.metrics().stats("b").unwrap();
    assert_eq!(stats.skipped_budget, 1);
    assert_eq!(orchestrator.metrics().stats("a").unwrap().skipped_unavailable, 1);
}

#[tokio::test]
async fn test_failed_provider_falls_through_to_terminal() {
    let orchestrator = Orchestrator::builder()
        .text_provider(ScriptedText::failing("openai", "HTTP 500").tier(CostTier::Premium))
        .with_builtin_fallbacks()
        .policy(SelectionPolicy::as_given())
        .build()
        .unwrap();

    let envelope = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();

    assert!(envelope.is_success());
    assert_eq!(envelope.provider, "emergency");
    assert_eq!(envelope.metadata["intent"], "time");
    assert!(orchestrator.ledger().records(None).is_empty());
    assert_eq!(orchestrator.metrics().stats("openai").unwrap().failures, 1);
}

#[tokio::test]
async fn test_exhaustion_is_distinct_from_provider_failure() {
    let orchestrator = Orchestrator::builder()
        .text_provider(ScriptedText::failing("openai", "HTTP 500"))
        .text_provider(ScriptedText::failing("claude", "overloaded").unavailable())
        .build()
        .unwrap();

    let err = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_misconfiguration());
    assert!(matches!(
        err,
        Error::FallbackExhausted {
            operation: Operation::TextGeneration,
            ..
        }
    ));
    let reasons: Vec<_> = err.attempts().iter().map(|a| a.error.clone()).collect();
    assert_eq!(
        reasons,
        vec![
            AttemptError::ProviderFailure {
                message: "HTTP 500".into()
            },
            AttemptError::Unavailable,
        ]
    );
}

#[tokio::test]
async fn test_empty_chain_exhausts() {
    let orchestrator = Orchestrator::builder().build().unwrap();
    let err = orchestrator
        .synthesize_with("hello", &[], SynthesisOptions::default(), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_misconfiguration());
    assert!(err.to_string().contains("speech synthesis"));
}

#[tokio::test]
async fn test_billed_failure_policy_from_config() {
    let billed = || ScriptedText::billed_failure("vendor", "truncated response", dec!(0.002));

    let orchestrator = Orchestrator::builder()
        .text_provider(billed())
        .with_builtin_fallbacks()
        .build()
        .unwrap();
    orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(orchestrator.ledger().records(Some("vendor"))[0].amount, dec!(0.002));

    let config = MemoryConfigProvider::new().value("selection.record_billed_failures", "false");
    let orchestrator = Orchestrator::builder()
        .configure(&config)
        .await
        .unwrap()
        .text_provider(billed())
        .with_builtin_fallbacks()
        .build()
        .unwrap();
    orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();
    assert!(orchestrator.ledger().records(Some("vendor")).is_empty());
}

#[tokio::test]
async fn test_over_budget_skips_for_the_rest_of_the_day() {
    let orchestrator = Orchestrator::builder()
        .text_provider(
            ScriptedText::succeeding("claude", "from claude".into(), dec!(0.40))
                .estimate(dec!(0.30))
                .tier(CostTier::Low),
        )
        .with_builtin_fallbacks()
        .policy(SelectionPolicy::as_given())
        .build()
        .unwrap();
    orchestrator
        .set_budget_limit("claude", WindowKind::Daily, dec!(0.75))
        .unwrap();

    let served: Vec<String> = {
        let mut served = Vec::new();
        for _ in 0..3 {
            let envelope = orchestrator
                .generate(&question(), GenerateOptions::default())
                .await
                .unwrap();
            served.push(envelope.provider);
        }
        served
    };

    // 0.40 + 0.30 fits, 0.80 + 0.30 does not
    assert_eq!(served, vec!["claude", "claude", "emergency"]);
    assert_eq!(orchestrator.ledger().accumulated("claude", WindowKind::Daily), dec!(0.80));

    let status = orchestrator.get_budget_status(Some("claude"));
    let daily = status["claude"].window(WindowKind::Daily).unwrap();
    assert!(daily.is_exhausted());
}

#[tokio::test]
async fn test_concurrent_requests_respect_budget() {
    init_tracing();
    let orchestrator = Arc::new(
        Orchestrator::builder()
            .text_provider(
                ScriptedText::succeeding("openai", "ok".into(), dec!(0.25))
                    .estimate(dec!(0.25))
                    .delay(Duration::from_millis(10))
                    .tier(CostTier::Medium),
            )
            .with_builtin_fallbacks()
            .policy(SelectionPolicy::as_given())
            .build()
            .unwrap(),
    );
    orchestrator
        .set_budget_limit("openai", WindowKind::Daily, dec!(1.00))
        .unwrap();

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move {
                orchestrator
                    .generate(&question(), GenerateOptions::default())
                    .await
                    .map(|e| e.provider)
            })
        })
        .collect();

    let mut served_by_openai = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == "openai" {
            served_by_openai += 1;
        }
    }

    assert_eq!(served_by_openai, 4);
    assert_eq!(orchestrator.ledger().accumulated("openai", WindowKind::Daily), dec!(1.00));
}

#[tokio::test]
async fn test_voice_chain_cost_ascending() {
    let premium = Arc::new(
        ScriptedVoice::succeeding("elevenlabs", Utterance::text_only("hi"), dec!(0.0005))
            .estimate(dec!(0.0005))
            .tier(CostTier::Premium),
    );
    let orchestrator = Orchestrator::builder()
        .voice_provider(quiet_voice())
        .shared_voice_provider(premium.clone())
        .build()
        .unwrap();
    orchestrator
        .set_budget_limit("elevenlabs", WindowKind::Daily, dec!(0.0010))
        .unwrap();

    // registered after the free terminal voice, still tried first
    let served: Vec<String> = {
        let mut served = Vec::new();
        for _ in 0..3 {
            let envelope = orchestrator
                .synthesize("hi", SynthesisOptions::default())
                .await
                .unwrap();
            served.push(envelope.provider);
        }
        served
    };
    assert_eq!(served, vec!["elevenlabs", "elevenlabs", "text_only"]);
    assert_eq!(premium.calls(), 2);
    assert_eq!(orchestrator.ledger().records(Some("elevenlabs")).len(), 2);

    let envelope = orchestrator
        .synthesize_registered(
            &["text_only", "elevenlabs"],
            "hi",
            SynthesisOptions::default(),
            RequestOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(envelope.provider, "text_only");
    assert_eq!(premium.calls(), 2);

    let failing = Orchestrator::builder()
        .voice_provider(quiet_voice())
        .voice_provider(ScriptedVoice::failing("elevenlabs", "quota exceeded").tier(CostTier::Premium))
        .build()
        .unwrap();
    let envelope = failing
        .synthesize("hi", SynthesisOptions::default().voice("rachel"))
        .await
        .unwrap();
    assert_eq!(envelope.provider, "text_only");
    assert_eq!(failing.metrics().stats("elevenlabs").unwrap().failures, 1);
}

#[tokio::test]
async fn test_default_order_serves_affordable_before_terminal() {
    init_tracing();
    let a = Arc::new(
        ScriptedText::succeeding("local", "from local".into(), Decimal::ZERO)
            .tier(CostTier::Free)
            .unavailable(),
    );
    let b = Arc::new(
        ScriptedText::succeeding("claude", "from claude".into(), dec!(0.01))
            .estimate(dec!(0.02))
            .tier(CostTier::Low),
    );
    let c = Arc::new(
        ScriptedText::succeeding("openai", "from openai".into(), dec!(0.004))
            .estimate(dec!(0.003))
            .tier(CostTier::Medium),
    );

    let orchestrator = Orchestrator::builder()
        .with_builtin_fallbacks()
        .shared_text_provider(c.clone())
        .shared_text_provider(b.clone())
        .shared_text_provider(a.clone())
        .build()
        .unwrap();
    orchestrator
        .set_budget_limit("claude", WindowKind::Daily, dec!(0.01))
        .unwrap();

    let envelope = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();

    assert_eq!(envelope.provider, "openai");
    assert_eq!((a.calls(), b.calls(), c.calls()), (0, 0, 1));
    let records = orchestrator.ledger().records(None);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].service, "openai");
    assert_eq!(orchestrator.metrics().stats("claude").unwrap().skipped_budget, 1);
    assert_eq!(orchestrator.metrics().stats("local").unwrap().skipped_unavailable, 1);
    assert!(orchestrator.metrics().stats("emergency").is_none());
}

#[tokio::test]
async fn test_panicking_adapter_does_not_escape() {
    let orchestrator = Orchestrator::builder()
        .text_provider(ScriptedText::panicking("buggy", "index out of bounds"))
        .with_builtin_fallbacks()
        .policy(SelectionPolicy::as_given())
        .build()
        .unwrap();

    let envelope = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(envelope.provider, "emergency");
}

/// Local inference server adapter gated by a reachability probe.
struct LocalModel {
    probe: HttpProbe,
}

#[async_trait]
impl Provider<TextGeneration> for LocalModel {
    fn name(&self) -> &str {
        "local"
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::Free
    }

    async fn is_available(&self) -> bool {
        self.probe.is_reachable().await
    }

    fn estimate_cost(&self, _input: &Vec<ChatMessage>, _options: &GenerateOptions) -> Decimal {
        Decimal::ZERO
    }

    async fn invoke(
        &self,
        _input: &Vec<ChatMessage>,
        _options: &GenerateOptions,
    ) -> Envelope<String> {
        Envelope::ok("local", "from the local model".to_string()).with_model("llama3")
    }
}

#[tokio::test]
async fn test_probe_gates_local_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let up = LocalModel {
        probe: HttpProbe::new(format!("{}/api/tags", server.uri())),
    };
    let down = LocalModel {
        probe: HttpProbe::with_timeout(
            format!("{}/missing", server.uri()),
            Duration::from_millis(200),
        ),
    };

    let orchestrator = Orchestrator::builder()
        .text_provider(up)
        .with_builtin_fallbacks()
        .build()
        .unwrap();
    let envelope = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(envelope.provider, "local");
    assert_eq!(envelope.model.as_deref(), Some("llama3"));

    let orchestrator = Orchestrator::builder()
        .text_provider(down)
        .with_builtin_fallbacks()
        .build()
        .unwrap();
    let envelope = orchestrator
        .generate(&question(), GenerateOptions::default())
        .await
        .unwrap();
    assert_eq!(envelope.provider, "emergency");

    let status = orchestrator.status().await;
    assert!(!status.text.iter().any(|p| p.name == "local" && p.available));
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let orchestrator = Orchestrator::builder()
        .text_provider(ScriptedText::succeeding("local", "Hello!".into(), Decimal::ZERO))
        .with_builtin_fallbacks()
        .build()
        .unwrap();

    let mut conversation = Conversation::new().with_system("be brief");
    for turn in ["hi", "how are you?"] {
        orchestrator
            .respond(&mut conversation, turn, GenerateOptions::default())
            .await
            .unwrap();
    }

    let history = conversation.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[3].content, "Hello!");
}
