//! Offline text responder used as the last resort of every text chain.

use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Local;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CostTier, Envelope, GenerateOptions, Provider, TextGeneration};
use crate::types::{ChatMessage, last_user_content};

const MODEL: &str = "emergency_v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Time,
    Weather,
    Help,
    Greeting,
    Thanks,
    Goodbye,
    Status,
    Unknown,
}

impl Intent {
    /// Detection order; the first intent with a matching keyword wins.
    const DETECTABLE: [Intent; 7] = [
        Intent::Time,
        Intent::Weather,
        Intent::Help,
        Intent::Greeting,
        Intent::Thanks,
        Intent::Goodbye,
        Intent::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Time => "time",
            Intent::Weather => "weather",
            Intent::Help => "help",
            Intent::Greeting => "greeting",
            Intent::Thanks => "thanks",
            Intent::Goodbye => "goodbye",
            Intent::Status => "status",
            Intent::Unknown => "unknown",
        }
    }

    fn default_keywords(self) -> &'static [&'static str] {
        match self {
            Intent::Time => &["time", "clock", "hour", "minute", "when", "what time"],
            Intent::Weather => &[
                "weather",
                "temperature",
                "rain",
                "sunny",
                "cloudy",
                "forecast",
                "outside",
            ],
            Intent::Help => &["help", "assist", "support", "what can you do"],
            Intent::Greeting => &[
                "hello",
                "hi",
                "hey",
                "good morning",
                "good afternoon",
                "good evening",
            ],
            Intent::Thanks => &["thank", "thanks", "appreciate", "grateful"],
            Intent::Goodbye => &["goodbye", "bye", "farewell", "see you", "exit", "quit"],
            Intent::Status => &[
                "status",
                "how are you",
                "system",
                "health",
                "operational",
                "working",
            ],
            Intent::Unknown => &[],
        }
    }

    fn default_templates(self) -> &'static [&'static str] {
        match self {
            Intent::Time => &[
                "The current time is {time}.",
                "It's {time} right now.",
                "The time is currently {time}.",
            ],
            Intent::Weather => &[
                "I'm unable to check the weather in emergency mode. Please try again later.",
                "Weather services are temporarily unavailable.",
                "My weather systems are offline. I apologize for the inconvenience.",
            ],
            Intent::Help => &[
                "I'm operating in emergency mode with limited capabilities.",
                "My systems are currently constrained. I can only provide basic assistance.",
                "Emergency protocols are active. How may I help with essential tasks?",
            ],
            Intent::Greeting => &[
                "Hello. I'm operating in emergency mode with reduced functionality.",
                "Good day. My systems are currently in conservation mode.",
                "Hello. I'm here to assist, though my capabilities are temporarily limited.",
            ],
            Intent::Thanks => &["You're welcome.", "My pleasure.", "At your service."],
            Intent::Goodbye => &[
                "Goodbye. I hope my systems will be fully operational soon.",
                "Until later. I'll be here when you need me.",
                "Farewell. Please try again when my systems are restored.",
            ],
            Intent::Status => &[
                "My systems are currently operating in emergency mode.",
                "I'm experiencing technical limitations but remain functional.",
                "Emergency protocols are active. Core systems operational.",
            ],
            Intent::Unknown => &[
                "I'm sorry. My systems are temporarily limited and I cannot process that request.",
                "I apologize, but I'm operating in emergency mode and cannot handle complex queries.",
                "My capabilities are currently restricted. Please try a simpler request.",
                "I'm afraid I cannot assist with that in emergency mode.",
            ],
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canned responses keyed by lightweight keyword intent matching.
///
/// Always available, free, and never fails.
#[derive(Debug, Clone)]
pub struct EmergencyResponder {
    name: String,
    keywords: Vec<(Intent, Vec<String>)>,
    templates: HashMap<Intent, Vec<String>>,
}

impl Default for EmergencyResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyResponder {
    pub fn new() -> Self {
        let keywords = Intent::DETECTABLE
            .into_iter()
            .map(|intent| {
                let words = intent
                    .default_keywords()
                    .iter()
                    .map(|k| k.to_string())
                    .collect();
                (intent, words)
            })
            .collect();

        let templates = Intent::DETECTABLE
            .into_iter()
            .chain([Intent::Unknown])
            .map(|intent| {
                let t = intent
                    .default_templates()
                    .iter()
                    .map(|t| t.to_string())
                    .collect();
                (intent, t)
            })
            .collect();

        Self {
            name: "emergency".to_string(),
            keywords,
            templates,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn add_template(mut self, intent: Intent, template: impl Into<String>) -> Self {
        self.templates
            .entry(intent)
            .or_default()
            .push(template.into());
        self
    }

    /// Replace every template of `intent`.
    pub fn with_templates<I, S>(mut self, intent: Intent, templates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.templates
            .insert(intent, templates.into_iter().map(Into::into).collect());
        self
    }

    pub fn add_keywords<I, S>(mut self, intent: Intent, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keywords = keywords.into_iter().map(|k| k.into().to_lowercase());
        match self.keywords.iter_mut().find(|(i, _)| *i == intent) {
            Some((_, existing)) => existing.extend(keywords),
            None => self.keywords.push((intent, keywords.collect())),
        }
        self
    }

    /// Keywords match on word boundaries, so "hi" does not fire on "this".
    pub fn detect_intent(&self, text: &str) -> Intent {
        let normalized: String = text
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
            .collect();
        let padded = format!(" {} ", normalized.split_whitespace().collect::<Vec<_>>().join(" "));

        self.keywords
            .iter()
            .find(|(_, words)| words.iter().any(|k| padded.contains(&format!(" {} ", k))))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Unknown)
    }

    fn render(template: &str) -> String {
        let now = Local::now();
        template
            .replace("{time}", &now.format("%I:%M %p").to_string())
            .replace("{date}", &now.format("%A, %B %d, %Y").to_string())
    }

    /// Pick and render a response for the latest user message.
    pub fn respond(&self, messages: &[ChatMessage]) -> (Intent, String) {
        let intent = self.detect_intent(last_user_content(messages).unwrap_or_default());
        let template = self
            .templates
            .get(&intent)
            .filter(|t| !t.is_empty())
            .or_else(|| self.templates.get(&Intent::Unknown))
            .and_then(|t| t.choose(&mut rand::rng()))
            .map(String::as_str)
            .unwrap_or("I'm operating in emergency mode and cannot help with that right now.");
        (intent, Self::render(template))
    }
}

#[async_trait]
impl Provider<TextGeneration> for EmergencyResponder {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::Free
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn estimate_cost(&self, _input: &Vec<ChatMessage>, _options: &GenerateOptions) -> Decimal {
        Decimal::ZERO
    }

    async fn invoke(
        &self,
        input: &Vec<ChatMessage>,
        _options: &GenerateOptions,
    ) -> Envelope<String> {
        let start = Instant::now();
        let (intent, content) = self.respond(input);
        Envelope::ok(self.name.clone(), content)
            .with_model(MODEL)
            .with_duration(start.elapsed())
            .with_metadata("intent", intent.as_str())
            .with_metadata("emergency_mode", true)
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_intent() {
        let responder = EmergencyResponder::new();
        assert_eq!(responder.detect_intent("What time is it?"), Intent::Time);
        assert_eq!(responder.detect_intent("Is it going to RAIN"), Intent::Weather);
        assert_eq!(responder.detect_intent("hi there"), Intent::Greeting);
        assert_eq!(responder.detect_intent("thanks a lot"), Intent::Thanks);
        assert_eq!(responder.detect_intent("how are you"), Intent::Status);
        assert_eq!(responder.detect_intent("bye!"), Intent::Goodbye);
        assert_eq!(responder.detect_intent("this is odd"), Intent::Unknown);
        assert_eq!(responder.detect_intent(""), Intent::Unknown);
    }

    #[test]
    fn test_custom_keywords_and_templates() {
        let responder = EmergencyResponder::new()
            .add_keywords(Intent::Help, ["sos"])
            .with_templates(Intent::Help, ["Help is on the way."]);

        let (intent, reply) = responder.respond(&[ChatMessage::user("SOS please")]);
        assert_eq!(intent, Intent::Help);
        assert_eq!(reply, "Help is on the way.");
    }

    #[test]
    fn test_placeholders_rendered() {
        let responder =
            EmergencyResponder::new().with_templates(Intent::Time, ["It is {time} on {date}."]);
        let (_, reply) = responder.respond(&[ChatMessage::user("what time is it")]);
        assert!(!reply.contains("{time}"));
        assert!(!reply.contains("{date}"));
        assert!(reply.starts_with("It is "));
    }

    #[tokio::test]
    async fn test_terminal_contract() {
        let responder = EmergencyResponder::new();
        let input = vec![ChatMessage::user("tell me a story")];
        let options = GenerateOptions::default();

        assert!(responder.is_terminal());
        assert!(responder.is_available().await);
        assert_eq!(responder.estimate_cost(&input, &options), Decimal::ZERO);

        let env = responder.invoke(&input, &options).await;
        assert!(env.is_success());
        assert_eq!(env.actual_cost, Decimal::ZERO);
        assert_eq!(env.model.as_deref(), Some("emergency_v1"));
        assert_eq!(env.metadata["intent"], "unknown");
    }
}
