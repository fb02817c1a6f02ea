//! Text output in place of audio, the last resort of every voice chain.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{CostTier, Envelope, Provider, SpeechSynthesis, SynthesisOptions};
use crate::types::Utterance;

/// Destination for rendered lines.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextStyle {
    Simple,
    #[default]
    Speech,
    Quote,
    Announcement,
    Whisper,
    Emphasis,
    Info,
    Robot,
}

impl TextStyle {
    pub const ALL: [TextStyle; 8] = [
        TextStyle::Simple,
        TextStyle::Speech,
        TextStyle::Quote,
        TextStyle::Announcement,
        TextStyle::Whisper,
        TextStyle::Emphasis,
        TextStyle::Info,
        TextStyle::Robot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextStyle::Simple => "simple",
            TextStyle::Speech => "speech",
            TextStyle::Quote => "quote",
            TextStyle::Announcement => "announcement",
            TextStyle::Whisper => "whisper",
            TextStyle::Emphasis => "emphasis",
            TextStyle::Info => "info",
            TextStyle::Robot => "robot",
        }
    }

    /// Unknown names fall back to `Simple`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(name.trim()))
            .unwrap_or(TextStyle::Simple)
    }

    pub fn render(&self, speaker: &str, text: &str) -> String {
        match self {
            TextStyle::Simple => format!("📝 {text}"),
            TextStyle::Speech => format!("🗣️  {speaker}: {text}"),
            TextStyle::Quote => format!("💬 \"{text}\""),
            TextStyle::Announcement => format!("📢 {text}"),
            TextStyle::Whisper => format!("🤫 {text}"),
            TextStyle::Emphasis => format!("‼️  {text}"),
            TextStyle::Info => format!("ℹ️  {text}"),
            TextStyle::Robot => format!("🤖 {text}"),
        }
    }
}

/// Writes the text to a sink instead of synthesizing audio.
///
/// Always available, free, and never fails.
#[derive(Clone)]
pub struct TextOnlyVoice {
    name: String,
    speaker: String,
    default_style: TextStyle,
    sink: OutputSink,
}

impl fmt::Debug for TextOnlyVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextOnlyVoice")
            .field("name", &self.name)
            .field("speaker", &self.speaker)
            .field("default_style", &self.default_style)
            .finish_non_exhaustive()
    }
}

impl Default for TextOnlyVoice {
    fn default() -> Self {
        Self::new()
    }
}

impl TextOnlyVoice {
    pub fn new() -> Self {
        Self {
            name: "text_only".to_string(),
            speaker: "Assistant".to_string(),
            default_style: TextStyle::default(),
            sink: Arc::new(|line: &str| println!("{line}")),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = speaker.into();
        self
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.default_style = style;
        self
    }

    pub fn with_sink(mut self, sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Formatted line for `text` under `options`, without writing it.
    pub fn render(&self, text: &str, options: &SynthesisOptions) -> (TextStyle, String) {
        let style = options
            .voice
            .as_deref()
            .map(TextStyle::from_name)
            .unwrap_or(self.default_style);
        let mut line = style.render(&self.speaker, text);
        if options.uppercase {
            line = line.to_uppercase();
        }
        (style, line)
    }
}

#[async_trait]
impl Provider<SpeechSynthesis> for TextOnlyVoice {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::Free
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn estimate_cost(&self, _input: &String, _options: &SynthesisOptions) -> Decimal {
        Decimal::ZERO
    }

    async fn invoke(&self, input: &String, options: &SynthesisOptions) -> Envelope<Utterance> {
        let start = Instant::now();
        let (style, line) = self.render(input, options);
        let repeat = options.repeat.max(1);
        for _ in 0..repeat {
            (self.sink)(line.as_str());
        }

        Envelope::ok(self.name.clone(), Utterance::text_only(line))
            .with_model(style.as_str())
            .with_duration(start.elapsed())
            .with_metadata("style", style.as_str())
            .with_metadata("uppercase", options.uppercase)
            .with_metadata("repeat_count", repeat)
    }

    fn is_terminal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn capture() -> (Arc<Mutex<Vec<String>>>, TextOnlyVoice) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let voice = TextOnlyVoice::new()
            .with_speaker("Atlas")
            .with_sink(move |line| sink.lock().unwrap().push(line.to_string()));
        (lines, voice)
    }

    #[test]
    fn test_style_lookup() {
        assert_eq!(TextStyle::from_name("Robot"), TextStyle::Robot);
        assert_eq!(TextStyle::from_name("nonexistent"), TextStyle::Simple);
    }

    #[tokio::test]
    async fn test_default_style_is_speech() {
        let (lines, voice) = capture();
        let env = voice
            .invoke(&"Good evening".to_string(), &SynthesisOptions::default())
            .await;

        assert!(env.is_success());
        assert_eq!(env.actual_cost, Decimal::ZERO);
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Atlas: Good evening"));
        assert!(!env.payload().unwrap().has_audio());
    }

    #[tokio::test]
    async fn test_uppercase_and_repeat() {
        let (lines, voice) = capture();
        let options = SynthesisOptions::default()
            .voice("quote")
            .uppercase()
            .repeat(3);
        let env = voice.invoke(&"alert".to_string(), &options).await;

        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.contains("\"ALERT\"")));
        assert_eq!(env.metadata["style"], "quote");
        assert_eq!(env.metadata["repeat_count"], 3);
    }
}
