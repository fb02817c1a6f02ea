use serde::{Deserialize, Serialize};

use crate::budget::estimate_tokens;
use crate::types::{ChatMessage, Role};

pub const DEFAULT_TOKEN_BUDGET: u64 = 4_000;
pub const DEFAULT_MAX_ENTRIES: usize = 20;
pub const DEFAULT_RETAINED_ENTRIES: usize = 16;

pub const COMPRESSION_NOTE: &str =
    "[Previous conversation context compressed. Continuing conversation with essential context preserved.]";

/// History of completed exchanges plus an optional system prompt.
///
/// Stored history is capped at `max_entries`; once exceeded only the last
/// `retained_entries` are kept. When building a request the history is
/// further compressed to fit `token_budget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    system: Option<String>,
    history: Vec<ChatMessage>,
    token_budget: u64,
    max_entries: usize,
    retained_entries: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            system: None,
            history: Vec::new(),
            token_budget: DEFAULT_TOKEN_BUDGET,
            max_entries: DEFAULT_MAX_ENTRIES,
            retained_entries: DEFAULT_RETAINED_ENTRIES,
        }
    }

    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.system = Some(prompt.into());
        self
    }

    pub fn with_token_budget(mut self, tokens: u64) -> Self {
        self.token_budget = tokens;
        self
    }

    /// `retained` is clamped to `max`.
    pub fn with_history_cap(mut self, max: usize, retained: usize) -> Self {
        self.max_entries = max;
        self.retained_entries = retained.min(max);
        self
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn set_token_budget(&mut self, tokens: u64) {
        self.token_budget = tokens;
    }

    /// Append a completed user/assistant exchange and apply the history cap.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(ChatMessage::user(user));
        self.history.push(ChatMessage::assistant(assistant));
        if self.history.len() > self.max_entries {
            let excess = self.history.len() - self.retained_entries;
            self.history.drain(..excess);
        }
    }

    /// History fitted to the token budget, and whether anything was dropped.
    ///
    /// The system prompt is charged against the budget first, since
    /// [`Conversation::build_messages`] sends it ahead of the history. A
    /// leading system message is always kept. Then the most recent
    /// messages that fit are kept, stopping at the first that does not. A
    /// compression note follows the leading system message when anything
    /// was dropped.
    pub fn compressed_history(&self) -> (Vec<ChatMessage>, bool) {
        let budget = self.history_budget();
        let total: u64 = self.history.iter().map(|m| estimate_tokens(&m.content)).sum();
        if total <= budget {
            return (self.history.clone(), false);
        }

        let (head, rest) = match self.history.split_first() {
            Some((first, rest)) if first.role == Role::System => (Some(first), rest),
            _ => (None, self.history.as_slice()),
        };

        let mut remaining =
            budget.saturating_sub(head.map_or(0, |m| estimate_tokens(&m.content)));
        let mut kept = Vec::new();
        for msg in rest.iter().rev() {
            let tokens = estimate_tokens(&msg.content);
            if tokens > remaining {
                break;
            }
            remaining -= tokens;
            kept.push(msg.clone());
        }
        kept.reverse();

        let mut compressed = Vec::with_capacity(kept.len() + 2);
        compressed.extend(head.cloned());
        compressed.push(ChatMessage::system(COMPRESSION_NOTE));
        compressed.extend(kept);
        (compressed, true)
    }

    fn history_budget(&self) -> u64 {
        let system = self.system.as_deref().map_or(0, estimate_tokens);
        self.token_budget.saturating_sub(system)
    }

    /// Full request for a new user turn: system prompt, fitted history,
    /// then the user input. Also reports whether history was compressed.
    pub fn build_messages(&self, user_input: &str) -> (Vec<ChatMessage>, bool) {
        let (history, compressed) = self.compressed_history();
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = &self.system {
            messages.push(ChatMessage::system(system.clone()));
        }
        messages.extend(history);
        messages.push(ChatMessage::user(user_input));
        (messages, compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_cap() {
        let mut conv = Conversation::new();
        for i in 0..10 {
            conv.record_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(conv.len(), 20);

        conv.record_exchange("q10", "a10");
        assert_eq!(conv.len(), 16);
        assert_eq!(conv.history()[0].content, "q3");
        assert_eq!(conv.history()[15].content, "a10");
    }

    #[test]
    fn test_no_compression_within_budget() {
        let mut conv = Conversation::new().with_system("be brief");
        conv.record_exchange("hello", "hi");

        let (messages, compressed) = conv.build_messages("how are you");
        assert!(!compressed);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0], ChatMessage::system("be brief"));
        assert_eq!(messages[3], ChatMessage::user("how are you"));
    }

    #[test]
    fn test_compression_keeps_recent() {
        // each message is 100 tokens
        let mut conv = Conversation::new().with_token_budget(250);
        for i in 0..3 {
            conv.record_exchange(format!("{i}").repeat(400), format!("{i}").repeat(400));
        }

        let (history, compressed) = conv.compressed_history();
        assert!(compressed);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].content, COMPRESSION_NOTE);
        assert_eq!(history[1].role, Role::User);
        assert!(history[1].content.starts_with('2'));
        assert_eq!(history[2].role, Role::Assistant);
    }

    #[test]
    fn test_compression_keeps_leading_system() {
        let mut conv = Conversation::new().with_token_budget(150);
        conv.history.push(ChatMessage::system("s".repeat(200)));
        conv.record_exchange("u".repeat(400), "a".repeat(200));

        let (history, compressed) = conv.compressed_history();
        assert!(compressed);
        assert_eq!(history.len(), 3);
        assert!(history[0].content.starts_with('s'));
        assert_eq!(history[1].content, COMPRESSION_NOTE);
        assert!(history[2].content.starts_with('a'));
    }

    #[test]
    fn test_system_prompt_counts_against_budget() {
        let mut conv = Conversation::new()
            .with_system("p".repeat(400))
            .with_token_budget(250);
        conv.record_exchange("1".repeat(400), "2".repeat(400));

        let (history, compressed) = conv.compressed_history();
        assert!(compressed);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, COMPRESSION_NOTE);
        assert!(history[1].content.starts_with('2'));

        let (messages, _) = conv.build_messages("next");
        let sent: u64 = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
        assert!(sent <= 250 + estimate_tokens(COMPRESSION_NOTE) + estimate_tokens("next"));
    }
}
