use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Result of a speech synthesis call.
///
/// Vendors return encoded audio; text-only fallbacks return no audio and
/// only the transcript that was rendered in its place.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Utterance {
    #[serde(skip)]
    pub audio: Option<Bytes>,
    /// Container/codec of `audio`, e.g. `mp3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub transcript: String,
}

impl Utterance {
    pub fn audio(audio: impl Into<Bytes>, format: impl Into<String>, transcript: impl Into<String>) -> Self {
        Self {
            audio: Some(audio.into()),
            format: Some(format.into()),
            transcript: transcript.into(),
        }
    }

    pub fn text_only(transcript: impl Into<String>) -> Self {
        Self {
            audio: None,
            format: None,
            transcript: transcript.into(),
        }
    }

    pub fn has_audio(&self) -> bool {
        self.audio.as_ref().is_some_and(|a| !a.is_empty())
    }
}
