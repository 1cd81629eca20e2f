//! Transcription collaborator boundary.
//!
//! The recognizer itself is external; this module fixes the contract the
//! pipeline relies on: segment-level no-speech probabilities, and collation
//! that silently drops segments the model considers non-speech.

use async_trait::async_trait;
use thiserror::Error;

/// Segments at or above this no-speech probability contribute no text.
pub const DEFAULT_NO_SPEECH_THRESHOLD: f32 = 0.4;

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    pub no_speech_prob: f32,
}

#[derive(Debug, Error)]
pub enum SttError {
    #[error("transcription connection failed: {0}")]
    Connection(String),
}

/// Model-side interface: a full audio buffer in, scored segments out.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[i16],
        language: Option<&str>,
    ) -> Result<Vec<TranscriptSegment>, SttError>;
}

/// Join segment texts, skipping any segment whose no-speech probability
/// meets or exceeds the threshold.
pub fn collate_transcript(segments: &[TranscriptSegment], no_speech_threshold: f32) -> String {
    let mut text = String::new();
    for segment in segments {
        if segment.no_speech_prob < no_speech_threshold {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(segment.text.trim());
        }
    }
    text
}

/// A recognizer plus its filtering threshold.
pub struct Transcriber<S> {
    model: S,
    no_speech_threshold: f32,
}

impl<S: SpeechToText> Transcriber<S> {
    pub fn new(model: S) -> Self {
        Self::with_threshold(model, DEFAULT_NO_SPEECH_THRESHOLD)
    }

    pub fn with_threshold(model: S, no_speech_threshold: f32) -> Self {
        Self {
            model,
            no_speech_threshold,
        }
    }

    /// Final transcript for a complete audio buffer.
    pub async fn recognize(&self, audio: &[i16], language: Option<&str>) -> Result<String, SttError> {
        let segments = self.model.transcribe(audio, language).await?;
        Ok(collate_transcript(&segments, self.no_speech_threshold))
    }
}
