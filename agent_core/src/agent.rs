//! Warm-up and utterance glue.
//!
//! Fetches the voice catalog once at process warm-up, speaks a greeting
//! after a short startup delay, and runs the say loop that plays queued
//! utterances through the synthesis pipeline one at a time.

use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use synth_core::frame::AudioFrame;

use crate::tts::{TtsClient, TtsError};

pub const GREETING: &str = "Hi there, how are you doing today?";

/// Delay before the first proactive utterance.
pub const STARTUP_DELAY: Duration = Duration::from_secs(3);

/// Voice identifiers known to the synthesis server, fetched once at warm-up
/// and read-only for the session lifetime.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    ids: Vec<String>,
}

/// One voice as presented to a UI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VoiceListing {
    pub id: String,
    pub name: String,
}

impl VoiceCatalog {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|v| v == id)
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Voices as `{id, name}` pairs, sorted by name for display.
    pub fn listing(&self) -> Vec<VoiceListing> {
        let mut voices: Vec<VoiceListing> = self
            .ids
            .iter()
            .map(|id| VoiceListing {
                id: id.clone(),
                name: id.clone(),
            })
            .collect();
        voices.sort_by(|a, b| a.name.cmp(&b.name));
        voices
    }
}

/// Fetch the voice catalog from the synthesis server.  Called once at
/// warm-up; on failure the caller is expected to continue without a catalog
/// (every voice-change request is then rejected).
pub async fn fetch_voice_catalog(
    http: &reqwest::Client,
    endpoint: &str,
) -> Result<VoiceCatalog, TtsError> {
    let resp = http
        .get(format!("{endpoint}/studio_speakers"))
        .send()
        .await
        .map_err(|e| TtsError::Connection(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(TtsError::Status {
            code: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }

    let ids: Vec<String> = resp
        .json()
        .await
        .map_err(|e| TtsError::Connection(e.to_string()))?;
    info!(voices = ids.len(), "fetched voice catalog");
    Ok(VoiceCatalog::new(ids))
}

/// Enqueue the greeting after the fixed startup delay.
pub async fn speak_greeting(say_tx: &mpsc::UnboundedSender<String>) {
    tokio::time::sleep(STARTUP_DELAY).await;
    let _ = say_tx.send(GREETING.to_string());
}

/// Play queued utterances one at a time.
///
/// Frames of each synthesis call are forwarded to the playback sink in
/// arrival order.  A failed call yields silence for that utterance and the
/// loop continues on the next one; frames already forwarded stay played.
pub async fn run_say_loop(
    tts: TtsClient,
    mut say_rx: mpsc::UnboundedReceiver<String>,
    sink: mpsc::Sender<AudioFrame>,
) {
    while let Some(text) = say_rx.recv().await {
        let mut stream = tts.synthesize(&text);
        while let Some(item) = stream.next().await {
            match item {
                Ok(frame) => {
                    if sink.send(frame).await.is_err() {
                        // Playback side is gone, stop the loop.
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "synthesis failed, utterance dropped");
                    break;
                }
            }
        }
    }
}
