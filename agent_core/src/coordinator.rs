//! Speaking-state coordination.
//!
//! Arbitrates a live voice-change request against the ongoing conversation:
//! the change itself is applied immediately, but the spoken confirmation is
//! gated on nobody holding the conversational floor.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::agent::VoiceCatalog;
use crate::tts::TtsClient;

pub const CONFIRMATION_PHRASE: &str = "How do I sound now?";

/// Turn-taking events emitted by the pipeline agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakingEvent {
    UserStartedSpeaking,
    UserStoppedSpeaking,
    AgentStartedSpeaking,
    AgentStoppedSpeaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantKind {
    Standard,
    Agent,
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub identity: String,
    pub kind: ParticipantKind,
}

#[derive(Debug, Default, Clone, Copy)]
struct SpeakingState {
    user_speaking: bool,
    agent_speaking: bool,
}

/// Reactive subscriber over the turn-taking events plus a gating read at the
/// voice-change decision point.
///
/// Both flags live behind one mutex and the decision reads them in a single
/// acquisition, so the gate never observes a torn pair.
pub struct VoiceCoordinator {
    catalog: VoiceCatalog,
    tts: TtsClient,
    state: Mutex<SpeakingState>,
    say_tx: mpsc::UnboundedSender<String>,
}

impl VoiceCoordinator {
    pub fn new(catalog: VoiceCatalog, tts: TtsClient, say_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            catalog,
            tts,
            state: Mutex::new(SpeakingState::default()),
            say_tx,
        }
    }

    pub fn handle_speaking_event(&self, event: SpeakingEvent) {
        let mut state = self.state.lock().unwrap();
        match event {
            SpeakingEvent::UserStartedSpeaking => state.user_speaking = true,
            SpeakingEvent::UserStoppedSpeaking => state.user_speaking = false,
            SpeakingEvent::AgentStartedSpeaking => state.agent_speaking = true,
            SpeakingEvent::AgentStoppedSpeaking => state.agent_speaking = false,
        }
    }

    /// Entry point for participant attribute changes.  Only a "voice" key
    /// set by a standard participant is acted on.
    pub fn handle_attributes_changed(
        &self,
        changed: &HashMap<String, String>,
        participant: &Participant,
    ) {
        if participant.kind != ParticipantKind::Standard {
            return;
        }
        let Some(voice_id) = changed.get("voice") else {
            return;
        };
        info!(
            identity = %participant.identity,
            voice = %voice_id,
            "participant requested voice change"
        );
        if voice_id.is_empty() {
            return;
        }
        self.request_voice_change(voice_id);
    }

    /// Apply a voice change and, if nobody is speaking, schedule the spoken
    /// confirmation.
    ///
    /// An identifier absent from the catalog is ignored entirely; the
    /// mutable voice option is left untouched.  A valid change always takes
    /// effect for the next synthesis call, speaking state only gates whether
    /// it is announced.
    pub fn request_voice_change(&self, voice_id: &str) {
        if !self.catalog.contains(voice_id) {
            warn!(voice = %voice_id, "voice not found, ignoring change request");
            return;
        }

        self.tts.set_voice(voice_id);

        let state = self.state.lock().unwrap();
        if !state.user_speaking && !state.agent_speaking {
            // Spoken through the normal pipeline, interruptible by the user.
            let _ = self.say_tx.send(CONFIRMATION_PHRASE.to_string());
        } else {
            info!(voice = %voice_id, "voice changed silently, conversation in progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::TtsOptions;

    fn setup() -> (VoiceCoordinator, mpsc::UnboundedReceiver<String>) {
        let catalog = VoiceCatalog::new(vec!["norman".into(), "thorsten".into(), "eva".into()]);
        let tts = TtsClient::new(TtsOptions::default());
        let (say_tx, say_rx) = mpsc::unbounded_channel();
        (VoiceCoordinator::new(catalog, tts, say_tx), say_rx)
    }

    #[tokio::test]
    async fn valid_change_while_idle_confirms() {
        let (coord, mut say_rx) = setup();

        coord.request_voice_change("thorsten");

        assert_eq!(coord.tts.voice(), "thorsten");
        assert_eq!(say_rx.recv().await.unwrap(), CONFIRMATION_PHRASE);
    }

    #[tokio::test]
    async fn valid_change_while_user_speaking_is_silent() {
        let (coord, mut say_rx) = setup();

        coord.handle_speaking_event(SpeakingEvent::UserStartedSpeaking);
        coord.request_voice_change("thorsten");
        coord.handle_speaking_event(SpeakingEvent::UserStoppedSpeaking);

        // The voice is updated regardless of speaking state.
        assert_eq!(coord.tts.voice(), "thorsten");
        // No confirmation at the change, and none queued after the user
        // stops; the change stays silent until the next natural utterance.
        assert!(say_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn valid_change_while_agent_speaking_is_silent() {
        let (coord, mut say_rx) = setup();

        coord.handle_speaking_event(SpeakingEvent::AgentStartedSpeaking);
        coord.request_voice_change("eva");

        assert_eq!(coord.tts.voice(), "eva");
        assert!(say_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn agent_stop_reopens_the_gate() {
        let (coord, mut say_rx) = setup();

        coord.handle_speaking_event(SpeakingEvent::AgentStartedSpeaking);
        coord.handle_speaking_event(SpeakingEvent::AgentStoppedSpeaking);
        coord.request_voice_change("thorsten");

        assert_eq!(say_rx.recv().await.unwrap(), CONFIRMATION_PHRASE);
    }

    #[tokio::test]
    async fn unknown_voice_is_ignored() {
        let (coord, mut say_rx) = setup();

        coord.request_voice_change("nobody");

        assert_eq!(coord.tts.voice(), TtsOptions::default().voice);
        assert!(say_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn attribute_change_from_agent_participant_is_ignored() {
        let (coord, mut say_rx) = setup();

        let mut changed = HashMap::new();
        changed.insert("voice".to_string(), "thorsten".to_string());
        let participant = Participant {
            identity: "assistant".into(),
            kind: ParticipantKind::Agent,
        };
        coord.handle_attributes_changed(&changed, &participant);

        assert_eq!(coord.tts.voice(), TtsOptions::default().voice);
        assert!(say_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn attribute_change_acts_on_voice_key_only() {
        let (coord, mut say_rx) = setup();

        let mut changed = HashMap::new();
        changed.insert("avatar".to_string(), "thorsten".to_string());
        let participant = Participant {
            identity: "user-1".into(),
            kind: ParticipantKind::Standard,
        };
        coord.handle_attributes_changed(&changed, &participant);
        assert!(say_rx.try_recv().is_err());

        changed.insert("voice".to_string(), "thorsten".to_string());
        coord.handle_attributes_changed(&changed, &participant);
        assert_eq!(coord.tts.voice(), "thorsten");
        assert_eq!(say_rx.recv().await.unwrap(), CONFIRMATION_PHRASE);
    }

    #[tokio::test]
    async fn empty_voice_value_is_ignored() {
        let (coord, mut say_rx) = setup();

        let mut changed = HashMap::new();
        changed.insert("voice".to_string(), String::new());
        let participant = Participant {
            identity: "user-1".into(),
            kind: ParticipantKind::Standard,
        };
        coord.handle_attributes_changed(&changed, &participant);

        assert_eq!(coord.tts.voice(), TtsOptions::default().voice);
        assert!(say_rx.try_recv().is_err());
    }
}
