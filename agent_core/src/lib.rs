//! Conversation-agent side of the voice pipeline: the streaming synthesis
//! client, the speaking-state coordinator, the transcription boundary, and
//! the glue that drives scheduled utterances into a playback sink.

pub mod agent;
pub mod coordinator;
pub mod stt;
pub mod tts;

pub use agent::{
    fetch_voice_catalog, run_say_loop, speak_greeting, VoiceCatalog, VoiceListing, GREETING,
    STARTUP_DELAY,
};
pub use coordinator::{Participant, ParticipantKind, SpeakingEvent, VoiceCoordinator, CONFIRMATION_PHRASE};
pub use stt::{collate_transcript, SpeechToText, SttError, Transcriber, TranscriptSegment};
pub use tts::{ConnOptions, FrameStream, TtsClient, TtsError, TtsOptions};
