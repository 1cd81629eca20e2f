//! Chunked-body emission for the streaming synthesis route.

use bytes::Bytes;

use synth_core::{wav, AudioFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmitState {
    HeaderPending,
    Streaming,
}

/// Two-state emitter for the streaming response body.
///
/// When a header was requested, the first PCM chunk is preceded by a WAV
/// header with a zero payload length, written as its own body segment.  The
/// state transition makes "exactly one header, only if requested, only
/// first" structural: after the first emission the emitter can never yield
/// a header again, and with no chunks it yields nothing at all.
#[derive(Debug)]
pub struct WavChunkEmitter {
    state: EmitState,
    format: AudioFormat,
}

impl WavChunkEmitter {
    pub fn new(format: AudioFormat, with_header: bool) -> Self {
        Self {
            state: if with_header {
                EmitState::HeaderPending
            } else {
                EmitState::Streaming
            },
            format,
        }
    }

    /// Body segments for one quantized PCM chunk, in write order.
    pub fn emit(&mut self, pcm: Vec<u8>) -> Vec<Bytes> {
        match self.state {
            EmitState::HeaderPending => {
                self.state = EmitState::Streaming;
                vec![
                    Bytes::copy_from_slice(&wav::header(self.format, 0)),
                    Bytes::from(pcm),
                ]
            }
            EmitState::Streaming => vec![Bytes::from(pcm)],
        }
    }
}
