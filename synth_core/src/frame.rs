//! Sample-aligned framing of a raw PCM byte stream.
//!
//! Transport chunks arrive with arbitrary boundaries.  The encoder keeps a
//! carry-over buffer and only ever emits frames whose length is an exact
//! multiple of the sample size, so every frame is safe to hand to a
//! playback sink.

use bytes::{Bytes, BytesMut};

use crate::AudioFormat;

/// One sample-aligned slice of PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub data: Bytes,
}

impl AudioFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of complete samples in this frame.
    pub fn samples(&self, format: AudioFormat) -> usize {
        self.data.len() / format.bytes_per_sample()
    }
}

/// Buffering transform from arbitrary byte chunks to [`AudioFrame`]s.
///
/// Owns its carry-over buffer exclusively; one instance per synthesis call,
/// never shared across producers.
#[derive(Debug)]
pub struct FrameEncoder {
    buf: BytesMut,
    bytes_per_sample: usize,
    max_frame_bytes: usize,
}

impl FrameEncoder {
    /// Encoder with the default frame cap of 10 ms of audio.
    pub fn new(format: AudioFormat) -> Self {
        Self::with_frame_samples(format, format.sample_rate as usize / 100)
    }

    /// Encoder capping frames at `samples_per_frame` complete samples.
    pub fn with_frame_samples(format: AudioFormat, samples_per_frame: usize) -> Self {
        let bytes_per_sample = format.bytes_per_sample();
        Self {
            buf: BytesMut::new(),
            bytes_per_sample,
            max_frame_bytes: samples_per_frame.max(1) * bytes_per_sample,
        }
    }

    /// Append a transport chunk and emit every frame that can be formed.
    ///
    /// Each emitted frame is the largest sample-aligned prefix of the buffer,
    /// bounded by the frame cap.  Leftover bytes below one sample stay
    /// buffered for the next call.
    pub fn write(&mut self, chunk: &[u8]) -> Vec<AudioFrame> {
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            let available = self.buf.len().min(self.max_frame_bytes);
            let aligned = available - available % self.bytes_per_sample;
            if aligned == 0 {
                break;
            }
            frames.push(AudioFrame {
                data: self.buf.split_to(aligned).freeze(),
            });
        }
        frames
    }

    /// Emit any remaining complete samples as a final frame.
    ///
    /// A trailing partial sample is dropped silently.  This is lossy by
    /// design: a malformed trailing byte count is not an error.
    pub fn flush(&mut self) -> Option<AudioFrame> {
        let aligned = self.buf.len() - self.buf.len() % self.bytes_per_sample;
        let frame = if aligned == 0 {
            None
        } else {
            Some(AudioFrame {
                data: self.buf.split_to(aligned).freeze(),
            })
        };
        self.buf.clear();
        frame
    }
}
