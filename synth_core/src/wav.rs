//! WAV (RIFF) container encoding.
//!
//! The streaming route prefixes its chunked body with a header whose payload
//! length is deliberately zero, so the header is written by hand here; hound
//! only supports finalized files.

use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};

use crate::{pcm, AudioFormat};

pub const HEADER_LEN: usize = 44;

/// Build a 44-byte WAV header describing `format` with a caller-supplied
/// payload length.  Pass zero for the streaming prelude.
pub fn header(format: AudioFormat, data_len: u32) -> [u8; HEADER_LEN] {
    let num_channels = format.channels;
    let bits_per_sample = format.bits_per_sample();
    let byte_rate = format.sample_rate * num_channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = num_channels * (bits_per_sample / 8);
    let riff_size: u32 = 36 + data_len;

    let mut out = [0u8; HEADER_LEN];
    let mut w = &mut out[..];

    fn put(w: &mut &mut [u8], bytes: &[u8]) {
        let (head, rest) = std::mem::take(w).split_at_mut(bytes.len());
        head.copy_from_slice(bytes);
        *w = rest;
    }

    // RIFF header
    put(&mut w, b"RIFF");
    put(&mut w, &riff_size.to_le_bytes());
    put(&mut w, b"WAVE");

    // fmt chunk
    put(&mut w, b"fmt ");
    put(&mut w, &16u32.to_le_bytes());
    put(&mut w, &1u16.to_le_bytes()); // PCM
    put(&mut w, &num_channels.to_le_bytes());
    put(&mut w, &format.sample_rate.to_le_bytes());
    put(&mut w, &byte_rate.to_le_bytes());
    put(&mut w, &block_align.to_le_bytes());
    put(&mut w, &bits_per_sample.to_le_bytes());

    // data chunk
    put(&mut w, b"data");
    put(&mut w, &data_len.to_le_bytes());

    out
}

/// Encode a whole utterance as a finalized WAV file.
pub fn encode_wav(samples: &[f32], format: AudioFormat) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format: hound::SampleFormat::Int,
    };

    let estimated = HEADER_LEN + samples.len() * format.sample_width as usize;
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(estimated));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| anyhow::anyhow!("wav write err: {e}"))?;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(v)
                .map_err(|e| anyhow::anyhow!("wav sample err: {e}"))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("wav finalize err: {e}"))?;
    }
    Ok(cursor.into_inner())
}

/// Whole-utterance WAV, base64-encoded for JSON transport.
pub fn encode_wav_base64(samples: &[f32], format: AudioFormat) -> anyhow::Result<String> {
    Ok(general_purpose::STANDARD.encode(encode_wav(samples, format)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let h = header(AudioFormat::PIPELINE, 0);
        assert_eq!(h.len(), HEADER_LEN);
        assert_eq!(&h[0..4], b"RIFF");
        assert_eq!(&h[8..12], b"WAVE");
        assert_eq!(&h[36..40], b"data");
    }

    #[test]
    fn streaming_header_has_zero_payload_length() {
        let h = header(AudioFormat::PIPELINE, 0);
        assert_eq!(u32::from_le_bytes(h[40..44].try_into().unwrap()), 0);
        assert_eq!(u32::from_le_bytes(h[4..8].try_into().unwrap()), 36);
    }

    #[test]
    fn header_describes_pipeline_format() {
        let h = header(AudioFormat::PIPELINE, 0);
        assert_eq!(u16::from_le_bytes(h[22..24].try_into().unwrap()), 1); // mono
        assert_eq!(u32::from_le_bytes(h[24..28].try_into().unwrap()), 24_000);
        assert_eq!(u16::from_le_bytes(h[34..36].try_into().unwrap()), 16); // bits
    }

    #[test]
    fn header_carries_payload_length() {
        let h = header(AudioFormat::PIPELINE, 2000);
        assert_eq!(u32::from_le_bytes(h[40..44].try_into().unwrap()), 2000);
        assert_eq!(u32::from_le_bytes(h[4..8].try_into().unwrap()), 2036);
    }

    #[test]
    fn encode_wav_matches_handwritten_header() {
        let samples = vec![0.0f32; 100];
        let wav = encode_wav(&samples, AudioFormat::PIPELINE).unwrap();
        assert_eq!(wav.len(), HEADER_LEN + 200);
        let expected = header(AudioFormat::PIPELINE, 200);
        assert_eq!(&wav[..HEADER_LEN], &expected[..]);
    }

    #[test]
    fn encode_wav_payload_is_quantized_samples() {
        let samples = [0.5f32, -0.25, 1.0];
        let wav = encode_wav(&samples, AudioFormat::PIPELINE).unwrap();
        assert_eq!(&wav[HEADER_LEN..], &pcm::quantize_i16le(&samples)[..]);
    }
}
