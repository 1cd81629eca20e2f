//! Quantization of model output to the pipeline wire format.

/// Convert f32 samples to 16-bit signed little-endian PCM, clipping to the
/// valid amplitude range [-1, 1] before quantization.
pub fn quantize_i16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantizes_full_scale() {
        assert_eq!(quantize_i16le(&[1.0]), i16::MAX.to_le_bytes());
        assert_eq!(quantize_i16le(&[-1.0]), (-i16::MAX).to_le_bytes());
        assert_eq!(quantize_i16le(&[0.0]), [0, 0]);
    }

    #[test]
    fn clips_out_of_range_amplitudes() {
        assert_eq!(quantize_i16le(&[3.5]), quantize_i16le(&[1.0]));
        assert_eq!(quantize_i16le(&[-7.0]), quantize_i16le(&[-1.0]));
    }

    #[test]
    fn output_is_two_bytes_per_sample() {
        let pcm = quantize_i16le(&[0.1, 0.2, 0.3]);
        assert_eq!(pcm.len(), 6);
    }

    #[test]
    fn output_is_little_endian() {
        // 0.5 * 32767 truncates to 16383 = 0x3FFF.
        assert_eq!(quantize_i16le(&[0.5]), [0xFF, 0x3F]);
    }
}
