//! Linear-interpolation resampling for 16-bit little-endian mono PCM.
//!
//! The output length is always `floor(N * target / source)` samples, and each
//! output sample is interpolated between the two nearest input samples. The
//! function is pure and deterministic for identical input.

/// Decode little-endian 16-bit PCM bytes into samples.
///
/// A trailing odd byte (half a sample) is ignored.
pub fn bytes_to_samples(data: &[u8]) -> Vec<i16> {
    data.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples back into little-endian 16-bit PCM bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Resample a slice of PCM16 samples from `source_rate` to `target_rate`.
///
/// Returns the input unchanged when the rates match or either rate is zero.
pub fn resample_samples(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 || samples.is_empty() {
        return samples.to_vec();
    }

    let new_len = (samples.len() as u64 * target_rate as u64 / source_rate as u64) as usize;
    let step = source_rate as f64 / target_rate as f64;
    let last = samples.len() - 1;

    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let position = i as f64 * step;
        let idx0 = (position.floor() as usize).min(last);
        let idx1 = (idx0 + 1).min(last);
        let frac = position - idx0 as f64;

        let value = samples[idx0] as f64 * (1.0 - frac) + samples[idx1] as f64 * frac;
        output.push(value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
    }

    output
}

/// Resample a PCM16 byte buffer from `source_rate` to `target_rate`.
///
/// # Example
///
/// ```
/// use voice_call_gateway::core::audio::resample_pcm16;
///
/// let pcm = vec![0u8; 480 * 2]; // 20ms at 24kHz
/// let out = resample_pcm16(&pcm, 24000, 16000);
/// assert_eq!(out.len(), 320 * 2);
/// ```
pub fn resample_pcm16(data: &[u8], source_rate: u32, target_rate: u32) -> Vec<u8> {
    if source_rate == target_rate {
        return data.to_vec();
    }
    let samples = bytes_to_samples(data);
    samples_to_bytes(&resample_samples(&samples, source_rate, target_rate))
}
