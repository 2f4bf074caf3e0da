//! PCM audio helpers shared by the telephony and speech sides of a call.

pub mod resample;

pub use resample::{bytes_to_samples, resample_pcm16, resample_samples, samples_to_bytes};
