// hideseek-core/src/lib.rs

//! The core logic for the Hide and Seek ear trainer.
//! This crate is responsible for tone synthesis, pitch detection,
//! note math and device audio I/O. It is completely headless
//! and contains no terminal or game code.

pub mod audio;
pub mod catalog;
pub mod fft;
pub mod peaks;
pub mod pitch;
pub mod synth;
pub mod tuning;

mod error;

pub use catalog::{CatalogNote, NoteCatalog};
pub use error::{AnalysisError, ConfigError, SynthError};
pub use pitch::{Correction, DetectorConfig, PitchDetector, PitchEstimate};
pub use synth::{Envelope, ToneSynthesizer};
pub use tuning::{Tolerance, cents_difference, within_tolerance};

/// Sample rate used for synthesis, recording and analysis unless told otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// A mono block of samples at a fixed sample rate.
///
/// Buffers are immutable once built. Every transformation in this crate
/// takes a buffer by reference or by value and hands back a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// An all-zero buffer of `len` samples.
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the buffer in seconds.
    pub fn duration_s(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Largest absolute sample value, 0.0 for an empty buffer.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Sums `other * gain` onto a copy of this buffer.
    ///
    /// The result is as long as the longer input and keeps this buffer's
    /// sample rate.
    pub fn mixed_with(&self, other: &AudioBuffer, gain: f32) -> AudioBuffer {
        let len = self.samples.len().max(other.samples.len());
        let mut samples = self.samples.clone();
        samples.resize(len, 0.0);
        for (out, s) in samples.iter_mut().zip(&other.samples) {
            *out += s * gain;
        }
        AudioBuffer::new(samples, self.sample_rate)
    }

    /// Appends `other` after this buffer.
    pub fn concat(&self, other: &AudioBuffer) -> AudioBuffer {
        let mut samples = Vec::with_capacity(self.samples.len() + other.samples.len());
        samples.extend_from_slice(&self.samples);
        samples.extend_from_slice(&other.samples);
        AudioBuffer::new(samples, self.sample_rate)
    }
}

/// The physically plausible range of target notes, in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBand {
    min_hz: f32,
    max_hz: f32,
}

impl FrequencyBand {
    /// Creates a band, rejecting anything but finite `0 < min < max`.
    pub fn new(min_hz: f32, max_hz: f32) -> Result<Self, ConfigError> {
        let valid = min_hz.is_finite() && max_hz.is_finite() && min_hz > 0.0 && min_hz < max_hz;
        if !valid {
            return Err(ConfigError::InvalidBand {
                min: min_hz,
                max: max_hz,
            });
        }
        Ok(Self { min_hz, max_hz })
    }

    pub fn min_hz(&self) -> f32 {
        self.min_hz
    }

    pub fn max_hz(&self) -> f32 {
        self.max_hz
    }

    /// Inclusive on both ends.
    pub fn contains(&self, freq: f32) -> bool {
        self.min_hz <= freq && freq <= self.max_hz
    }

    /// Half the minimum to double the maximum, used for harmonic reasoning.
    pub fn extended(&self) -> FrequencyBand {
        FrequencyBand {
            min_hz: self.min_hz * 0.5,
            max_hz: self.max_hz * 2.0,
        }
    }
}

impl Default for FrequencyBand {
    /// The upper range of the violin: 200 - 900 Hz.
    fn default() -> Self {
        Self {
            min_hz: 200.0,
            max_hz: 900.0,
        }
    }
}
