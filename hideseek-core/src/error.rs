//! # Error Module
//!
//! Typed errors for the core crate. Configuration problems are fatal and
//! surface at construction time; analysis problems never leave the
//! detector and are only logged.

use thiserror::Error;

/// Invalid configuration, detected eagerly when a value is constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Band bounds must be finite with `0 < min < max`.
    #[error("invalid frequency band: {min} - {max} Hz")]
    InvalidBand { min: f32, max: f32 },

    /// Tolerance must be a positive number of cents.
    #[error("invalid tolerance: {0} cents (must be > 0)")]
    InvalidTolerance(f32),

    /// A note catalog needs at least one entry.
    #[error("note catalog is empty")]
    EmptyCatalog,

    /// A catalog entry carries a non-positive or non-finite frequency.
    #[error("invalid frequency {frequency} Hz for note {name}")]
    InvalidNoteFrequency { name: String, frequency: f32 },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// The analysis frame must be long enough to hold a spectrum.
    #[error("invalid analysis frame length: {0}")]
    InvalidFrameLength(usize),

    /// A detector threshold or tolerance that is not a positive number.
    #[error("invalid detector parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("unknown note name: {0}")]
    UnknownNote(String),

    #[error("invalid scale file: {0}")]
    InvalidScaleFile(String),
}

/// Rejected synthesis input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    #[error("invalid frequency: {0} Hz")]
    InvalidFrequency(f32),

    #[error("invalid duration: {0} s")]
    InvalidDuration(f32),

    /// Volume must lie in `(0, 1]`.
    #[error("invalid volume factor: {0}")]
    InvalidVolume(f32),

    #[error("invalid envelope {name}: {value}")]
    InvalidEnvelope { name: &'static str, value: f32 },
}

/// Numerical failure inside the detector. Never returned to callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("spectrum contains non-finite magnitudes")]
    NonFiniteSpectrum,

    /// The buffer was not recorded at the rate the detector was built for.
    #[error("buffer sample rate {actual} Hz does not match detector rate {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },
}
