//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a short monophonic
//! recording. It is tuned for bowed and sung tones near the edge of an
//! instrument's range, where the second harmonic often carries more energy
//! than the fundamental.
//!
//! ## Pipeline
//! 1. Centered fixed-length frame, Hann window, magnitude spectrum
//! 2. Restrict to the extended band (half the minimum to double the maximum)
//! 3. Peak picking with a height floor and a minimum bin distance
//! 4. Walk the peaks tallest first through an ordered list of rules:
//!    - noise floor: skip peaks that barely clear the band average
//!    - nominal band: a peak inside the target band is the answer
//!    - harmonic partner: a peak at half a catalog note, with that note
//!      also present, reports the catalog note
//!    - octave error: a low peak at half one of the highest catalog notes,
//!      with that note present, reports the high note

use std::ops::Range;

use log::{Level, log, warn};

use crate::fft::{FRAME_LENGTH, Spectrum, SpectrumAnalyzer};
use crate::peaks::{Peak, find_peaks, sort_by_magnitude};
use crate::{AnalysisError, AudioBuffer, ConfigError, DEFAULT_SAMPLE_RATE, FrequencyBand, NoteCatalog};

/// Tunable constants of the detector.
///
/// The three magnitude factors (noise floor, harmonic partner, octave error)
/// are kept separate on purpose; their values are empirical.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub sample_rate: u32,
    /// Analysis frame length in samples.
    pub frame_length: usize,
    /// Peaks must reach this fraction of the band's tallest bin.
    pub peak_height_fraction: f32,
    /// Minimum separation between peaks, in bins.
    pub min_peak_distance: usize,
    /// A peak below `noise_floor_factor * mean` is skipped.
    pub noise_floor_factor: f32,
    /// The full-frequency partner must exceed `harmonic_factor * mean`.
    pub harmonic_factor: f32,
    /// How close a peak must sit to half a catalog note, in Hz.
    pub harmonic_tolerance_hz: f32,
    /// The high note must exceed `octave_factor * mean`.
    pub octave_factor: f32,
    pub octave_tolerance_hz: f32,
    /// Octave correction only looks at peaks below this fraction of the band maximum.
    pub octave_ceiling_fraction: f32,
    /// How many of the highest catalog notes are eligible for octave correction.
    pub octave_candidates: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_length: FRAME_LENGTH,
            peak_height_fraction: 0.05,
            min_peak_distance: 10,
            noise_floor_factor: 1.5,
            harmonic_factor: 1.0,
            harmonic_tolerance_hz: 10.0,
            octave_factor: 0.8,
            octave_tolerance_hz: 20.0,
            octave_ceiling_fraction: 0.6,
            octave_candidates: 3,
        }
    }
}

impl DetectorConfig {
    /// Checks every field, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.frame_length < 2 {
            return Err(ConfigError::InvalidFrameLength(self.frame_length));
        }
        if self.min_peak_distance == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "min_peak_distance",
                value: 0.0,
            });
        }
        let positive = [
            ("peak_height_fraction", self.peak_height_fraction),
            ("noise_floor_factor", self.noise_floor_factor),
            ("harmonic_factor", self.harmonic_factor),
            ("harmonic_tolerance_hz", self.harmonic_tolerance_hz),
            ("octave_factor", self.octave_factor),
            ("octave_tolerance_hz", self.octave_tolerance_hz),
            ("octave_ceiling_fraction", self.octave_ceiling_fraction),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        if self.peak_height_fraction >= 1.0 {
            return Err(ConfigError::InvalidParameter {
                name: "peak_height_fraction",
                value: self.peak_height_fraction,
            });
        }
        Ok(())
    }
}

/// Which rule produced an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// The peak itself lay inside the nominal band.
    Direct,
    /// The peak sat at half a catalog note whose own bin was present.
    HarmonicPartner,
    /// A low peak was taken as the lower octave of a high catalog note.
    OctaveError,
}

/// A confident fundamental frequency estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchEstimate {
    /// Estimated fundamental, always positive and finite.
    pub frequency_hz: f32,
    /// Magnitude of the spectral peak that led to the estimate.
    pub magnitude: f32,
    pub correction: Correction,
}

/// The slice of a spectrum covered by the extended band, with its statistics.
struct BandView<'a> {
    spectrum: &'a Spectrum,
    bins: Range<usize>,
    mean: f32,
    max: f32,
}

impl<'a> BandView<'a> {
    fn new(spectrum: &'a Spectrum, band: &FrequencyBand) -> Option<Self> {
        let bins = spectrum.bins_between(band.min_hz(), band.max_hz());
        if bins.is_empty() {
            return None;
        }
        let magnitudes = &spectrum.magnitudes()[bins.clone()];
        let mean = magnitudes.iter().sum::<f32>() / magnitudes.len() as f32;
        let max = magnitudes.iter().fold(0.0_f32, |acc, &m| acc.max(m));
        Some(Self {
            spectrum,
            bins,
            mean,
            max,
        })
    }

    fn magnitudes(&self) -> &[f32] {
        &self.spectrum.magnitudes()[self.bins.clone()]
    }

    fn frequency(&self, local: usize) -> f32 {
        self.spectrum.frequency_of(self.bins.start + local)
    }

    /// Magnitude of the in-band bin whose frequency is closest to `freq`.
    fn magnitude_near(&self, freq: f32) -> f32 {
        let magnitudes = self.magnitudes();
        (0..magnitudes.len())
            .min_by(|&a, &b| {
                let da = (self.frequency(a) - freq).abs();
                let db = (self.frequency(b) - freq).abs();
                da.total_cmp(&db)
            })
            .map_or(0.0, |i| magnitudes[i])
    }
}

/// Rejects peaks that are not clearly above the band's average magnitude.
fn clears_noise_floor(magnitude: f32, mean: f32, factor: f32) -> bool {
    magnitude >= mean * factor
}

/// True when `freq` lies within `tolerance_hz` of half of `target`.
fn near_half_of(freq: f32, target: f32, tolerance_hz: f32) -> bool {
    (freq - target / 2.0).abs() < tolerance_hz
}

/// Harmonic correction: the peak is the undertone of a catalog note whose
/// own bin is above `threshold`. Returns the first such catalog note.
fn harmonic_partner(
    freq: f32,
    targets: &[f32],
    tolerance_hz: f32,
    threshold: f32,
    magnitude_at: impl Fn(f32) -> f32,
) -> Option<f32> {
    targets
        .iter()
        .copied()
        .filter(|&target| near_half_of(freq, target, tolerance_hz))
        .find(|&target| magnitude_at(target) > threshold)
}

/// Octave-error correction for high notes: only peaks below `ceiling_hz`
/// are considered, and only the given high notes.
fn octave_error(
    freq: f32,
    ceiling_hz: f32,
    high_notes: &[f32],
    tolerance_hz: f32,
    threshold: f32,
    magnitude_at: impl Fn(f32) -> f32,
) -> Option<f32> {
    if freq >= ceiling_hz {
        return None;
    }
    harmonic_partner(freq, high_notes, tolerance_hz, threshold, magnitude_at)
}

/// FFT-based fundamental frequency detector for a fixed note catalog.
#[derive(Debug)]
pub struct PitchDetector {
    config: DetectorConfig,
    targets: Vec<f32>,
    high_notes: Vec<f32>,
    analyzer: SpectrumAnalyzer,
}

impl PitchDetector {
    /// Validates the configuration and plans the transform.
    pub fn new(config: DetectorConfig, catalog: &NoteCatalog) -> Result<Self, ConfigError> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(Self::build(config, catalog))
    }

    fn build(config: DetectorConfig, catalog: &NoteCatalog) -> Self {
        let targets: Vec<f32> = catalog.frequencies().collect();
        // Checked in ascending order, lowest eligible note first.
        let mut high_notes = catalog.highest(config.octave_candidates);
        high_notes.reverse();
        let analyzer = SpectrumAnalyzer::new(config.frame_length, config.sample_rate);
        Self {
            config,
            targets,
            high_notes,
            analyzer,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Frequency spacing of the analysis bins.
    pub fn resolution_hz(&self) -> f32 {
        self.config.sample_rate as f32 / self.config.frame_length as f32
    }

    /// Estimates the fundamental of `buffer`, expected to lie in `band`.
    ///
    /// Returns `None` when no peak is confident enough. Numerical failures
    /// are logged and reported the same way. With `debug` set every
    /// decision is logged at debug level, otherwise at trace level.
    pub fn detect(&self, buffer: &AudioBuffer, band: &FrequencyBand, debug: bool) -> Option<PitchEstimate> {
        if buffer.is_empty() {
            return None;
        }
        let level = if debug { Level::Debug } else { Level::Trace };
        match self.analyze(buffer, band, level) {
            Ok(estimate) => estimate,
            Err(err) => {
                warn!("[PITCH] Analysis failed, reporting no pitch: {}", err);
                None
            }
        }
    }

    fn analyze(
        &self,
        buffer: &AudioBuffer,
        band: &FrequencyBand,
        level: Level,
    ) -> Result<Option<PitchEstimate>, AnalysisError> {
        if buffer.sample_rate() != self.config.sample_rate {
            return Err(AnalysisError::SampleRateMismatch {
                expected: self.config.sample_rate,
                actual: buffer.sample_rate(),
            });
        }

        let spectrum = self.analyzer.analyze(buffer.samples());
        if spectrum.magnitudes().iter().any(|m| !m.is_finite()) {
            return Err(AnalysisError::NonFiniteSpectrum);
        }

        let extended = band.extended();
        log!(
            level,
            "[PITCH] Audio length: {}, frame length: {}",
            buffer.len(),
            self.analyzer.frame_length()
        );
        log!(
            level,
            "[PITCH] Frequency range: {:.1} - {:.1} Hz",
            extended.min_hz(),
            extended.max_hz()
        );

        let Some(view) = BandView::new(&spectrum, &extended) else {
            log!(level, "[PITCH] Extended band holds no bins");
            return Ok(None);
        };
        log!(level, "[PITCH] Max magnitude: {:.2}, mean: {:.2}", view.max, view.mean);

        let mut peaks = find_peaks(
            view.magnitudes(),
            view.max * self.config.peak_height_fraction,
            self.config.min_peak_distance,
        );
        log!(level, "[PITCH] Found {} peaks", peaks.len());
        if peaks.is_empty() {
            return Ok(None);
        }

        // Logged in bin order, before ranking.
        for (n, peak) in peaks.iter().take(5).enumerate() {
            log!(
                level,
                "[PITCH] Peak {}: {:.1} Hz, magnitude: {:.2}",
                n + 1,
                view.frequency(peak.index),
                peak.magnitude
            );
        }
        sort_by_magnitude(&mut peaks);

        let estimate = peaks
            .iter()
            .find_map(|peak| self.evaluate_peak(peak, &view, band, level));
        if estimate.is_none() {
            log!(level, "[PITCH] No valid pitch found");
        }
        Ok(estimate)
    }

    /// Runs one peak through the rule list, first match wins.
    fn evaluate_peak(
        &self,
        peak: &Peak,
        view: &BandView<'_>,
        band: &FrequencyBand,
        level: Level,
    ) -> Option<PitchEstimate> {
        let freq = view.frequency(peak.index);
        let estimate = |frequency_hz, correction| {
            Some(PitchEstimate {
                frequency_hz,
                magnitude: peak.magnitude,
                correction,
            })
        };

        if !clears_noise_floor(peak.magnitude, view.mean, self.config.noise_floor_factor) {
            log!(level, "[PITCH] {:.1} Hz too weak, skipping", freq);
            return None;
        }

        if band.contains(freq) {
            log!(level, "[PITCH] {:.1} Hz is inside the target band", freq);
            return estimate(freq, Correction::Direct);
        }

        let magnitude_at = |target: f32| view.magnitude_near(target);

        if let Some(target) = harmonic_partner(
            freq,
            &self.targets,
            self.config.harmonic_tolerance_hz,
            view.mean * self.config.harmonic_factor,
            magnitude_at,
        ) {
            log!(level, "[PITCH] Harmonic correction: {:.1} Hz -> {:.1} Hz", freq, target);
            return estimate(target, Correction::HarmonicPartner);
        }

        if let Some(target) = octave_error(
            freq,
            band.max_hz() * self.config.octave_ceiling_fraction,
            &self.high_notes,
            self.config.octave_tolerance_hz,
            view.mean * self.config.octave_factor,
            magnitude_at,
        ) {
            log!(level, "[PITCH] Octave error correction: {:.1} Hz -> {:.1} Hz", freq, target);
            return estimate(target, Correction::OctaveError);
        }

        log!(level, "[PITCH] {:.1} Hz matched no rule", freq);
        None
    }
}

impl Default for PitchDetector {
    /// Default configuration over the A major scale.
    fn default() -> Self {
        Self::build(DetectorConfig::default(), &NoteCatalog::a_major())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToneSynthesizer;
    use approx::assert_abs_diff_eq;

    const A_MAJOR: [f32; 8] = [440.0, 493.9, 554.4, 587.3, 659.3, 740.0, 830.6, 880.0];

    #[test]
    fn noise_floor_rule() {
        assert!(clears_noise_floor(1.5, 1.0, 1.5));
        assert!(!clears_noise_floor(1.49, 1.0, 1.5));
    }

    #[test]
    fn harmonic_partner_needs_both_proximity_and_partner_energy() {
        let strong = |_: f32| 10.0;
        let weak = |_: f32| 0.5;
        assert_eq!(harmonic_partner(441.0, &A_MAJOR, 10.0, 1.0, strong), Some(880.0));
        assert_eq!(harmonic_partner(441.0, &A_MAJOR, 10.0, 1.0, weak), None);
        // 455 Hz is 15 Hz from 440, outside the 10 Hz window.
        assert_eq!(harmonic_partner(455.0, &A_MAJOR, 10.0, 1.0, strong), None);
    }

    #[test]
    fn harmonic_partner_checks_catalog_order() {
        // 247 Hz is near half of B4 only.
        let only_b4 = |f: f32| if (f - 493.9).abs() < 0.5 { 5.0 } else { 0.0 };
        assert_eq!(harmonic_partner(247.0, &A_MAJOR, 10.0, 1.0, only_b4), Some(493.9));
    }

    #[test]
    fn octave_error_respects_the_ceiling() {
        let high = [740.0, 830.6, 880.0];
        let present = |_: f32| 1.0;
        assert_eq!(octave_error(430.0, 540.0, &high, 20.0, 0.8, present), Some(830.6));
        assert_eq!(octave_error(430.0, 400.0, &high, 20.0, 0.8, present), None);
        assert_eq!(octave_error(430.0, 540.0, &high, 20.0, 1.2, present), None);
    }

    #[test]
    fn config_validation_rejects_bad_values() {
        assert!(DetectorConfig::default().validate().is_ok());
        let bad_rate = DetectorConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert_eq!(bad_rate.validate(), Err(ConfigError::InvalidSampleRate(0)));
        let bad_frame = DetectorConfig {
            frame_length: 1,
            ..Default::default()
        };
        assert_eq!(bad_frame.validate(), Err(ConfigError::InvalidFrameLength(1)));
        let bad_factor = DetectorConfig {
            octave_factor: -0.8,
            ..Default::default()
        };
        assert!(matches!(
            bad_factor.validate(),
            Err(ConfigError::InvalidParameter {
                name: "octave_factor",
                ..
            })
        ));
        let bad_fraction = DetectorConfig {
            peak_height_fraction: 1.0,
            ..Default::default()
        };
        assert!(bad_fraction.validate().is_err());
    }

    #[test]
    fn new_rejects_invalid_config() {
        let config = DetectorConfig {
            min_peak_distance: 0,
            ..Default::default()
        };
        assert!(PitchDetector::new(config, &NoteCatalog::a_major()).is_err());
    }

    #[test]
    fn detects_a_pure_tone_inside_the_band() {
        let detector = PitchDetector::default();
        let synth = ToneSynthesizer::new(DEFAULT_SAMPLE_RATE);
        let tone = synth.sine(587.3, 1.0).unwrap();
        let estimate = detector
            .detect(&tone, &FrequencyBand::default(), true)
            .unwrap();
        assert_eq!(estimate.correction, Correction::Direct);
        assert_abs_diff_eq!(estimate.frequency_hz, 587.3, epsilon = detector.resolution_hz());
    }

    #[test]
    fn empty_and_silent_buffers_give_no_estimate() {
        let detector = PitchDetector::default();
        let band = FrequencyBand::default();
        assert!(detector.detect(&AudioBuffer::silence(0, DEFAULT_SAMPLE_RATE), &band, false).is_none());
        for len in [1, 100, 8192, 44_100] {
            let silence = AudioBuffer::silence(len, DEFAULT_SAMPLE_RATE);
            assert!(detector.detect(&silence, &band, false).is_none());
        }
    }

    #[test]
    fn non_finite_input_is_downgraded_to_no_estimate() {
        let detector = PitchDetector::default();
        let mut samples = vec![0.0; 8192];
        samples[4096] = f32::NAN;
        let buffer = AudioBuffer::new(samples, DEFAULT_SAMPLE_RATE);
        assert!(detector.detect(&buffer, &FrequencyBand::default(), false).is_none());
    }

    #[test]
    fn mismatched_sample_rate_gives_no_estimate() {
        let detector = PitchDetector::default();
        let tone = ToneSynthesizer::new(48_000).sine(440.0, 1.0).unwrap();
        assert!(detector.detect(&tone, &FrequencyBand::default(), false).is_none());
    }

    #[test]
    fn smallest_valid_frame_reports_no_pitch() {
        let config = DetectorConfig {
            frame_length: 2,
            ..Default::default()
        };
        let detector = PitchDetector::new(config, &NoteCatalog::a_major()).unwrap();
        let tone = ToneSynthesizer::new(DEFAULT_SAMPLE_RATE).sine(440.0, 0.1).unwrap();
        assert!(detector.detect(&tone, &FrequencyBand::default(), true).is_none());
    }

    #[test]
    fn weak_fundamental_with_strong_undertone_reports_the_catalog_note() {
        let detector = PitchDetector::default();
        let synth = ToneSynthesizer::new(DEFAULT_SAMPLE_RATE);
        let undertone = synth.sine(440.0, 1.0).unwrap();
        let target = synth.sine(880.0, 1.0).unwrap();
        let buffer = undertone.mixed_with(&target, 0.4);
        let band = FrequencyBand::new(500.0, 900.0).unwrap();

        let estimate = detector.detect(&buffer, &band, true).unwrap();
        assert_eq!(estimate.correction, Correction::HarmonicPartner);
        assert_eq!(estimate.frequency_hz, 880.0);
    }
}
