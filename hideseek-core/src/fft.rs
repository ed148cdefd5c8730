//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns a recorded buffer into a magnitude spectrum for pitch
//! analysis. It handles fixed-length frame extraction, Hann windowing and
//! the forward transform.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per analyzer
//! - Zero padding of short input, centered extraction from long input
//! - Hann windowing for reduced spectral leakage
//! - Magnitudes for the non-negative frequency bins only

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Analysis frame length in samples.
///
/// 8192 samples at 44.1 kHz gives bins roughly 5.4 Hz apart, fine enough to
/// separate neighbouring semitones in the violin's upper range.
pub const FRAME_LENGTH: usize = 8192;

/// Normalizes a buffer to exactly `frame_length` samples.
///
/// Short input is zero padded at the end. Long input is cut to the centered
/// window so onset and release transients are discarded equally from both ends.
pub fn extract_frame(samples: &[f32], frame_length: usize) -> Vec<f32> {
    if samples.len() < frame_length {
        let mut frame = Vec::with_capacity(frame_length);
        frame.extend_from_slice(samples);
        frame.resize(frame_length, 0.0);
        frame
    } else {
        let start = samples.len() / 2 - frame_length / 2;
        samples[start..start + frame_length].to_vec()
    }
}

/// Applies a symmetric Hann window to the buffer in place.
///
/// The window tapers the frame to zero at both edges, which keeps energy
/// from a sine that does not fit the frame exactly from smearing across
/// the whole spectrum.
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Magnitudes of the non-negative frequency bins of one analysis frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    magnitudes: Vec<f32>,
    bin_hz: f32,
}

impl Spectrum {
    pub fn new(magnitudes: Vec<f32>, bin_hz: f32) -> Self {
        Self { magnitudes, bin_hz }
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Spacing between adjacent bins: `sample_rate / frame_length`.
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }

    pub fn frequency_of(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_hz
    }

    /// Index range of the bins whose center frequency lies in `[min_hz, max_hz]`.
    pub fn bins_between(&self, min_hz: f32, max_hz: f32) -> std::ops::Range<usize> {
        let len = self.magnitudes.len();
        let start = (0..len)
            .find(|&b| self.frequency_of(b) >= min_hz)
            .unwrap_or(len);
        let end = (start..len)
            .find(|&b| self.frequency_of(b) > max_hz)
            .unwrap_or(len);
        start..end
    }
}

/// Windowed forward FFT over fixed-length frames, with the plan built once.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    frame_length: usize,
    sample_rate: u32,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("frame_length", &self.frame_length)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(frame_length: usize, sample_rate: u32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_length);
        Self {
            fft,
            frame_length,
            sample_rate,
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    /// Extracts a frame, windows it and returns its magnitude spectrum.
    ///
    /// The spectrum holds `frame_length / 2 + 1` bins, from DC up to Nyquist.
    pub fn analyze(&self, samples: &[f32]) -> Spectrum {
        let mut frame = extract_frame(samples, self.frame_length);
        apply_hann_window(&mut frame);

        let mut buffer: Vec<Complex<f32>> = frame
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);

        let magnitudes = buffer
            .iter()
            .take(self.frame_length / 2 + 1)
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect();

        Spectrum::new(
            magnitudes,
            self.sample_rate as f32 / self.frame_length as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn short_input_is_zero_padded_at_the_end() {
        let frame = extract_frame(&[1.0, 2.0, 3.0], 6);
        assert_eq!(frame, vec![1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn long_input_keeps_the_centered_window() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let frame = extract_frame(&samples, 4);
        assert_eq!(frame, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn hann_window_is_zero_at_edges_and_one_in_the_middle() {
        let mut buffer = vec![1.0; 5];
        apply_hann_window(&mut buffer);
        assert_abs_diff_eq!(buffer[0], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(buffer[2], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(buffer[4], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn spectrum_peaks_at_the_sine_bin() {
        let sample_rate = 8_000;
        let analyzer = SpectrumAnalyzer::new(1024, sample_rate);
        // 1000 Hz sits exactly on bin 128.
        let samples: Vec<f32> = (0..1024)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        let spectrum = analyzer.analyze(&samples);
        assert_eq!(spectrum.magnitudes().len(), 513);
        let (peak_bin, _) = spectrum
            .magnitudes()
            .iter()
            .enumerate()
            .fold((0, 0.0_f32), |best, (i, &m)| if m > best.1 { (i, m) } else { best });
        assert_eq!(peak_bin, 128);
        assert_abs_diff_eq!(spectrum.frequency_of(peak_bin), 1000.0, epsilon = 1e-3);
    }

    #[test]
    fn smallest_frame_still_has_dc_and_nyquist_bins() {
        let spectrum = SpectrumAnalyzer::new(2, 44_100).analyze(&[]);
        assert_eq!(spectrum.magnitudes().len(), 2);
        assert_abs_diff_eq!(spectrum.frequency_of(1), 22_050.0, epsilon = 1e-3);
    }

    #[test]
    fn bins_between_is_inclusive() {
        let spectrum = Spectrum::new(vec![0.0; 11], 10.0);
        assert_eq!(spectrum.bins_between(20.0, 50.0), 2..6);
        assert_eq!(spectrum.bins_between(15.0, 15.0), 2..2);
        assert_eq!(spectrum.bins_between(500.0, 900.0), 11..11);
    }
}
