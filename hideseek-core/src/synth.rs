//! # Tone Synthesis Module
//!
//! Reference tones for the game and the short cue sounds played around
//! each attempt. Every generator works at the synthesizer's sample rate and
//! keeps its output inside `[-1, 1]`; the cue presets scale to a caller
//! volume so nothing clips on the way to the output device.
//!
//! ## Cues
//! - water drop: rising sweep with two harmonics, played on a correct answer
//! - click: enveloped noise, played when recording starts
//! - cheer: a cluster of bright partials plus noise, played when a game is won

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::{AudioBuffer, SynthError};

/// Relative weights of the fundamental, 2nd and 3rd harmonic in a sweep.
const SWEEP_HARMONICS: [f64; 3] = [1.0, 0.3, 0.1];

/// Fixed partials of the cheer cue, in Hz.
const CHEER_PARTIALS: [f64; 9] = [800.0, 1000.0, 1250.0, 1500.0, 1900.0, 2300.0, 2800.0, 3400.0, 4000.0];

const WATER_DROP_START_HZ: f32 = 500.0;
const WATER_DROP_END_HZ: f32 = 1500.0;
const CHEER_DURATION_S: f32 = 1.5;
const CHEER_NOISE_GAIN: f32 = 0.05;

/// Amplitude shape applied over a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope {
    /// Linear ramp up over `attack_s`, then `exp(-rate * p)` where `p` runs
    /// from 0 to 1 across the following `decay_s`.
    AttackDecay { attack_s: f32, decay_s: f32, rate: f32 },
    /// Linear fade in over the first `fade_s` and out over the last `fade_s`.
    Fade { fade_s: f32 },
}

impl Envelope {
    pub const WATER_DROP: Envelope = Envelope::AttackDecay {
        attack_s: 0.05,
        decay_s: 0.35,
        rate: 8.0,
    };

    pub const CLICK: Envelope = Envelope::AttackDecay {
        attack_s: 0.005,
        decay_s: 0.045,
        rate: 15.0,
    };

    pub const CHEER: Envelope = Envelope::Fade { fade_s: 0.1 };

    fn validate(&self) -> Result<(), SynthError> {
        let check = |name, value: f32, allow_zero: bool| {
            let ok = value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0));
            if ok {
                Ok(())
            } else {
                Err(SynthError::InvalidEnvelope { name, value })
            }
        };
        match *self {
            Envelope::AttackDecay {
                attack_s,
                decay_s,
                rate,
            } => {
                check("attack_s", attack_s, true)?;
                check("decay_s", decay_s, false)?;
                check("rate", rate, true)
            }
            Envelope::Fade { fade_s } => check("fade_s", fade_s, false),
        }
    }

    /// Natural length of a sound shaped by this envelope.
    pub fn span_s(&self) -> f32 {
        match *self {
            Envelope::AttackDecay {
                attack_s, decay_s, ..
            } => attack_s + decay_s,
            Envelope::Fade { fade_s } => 2.0 * fade_s,
        }
    }

    /// Gain at time `t` into a buffer lasting `total_s` seconds.
    pub fn gain_at(&self, t: f32, total_s: f32) -> f32 {
        match *self {
            Envelope::AttackDecay {
                attack_s,
                decay_s,
                rate,
            } => {
                if t < attack_s {
                    t / attack_s
                } else {
                    (-rate * (t - attack_s) / decay_s).exp()
                }
            }
            Envelope::Fade { fade_s } => {
                let fade_in = (t / fade_s).min(1.0);
                let fade_out = ((total_s - t) / fade_s).min(1.0);
                fade_in.min(fade_out).max(0.0)
            }
        }
    }
}

/// Generator of reference tones and feedback cues.
///
/// Holds the noise source, so noise-based output depends on the seed.
#[derive(Debug)]
pub struct ToneSynthesizer {
    sample_rate: u32,
    rng: StdRng,
}

impl ToneSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic noise for reproducible cues and tests.
    pub fn with_seed(sample_rate: u32, seed: u64) -> Self {
        Self {
            sample_rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples in `[0, duration)`, no sample at the end time itself.
    fn sample_count(&self, duration_s: f32) -> Result<usize, SynthError> {
        if !(duration_s.is_finite() && duration_s > 0.0) {
            return Err(SynthError::InvalidDuration(duration_s));
        }
        Ok((f64::from(self.sample_rate) * f64::from(duration_s)) as usize)
    }

    fn time_of(&self, i: usize) -> f64 {
        i as f64 / f64::from(self.sample_rate)
    }

    /// Pure sine wave with amplitude 1.
    ///
    /// Sampling stops before the end time, so consecutive tones concatenate
    /// without a doubled boundary sample.
    pub fn sine(&self, frequency_hz: f32, duration_s: f32) -> Result<AudioBuffer, SynthError> {
        check_frequency(frequency_hz)?;
        let n = self.sample_count(duration_s)?;
        let freq = f64::from(frequency_hz);
        let samples = (0..n)
            .map(|i| (TAU * freq * self.time_of(i)).sin() as f32)
            .collect();
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    /// Sweep whose instantaneous frequency moves linearly from `start_hz`
    /// to `end_hz`, with the 2nd and 3rd harmonic mixed in at 0.3 and 0.1.
    ///
    /// Scaled by the sum of the harmonic weights so the peak stays within 1.
    pub fn frequency_sweep(&self, start_hz: f32, end_hz: f32, duration_s: f32) -> Result<AudioBuffer, SynthError> {
        check_frequency(start_hz)?;
        check_frequency(end_hz)?;
        let n = self.sample_count(duration_s)?;
        let (f0, f1, d) = (f64::from(start_hz), f64::from(end_hz), f64::from(duration_s));
        let total_weight: f64 = SWEEP_HARMONICS.iter().sum();
        let samples = (0..n)
            .map(|i| {
                let t = self.time_of(i);
                // Integral of the linear frequency ramp.
                let phase = TAU * (f0 * t + (f1 - f0) * t * t / (2.0 * d));
                let value: f64 = SWEEP_HARMONICS
                    .iter()
                    .enumerate()
                    .map(|(k, w)| w * ((k + 1) as f64 * phase).sin())
                    .sum();
                (value / total_weight) as f32
            })
            .collect();
        Ok(AudioBuffer::new(samples, self.sample_rate))
    }

    /// Gaussian white noise shaped by `envelope`, normalized to `volume`.
    pub fn noise_burst(&mut self, duration_s: f32, envelope: &Envelope, volume: f32) -> Result<AudioBuffer, SynthError> {
        let n = self.sample_count(duration_s)?;
        let samples = (0..n)
            .map(|_| self.rng.sample::<f64, _>(StandardNormal) as f32)
            .collect();
        let noise = self.envelope_apply(AudioBuffer::new(samples, self.sample_rate), envelope)?;
        normalize(noise, volume)
    }

    /// Multiplies every sample by the envelope gain at its time.
    pub fn envelope_apply(&self, buffer: AudioBuffer, envelope: &Envelope) -> Result<AudioBuffer, SynthError> {
        envelope.validate()?;
        let rate = buffer.sample_rate();
        let total_s = buffer.duration_s();
        let samples = buffer
            .into_samples()
            .into_iter()
            .enumerate()
            .map(|(i, s)| s * envelope.gain_at(i as f32 / rate as f32, total_s))
            .collect();
        Ok(AudioBuffer::new(samples, rate))
    }

    /// A game stimulus: a sine at `volume`.
    pub fn tone(&self, frequency_hz: f32, duration_s: f32, volume: f32) -> Result<AudioBuffer, SynthError> {
        check_volume(volume)?;
        Ok(scaled(self.sine(frequency_hz, duration_s)?, volume))
    }

    /// Success cue: rising sweep under the water-drop envelope.
    pub fn water_drop(&self, volume: f32) -> Result<AudioBuffer, SynthError> {
        let envelope = Envelope::WATER_DROP;
        let sweep = self.frequency_sweep(WATER_DROP_START_HZ, WATER_DROP_END_HZ, envelope.span_s())?;
        normalize(self.envelope_apply(sweep, &envelope)?, volume)
    }

    /// Recording-started cue: a short noise click.
    pub fn click(&mut self, volume: f32) -> Result<AudioBuffer, SynthError> {
        let envelope = Envelope::CLICK;
        self.noise_burst(envelope.span_s(), &envelope, volume)
    }

    /// Victory cue: fixed partials at random phase and amplitude over noise,
    /// faded in and out.
    pub fn cheer(&mut self, volume: f32) -> Result<AudioBuffer, SynthError> {
        check_volume(volume)?;
        let n = self.sample_count(CHEER_DURATION_S)?;
        let partials: Vec<(f64, f64, f64)> = CHEER_PARTIALS
            .iter()
            .map(|&freq| {
                let amplitude = self.rng.random_range(0.3..1.0);
                let phase = self.rng.random_range(0.0..TAU);
                (freq, amplitude, phase)
            })
            .collect();

        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            let t = self.time_of(i);
            let tonal: f64 = partials
                .iter()
                .map(|&(freq, amplitude, phase)| amplitude * (TAU * freq * t + phase).sin())
                .sum();
            let noise: f64 = self.rng.sample(StandardNormal);
            samples.push((tonal / CHEER_PARTIALS.len() as f64) as f32 + CHEER_NOISE_GAIN * noise as f32);
        }

        let faded = self.envelope_apply(AudioBuffer::new(samples, self.sample_rate), &Envelope::CHEER)?;
        normalize(faded, volume)
    }
}

fn check_frequency(frequency_hz: f32) -> Result<(), SynthError> {
    if frequency_hz.is_finite() && frequency_hz > 0.0 {
        Ok(())
    } else {
        Err(SynthError::InvalidFrequency(frequency_hz))
    }
}

fn check_volume(volume: f32) -> Result<(), SynthError> {
    if volume.is_finite() && volume > 0.0 && volume <= 1.0 {
        Ok(())
    } else {
        Err(SynthError::InvalidVolume(volume))
    }
}

fn scaled(buffer: AudioBuffer, gain: f32) -> AudioBuffer {
    let rate = buffer.sample_rate();
    let samples = buffer.into_samples().into_iter().map(|s| s * gain).collect();
    AudioBuffer::new(samples, rate)
}

/// Scales a buffer so its peak equals `volume`. Silence is left untouched.
pub fn normalize(buffer: AudioBuffer, volume: f32) -> Result<AudioBuffer, SynthError> {
    check_volume(volume)?;
    let peak = buffer.peak();
    if peak == 0.0 || !peak.is_finite() {
        return Ok(buffer);
    }
    Ok(scaled(buffer, volume / peak))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const RATE: u32 = 44_100;

    #[test]
    fn sine_has_the_expected_length_and_range() {
        let synth = ToneSynthesizer::new(RATE);
        let wave = synth.sine(440.0, 1.0).unwrap();
        assert_eq!(wave.len(), 44_100);
        assert_eq!(wave.samples()[0], 0.0);
        assert!(wave.peak() <= 1.0);
        assert!(wave.peak() > 0.99);
    }

    #[test]
    fn sine_excludes_the_end_sample() {
        let synth = ToneSynthesizer::new(8);
        // One cycle per second at 8 Hz sampling: exactly 8 samples, the
        // last one a quarter cycle before the start of the next cycle.
        let wave = synth.sine(1.0, 1.0).unwrap();
        assert_eq!(wave.len(), 8);
        assert_abs_diff_eq!(wave.samples()[6], -1.0, epsilon = 1e-6);
        let joined = wave.concat(&wave);
        assert_eq!(joined.len(), 16);
        assert_abs_diff_eq!(joined.samples()[8], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let mut synth = ToneSynthesizer::new(RATE);
        assert_eq!(synth.sine(0.0, 1.0), Err(SynthError::InvalidFrequency(0.0)));
        assert_eq!(synth.sine(440.0, -1.0), Err(SynthError::InvalidDuration(-1.0)));
        assert_eq!(synth.tone(440.0, 1.0, 1.5), Err(SynthError::InvalidVolume(1.5)));
        assert!(synth.frequency_sweep(440.0, f32::NAN, 1.0).is_err());
        assert!(synth.noise_burst(0.1, &Envelope::Fade { fade_s: 0.0 }, 0.5).is_err());
    }

    #[test]
    fn tone_peak_follows_volume() {
        let synth = ToneSynthesizer::new(RATE);
        let tone = synth.tone(440.0, 0.5, 0.3).unwrap();
        assert!(tone.peak() <= 0.3 + 1e-6);
        assert!(tone.peak() > 0.29);
    }

    #[test]
    fn attack_decay_envelope_ramps_then_decays() {
        let env = Envelope::WATER_DROP;
        assert_abs_diff_eq!(env.gain_at(0.0, 0.4), 0.0);
        assert_abs_diff_eq!(env.gain_at(0.025, 0.4), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(env.gain_at(0.05, 0.4), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(env.gain_at(0.4, 0.4), (-8.0_f32).exp(), epsilon = 1e-6);
        assert!(env.gain_at(0.2, 0.4) > env.gain_at(0.3, 0.4));
    }

    #[test]
    fn fade_envelope_is_symmetric() {
        let env = Envelope::CHEER;
        assert_abs_diff_eq!(env.gain_at(0.0, 1.0), 0.0);
        assert_abs_diff_eq!(env.gain_at(0.05, 1.0), 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(env.gain_at(0.5, 1.0), 1.0);
        assert_abs_diff_eq!(env.gain_at(0.95, 1.0), 0.5, epsilon = 1e-5);
    }

    #[test]
    fn envelope_apply_scales_each_sample() {
        let synth = ToneSynthesizer::new(10);
        let flat = AudioBuffer::new(vec![1.0; 10], 10);
        let shaped = synth
            .envelope_apply(flat, &Envelope::Fade { fade_s: 0.5 })
            .unwrap();
        assert_abs_diff_eq!(shaped.samples()[0], 0.0);
        assert_abs_diff_eq!(shaped.samples()[1], 0.2, epsilon = 1e-6);
        assert_abs_diff_eq!(shaped.samples()[5], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(shaped.samples()[9], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn sweep_stays_within_unit_range() {
        let synth = ToneSynthesizer::new(RATE);
        let sweep = synth.frequency_sweep(500.0, 1500.0, 0.4).unwrap();
        assert_eq!(sweep.len(), 17_640);
        assert!(sweep.peak() <= 1.0);
    }

    #[test]
    fn cues_respect_the_volume_factor() {
        let mut synth = ToneSynthesizer::with_seed(RATE, 7);
        for cue in [
            synth.water_drop(0.5).unwrap(),
            synth.click(0.5).unwrap(),
            synth.cheer(0.5).unwrap(),
        ] {
            assert!(!cue.is_empty());
            assert_abs_diff_eq!(cue.peak(), 0.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn seeded_noise_is_reproducible() {
        let mut a = ToneSynthesizer::with_seed(RATE, 42);
        let mut b = ToneSynthesizer::with_seed(RATE, 42);
        assert_eq!(a.click(0.8).unwrap(), b.click(0.8).unwrap());
        assert_eq!(a.click(0.8).unwrap().len(), 2_205);
    }

    #[test]
    fn normalize_leaves_silence_alone() {
        let silence = AudioBuffer::silence(100, RATE);
        assert_eq!(normalize(silence.clone(), 0.5).unwrap(), silence);
        assert!(normalize(silence, 0.0).is_err());
    }
}
