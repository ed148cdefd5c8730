//! # Musical Tuning Module
//!
//! This module provides the note math used by the ear trainer. It handles
//! note name conversions, equal-tempered frequency calculations and cent
//! comparisons, all referenced to A4 = 440 Hz.
//!
//! ## Features
//! - 88-key note table (A0 to C8) for nearest-note lookups
//! - Equal temperament frequency calculations
//! - Cent differences and tolerance checks that never take the log of a
//!   non-positive number

use once_cell::sync::Lazy;

use crate::ConfigError;

/// Reference pitch for equal temperament.
pub const A4_HZ: f32 = 440.0;

/// Sharp-spelled note names, starting from C.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Represents a single musical note with its name and frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// Note name (e.g., "A4", "C#3")
    pub name: String,
    /// Frequency in Hz
    pub frequency: f32,
}

/// Statically computed notes for a standard 88-key keyboard (A0 to C8).
///
/// Used to name whatever pitch the player produced, which need not be part
/// of the scale being trained.
static NOTES: Lazy<Vec<Note>> = Lazy::new(|| {
    (0..88)
        .map(|key| {
            // A0 is 48 semitones below A4, and A sits at index 9 from C.
            let semitones_from_a4 = key as i32 - 48;
            let from_c0 = key as i32 + 9;
            let name = format!("{}{}", NOTE_NAMES[(from_c0 % 12) as usize], from_c0 / 12);
            Note {
                name,
                frequency: frequency_from_semitones(semitones_from_a4),
            }
        })
        .collect()
});

/// Frequency `n` equal-tempered semitones away from A4: `f = 440 * 2^(n/12)`.
pub fn frequency_from_semitones(semitones_from_a4: i32) -> f32 {
    A4_HZ * 2.0_f32.powf(semitones_from_a4 as f32 / 12.0)
}

/// Calculates the frequency of a note name in a given octave.
///
/// Octave 4 holds middle C, so `note_frequency("A", 4)` is 440 Hz.
pub fn note_frequency(note_name: &str, octave: i32) -> Result<f32, ConfigError> {
    let index = NOTE_NAMES
        .iter()
        .position(|&n| n == note_name)
        .ok_or_else(|| ConfigError::UnknownNote(note_name.to_string()))?;
    let semitones_from_a4 = index as i32 - 9 + (octave - 4) * 12;
    Ok(frequency_from_semitones(semitones_from_a4))
}

/// Finds the keyboard note closest to a frequency.
///
/// Returns `None` for non-positive or non-finite input. Closeness is measured
/// in cents, so the boundary between two keys sits at the quarter tone.
pub fn find_nearest_note(freq: f32) -> Option<&'static Note> {
    if !(freq.is_finite() && freq > 0.0) {
        return None;
    }
    NOTES.iter().min_by(|a, b| {
        let diff_a = (freq / a.frequency).log2().abs();
        let diff_b = (freq / b.frequency).log2().abs();
        diff_a.total_cmp(&diff_b)
    })
}

/// Calculates the distance from a reference frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values mean the measurement is sharp, negative flat
///
/// Returns `None` ("not comparable") when either frequency is not a positive
/// finite number.
pub fn cents_difference(reference_hz: f32, measured_hz: f32) -> Option<f32> {
    let valid = |f: f32| f.is_finite() && f > 0.0;
    if !valid(reference_hz) || !valid(measured_hz) {
        return None;
    }
    Some(1200.0 * (measured_hz / reference_hz).log2())
}

/// Shifts a frequency by a number of cents: `f * 2^(cents/1200)`.
pub fn offset_by_cents(freq: f32, cents: f32) -> f32 {
    freq * 2.0_f32.powf(cents / 1200.0)
}

/// Symmetric acceptance window around a target, in cents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f32);

impl Tolerance {
    pub fn new(cents: f32) -> Result<Self, ConfigError> {
        if !(cents.is_finite() && cents > 0.0) {
            return Err(ConfigError::InvalidTolerance(cents));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> f32 {
        self.0
    }
}

/// True when `measured_hz` is within the tolerance of `reference_hz`.
///
/// Always false when either frequency is not comparable.
pub fn within_tolerance(reference_hz: f32, measured_hz: f32, tolerance: Tolerance) -> bool {
    cents_difference(reference_hz, measured_hz)
        .is_some_and(|cents| cents.abs() <= tolerance.cents())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn tol(cents: f32) -> Tolerance {
        Tolerance::new(cents).unwrap()
    }

    #[test]
    fn note_frequencies_follow_equal_temperament() {
        assert_abs_diff_eq!(note_frequency("A", 4).unwrap(), 440.0, epsilon = 0.1);
        assert_abs_diff_eq!(note_frequency("C", 4).unwrap(), 261.6, epsilon = 0.1);
        assert_abs_diff_eq!(note_frequency("E", 5).unwrap(), 659.3, epsilon = 0.1);
        assert_abs_diff_eq!(note_frequency("A", 5).unwrap(), 880.0, epsilon = 0.01);
    }

    #[test]
    fn unknown_note_names_are_rejected() {
        assert_eq!(
            note_frequency("H", 4),
            Err(ConfigError::UnknownNote("H".to_string()))
        );
        assert!(note_frequency("Bb", 4).is_err());
    }

    #[test]
    fn keyboard_table_spans_a0_to_c8() {
        assert_eq!(NOTES.len(), 88);
        assert_eq!(NOTES[0].name, "A0");
        assert_abs_diff_eq!(NOTES[0].frequency, 27.5, epsilon = 0.01);
        assert_eq!(NOTES[48].name, "A4");
        assert_eq!(NOTES[87].name, "C8");
    }

    #[test]
    fn nearest_note_names_a_slightly_sharp_g_sharp() {
        let note = find_nearest_note(418.0).unwrap();
        assert_eq!(note.name, "G#4");
        assert!(find_nearest_note(0.0).is_none());
        assert!(find_nearest_note(-3.0).is_none());
    }

    #[test]
    fn identical_frequencies_are_zero_cents_apart() {
        for f in [27.5, 196.0, 440.0, 1234.5] {
            assert_eq!(cents_difference(f, f), Some(0.0));
            assert!(within_tolerance(f, f, tol(0.001)));
        }
    }

    #[test]
    fn an_octave_is_twelve_hundred_cents() {
        assert_abs_diff_eq!(cents_difference(440.0, 880.0).unwrap(), 1200.0, epsilon = 1e-3);
        assert_abs_diff_eq!(cents_difference(440.0, 220.0).unwrap(), -1200.0, epsilon = 1e-3);
    }

    #[test]
    fn non_positive_frequencies_are_not_comparable() {
        assert_eq!(cents_difference(0.0, 440.0), None);
        assert_eq!(cents_difference(440.0, -1.0), None);
        assert_eq!(cents_difference(f32::NAN, 440.0), None);
        for t in [1.0, 50.0, 10_000.0] {
            assert!(!within_tolerance(0.0, 440.0, tol(t)));
            assert!(!within_tolerance(440.0, -1.0, tol(t)));
        }
    }

    #[test]
    fn cents_grow_as_the_measurement_moves_away() {
        let reference = 440.0;
        let mut last_up = 0.0;
        let mut last_down = 0.0;
        for step in 1..50 {
            let up = cents_difference(reference, reference + step as f32 * 3.0).unwrap().abs();
            let down = cents_difference(reference, reference - step as f32 * 3.0).unwrap().abs();
            assert!(up > last_up);
            assert!(down > last_down);
            last_up = up;
            last_down = down;
        }
    }

    #[test]
    fn tolerance_examples() {
        assert!(within_tolerance(440.0, 441.0, tol(50.0)));
        assert!(!within_tolerance(440.0, 880.0, tol(50.0)));
        assert!(within_tolerance(440.0, 450.0, tol(100.0)));
        assert!(!within_tolerance(440.0, 450.0, tol(10.0)));
    }

    #[test]
    fn tolerance_must_be_positive() {
        assert!(Tolerance::new(0.0).is_err());
        assert!(Tolerance::new(-10.0).is_err());
        assert!(Tolerance::new(f32::NAN).is_err());
        assert_eq!(tol(40.0).cents(), 40.0);
    }

    #[test]
    fn cents_offset_round_trips_through_cents_difference() {
        let shifted = offset_by_cents(440.0, 50.0);
        assert_abs_diff_eq!(cents_difference(440.0, shifted).unwrap(), 50.0, epsilon = 1e-2);
        assert_abs_diff_eq!(offset_by_cents(440.0, -1200.0), 220.0, epsilon = 1e-3);
    }
}
