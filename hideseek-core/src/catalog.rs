//! Note catalogs: the ordered set of notes a game session trains on.
//!
//! A catalog is plain configuration. It is built once, from the tuning
//! formulas or from JSON, and then handed to the detector and the game.

use serde::{Deserialize, Serialize};

use crate::ConfigError;
use crate::tuning::{NOTE_NAMES, frequency_from_semitones};

/// Semitone steps of a major scale, tonic to octave.
const MAJOR_STEPS: [i32; 8] = [0, 2, 4, 5, 7, 9, 11, 12];

/// Index of A in `NOTE_NAMES`.
const A_INDEX: i32 = 9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogNote {
    pub name: String,
    pub frequency: f32,
}

impl CatalogNote {
    /// Builds the note `index` semitones above C of `octave`.
    fn from_position(index: i32, octave: i32) -> Self {
        let octave = octave + index.div_euclid(12);
        let pitch_class = index.rem_euclid(12);
        Self {
            name: format!("{}{}", NOTE_NAMES[pitch_class as usize], octave),
            frequency: frequency_from_semitones(pitch_class - A_INDEX + (octave - 4) * 12),
        }
    }
}

#[derive(Deserialize)]
struct RawCatalog {
    notes: Vec<CatalogNote>,
}

impl TryFrom<RawCatalog> for NoteCatalog {
    type Error = ConfigError;

    fn try_from(raw: RawCatalog) -> Result<Self, Self::Error> {
        NoteCatalog::new(raw.notes)
    }
}

/// A non-empty, ordered list of notes with positive finite frequencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCatalog")]
pub struct NoteCatalog {
    notes: Vec<CatalogNote>,
}

impl NoteCatalog {
    pub fn new(notes: Vec<CatalogNote>) -> Result<Self, ConfigError> {
        if notes.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        if let Some(bad) = notes
            .iter()
            .find(|n| !(n.frequency.is_finite() && n.frequency > 0.0))
        {
            return Err(ConfigError::InvalidNoteFrequency {
                name: bad.name.clone(),
                frequency: bad.frequency,
            });
        }
        Ok(Self { notes })
    }

    /// The eight notes of a major scale starting at `tonic` in `octave`.
    pub fn major_scale(tonic: &str, octave: i32) -> Result<Self, ConfigError> {
        let index = NOTE_NAMES
            .iter()
            .position(|&n| n == tonic)
            .ok_or_else(|| ConfigError::UnknownNote(tonic.to_string()))?;
        Ok(Self::major_from_index(index as i32, octave))
    }

    /// A major from A4 (440 Hz) to A5 (880 Hz).
    pub fn a_major() -> Self {
        Self::major_from_index(A_INDEX, 4)
    }

    fn major_from_index(index: i32, octave: i32) -> Self {
        let notes = MAJOR_STEPS
            .iter()
            .map(|step| CatalogNote::from_position(index + step, octave))
            .collect();
        Self { notes }
    }

    /// Notes reachable in first position on the D, A and E strings.
    pub fn violin_range() -> Self {
        // (semitones above C, octave)
        const POSITIONS: [(i32, i32); 16] = [
            (9, 4),  // A4, open A string
            (10, 4),
            (11, 4),
            (2, 4),  // D4, open D string
            (3, 4),
            (4, 4),
            (5, 4),
            (6, 4),
            (7, 4),
            (8, 4),
            (4, 5),  // E5, open E string
            (5, 5),
            (6, 5),
            (7, 5),
            (8, 5),
            (9, 5),
        ];
        let notes = POSITIONS
            .iter()
            .map(|&(index, octave)| CatalogNote::from_position(index, octave))
            .collect();
        Self { notes }
    }

    /// Parses `{"notes": [{"name": "A4", "frequency": 440.0}, ...]}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidScaleFile(e.to_string()))
    }

    pub fn notes(&self) -> &[CatalogNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn frequencies(&self) -> impl Iterator<Item = f32> + '_ {
        self.notes.iter().map(|n| n.frequency)
    }

    /// The `count` highest frequencies in the catalog, highest first.
    pub fn highest(&self, count: usize) -> Vec<f32> {
        let mut freqs: Vec<f32> = self.frequencies().collect();
        freqs.sort_by(|a, b| b.total_cmp(a));
        freqs.truncate(count);
        freqs
    }
}
