//! Hide and Seek: the player hears a note and plays or sings it back.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use hideseek_core::tuning::find_nearest_note;
use hideseek_core::{
    AudioBuffer, CatalogNote, FrequencyBand, NoteCatalog, PitchDetector, PitchEstimate, Tolerance,
    ToneSynthesizer, audio, cents_difference, within_tolerance,
};
use log::debug;
use rand::Rng;
use rand::seq::IndexedRandom;

const STIMULUS_SECONDS: f32 = 2.0;
const STIMULUS_VOLUME: f32 = 0.3;
const INTRO_SECONDS: f32 = 1.0;
const INTRO_VOLUME: f32 = 0.2;
const RECORD_SECONDS: f32 = 3.0;
const CUE_VOLUME: f32 = 0.4;

/// The notes a session introduces and the order they are hidden in.
#[derive(Debug, Clone, PartialEq)]
pub struct NotePlan {
    pub distinct: Vec<CatalogNote>,
    pub sequence: Vec<CatalogNote>,
}

impl NotePlan {
    /// Picks `distinct` different notes from the catalog, then draws a
    /// sequence of `length` notes from those.
    pub fn choose(catalog: &NoteCatalog, distinct: usize, length: usize, rng: &mut impl Rng) -> Self {
        let distinct: Vec<CatalogNote> = catalog
            .notes()
            .choose_multiple(rng, distinct.min(catalog.len()))
            .cloned()
            .collect();
        let sequence = (0..length)
            .filter_map(|_| distinct.choose(rng).cloned())
            .collect();
        Self { distinct, sequence }
    }
}

/// Outcome of comparing one recording with its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    NoPitch,
    Match { detected_hz: f32 },
    Miss { detected_hz: f32, cents: f32 },
}

pub fn judge(target_hz: f32, estimate: Option<PitchEstimate>, tolerance: Tolerance) -> Verdict {
    let Some(estimate) = estimate else {
        return Verdict::NoPitch;
    };
    let detected_hz = estimate.frequency_hz;
    if within_tolerance(target_hz, detected_hz, tolerance) {
        Verdict::Match { detected_hz }
    } else {
        Verdict::Miss {
            detected_hz,
            cents: cents_difference(target_hz, detected_hz).unwrap_or(f32::NAN),
        }
    }
}

/// Running score, owned by the game rather than the detector.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Score {
    pub found: usize,
    pub attempts: usize,
}

impl Score {
    pub fn success_rate(&self, notes: usize) -> f32 {
        if notes == 0 {
            return 0.0;
        }
        self.found as f32 / notes as f32 * 100.0
    }
}

pub struct HideAndSeek {
    detector: PitchDetector,
    synth: ToneSynthesizer,
    band: FrequencyBand,
    tolerance: Tolerance,
    debug: bool,
    score: Score,
}

impl HideAndSeek {
    pub fn new(detector: PitchDetector, band: FrequencyBand, tolerance: Tolerance, debug: bool) -> Self {
        let synth = ToneSynthesizer::new(detector.sample_rate());
        Self {
            detector,
            synth,
            band,
            tolerance,
            debug,
            score: Score::default(),
        }
    }

    pub fn run(&mut self, plan: &NotePlan) -> Result<()> {
        println!("🎻 Welcome to Hide and Seek - Ear Training for Violin!");
        println!("{}", "=".repeat(50));

        self.introduce(&plan.distinct)?;

        for (i, note) in plan.sequence.iter().enumerate() {
            println!("\n🎵 Note {} of {}: {}", i + 1, plan.sequence.len(), note.name);
            if self.hide_note(note)? {
                self.score.found += 1;
            }
        }

        let total = plan.sequence.len();
        println!("\n🎯 Game Results:");
        println!("   Notes found: {}/{}", self.score.found, total);
        println!("   Total attempts: {}", self.score.attempts);
        println!("   Success rate: {:.1}%", self.score.success_rate(total));

        if self.score.found == total {
            self.celebrate()?;
        } else {
            println!("\nGood job! You found {} out of {} notes.", self.score.found, total);
            println!("Keep practicing and you'll get better!");
        }
        println!("\nThanks for playing Hide and Seek! 🎵");
        Ok(())
    }

    fn introduce(&self, notes: &[CatalogNote]) -> Result<()> {
        println!("\n🎵 Let's play Hide and Seek with these notes:");
        for (i, note) in notes.iter().enumerate() {
            println!("  {}. {} ({:.1} Hz)", i + 1, note.name, note.frequency);
            audio::play_blocking(&self.synth.tone(note.frequency, INTRO_SECONDS, INTRO_VOLUME)?)?;
            thread::sleep(Duration::from_millis(500));
        }
        println!("\nNow I'll hide one note at a time. Listen carefully and try to match it!");
        thread::sleep(Duration::from_secs(2));
        Ok(())
    }

    /// Plays the note, listens, and gives one retry. True when found.
    fn hide_note(&mut self, note: &CatalogNote) -> Result<bool> {
        let stimulus = self.synth.tone(note.frequency, STIMULUS_SECONDS, STIMULUS_VOLUME)?;
        audio::play_blocking(&stimulus)?;

        if self.listen(note)? {
            println!("✅ Perfect! You found the hidden note!");
            return Ok(true);
        }

        println!("❌ Not quite right. Let me play it again...");
        audio::play_blocking(&stimulus)?;
        println!("Try again:");
        if self.listen(note)? {
            println!("✅ Great! You got it on the second try!");
            Ok(true)
        } else {
            println!("❌ Let's move on to the next note...");
            Ok(false)
        }
    }

    fn listen(&mut self, note: &CatalogNote) -> Result<bool> {
        audio::play_blocking(&self.synth.click(CUE_VOLUME)?)?;
        println!("Recording for {} seconds... Play or sing now!", RECORD_SECONDS);
        let recording = audio::record(RECORD_SECONDS, self.detector.sample_rate())?;
        self.score.attempts += 1;

        let verdict = self.evaluate(note, &recording);
        match verdict {
            Verdict::NoPitch => println!("No clear pitch detected. Please try again!"),
            Verdict::Match { detected_hz } => {
                println!("Great! Detected {:.1} Hz (target: {:.1} Hz)", detected_hz, note.frequency);
                audio::play_blocking(&self.synth.water_drop(CUE_VOLUME)?)?;
            }
            Verdict::Miss { detected_hz, cents } => {
                let heard = find_nearest_note(detected_hz).map_or("?", |n| n.name.as_str());
                println!(
                    "Detected {:.1} Hz ({}, {:+.0} cents), but target was {:.1} Hz",
                    detected_hz, heard, cents, note.frequency
                );
            }
        }
        Ok(matches!(verdict, Verdict::Match { .. }))
    }

    fn evaluate(&self, note: &CatalogNote, recording: &AudioBuffer) -> Verdict {
        let estimate = self.detector.detect(recording, &self.band, self.debug);
        debug!(
            "[GAME] Target {:.1} Hz, estimate {:?}",
            note.frequency, estimate
        );
        judge(note.frequency, estimate, self.tolerance)
    }

    fn celebrate(&mut self) -> Result<()> {
        println!("\n🎉🎉🎉 CONGRATULATIONS! 🎉🎉🎉");
        println!("You found all the hidden notes!");
        audio::play_blocking(&self.synth.cheer(CUE_VOLUME)?)?;
        Ok(())
    }
}
