//! Scale Detective: find the one out-of-tune note in a scale.

use std::fmt;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use hideseek_core::tuning::offset_by_cents;
use hideseek_core::{CatalogNote, DEFAULT_SAMPLE_RATE, NoteCatalog, ToneSynthesizer, audio};
use log::debug;
use rand::Rng;

use crate::input::Keyboard;

const NOTE_SECONDS: f32 = 1.0;
const VOLUME: f32 = 0.3;
const KEY_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Only say whether a note is out of tune.
    Easy,
    /// Also say which way it is off.
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sharp,
    Flat,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Sharp => f.write_str("sharp"),
            Direction::Flat => f.write_str("flat"),
        }
    }
}

/// The note that was detuned, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct HiddenNote {
    pub index: usize,
    pub direction: Direction,
    pub cents: f32,
}

impl HiddenNote {
    /// Picks any note but the first and detunes it by `cents` either way.
    pub fn choose(scale_len: usize, cents: f32, rng: &mut impl Rng) -> Self {
        let index = if scale_len > 1 {
            rng.random_range(1..scale_len)
        } else {
            0
        };
        let direction = if rng.random_bool(0.5) {
            Direction::Sharp
        } else {
            Direction::Flat
        };
        Self {
            index,
            direction,
            cents,
        }
    }

    pub fn detuned(&self, frequency: f32) -> f32 {
        match self.direction {
            Direction::Sharp => offset_by_cents(frequency, self.cents),
            Direction::Flat => offset_by_cents(frequency, -self.cents),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    InTune,
    OutOfTune,
    TooHigh,
    TooLow,
}

impl Answer {
    /// Reads one typed line. `None` means the line is not an answer in this mode.
    pub fn parse(line: &str, mode: Mode) -> Option<Self> {
        match (mode, line.trim().to_ascii_lowercase().as_str()) {
            (_, "") => Some(Answer::InTune),
            (Mode::Easy, "/") => Some(Answer::OutOfTune),
            (Mode::Hard, "u" | "up") => Some(Answer::TooHigh),
            (Mode::Hard, "d" | "down") => Some(Answer::TooLow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    /// The detuned note was called in tune.
    Missed,
    /// The detuned note was found but its direction was wrong.
    WrongDirection,
    /// The scale ended without the note being found.
    ScaleEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Go on to the next note. `mistaken` is set when an in-tune note was flagged.
    Continue { mistaken: bool },
    Won,
    Lost(Loss),
}

/// Judges the answer given for the note at `index`.
pub fn judge(index: usize, answer: Answer, hidden: &HiddenNote, mode: Mode) -> Outcome {
    if index != hidden.index {
        return Outcome::Continue {
            mistaken: answer != Answer::InTune,
        };
    }
    match (mode, answer) {
        (_, Answer::InTune) => Outcome::Lost(Loss::Missed),
        (Mode::Easy, _) => Outcome::Won,
        (Mode::Hard, Answer::TooHigh) if hidden.direction == Direction::Sharp => Outcome::Won,
        (Mode::Hard, Answer::TooLow) if hidden.direction == Direction::Flat => Outcome::Won,
        (Mode::Hard, _) => Outcome::Lost(Loss::WrongDirection),
    }
}

pub struct ScaleDetective {
    scale: Vec<CatalogNote>,
    cents: f32,
    mode: Mode,
    synth: ToneSynthesizer,
    keyboard: Keyboard,
}

impl ScaleDetective {
    pub fn new(cents: f32, mode: Mode, keyboard: Keyboard) -> Self {
        Self {
            scale: NoteCatalog::a_major().notes().to_vec(),
            cents,
            mode,
            synth: ToneSynthesizer::new(DEFAULT_SAMPLE_RATE),
            keyboard,
        }
    }

    pub fn run(&mut self, rng: &mut impl Rng) -> Result<()> {
        println!("🎻 Welcome to Scale Detective!");
        println!("{}", "=".repeat(40));
        println!("I'll play an A major scale, one note at a time.");
        println!("One note will be out of tune by {} cents.", self.cents);
        println!("After each note, type:");
        match self.mode {
            Mode::Easy => {
                println!("  Enter = 'OK' (note sounds in tune)");
                println!("  /     = 'Out of tune' (note sounds wrong)");
            }
            Mode::Hard => {
                println!("  Enter = 'OK' (note sounds in tune)");
                println!("  u     = too high");
                println!("  d     = too low");
            }
        }
        println!("You can answer while the note is still sounding.");
        println!();

        let hidden = HiddenNote::choose(self.scale.len(), self.cents, rng);
        debug!("[DETECTIVE] Hidden note {:?}", hidden);

        println!("Press Enter to start...");
        self.keyboard.wait_for_enter();
        self.keyboard.discard_pending();
        println!();

        for index in 0..self.scale.len() {
            let note = &self.scale[index];
            let frequency = if index == hidden.index {
                hidden.detuned(note.frequency)
            } else {
                note.frequency
            };

            println!("Note {}", index + 1);
            let answer = self.play_and_ask(frequency)?;

            match judge(index, answer, &hidden, self.mode) {
                Outcome::Continue { mistaken } => {
                    if mistaken {
                        println!("❌ Not quite right. That note was actually in tune.");
                    } else {
                        println!("✅ Correct! That note was in tune.");
                    }
                    if index + 1 < self.scale.len() {
                        println!("Let's continue...\n");
                    }
                }
                Outcome::Won => {
                    match self.mode {
                        Mode::Easy => println!("🎉 Well done! You found the out-of-tune note!"),
                        Mode::Hard => println!(
                            "🎉 Well done! You found the out-of-tune note and got the direction right!"
                        ),
                    }
                    self.play_victory(&hidden)?;
                    println!("\nGreat work! Keep training your ear! 🎵");
                    return Ok(());
                }
                Outcome::Lost(loss) => return self.game_over(loss, &hidden),
            }
        }

        self.game_over(Loss::ScaleEnded, &hidden)
    }

    /// Plays one note, returning as soon as a valid answer is typed.
    fn play_and_ask(&self, frequency: f32) -> Result<Answer> {
        let tone = self.synth.tone(frequency, NOTE_SECONDS, VOLUME)?;
        let mut playback = audio::play(&tone)?;

        while playback.is_playing() {
            let Ok(line) = self.keyboard.poll(KEY_POLL) else {
                bail!("input closed");
            };
            if let Some(answer) = line.and_then(|l| Answer::parse(&l, self.mode)) {
                playback.stop();
                return Ok(answer);
            }
        }
        playback.stop();

        match self.mode {
            Mode::Easy => println!("Type: / (out of tune), Enter (in tune)"),
            Mode::Hard => println!("Type: u (too high), d (too low), Enter (in tune)"),
        }
        loop {
            let Some(line) = self.keyboard.next_line() else {
                bail!("input closed");
            };
            match Answer::parse(&line, self.mode) {
                Some(answer) => return Ok(answer),
                None => println!("Unrecognized answer {:?}, try again.", line),
            }
        }
    }

    fn game_over(&self, loss: Loss, hidden: &HiddenNote) -> Result<()> {
        match loss {
            Loss::Missed => println!("❌ GAME OVER! You missed the out-of-tune note."),
            Loss::WrongDirection => {
                println!("❌ GAME OVER! You found the out-of-tune note but got the direction wrong.")
            }
            Loss::ScaleEnded => println!(
                "❌ GAME OVER! You went through the whole scale without finding the out-of-tune note."
            ),
        }
        println!(
            "The {} was {} by {} cents.",
            self.scale[hidden.index].name, hidden.direction, hidden.cents
        );
        self.play_correction(hidden)?;
        println!("\nKeep practicing! Your ear will get stronger! 🎵");
        Ok(())
    }

    /// Replays the scale quickly with the detuned note and its correction.
    fn play_victory(&self, hidden: &HiddenNote) -> Result<()> {
        println!("\n🎉 Victory! Here's what you heard:");
        self.replay(hidden, 0.25, 0.5)
    }

    fn play_correction(&self, hidden: &HiddenNote) -> Result<()> {
        println!("\n🎵 Here's the scale with the correction:");
        self.replay(hidden, 0.5, 1.0)
    }

    /// Plays the scale with plain notes at `plain_s` and the detuned note,
    /// followed by its correct pitch, at `focus_s`.
    fn replay(&self, hidden: &HiddenNote, plain_s: f32, focus_s: f32) -> Result<()> {
        for (index, note) in self.scale.iter().enumerate() {
            if index == hidden.index {
                println!("  {} (out of tune)", note.name);
                self.sound(hidden.detuned(note.frequency), focus_s)?;
                println!("  {} (correct)", note.name);
                self.sound(note.frequency, focus_s)?;
            } else {
                println!("  {}", note.name);
                self.sound(note.frequency, plain_s)?;
            }
        }
        Ok(())
    }

    fn sound(&self, frequency: f32, duration_s: f32) -> Result<()> {
        audio::play_blocking(&self.synth.tone(frequency, duration_s, VOLUME)?)?;
        thread::sleep(Duration::from_secs_f32(duration_s / 5.0));
        Ok(())
    }
}
