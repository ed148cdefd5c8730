//! Hide and Seek - ear training for violin in the terminal.

mod detective;
mod game;
mod input;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use hideseek_core::{DetectorConfig, FrequencyBand, NoteCatalog, PitchDetector, Tolerance};
use log::{LevelFilter, info};

use crate::detective::{Mode, ScaleDetective};
use crate::game::{HideAndSeek, NotePlan};
use crate::input::Keyboard;

/// Detuning above which the detective asks before starting.
const LARGE_DETUNE_CENTS: f32 = 200.0;

#[derive(Parser)]
#[command(name = "hide-and-seek")]
#[command(author, version, about = "Ear training game for violin", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    play: PlayArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Hear a hidden note and play or sing it back (default)
    Play(PlayArgs),
    /// Find the out-of-tune note in an A major scale
    Detective(DetectiveArgs),
}

#[derive(Args, Debug, Clone)]
struct PlayArgs {
    /// Number of notes to play in the game
    #[arg(short = 'n', long, default_value_t = 8)]
    num_notes: usize,

    /// Number of distinct notes to use
    #[arg(short = 'd', long, default_value_t = 4)]
    distinct_notes: usize,

    /// Tolerance in cents for pitch matching
    #[arg(short = 't', long, default_value_t = 40.0)]
    tolerance: f32,

    /// List available notes and exit
    #[arg(long)]
    list_notes: bool,

    /// Print detector diagnostics
    #[arg(long)]
    debug: bool,

    /// JSON file with a custom note catalog
    #[arg(long, value_name = "FILE")]
    scale_file: Option<PathBuf>,

    /// Lower edge of the accepted frequency band in Hz
    #[arg(long, default_value_t = 200.0)]
    min_hz: f32,

    /// Upper edge of the accepted frequency band in Hz
    #[arg(long, default_value_t = 900.0)]
    max_hz: f32,
}

#[derive(Args, Debug, Clone)]
struct DetectiveArgs {
    /// Cents the out-of-tune note is off by
    #[arg(short = 'c', long, default_value_t = 50.0)]
    cents: f32,

    /// Also name the direction: u (too high) or d (too low)
    #[arg(long)]
    hard: bool,
}

/// Validated settings for a Hide and Seek session.
#[derive(Debug)]
struct PlaySettings {
    catalog: NoteCatalog,
    band: FrequencyBand,
    tolerance: Tolerance,
    num_notes: usize,
    distinct_notes: usize,
}

impl PlayArgs {
    fn validate(&self, catalog: NoteCatalog) -> Result<PlaySettings> {
        if self.num_notes < 1 {
            bail!("Number of notes must be at least 1");
        }
        if self.distinct_notes < 1 || self.distinct_notes > catalog.len() {
            bail!("Distinct notes must be between 1 and {}", catalog.len());
        }
        let tolerance = Tolerance::new(self.tolerance).context("Tolerance must be positive")?;
        let band = FrequencyBand::new(self.min_hz, self.max_hz)?;
        Ok(PlaySettings {
            catalog,
            band,
            tolerance,
            num_notes: self.num_notes,
            distinct_notes: self.distinct_notes,
        })
    }
}

impl DetectiveArgs {
    fn validate(&self) -> Result<()> {
        if !(self.cents.is_finite() && self.cents > 0.0) {
            bail!("Cents must be positive");
        }
        Ok(())
    }
}

fn load_catalog(path: Option<&Path>) -> Result<NoteCatalog> {
    let Some(path) = path else {
        return Ok(NoteCatalog::a_major());
    };
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read scale file {}", path.display()))?;
    let catalog = NoteCatalog::from_json(&json)
        .with_context(|| format!("failed to load scale file {}", path.display()))?;
    info!("Loaded {} notes from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn list_notes() {
    println!("Available notes (violin range):");
    for note in NoteCatalog::violin_range().notes() {
        println!("  {}: {:.2} Hz", note.name, note.frequency);
    }
}

fn play(args: &PlayArgs) -> Result<()> {
    if args.list_notes {
        list_notes();
        return Ok(());
    }

    let catalog = load_catalog(args.scale_file.as_deref())?;
    let settings = args.validate(catalog)?;
    let detector = PitchDetector::new(DetectorConfig::default(), &settings.catalog)?;

    let mut rng = rand::rng();
    let plan = NotePlan::choose(
        &settings.catalog,
        settings.distinct_notes,
        settings.num_notes,
        &mut rng,
    );
    info!(
        "Session of {} notes from {:?}",
        plan.sequence.len(),
        plan.distinct.iter().map(|n| n.name.as_str()).collect::<Vec<_>>()
    );

    HideAndSeek::new(detector, settings.band, settings.tolerance, args.debug).run(&plan)
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

fn detective(args: &DetectiveArgs) -> Result<()> {
    args.validate()?;
    if args.cents > LARGE_DETUNE_CENTS {
        println!(
            "Warning: {} cents is very out of tune (more than 2 semitones)",
            args.cents
        );
        if !confirm("Continue anyway? (y/N): ")? {
            return Ok(());
        }
    }

    let mode = if args.hard { Mode::Hard } else { Mode::Easy };
    ScaleDetective::new(args.cents, mode, Keyboard::spawn()).run(&mut rand::rng())
}

fn init_logging(debug: bool) {
    let default_level = if debug { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    ctrlc::set_handler(|| {
        println!("\n\nGame interrupted. Thanks for playing! 🎵");
        std::process::exit(0);
    })
    .context("unable to set the Ctrl-C handler")?;

    match cli.command {
        Some(Command::Play(args)) => play(&args),
        Some(Command::Detective(args)) => detective(&args),
        None => play(&cli.play),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = match &cli.command {
        Some(Command::Play(args)) => args.debug,
        Some(Command::Detective(_)) => false,
        None => cli.play.debug,
    };
    init_logging(debug);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("\nError: {err:#}");
            eprintln!("Make sure your microphone and speakers are working properly.");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn play_args(extra: &[&str]) -> PlayArgs {
        let cli = Cli::try_parse_from(std::iter::once("hide-and-seek").chain(extra.iter().copied()))
            .unwrap();
        match cli.command {
            Some(Command::Play(args)) => args,
            None => cli.play,
            Some(Command::Detective(_)) => panic!("expected play arguments"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn play_defaults() {
        let args = play_args(&[]);
        assert_eq!(args.num_notes, 8);
        assert_eq!(args.distinct_notes, 4);
        assert_eq!(args.tolerance, 40.0);
        assert!(!args.list_notes);

        let settings = args.validate(NoteCatalog::a_major()).unwrap();
        assert_eq!(settings.band, FrequencyBand::default());
        assert_eq!(settings.tolerance.cents(), 40.0);
    }

    #[test]
    fn play_subcommand_takes_the_same_flags() {
        let args = play_args(&["play", "-n", "3", "-d", "2", "-t", "25"]);
        assert_eq!(args.num_notes, 3);
        assert_eq!(args.distinct_notes, 2);
        assert_eq!(args.tolerance, 25.0);
    }

    #[test]
    fn rejects_out_of_range_play_settings() {
        assert!(play_args(&["-n", "0"]).validate(NoteCatalog::a_major()).is_err());
        assert!(play_args(&["-d", "0"]).validate(NoteCatalog::a_major()).is_err());
        assert!(play_args(&["-d", "9"]).validate(NoteCatalog::a_major()).is_err());
        assert!(play_args(&["-t", "0"]).validate(NoteCatalog::a_major()).is_err());
        assert!(
            play_args(&["--min-hz", "900", "--max-hz", "200"])
                .validate(NoteCatalog::a_major())
                .is_err()
        );
        assert!(play_args(&["-d", "8"]).validate(NoteCatalog::a_major()).is_ok());
    }

    #[test]
    fn detective_flags() {
        let cli = Cli::try_parse_from(["hide-and-seek", "detective", "-c", "30", "--hard"]).unwrap();
        let Some(Command::Detective(args)) = cli.command else {
            panic!("expected detective arguments");
        };
        assert_eq!(args.cents, 30.0);
        assert!(args.hard);
        assert!(args.validate().is_ok());

        let negative = DetectiveArgs {
            cents: -5.0,
            hard: false,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn top_level_flags_conflict_with_subcommands() {
        assert!(Cli::try_parse_from(["hide-and-seek", "-n", "3", "detective"]).is_err());
    }

    #[test]
    fn missing_scale_file_is_an_error() {
        assert!(load_catalog(Some(Path::new("/nonexistent/scale.json"))).is_err());
        assert_eq!(load_catalog(None).unwrap(), NoteCatalog::a_major());
    }
}
