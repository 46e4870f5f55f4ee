//! Mathtrix: falling-block arithmetic puzzle in the terminal.

mod app;
mod block;
mod board;
mod config;
mod game;
mod hint;
mod input;
mod problem;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use config::{Difficulty, Overrides, Settings, Tier, Training};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }
    let settings = build_settings(&args)?;
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|e| {
        log::warn!("theme not loaded, using defaults: {}", e);
        theme::Theme::default()
    });
    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("starting {} with seed {}", settings.tier.label(), seed);
    let mut app = App::new(settings, theme, seed, args.config.clone());
    app.run()?;
    Ok(())
}

/// The terminal is in raw mode while playing, so logs only go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

/// Preset, then the JSON file, then command-line overrides.
fn build_settings(args: &Args) -> Result<Settings> {
    let tier = match args.training {
        Some(t) => Tier::Training(t),
        None => Tier::Standard(args.difficulty),
    };
    let mut settings = Settings::for_tier(tier);
    let file = match &args.config {
        Some(path) => Overrides::load(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Overrides::default(),
    };
    let overrides = file.merge(args.overrides());
    settings.apply(&overrides)?;
    settings.validate()?;
    log::debug!("settings: {:?}", settings);
    Ok(settings)
}

/// Falling-block arithmetic puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "mathtrix",
    version,
    about = "Falling-block arithmetic puzzle in the terminal. Type the answer to clear every block that matches.",
    long_about = "Mathtrix drops arithmetic problems onto a 7-column board.\n\n\
        Type an answer and press Enter: every block whose answer matches is cleared. \
        A wrong answer on Normal or Hard pushes penalty blocks up from the bottom. \
        ◆ blocks also clear their neighbours; ◷ blocks stop time for a few seconds. \
        The game ends when the stack reaches the top row.\n\n\
        CONTROLS:\n  0-9         Type answer   Backspace  Erase\n  Enter/Space Submit        P/Tab      Pause\n  R           Restart (after game over)    Q / Esc    Quit\n  C           Reload --config file         D          Next difficulty (after game over)\n\n\
        Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Difficulty: easy (+ -), normal (+ - ×, penalties), hard (+ - × ÷, penalties).
    #[arg(short, long, default_value = "easy")]
    pub difficulty: Difficulty,

    /// Training mode; replaces --difficulty. Fixed ranges, no penalties.
    #[arg(long)]
    pub training: Option<Training>,

    /// RNG seed for a reproducible game.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// JSON file with parameter overrides (same names as the flags below, snake_case).
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write logs here (level from RUST_LOG, default info).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Fall speed in units per second (one cell is 40 units).
    #[arg(long, value_name = "UNITS")]
    pub fall_speed: Option<f32>,

    /// Time between spawns in ms.
    #[arg(long, value_name = "MS")]
    pub spawn_interval_ms: Option<f32>,

    /// Maximum blocks falling at once.
    #[arg(long, value_name = "N")]
    pub max_blocks: Option<usize>,

    /// Smallest operand.
    #[arg(long, value_name = "N")]
    pub min: Option<i64>,

    /// Largest operand at level 1.
    #[arg(long, value_name = "N")]
    pub max: Option<i64>,

    /// Enabled operators, e.g. "+-*/".
    #[arg(long, value_name = "OPS")]
    pub operators: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            fall_speed: self.fall_speed,
            spawn_interval_ms: self.spawn_interval_ms,
            max_blocks: self.max_blocks,
            min: self.min,
            max: self.max,
            operators: self.operators.clone(),
            ..Overrides::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::Operator;

    #[test]
    fn cli_flags_reach_settings() {
        let args = Args::parse_from([
            "mathtrix",
            "--difficulty",
            "hard",
            "--max-blocks",
            "6",
            "--operators",
            "+*",
        ]);
        let s = build_settings(&args).unwrap();
        assert_eq!(s.tier, Tier::Standard(Difficulty::Hard));
        assert_eq!(s.max_falling, 6);
        assert_eq!(
            s.problem.operators.enabled(),
            vec![Operator::Add, Operator::Multiply]
        );
    }

    #[test]
    fn training_replaces_difficulty() {
        let args = Args::parse_from(["mathtrix", "--training", "omiyage"]);
        let s = build_settings(&args).unwrap();
        assert_eq!(s.tier, Tier::Training(Training::Omiyage));
        assert!(s.problem.omiyage);
    }

    #[test]
    fn empty_operator_list_is_rejected() {
        let args = Args::parse_from(["mathtrix", "--operators", ""]);
        assert!(build_settings(&args).is_err());
    }

    #[test]
    fn training_range_must_keep_answers_typeable() {
        let args = Args::parse_from(["mathtrix", "--training", "times", "--max", "200"]);
        assert!(build_settings(&args).is_err());
        let args = Args::parse_from(["mathtrix", "--training", "times", "--max", "99"]);
        assert!(build_settings(&args).is_ok());
    }

    #[test]
    fn palette_aliases() {
        let args = Args::parse_from(["mathtrix", "--palette", "colourblind"]);
        assert_eq!(args.palette, Palette::Colorblind);
    }
}
