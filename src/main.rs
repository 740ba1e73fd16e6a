//! Block Party: Sanrio-themed falling-shape match-3 puzzle game in the terminal.

mod anim;
mod app;
mod board;
mod game;
mod input;
mod piece;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Options derived from CLI that affect game behaviour.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub mode: GameMode,
    /// RNG seed; None picks one at random.
    pub seed: Option<u64>,
    pub cascade: bool,
    /// Play compaction slides (off: the next piece spawns straight after a clear).
    pub animate: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;
    let theme = match theme::Theme::load(args.theme.as_deref(), args.palette) {
        Ok(theme) => theme,
        Err(err) => {
            tracing::warn!(%err, "theme not loaded, using defaults");
            let mut theme = theme::Theme::default();
            theme.apply_palette(args.palette);
            theme
        }
    };
    let config = GameConfig {
        mode: args.mode,
        seed: args.seed,
        cascade: args.cascade,
        animate: !args.no_animation,
    };
    let mut app = App::new(args, &config, theme);
    app.run()?;
    Ok(())
}

/// Logs go to a file when asked for; the terminal belongs to the game.
fn init_logging(path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let file = std::fs::File::create(path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    Ok(())
}

/// Sanrio Block Party in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "blockparty",
    version,
    about = "Sanrio Block Party: steer falling shapes of coloured blocks; three in a row clears.",
    long_about = "Block Party is a terminal puzzle game on an 8x8 board.\n\n\
        Falling mode: shapes of four coloured blocks fall from the top. When a shape lands, \
        any run of three or more same-coloured blocks in a row or column is cleared and the \
        blocks above drop down. The game ends when a new shape has no room.\n\n\
        Classic mode: the board starts full. Pick a block that lines up with at least two \
        neighbours of its colour to clear them; new blocks fall in from the top.\n\n\
        CONTROLS:\n  Left/Right, h/l  Move (cursor in classic)   Up/k  Rotate CW   u  Rotate CCW\n  \
        Down/j  Soft drop   Space/Enter  Hard drop (select in classic)   Mouse  Select (classic)\n  \
        P  Pause   R  Restart after game over   Q / Esc  Quit"
)]
pub struct Args {
    /// Game mode: falling (shapes drop onto the board) or classic (click to clear, board refills).
    #[arg(short, long, default_value = "falling")]
    pub mode: GameMode,

    /// RNG seed for reproducible games.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Milliseconds between automatic one-row drops.
    #[arg(long, default_value = "500", value_name = "MS")]
    pub drop_interval_ms: u64,

    /// Target frames per second; the compaction slide advances once per frame.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub frame_rate: f64,

    /// Re-check the board after blocks drop and clear new runs too.
    #[arg(long)]
    pub cascade: bool,

    /// Disable drop animation and clear flash.
    #[arg(long)]
    pub no_animation: bool,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses the pastel defaults if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Write logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GameMode {
    #[default]
    Falling,
    Classic,
}
