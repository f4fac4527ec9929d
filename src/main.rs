//! Blockfall — classic falling-block puzzle game in the terminal.

mod app;
mod game;
mod highscores;
mod input;
mod theme;
mod ui;

use anyhow::Result;
use app::App;
use clap::{Parser, ValueEnum};

/// Options derived from CLI that affect the game engine (starting level, piece RNG seed).
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub initial_level: u32,
    pub seed: Option<u32>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_default();
    let config = GameConfig {
        initial_level: args.initial_level,
        seed: args.seed,
    };
    let mut app = App::new(args, config, theme)?;
    app.run()?;
    Ok(())
}

/// Classic falling-block puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "blockfall",
    version,
    about = "Classic falling-block puzzle in the terminal. Stack the pieces; clear full rows to score.",
    long_about = "Blockfall is a terminal rendition of the classic falling-block puzzle.\n\n\
        Move and rotate the falling piece; completed rows disappear and score points. \
        Every 5 cleared lines raises the level and the fall speed.\n\n\
        CONTROLS (normal):\n  Left/Right  Move    Up        Rotate      Down       Soft drop\n  Enter/Space Hard drop   P          Pause      Q / Esc    Quit\n\n\
        CONTROLS (vim):\n  h/l         Move    k or i     Rotate      j          Soft drop\n  Space       Hard drop  p          Pause      q          Quit\n\n\
        Hold a movement key to keep the piece moving. Use --theme to load a btop-style theme (e.g. onedark.theme)."
)]
pub struct Args {
    /// Playfield width in columns.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: u16,

    /// Playfield height in rows.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: u16,

    /// Path to theme file (btop-style theme[key]=\"value\"). Uses One Dark if not set.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Initial level (e.g. for practice). Raises the starting fall speed.
    #[arg(long, default_value = "1", value_name = "N")]
    pub initial_level: u32,

    /// Seed for the piece sequence (reproducible games). Random if not set.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u32>,

    /// Disable the game-over fade animation.
    #[arg(long)]
    pub no_animation: bool,
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
