//! Persist the best score to disk (XDG config or ~/.config/blockfall).

use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

const FILENAME: &str = "highscore";

/// Returns the path to the high score file (config dir / blockfall / highscore).
fn config_path() -> Result<PathBuf> {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if xdg.is_empty() {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".config")
        } else {
            PathBuf::from(xdg)
        }
    } else {
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".config"))
            .unwrap_or_else(|_| PathBuf::from("."))
    };
    Ok(base.join("blockfall").join(FILENAME))
}

/// Load the best score from disk. Returns 0 on missing/parse error.
pub fn load_high_score() -> u32 {
    let path = match config_path() {
        Ok(p) => p,
        Err(_) => return 0,
    };
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Save the best score to disk. Creates config directory if needed.
pub fn save_high_score(score: u32) -> Result<()> {
    let path = config_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = fs::File::create(path)?;
    writeln!(f, "{}", score)?;
    Ok(())
}
