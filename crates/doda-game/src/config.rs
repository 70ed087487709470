//! Game tunables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scorer::SpecialClassRules;

/// File name of the preference table inside the data directory.
pub const PREFERENCES_FILE: &str = "doda_preferences.json";
/// File name of the session state inside the data directory.
pub const SESSION_FILE: &str = "save_state.json";

/// Win and lose thresholds for the gratification level.
///
/// The level wins once it reaches `win` (inclusive) and loses once it drops
/// to `lose` (inclusive).  Win is checked first, so degenerate pairs where
/// `lose >= win` are accepted and resolve to a win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub win: i32,
    pub lose: i32,
}

impl Thresholds {
    pub const fn new(win: i32, lose: i32) -> Self {
        Self { win, lose }
    }

    /// The long game: +30 / −30.
    pub const fn classic() -> Self {
        Self::new(30, -30)
    }

    /// A faster round: +15 / −10.
    pub const fn quick() -> Self {
        Self::new(15, -10)
    }

    /// Look up a named preset (`"classic"` or `"quick"`, case-insensitive).
    pub fn preset(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "classic" => Some(Self::classic()),
            "quick" => Some(Self::quick()),
            _ => None,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::classic()
    }
}

/// Everything a [`GameSession`][crate::session::GameSession] needs to start.
///
/// `None` paths keep the corresponding state in memory only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub preferences_path: Option<PathBuf>,
    #[serde(default)]
    pub session_path: Option<PathBuf>,
    #[serde(default)]
    pub special: SpecialClassRules,
}

impl GameConfig {
    /// Store both game files inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>, thresholds: Thresholds) -> Self {
        let dir = dir.as_ref();
        Self {
            thresholds,
            preferences_path: Some(dir.join(PREFERENCES_FILE)),
            session_path: Some(dir.join(SESSION_FILE)),
            special: SpecialClassRules::default(),
        }
    }
}
