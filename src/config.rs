//! Configuration loading and persistence.
//!
//! Settings live in a flat key/value file: `sword_config.toml` by
//! default, or a legacy `sword_config.json`. Older files used
//! upper-case key names; those are mapped onto the current fields once,
//! at load time, through [`LEGACY_KEYS`]. Missing keys take defaults.
//! The settings menu saves after every change.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classifier::vocabulary::Locale;
use crate::types::MacroError;

/// File name used when no path is given.
pub const CONFIG_FILE_NAME: &str = "sword_config.toml";

/// Old key name → current field name.
///
/// When both spellings are present the old one wins, matching how
/// existing config files were read before the rename.
pub const LEGACY_KEYS: &[(&str, &str)] = &[
    ("SLOW_START_LEVEL", "slow_start_level"),
    ("FAST_DELAY", "fast_delay"),
    ("SLOW_DELAY", "slow_delay"),
    ("MIN_GOLD_LIMIT", "min_gold"),
    ("USE_CUSTOM_POS", "use_fixed_pos"),
    ("FIXED_X", "fixed_x"),
    ("FIXED_Y", "fixed_y"),
    ("FIXED_START_Y", "fixed_start_y"),
    ("CLIPBOARD_SAFETY_DELAY", "clipboard_delay"),
    ("INPUT_DELAY", "input_delay"),
];

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacroConfig {
    /// Levels at or above this use the slow delay.
    pub slow_start_level: u32,
    /// Mid-level enhance delay and the farming wait (seconds).
    pub fast_delay: f64,
    /// High-level enhance delay (seconds).
    pub slow_delay: f64,
    /// Stop when gold drops to this value or below. 0 disables.
    pub min_gold: u64,
    pub use_fixed_pos: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_y: Option<i32>,
    /// Top edge of the chat capture when using fixed coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_start_y: Option<i32>,
    /// Wait after each clipboard copy before reading it back (seconds).
    pub clipboard_delay: f64,
    /// Pause between synthetic keystrokes (seconds).
    pub input_delay: f64,
    /// Enhancement level that gold mining sells at.
    pub gold_mine_target: u32,
    /// Stop a run after this many minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_run_minutes: Option<u64>,
    /// Which game text the classifier matches.
    pub locale: Locale,
}

impl Default for MacroConfig {
    fn default() -> Self {
        Self {
            slow_start_level: 9,
            fast_delay: 2.5,
            slow_delay: 3.5,
            min_gold: 0,
            use_fixed_pos: false,
            fixed_x: None,
            fixed_y: None,
            fixed_start_y: None,
            clipboard_delay: 0.3,
            input_delay: 0.12,
            gold_mine_target: 10,
            max_run_minutes: None,
            locale: Locale::Korean,
        }
    }
}

impl MacroConfig {
    /// Default location: the user config dir, falling back to the
    /// working directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("sword-macro").join(CONFIG_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load configuration, returning defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut map = parse_flat(path, &contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        apply_legacy_keys(&mut map);

        let config: MacroConfig = serde_json::from_value(Value::Object(map))
            .with_context(|| format!("Invalid config values in {}", path.display()))?;

        debug!(path = %path.display(), ?config, "Config loaded");
        Ok(config)
    }

    /// Write every field as a flat record. JSON paths stay JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
        }

        let body = if is_json(path) {
            serde_json::to_string_pretty(self).context("Failed to serialise config")?
        } else {
            toml::to_string_pretty(self).context("Failed to serialise config")?
        };

        fs::write(path, body)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// The fixed click point and capture top, when fixed mode is fully set.
    pub fn fixed_position(&self) -> Option<(i32, i32, Option<i32>)> {
        if !self.use_fixed_pos {
            return None;
        }
        match (self.fixed_x, self.fixed_y) {
            (Some(x), Some(y)) => Some((x, y, self.fixed_start_y)),
            _ => None,
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn parse_flat(path: &Path, contents: &str) -> Result<Map<String, Value>> {
    let value = if is_json(path) {
        serde_json::from_str::<Value>(contents)?
    } else {
        let table: toml::Table = toml::from_str(contents)?;
        serde_json::to_value(table)?
    };
    match value {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a table of settings, found {other}"),
    }
}

/// Rename legacy keys in place. An old key overrides its new spelling.
pub fn apply_legacy_keys(map: &mut Map<String, Value>) {
    for (old, new) in LEGACY_KEYS {
        if let Some(value) = map.remove(*old) {
            map.insert((*new).to_string(), value);
        }
    }
}

// ---------------------------------------------------------------------------
// Settings surface
// ---------------------------------------------------------------------------

/// A user-editable setting, as offered by the settings menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    SlowStartLevel,
    FastDelay,
    SlowDelay,
    MinGold,
    ClipboardDelay,
    InputDelay,
    GoldMineTarget,
    MaxRunMinutes,
}

impl Setting {
    pub const ALL: [Setting; 8] = [
        Setting::SlowStartLevel,
        Setting::FastDelay,
        Setting::SlowDelay,
        Setting::MinGold,
        Setting::ClipboardDelay,
        Setting::InputDelay,
        Setting::GoldMineTarget,
        Setting::MaxRunMinutes,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Setting::SlowStartLevel => "Slow-down start level",
            Setting::FastDelay => "Normal delay",
            Setting::SlowDelay => "High-level delay",
            Setting::MinGold => "Minimum gold",
            Setting::ClipboardDelay => "Clipboard settle time",
            Setting::InputDelay => "Keystroke delay",
            Setting::GoldMineTarget => "Gold mining sell level",
            Setting::MaxRunMinutes => "Run time limit (min, 0 = off)",
        }
    }

    /// Current value rendered for the menu.
    pub fn current(&self, cfg: &MacroConfig) -> String {
        match self {
            Setting::SlowStartLevel => format!("+{}", cfg.slow_start_level),
            Setting::FastDelay => format!("{}s", cfg.fast_delay),
            Setting::SlowDelay => format!("{}s", cfg.slow_delay),
            Setting::MinGold => format!("{}G", cfg.min_gold),
            Setting::ClipboardDelay => format!("{}s", cfg.clipboard_delay),
            Setting::InputDelay => format!("{}s", cfg.input_delay),
            Setting::GoldMineTarget => format!("+{}", cfg.gold_mine_target),
            Setting::MaxRunMinutes => match cfg.max_run_minutes {
                Some(m) => format!("{m}min"),
                None => "off".to_string(),
            },
        }
    }

    /// Parse `raw` and store it. Rejected input leaves `cfg` untouched.
    pub fn apply(&self, cfg: &mut MacroConfig, raw: &str) -> Result<(), MacroError> {
        let raw = raw.trim();
        match self {
            Setting::SlowStartLevel => cfg.slow_start_level = parse_int(raw)?,
            Setting::FastDelay => cfg.fast_delay = parse_secs(raw)?,
            Setting::SlowDelay => cfg.slow_delay = parse_secs(raw)?,
            Setting::MinGold => cfg.min_gold = parse_int(raw)?,
            Setting::ClipboardDelay => cfg.clipboard_delay = parse_secs(raw)?,
            Setting::InputDelay => cfg.input_delay = parse_secs(raw)?,
            Setting::GoldMineTarget => {
                let level: u32 = parse_int(raw)?;
                if level == 0 {
                    return Err(MacroError::Config("sell level must be at least +1".into()));
                }
                cfg.gold_mine_target = level;
            }
            Setting::MaxRunMinutes => {
                let minutes: u64 = parse_int(raw)?;
                cfg.max_run_minutes = (minutes > 0).then_some(minutes);
            }
        }
        Ok(())
    }
}

fn parse_int<T: std::str::FromStr>(raw: &str) -> Result<T, MacroError> {
    raw.replace(',', "")
        .parse()
        .map_err(|_| MacroError::Config(format!("not a whole number: {raw:?}")))
}

fn parse_secs(raw: &str) -> Result<f64, MacroError> {
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(MacroError::Config(format!("not a delay in seconds: {raw:?}"))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
