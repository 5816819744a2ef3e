//! # Settings Loader
//!
//! Loads the optional `settings.json` that tunes the allocation report:
//! the allocation sheet name, the two scaling multipliers, the oldest year
//! accepted as a block date, the master columns to prune, the download prefix
//! and how Max SL rows are paired with Capital Deployed rows.
//!
//! Every field has a default, so a partial file only overrides what it names.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/settings.json")?;
//!
//! // Missing file or no path at all: built-in defaults
//! let path = Some(PathBuf::from("settings.json"));
//! let settings = settings_loader::load_settings_or_default(path.as_ref())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use models::Settings;

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    validate(&settings).with_context(|| format!("Invalid settings in {}", path.display()))?;
    Ok(settings)
}

/// Built-in defaults when no path is given or the file does not exist.
/// A file that exists but does not parse is still an error.
pub fn load_settings_or_default(path: Option<&PathBuf>) -> Result<Settings> {
    match path {
        Some(settings_path) if settings_file_exists(settings_path) => load_settings(settings_path),
        Some(settings_path) => {
            tracing::warn!(
                path = %settings_path.display(),
                "settings file not found, using defaults"
            );
            Ok(Settings::default())
        }
        None => Ok(Settings::default()),
    }
}

/// Checks if a settings file exists at the given path
pub fn settings_file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

fn validate(settings: &Settings) -> Result<()> {
    ensure!(
        !settings.allocation_sheet.trim().is_empty(),
        "allocation_sheet must not be empty"
    );
    ensure!(
        settings.capital_multiplier.is_finite() && settings.component_multiplier.is_finite(),
        "multipliers must be finite numbers"
    );
    ensure!(
        !settings.report_prefix.trim().is_empty(),
        "report_prefix must not be empty"
    );
    Ok(())
}
