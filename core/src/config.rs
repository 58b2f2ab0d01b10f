//! Persisted configuration: application-wide `Settings` and per-trace
//! `ProjectFile` side-cars (spec §6.3). JSON, not TOML, per spec — the data
//! being persisted (recent-file lists, per-track display state) is naturally
//! document-shaped and user-editable, and §6.3 calls out JSON explicitly.
//!
//! Shape and loading conventions (`from_file`/`from_file_or_default`/
//! `validate`) follow the teacher's `Config`; only the serialization format
//! and field set changed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application-wide user preferences, persisted once at an OS-standard
/// config directory (resolved via the `dirs` crate).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub recent_files: Vec<String>,

    #[serde(default)]
    pub display: DisplaySettings,

    #[serde(default)]
    pub units: UnitSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplaySettings {
    #[serde(default = "default_font_size_px")]
    pub font_size_px: u32,

    #[serde(default)]
    pub dark_mode: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_size_px: default_font_size_px(),
            dark_mode: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    WallClock,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnitSettings {
    #[serde(default = "default_time_format")]
    pub time_format: TimeFormat,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const MAX_RECENT_FILES: usize = 10;

impl Settings {
    /// Loads settings from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).context("failed to read settings file")?;
        let settings: Settings = serde_json::from_str(&contents).context("failed to parse settings file")?;
        Ok(settings)
    }

    /// Loads settings from a JSON file, falling back to defaults (and
    /// logging a warning) if the file is missing or unreadable.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = ?path.as_ref(), error = %e, "failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create settings directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        std::fs::write(path, json).context("failed to write settings file")
    }

    pub fn validate(&self) -> Result<()> {
        if self.display.font_size_px == 0 {
            anyhow::bail!("display.font_size_px cannot be 0");
        }
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("invalid log level: {other}"),
        }
        Ok(())
    }

    /// Records `path` as the most recently opened trace, most-recent-first,
    /// capped at [`MAX_RECENT_FILES`].
    pub fn note_recent_file(&mut self, path: &str) {
        self.recent_files.retain(|p| p != path);
        self.recent_files.insert(0, path.to_string());
        self.recent_files.truncate(MAX_RECENT_FILES);
    }

    /// The OS-standard config directory this crate's settings live under
    /// (e.g. `~/.config/chronoscope` on Linux).
    pub fn default_config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("chronoscope"))
            .context("could not resolve an OS-standard config directory")
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("settings.json"))
    }
}

/// Per-trace side-car: UI state that belongs with a specific trace file
/// rather than with the application (track heights, colour modes,
/// annotations). Stores only time-domain values (sticky-note timestamps,
/// not their current pixel offsets) — pixel offsets are a function of the
/// current view range and font size and would go stale the moment either
/// changes (spec §9 Open Question, resolved: persist semantics, not layout).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProjectFile {
    #[serde(default)]
    pub track_heights_px: std::collections::HashMap<u64, u32>,

    #[serde(default)]
    pub track_color_modes: std::collections::HashMap<u64, String>,

    #[serde(default)]
    pub sticky_notes: Vec<StickyNote>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StickyNote {
    pub event_id: u64,
    pub timestamp_ns: u64,
    pub text: String,
}

impl ProjectFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).context("failed to read project file")?;
        serde_json::from_str(&contents).context("failed to parse project file")
    }

    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(project) => project,
            Err(e) => {
                tracing::warn!(path = ?path.as_ref(), error = %e, "failed to load project file, using defaults");
                Self::default()
            }
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize project file")?;
        std::fs::write(path.as_ref(), json).context("failed to write project file")
    }

    /// The side-car path for a given trace file: same directory, same stem,
    /// `.chronoscope.json` extension.
    pub fn sidecar_path_for(trace_path: &Path) -> PathBuf {
        let mut path = trace_path.to_path_buf();
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        path.set_file_name(format!("{stem}.chronoscope.json"));
        path
    }
}

/// Renders a nanosecond timestamp the way the table engine and event detail
/// panel display it, per the user's [`TimeFormat`] preference.
pub fn format_timestamp_ns(ns: u64, format: TimeFormat) -> String {
    match format {
        TimeFormat::Nanoseconds => format!("{ns} ns"),
        TimeFormat::Microseconds => format!("{:.3} us", ns as f64 / 1_000.0),
        TimeFormat::Milliseconds => format!("{:.3} ms", ns as f64 / 1_000_000.0),
        TimeFormat::WallClock => {
            let secs = (ns / 1_000_000_000) as i64;
            let nanos = (ns % 1_000_000_000) as u32;
            match chrono::DateTime::from_timestamp(secs, nanos) {
                Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                None => format!("{ns} ns"),
            }
        }
    }
}

fn default_font_size_px() -> u32 {
    14
}

fn default_time_format() -> TimeFormat {
    TimeFormat::Microseconds
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.display.font_size_px, 14);
        assert_eq!(settings.units.time_format, TimeFormat::Microseconds);
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let mut settings = Settings::default();
        settings.logging.level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn recent_files_are_deduped_and_capped() {
        let mut settings = Settings::default();
        for i in 0..(MAX_RECENT_FILES + 5) {
            settings.note_recent_file(&format!("trace_{i}.bin"));
        }
        assert_eq!(settings.recent_files.len(), MAX_RECENT_FILES);
        assert_eq!(settings.recent_files[0], format!("trace_{}.bin", MAX_RECENT_FILES + 4));

        settings.note_recent_file("trace_0.bin");
        // The re-opened file moves back to the front instead of duplicating.
        assert_eq!(settings.recent_files[0], "trace_0.bin");
        assert_eq!(settings.recent_files.iter().filter(|p| *p == "trace_0.bin").count(), 1);
    }

    #[test]
    fn settings_round_trip_through_json() {
        let mut settings = Settings::default();
        settings.note_recent_file("a.trace");
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.recent_files, settings.recent_files);
    }

    #[test]
    fn sidecar_path_swaps_extension() {
        let trace = Path::new("/traces/run1.rocprofvis");
        let sidecar = ProjectFile::sidecar_path_for(trace);
        assert_eq!(sidecar, Path::new("/traces/run1.chronoscope.json"));
    }

    #[test]
    fn timestamp_formatting_respects_unit_preference() {
        assert_eq!(format_timestamp_ns(1_500, TimeFormat::Nanoseconds), "1500 ns");
        assert_eq!(format_timestamp_ns(1_500, TimeFormat::Microseconds), "1.500 us");
        assert!(format_timestamp_ns(0, TimeFormat::WallClock).starts_with("1970-01-01"));
    }
}
