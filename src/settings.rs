//! Application settings
//!
//! Loaded from `~/.config/pengesture/settings.toml`; every field has a
//! default so a missing or partial file is fine.

use crate::classifier::Timings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Where classified gestures go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Inject Ctrl+key strokes through a uinput virtual keyboard
    #[default]
    Uinput,
    /// Only log gestures
    Log,
}

/// Classifier windows in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub cycle_ms: u64,
    pub segment_gap_ms: u64,
    pub min_segment_ms: u64,
    pub contact_click_ms: u64,
    pub click_ms: u64,
    pub double_click_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            cycle_ms: 10,
            segment_gap_ms: 400,
            min_segment_ms: 50,
            contact_click_ms: 10,
            click_ms: 200,
            double_click_ms: 400,
        }
    }
}

impl TimingSettings {
    pub fn to_timings(&self) -> Timings {
        Timings {
            cycle: Duration::from_millis(self.cycle_ms),
            segment_gap: Duration::from_millis(self.segment_gap_ms),
            min_segment: Duration::from_millis(self.min_segment_ms),
            contact_click: Duration::from_millis(self.contact_click_ms),
            click: Duration::from_millis(self.click_ms),
            double_click: Duration::from_millis(self.double_click_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Tablet event node, e.g. `/dev/input/event5`
    #[serde(default)]
    pub device: Option<PathBuf>,

    #[serde(default)]
    pub sink: SinkKind,

    /// Sleep between reads while the device is idle
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Gestures queued between the reader thread and the injector
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub timings: TimingSettings,
}

fn default_poll_interval_ms() -> u64 {
    5
}

fn default_channel_capacity() -> usize {
    64
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            device: None,
            sink: SinkKind::default(),
            poll_interval_ms: default_poll_interval_ms(),
            channel_capacity: default_channel_capacity(),
            timings: TimingSettings::default(),
        }
    }
}

impl AppSettings {
    /// Get the settings file path
    pub fn settings_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not find config directory")?
            .join("pengesture");
        Ok(config_dir.join("settings.toml"))
    }

    /// Load settings from the default location (or use defaults)
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::settings_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read settings from {:?}", path))?;
            let settings: AppSettings = toml::from_str(&content)
                .with_context(|| format!("Invalid settings file {:?}", path))?;
            info!("Loaded settings from {:?}", path);
            Ok(settings)
        } else {
            info!("No settings file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Write the settings, creating the config directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
