//! Persistent viewer settings (JSON).
//!
//! Missing file means defaults. Missing fields in an existing file fall back
//! to defaults field by field. CLI flags are applied on top by the binary.

use crate::core::session::SessionOptions;
use crate::core::timeline::TimelineConfig;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Timeline bounds, step and autoplay rate
    pub timeline: TimelineConfig,
    /// Start with autoplay paused
    pub start_paused: bool,
    /// Initial timeline value after load
    pub start_value: f64,
    /// Simulated frame rate of the headless runner
    pub fps: f64,
    /// Scrub bar width in cells
    pub bar_width: usize,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            timeline: TimelineConfig::default(),
            start_paused: false,
            start_value: 0.0,
            fps: 60.0,
            bar_width: 40,
        }
    }
}

impl ViewerSettings {
    /// Load from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;
        info!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))?;
        info!("Settings saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.timeline.validate()?;
        if !(self.fps.is_finite() && self.fps > 0.0) {
            bail!("fps must be positive, got {}", self.fps);
        }
        if !self.start_value.is_finite() {
            bail!("start_value must be finite, got {}", self.start_value);
        }
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            timeline: self.timeline,
            start_paused: self.start_paused,
            start_value: self.start_value,
        }
    }

    /// Seconds between simulated frames
    pub fn frame_dt(&self) -> f64 {
        1.0 / self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("scrubline_settings_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let s = ViewerSettings::load(Path::new("/no/such/scrubline.json")).unwrap();
        assert_eq!(s, ViewerSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial.json");
        std::fs::write(&path, r#"{ "fps": 30, "timeline": { "rate": 1.0 } }"#).unwrap();

        let s = ViewerSettings::load(&path).unwrap();
        assert_eq!(s.fps, 30.0);
        assert_eq!(s.timeline.rate, 1.0);
        assert_eq!(s.timeline.step, 0.02);
        assert_eq!(s.bar_width, 40);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("saved.json");
        let mut s = ViewerSettings::default();
        s.start_paused = true;
        s.start_value = 0.4;
        s.save(&path).unwrap();

        assert_eq!(ViewerSettings::load(&path).unwrap(), s);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let path = temp_path("bad.json");
        std::fs::write(&path, r#"{ "timeline": { "step": 0 } }"#).unwrap();
        let err = ViewerSettings::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("step must be positive"));

        std::fs::write(&path, "not json").unwrap();
        assert!(ViewerSettings::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_session_options_and_dt() {
        let s = ViewerSettings {
            fps: 50.0,
            start_value: 1.0,
            ..Default::default()
        };
        assert_eq!(s.session_options().start_value, 1.0);
        assert!((s.frame_dt() - 0.02).abs() < 1e-12);
    }
}
