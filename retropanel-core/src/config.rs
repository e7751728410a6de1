//! Static configuration loaded once at process start.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DisplayError;

/// How long a power button must be held before the command is issued.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_secs(3);

/// Top level configuration.
///
/// Every section has defaults, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Automatic page cycling.
    pub paging: PagingConfig,
    /// Contrast values cycled by the brightness button.
    pub brightness: BrightnessConfig,
    /// Frame cadences.
    pub render: RenderConfig,
    /// Button debounce and hold polling.
    pub input: InputConfig,
    /// BCM pin numbers of each input line.
    pub pins: PinConfig,
}

impl Config {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, DisplayError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self, DisplayError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    fn validate(&self) -> Result<(), DisplayError> {
        if self.brightness.levels.is_empty() {
            return Err(DisplayError::EmptyBrightnessLevels);
        }
        Ok(())
    }
}

/// Automatic page cycling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagingConfig {
    /// Whether pages advance on their own.
    pub enabled: bool,
    /// Seconds between automatic page changes.
    pub interval_secs: u64,
}

impl PagingConfig {
    /// Time between automatic page changes.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
        }
    }
}

/// Brightness button levels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrightnessConfig {
    /// Contrast values in cycle order (low, medium, high, off).
    pub levels: Vec<u8>,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            levels: vec![30, 128, 255, 0],
        }
    }
}

/// Timing of the background render tasks.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Delay between scroll steps.
    pub scroll_cadence_ms: u64,
    /// How long a static frame is held before the task ends.
    pub static_hold_ms: u64,
    /// Delay between stats redraws.
    pub stats_interval_ms: u64,
}

impl RenderConfig {
    /// Delay between scroll steps.
    pub fn scroll_cadence(&self) -> Duration {
        Duration::from_millis(self.scroll_cadence_ms)
    }

    /// Hold time of a static frame.
    pub fn static_hold(&self) -> Duration {
        Duration::from_millis(self.static_hold_ms)
    }

    /// Delay between stats redraws.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scroll_cadence_ms: 30,
            static_hold_ms: 1000,
            stats_interval_ms: 1000,
        }
    }
}

/// Button timing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Edges within this window after an accepted edge are dropped.
    pub debounce_ms: u64,
    /// How often a held power button is sampled.
    pub hold_poll_ms: u64,
}

impl InputConfig {
    /// Debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Sampling interval of a held button.
    pub fn hold_poll(&self) -> Duration {
        Duration::from_millis(self.hold_poll_ms)
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            hold_poll_ms: 100,
        }
    }
}

/// BCM GPIO offsets of the inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinConfig {
    /// Joystick right.
    pub next: u32,
    /// Joystick left.
    pub previous: u32,
    /// Button 1.
    pub brightness: u32,
    /// Button 2, hold to reboot.
    pub reboot: u32,
    /// Button 3, hold to shut down.
    pub shutdown: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            next: 26,
            previous: 5,
            brightness: 21,
            reboot: 20,
            shutdown: 16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.paging.enabled);
        assert_eq!(config.paging.interval(), Duration::from_secs(10));
        assert_eq!(config.brightness.levels, vec![30, 128, 255, 0]);
        assert_eq!(config.input.debounce(), Duration::from_millis(300));
        assert_eq!(config.pins.next, 26);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [paging]
            enabled = false

            [render]
            scroll_cadence_ms = 50
            "#,
        )
        .unwrap();

        assert!(!config.paging.enabled);
        assert_eq!(config.paging.interval_secs, 10);
        assert_eq!(config.render.scroll_cadence(), Duration::from_millis(50));
        assert_eq!(config.render.static_hold(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_brightness_rejected() {
        let err = Config::from_toml("[brightness]\nlevels = []\n").unwrap_err();
        assert!(matches!(err, DisplayError::EmptyBrightnessLevels));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml("[paging]\nspeed = 3\n").unwrap_err();
        assert!(matches!(err, DisplayError::Config(_)));
    }
}
