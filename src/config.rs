//! Server configuration parsing and validation.
//!
//! Every field has a default, so an empty document (or no file at all)
//! yields a working configuration.

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::models::metrics::ScreenMetrics;
use crate::{AppError, Result};

/// Standard OPI listening port.
pub const DEFAULT_PORT: u16 = 50008;

/// Protocol listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ListenerConfig {
    /// Interface address to bind.
    pub bind_address: IpAddr,
    /// TCP port to bind.
    pub port: u16,
    /// Maximum wait for each stimulus step line; 0 means no timeout.
    pub step_read_timeout_ms: u64,
    /// Reply with an error line to unknown commands instead of ignoring them.
    pub reply_to_unknown_commands: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            step_read_timeout_ms: 30_000,
            reply_to_unknown_commands: false,
        }
    }
}

/// Presentation timing settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct PresentationConfig {
    /// Responses earlier than this after onset are ignored.
    pub min_response_ms: u64,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            min_response_ms: 100,
        }
    }
}

/// Screen description reported by the headless display.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct DisplayConfig {
    /// Width in pixels.
    pub width_px: u32,
    /// Height in pixels.
    pub height_px: u32,
    /// Horizontal pixel density.
    pub xdpi: f32,
    /// Vertical pixel density.
    pub ydpi: f32,
    /// Field-of-view half-angles in degrees: left, right, up, down.
    pub fov: [f32; 4],
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width_px: 2400,
            height_px: 1080,
            xdpi: 400.0,
            ydpi: 400.0,
            fov: [45.0; 4],
        }
    }
}

/// Trigger input settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct TriggerConfig {
    /// Treat every line read from stdin as a trigger event.
    pub stdin: bool,
    /// Capacity of the trigger event queue.
    pub channel_capacity: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            stdin: false,
            channel_capacity: 16,
        }
    }
}

/// Ambient light sensor settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct SensorConfig {
    /// Light level reported before the first reading arrives.
    pub initial_light_level: f32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            initial_light_level: -1.0,
        }
    }
}

/// Top-level configuration parsed from `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct ServerConfig {
    /// Protocol listener settings.
    pub server: ListenerConfig,
    /// Presentation timing settings.
    pub presentation: PresentationConfig,
    /// Screen description.
    pub display: DisplayConfig,
    /// Trigger input settings.
    pub triggers: TriggerConfig,
    /// Ambient light sensor settings.
    pub sensor: SensorConfig,
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Bounded wait for each stimulus step line, if enabled.
    #[must_use]
    pub fn step_read_timeout(&self) -> Option<Duration> {
        match self.server.step_read_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Minimum acceptance latency for responses.
    #[must_use]
    pub fn min_response(&self) -> Duration {
        Duration::from_millis(self.presentation.min_response_ms)
    }

    /// Screen metrics described by the `[display]` section.
    #[must_use]
    pub fn screen_metrics(&self) -> ScreenMetrics {
        ScreenMetrics {
            width_px: self.display.width_px,
            height_px: self.display.height_px,
            xdpi: self.display.xdpi,
            ydpi: self.display.ydpi,
            fov: self.display.fov,
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.presentation.min_response_ms == 0 {
            return Err(AppError::Config(
                "min_response_ms must be greater than zero".into(),
            ));
        }

        if self.triggers.channel_capacity == 0 {
            return Err(AppError::Config(
                "triggers.channel_capacity must be greater than zero".into(),
            ));
        }

        let display = &self.display;
        if display.width_px == 0 || display.height_px == 0 {
            return Err(AppError::Config(
                "display dimensions must be greater than zero".into(),
            ));
        }
        if !(display.xdpi > 0.0 && display.ydpi > 0.0) {
            return Err(AppError::Config("display dpi must be positive".into()));
        }
        if display.fov.iter().any(|angle| !(*angle > 0.0 && *angle <= 90.0)) {
            return Err(AppError::Config(
                "display fov half-angles must be in (0, 90] degrees".into(),
            ));
        }

        Ok(())
    }
}
