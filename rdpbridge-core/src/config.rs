//! Session configuration
//!
//! Settings negotiated before the worker starts: desktop geometry, the two
//! color depths the pixel converter works between, and the scaling and
//! keyboard behaviour of the display side. Stored as TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::pixel::ColorDepth;

/// Upper bound for a per-axis scale percentage
pub const MAX_SCALE_PERCENT: u32 = 200;

/// Configuration for one bridged session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Remote desktop width in pixels
    pub width: u32,

    /// Remote desktop height in pixels
    pub height: u32,

    /// Color depth declared by the server
    pub server_depth: ColorDepth,

    /// Native depth of the client surface
    pub client_depth: ColorDepth,

    /// Scale the remote desktop into the widget
    pub scale: bool,

    /// Horizontal scale in percent, 0 fits the widget width
    pub hscale: u32,

    /// Vertical scale in percent, 0 fits the widget height
    pub vscale: u32,

    /// Delay before a new scale buffer is built after a resize
    pub scale_settle_ms: u64,

    /// Release held keys when the widget loses focus
    pub release_keys_on_unfocus: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            server_depth: ColorDepth::Bpp16,
            client_depth: ColorDepth::Bpp32,
            scale: false,
            hscale: 0,
            vscale: 0,
            scale_settle_ms: 1000,
            release_keys_on_unfocus: true,
        }
    }
}

impl BridgeConfig {
    /// Creates a configuration for the given desktop size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Sets the server and client color depths
    #[must_use]
    pub const fn with_depths(mut self, server: ColorDepth, client: ColorDepth) -> Self {
        self.server_depth = server;
        self.client_depth = client;
        self
    }

    /// Enables scaling with per-axis percentages (0 = fit)
    #[must_use]
    pub const fn with_scale(mut self, hscale: u32, vscale: u32) -> Self {
        self.scale = true;
        self.hscale = hscale;
        self.vscale = vscale;
        self
    }

    /// Sets the scale settle delay
    #[must_use]
    pub const fn with_scale_settle(mut self, delay: Duration) -> Self {
        self.scale_settle_ms = delay.as_millis() as u64;
        self
    }

    /// Enables or disables key release on focus loss
    #[must_use]
    pub const fn with_release_keys_on_unfocus(mut self, enabled: bool) -> Self {
        self.release_keys_on_unfocus = enabled;
        self
    }

    /// Returns the scale settle delay
    #[must_use]
    pub const fn scale_settle(&self) -> Duration {
        Duration::from_millis(self.scale_settle_ms)
    }

    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` naming the first invalid field.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Validation {
                field: "width/height".to_string(),
                reason: format!("desktop size {}x{} is empty", self.width, self.height),
            });
        }
        if !self.client_depth.is_image_target() {
            return Err(ConfigError::Validation {
                field: "client_depth".to_string(),
                reason: format!("{} surfaces are not supported", self.client_depth),
            });
        }
        for (field, value) in [("hscale", self.hscale), ("vscale", self.vscale)] {
            if value > MAX_SCALE_PERCENT {
                return Err(ConfigError::Validation {
                    field: field.to_string(),
                    reason: format!("{value}% exceeds {MAX_SCALE_PERCENT}%"),
                });
            }
        }
        Ok(())
    }

    /// Loads and validates a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, malformed or
    /// fails validation.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = self.to_toml()?;
        fs::write(path, content)
            .map_err(|e| ConfigError::Write(format!("Failed to write {}: {}", path.display(), e)))
    }

    /// Renders the configuration as TOML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(format!("Failed to serialize: {e}")))
    }
}
