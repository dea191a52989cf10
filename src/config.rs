use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the uinput node path
pub const UINPUT_PATH_ENV: &str = "VTOUCHPAD_UINPUT";

/// Shape and identity of the virtual touchpads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TouchpadConfig {
    /// Number of touchpads; fixed for the lifetime of the array
    pub devices: usize,
    /// Device name template, `{}` is replaced by the touchpad index.
    /// The host may look up device configuration by name, so it must be unique.
    pub name_template: String,
    pub width: i32,
    pub height: i32,
    /// Simultaneous contacts declared to the host
    pub slots: i32,
    pub uinput_path: PathBuf,
}

impl Default for TouchpadConfig {
    fn default() -> Self {
        Self {
            devices: 2,
            name_template: "vr-virtual-touchpad-{}".to_string(),
            width: 0x10000,
            height: 0x10000,
            slots: 2,
            uinput_path: PathBuf::from("/dev/uinput"),
        }
    }
}

impl TouchpadConfig {
    /// Load a JSON configuration file; missing fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(path) = std::env::var(UINPUT_PATH_ENV) {
            self.uinput_path = PathBuf::from(path);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.devices == 0 {
            anyhow::bail!("At least one touchpad is required");
        }
        if self.width <= 0 || self.height <= 0 {
            anyhow::bail!("Touch surface {}x{} is empty", self.width, self.height);
        }
        if self.slots <= 0 {
            anyhow::bail!("At least one touch slot is required");
        }
        Ok(())
    }

    pub fn device_name(&self, index: usize) -> String {
        self.name_template.replace("{}", &index.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_two_square_touchpads() {
        let config = TouchpadConfig::default();
        assert_eq!(config.devices, 2);
        assert_eq!((config.width, config.height), (65536, 65536));
        assert_eq!(config.slots, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn device_name_substitutes_index() {
        let config = TouchpadConfig::default();
        assert_eq!(config.device_name(1), "vr-virtual-touchpad-1");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: TouchpadConfig =
            serde_json::from_str(r#"{"devices": 4, "uinput_path": "/tmp/uinput"}"#).unwrap();
        assert_eq!(config.devices, 4);
        assert_eq!(config.uinput_path, PathBuf::from("/tmp/uinput"));
        assert_eq!(config.name_template, "vr-virtual-touchpad-{}");
    }

    #[test]
    fn zero_devices_is_invalid() {
        let config = TouchpadConfig {
            devices: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
