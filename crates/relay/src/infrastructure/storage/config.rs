//! TOML-based configuration for the relay.
//!
//! Reads `RelayConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\SerialRelay\config.toml`
//! - Linux:    `~/.config/serial-relay/config.toml`
//! - macOS:    `~/Library/Application Support/SerialRelay/config.toml`
//!
//! ```toml
//! [serial]
//! baud_rate = 9600
//! parity = "none"
//! stop_bits = 1
//! read_timeout_ms = 2000
//!
//! [timing]
//! poll_interval_ms = 1000
//! cycle_interval_ms = 100
//! read_chunk = 256
//! key_hold_ms = 500
//!
//! [ports]
//! device = "/dev/ttyUSB0"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every section and field is optional; `#[serde(default)]` fills in the
//! built-in value, so a missing file and an empty file mean the same thing.
//! Command-line flags override whatever is loaded here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serial_relay_core::{Parity, SerialConfig, StopBits};
use thiserror::Error;
use tracing::debug;

use crate::application::lifecycle::{RelaySettings, Variant};
use crate::application::receive_loop::ReceiveSettings;
use crate::application::send_loop::SendSettings;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    pub serial: SerialSection,
    pub timing: TimingSection,
    pub ports: PortsSection,
    pub logging: LoggingSection,
}

/// Line settings shared by every opened port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SerialSection {
    pub baud_rate: u32,
    /// `"none"`, `"even"` or `"odd"`.
    pub parity: Parity,
    /// 1 or 2.
    pub stop_bits: u8,
    pub read_timeout_ms: u64,
}

/// Loop pacing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingSection {
    /// Receive loop sleep between polls.
    pub poll_interval_ms: u64,
    /// Send loop pacing in the keys variant.
    pub cycle_interval_ms: u64,
    /// Largest single read the receive loop issues.
    pub read_chunk: usize,
    /// Key expiry when the terminal cannot report releases.
    pub key_hold_ms: u64,
}

/// Device names. Absent names fall back to flags or the prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inbound: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// `tracing` level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    pub level: String,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            baud_rate: serial_relay_core::port::DEFAULT_BAUD_RATE,
            parity: Parity::None,
            stop_bits: 1,
            read_timeout_ms: 2000,
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            cycle_interval_ms: 100,
            read_chunk: 256,
            key_hold_ms: 500,
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ── Derived settings ──────────────────────────────────────────────────────────

impl RelayConfig {
    /// Rejects values that parse but cannot drive a relay.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("serial.baud_rate must be positive".into()));
        }
        if StopBits::try_from(self.serial.stop_bits).is_err() {
            return Err(ConfigError::Invalid(format!(
                "serial.stop_bits must be 1 or 2, got {}",
                self.serial.stop_bits
            )));
        }
        if self.timing.read_chunk == 0 {
            return Err(ConfigError::Invalid("timing.read_chunk must be positive".into()));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.poll_interval_ms must be positive".into(),
            ));
        }
        if self.timing.cycle_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.cycle_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Builds the line settings for `device`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `stop_bits` is out of range.
    pub fn serial_config(&self, device: &str) -> Result<SerialConfig, ConfigError> {
        let stop_bits = StopBits::try_from(self.serial.stop_bits).map_err(|bits| {
            ConfigError::Invalid(format!("serial.stop_bits must be 1 or 2, got {bits}"))
        })?;
        Ok(SerialConfig::new(device)
            .with_baud_rate(self.serial.baud_rate)
            .with_parity(self.serial.parity)
            .with_stop_bits(stop_bits)
            .with_read_timeout(Duration::from_millis(self.serial.read_timeout_ms)))
    }

    /// Loop settings for the given relay variant.
    pub fn relay_settings(&self, variant: Variant) -> RelaySettings {
        let send = match variant {
            Variant::Console => SendSettings::console(),
            Variant::Keys => {
                SendSettings::keys(Duration::from_millis(self.timing.cycle_interval_ms))
            }
        };
        RelaySettings {
            send,
            receive: ReceiveSettings {
                poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
                max_chunk: self.timing.read_chunk,
            },
        }
    }

    pub fn key_hold(&self) -> Duration {
        Duration::from_millis(self.timing.key_hold_ms)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from the platform path, or defaults if there is none.
///
/// # Errors
///
/// Same as [`load_config_from`].
pub fn load_config() -> Result<RelayConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads and validates the config at `path`, returning defaults if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<RelayConfig, ConfigError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!("loading config from {}", path.display());
            toml::from_str::<RelayConfig>(&content)?
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            RelayConfig::default()
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Resolves the platform config directory including the app subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("SerialRelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("serial-relay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("SerialRelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("serial-relay-{}-{name}.toml", std::process::id()))
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_matches_device_uart() {
        // Arrange / Act
        let cfg = RelayConfig::default();

        // Assert
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.serial.parity, Parity::None);
        assert_eq!(cfg.serial.stop_bits, 1);
        assert_eq!(cfg.serial.read_timeout_ms, 2000);
    }

    #[test]
    fn test_default_timing_values() {
        let cfg = TimingSection::default();
        assert_eq!(cfg.poll_interval_ms, 1000);
        assert_eq!(cfg.cycle_interval_ms, 100);
        assert_eq!(cfg.read_chunk, 256);
        assert_eq!(cfg.key_hold_ms, 500);
    }

    #[test]
    fn test_default_config_has_no_devices_and_info_level() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.ports, PortsSection::default());
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.validate().is_ok());
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: RelayConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_partial_section_overrides_only_named_fields() {
        // Arrange
        let toml_str = r#"
[serial]
baud_rate = 115200
parity = "even"

[ports]
inbound = "COM20"
outbound = "COM21"
"#;

        // Act
        let cfg: RelayConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.serial.baud_rate, 115_200);
        assert_eq!(cfg.serial.parity, Parity::Even);
        assert_eq!(cfg.serial.read_timeout_ms, 2000);
        assert_eq!(cfg.ports.inbound.as_deref(), Some("COM20"));
        assert_eq!(cfg.ports.outbound.as_deref(), Some("COM21"));
        assert_eq!(cfg.ports.device, None);
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        // Arrange
        let mut cfg = RelayConfig::default();
        cfg.ports.device = Some("/dev/ttyUSB0".to_string());
        cfg.timing.poll_interval_ms = 250;

        // Act
        let toml_str = cfg.to_toml().expect("serialize");
        let restored: RelayConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
        assert!(!toml_str.contains("inbound"), "None ports must be omitted");
    }

    #[test]
    fn test_unknown_parity_is_parse_error() {
        let result: Result<RelayConfig, toml::de::Error> =
            toml::from_str("[serial]\nparity = \"mark\"\n");
        assert!(result.is_err());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_invalid_stop_bits_rejected() {
        let mut cfg = RelayConfig::default();
        cfg.serial.stop_bits = 3;

        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(cfg.serial_config("COM1"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_chunk_rejected() {
        let mut cfg = RelayConfig::default();
        cfg.timing.read_chunk = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut cfg = RelayConfig::default();
        cfg.timing.poll_interval_ms = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_cycle_interval_rejected() {
        let mut cfg = RelayConfig::default();
        cfg.timing.cycle_interval_ms = 0;

        let err = cfg.validate().unwrap_err();

        assert!(err.to_string().contains("cycle_interval_ms"), "{err}");
    }

    // ── Derived settings ──────────────────────────────────────────────────────

    #[test]
    fn test_serial_config_carries_line_settings() {
        // Arrange
        let mut cfg = RelayConfig::default();
        cfg.serial.stop_bits = 2;
        cfg.serial.read_timeout_ms = 500;

        // Act
        let serial = cfg.serial_config("COM7").expect("valid");

        // Assert
        assert_eq!(serial.device, "COM7");
        assert_eq!(serial.stop_bits, StopBits::Two);
        assert_eq!(serial.read_timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_console_variant_has_no_pacing() {
        let settings = RelayConfig::default().relay_settings(Variant::Console);
        assert_eq!(settings.send.pacing, None);
        assert_eq!(settings.receive.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.receive.max_chunk, 256);
    }

    #[test]
    fn test_keys_variant_paces_by_cycle_interval() {
        let mut cfg = RelayConfig::default();
        cfg.timing.cycle_interval_ms = 40;
        let settings = cfg.relay_settings(Variant::Keys);
        assert_eq!(settings.send.pacing, Some(Duration::from_millis(40)));
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = scratch_path("missing");
        let _ = std::fs::remove_file(&path);

        let cfg = load_config_from(&path).expect("defaults");

        assert_eq!(cfg, RelayConfig::default());
    }

    #[test]
    fn test_load_reads_and_validates_file() {
        // Arrange
        let path = scratch_path("invalid");
        std::fs::write(&path, "[timing]\nread_chunk = 0\n").expect("write scratch file");

        // Act
        let result = load_config_from(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let path = scratch_path("malformed");
        std::fs::write(&path, "[[[ not valid toml").expect("write scratch file");

        let result = load_config_from(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
