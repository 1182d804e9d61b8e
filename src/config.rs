//! Run configuration, read from a [ron] file. Every field has a default, so a
//! file only needs to mention what it changes:
//!
//! ```text
//! (
//!     rotator: (model: Rotctld, device: Some("localhost:4533")),
//!     sweep: (azimuth_min: 90, azimuth_max: 270, origin_azimuth: 180),
//!     source: Cw(on_message: "SRC ON", off_message: "CL"),
//! )
//! ```

use crate::dataset::Statistic;

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, fs, path::Path, path::PathBuf, time::Duration};

/// Which rotator driver to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum RotatorModel {
    /// Yaesu GS-232 controller on a serial port.
    #[default]
    Gs232,
    /// hamlib `rotctld` at `host:port`.
    Rotctld,
    /// No hardware at all.
    Simulated,
}

/// Which receiver driver to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ReceiverModel {
    /// Kenwood TS-2000 on a serial port.
    #[default]
    Ts2000,
    /// No hardware at all.
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    pub model: RotatorModel,
    /// Serial device, or `host:port` for `rotctld`. Asked for when missing.
    pub device: Option<String>,
    pub baud: u32,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            model: RotatorModel::default(),
            device: None,
            baud: 9600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub model: ReceiverModel,
    pub device: Option<String>,
    pub baud: u32,
    /// S-meter to read: 0/2 main receiver, 1/3 sub receiver.
    pub unit: u8,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            model: ReceiverModel::default(),
            device: None,
            baud: 9600,
            unit: 0,
        }
    }
}

/// How the source gets switched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SourceConfig {
    /// Prompt on the terminal and wait for ENTER.
    #[default]
    Manual,
    /// Key CW messages through the receiver.
    Cw {
        on_message: String,
        off_message: String,
    },
    /// Switch the simulated source.
    Simulated,
}

/// Where the scan goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub azimuth_min: i32,
    pub azimuth_max: i32,
    pub elevation_min: i32,
    pub elevation_max: i32,
    /// Azimuth of the source, used as the origin of azimuth plots.
    pub origin_azimuth: i32,
    /// Sweep the azimuth plane once with the source off first.
    pub background: bool,
    /// Sweep the elevation plane after the azimuth plane.
    pub elevation_sweep: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            azimuth_min: 0,
            azimuth_max: 360,
            elevation_min: 0,
            elevation_max: 90,
            origin_azimuth: 0,
            background: true,
            elevation_sweep: true,
        }
    }
}

/// How each move is supervised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteerConfig {
    /// Degrees from the target, on both axes, that count as arrived.
    pub tolerance_deg: f64,
    /// Longest a single move may take before the run is abandoned.
    pub timeout_secs: f64,
    /// Consecutive failed position reads tolerated before a move is given up
    /// on and treated as complete.
    pub error_budget: u32,
    pub backoff_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for SteerConfig {
    fn default() -> Self {
        Self {
            tolerance_deg: 3.0,
            timeout_secs: 70.0,
            error_budget: 3,
            backoff_ms: 3000,
            poll_interval_ms: 100,
        }
    }
}

impl SteerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything a capture run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    pub rotator: RotatorConfig,
    pub receiver: ReceiverConfig,
    pub source: SourceConfig,
    pub sweep: SweepConfig,
    pub steer: SteerConfig,
    pub statistic: Statistic,
    pub log_path: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            rotator: RotatorConfig::default(),
            receiver: ReceiverConfig::default(),
            source: SourceConfig::default(),
            sweep: SweepConfig::default(),
            steer: SteerConfig::default(),
            statistic: Statistic::default(),
            log_path: PathBuf::from("data.log"),
        }
    }
}

/// Errors while loading or saving a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    RonError(ron::Error),
    RonSpannedError(ron::error::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::IoError(error) => Cow::from(format!("io error: {}", error)),
            ConfigError::RonError(error) => Cow::from(format!("ron error: {}", error)),
            ConfigError::RonSpannedError(error) => Cow::from(format!("config error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl ScanConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        ron::de::from_str(text).map_err(ConfigError::RonSpannedError)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::IoError)?;
        Self::from_ron(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ScanConfig::from_ron("()").unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.steer.timeout(), Duration::from_secs(70));
        assert_eq!(config.log_path, PathBuf::from("data.log"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ScanConfig::from_ron(
            r#"(
                rotator: (model: Rotctld, device: Some("localhost:4533")),
                sweep: (azimuth_min: 90, azimuth_max: 270, origin_azimuth: 180),
                source: Cw(on_message: "SRC ON", off_message: "CL"),
                statistic: Mean,
            )"#,
        )
        .unwrap();

        assert_eq!(config.rotator.model, RotatorModel::Rotctld);
        assert_eq!(config.rotator.device.as_deref(), Some("localhost:4533"));
        assert_eq!(config.rotator.baud, 9600);
        assert_eq!(config.sweep.azimuth_max, 270);
        assert_eq!(config.sweep.elevation_max, 90);
        assert!(config.sweep.background);
        assert_eq!(
            config.source,
            SourceConfig::Cw {
                on_message: "SRC ON".to_owned(),
                off_message: "CL".to_owned()
            }
        );
        assert_eq!(config.statistic, Statistic::Mean);
    }

    #[test]
    fn written_config_reads_back() {
        let mut config = ScanConfig::default();
        config.receiver.unit = 1;
        config.steer.tolerance_deg = 1.5;
        config.source = SourceConfig::Simulated;

        let text = config.to_ron().unwrap();
        assert_eq!(ScanConfig::from_ron(&text).unwrap(), config);
    }

    #[test]
    fn unknown_fields_are_errors() {
        assert!(matches!(
            ScanConfig::from_ron("(rotater: ())"),
            Err(ConfigError::RonSpannedError(_))
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ScanConfig::from_path(dir.path().join("nope.ron")),
            Err(ConfigError::IoError(_))
        ));
    }
}
