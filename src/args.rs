// Commandline argument parser using clap for antpattern

use crate::config::{ReceiverModel, RotatorModel, ScanConfig, SourceConfig};
use crate::dataset::Statistic;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct AntArgs {
    #[command(subcommand)]
    /// Which task to perform, a live capture or a replay of an earlier log
    pub command: CommandTask,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Drive the rotator through a measurement and print the patterns
    #[command(about)]
    Capture(CaptureCommand),

    /// Rebuild the patterns of an earlier capture from its log
    #[command(about)]
    Replay(ReplayCommand),
}

/// An inclusive range of whole degrees, written `MIN,MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AngleRange {
    pub min: i32,
    pub max: i32,
}

fn parse_range(s: &str) -> Result<AngleRange, String> {
    let (min, max) = s
        .split_once(',')
        .ok_or_else(|| format!("expected MIN,MAX but got '{}'", s))?;
    let min: i32 = min
        .trim()
        .parse()
        .map_err(|e| format!("bad minimum '{}': {}", min, e))?;
    let max: i32 = max
        .trim()
        .parse()
        .map_err(|e| format!("bad maximum '{}': {}", max, e))?;
    if min > max {
        return Err(format!("minimum {} is above maximum {}", min, max));
    }
    Ok(AngleRange { min, max })
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct CaptureCommand {
    /// RON configuration file; flags given here override it
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Rotator driver
    #[arg(short = 'm', long = "rotator", value_enum)]
    pub rotator_model: Option<RotatorModel>,

    /// Rotator serial device, or host:port for rotctld
    #[arg(short = 'd', long = "rotator-device")]
    pub rotator_device: Option<String>,

    /// Receiver driver
    #[arg(long = "receiver", value_enum)]
    pub receiver_model: Option<ReceiverModel>,

    /// Receiver serial device
    #[arg(short = 'r', long = "receiver-device")]
    pub receiver_device: Option<String>,

    /// S-meter to read: 0/2 main receiver, 1/3 sub receiver
    #[arg(long = "unit")]
    pub unit: Option<u8>,

    /// Azimuth sweep, in degrees
    #[arg(short = 'a', long = "azimuth", value_name = "MIN,MAX", value_parser = parse_range, allow_hyphen_values = true)]
    pub azimuth: Option<AngleRange>,

    /// Elevation sweep, in degrees
    #[arg(short = 'e', long = "elevation", value_name = "MIN,MAX", value_parser = parse_range, allow_hyphen_values = true)]
    pub elevation: Option<AngleRange>,

    /// Azimuth of the source, used as the origin of azimuth plots
    #[arg(short = 'o', long = "origin", allow_hyphen_values = true)]
    pub origin: Option<i32>,

    /// Acquisition log to create. Must not exist yet
    #[arg(short = 'w', long = "log")]
    pub log_path: Option<PathBuf>,

    /// What each angle reports
    #[arg(short = 's', long = "statistic", value_enum)]
    pub statistic: Option<Statistic>,

    /// Skip the background sweep with the source off
    #[arg(long = "no-background")]
    pub no_background: bool,

    /// Skip the elevation sweep
    #[arg(long = "no-elevation")]
    pub no_elevation: bool,

    /// Use the simulated rotator, receiver and source
    #[arg(long = "simulate")]
    pub simulate: bool,
}

impl CaptureCommand {
    /// Overrides the fields of `config` that were given on the command line.
    pub fn apply(&self, config: &mut ScanConfig) {
        if self.simulate {
            config.rotator.model = RotatorModel::Simulated;
            config.receiver.model = ReceiverModel::Simulated;
            config.source = SourceConfig::Simulated;
        }
        if let Some(model) = self.rotator_model {
            config.rotator.model = model;
        }
        if let Some(device) = &self.rotator_device {
            config.rotator.device = Some(device.clone());
        }
        if let Some(model) = self.receiver_model {
            config.receiver.model = model;
        }
        if let Some(device) = &self.receiver_device {
            config.receiver.device = Some(device.clone());
        }
        if let Some(unit) = self.unit {
            config.receiver.unit = unit;
        }
        if let Some(AngleRange { min, max }) = self.azimuth {
            config.sweep.azimuth_min = min;
            config.sweep.azimuth_max = max;
        }
        if let Some(AngleRange { min, max }) = self.elevation {
            config.sweep.elevation_min = min;
            config.sweep.elevation_max = max;
        }
        if let Some(origin) = self.origin {
            config.sweep.origin_azimuth = origin;
        }
        if let Some(path) = &self.log_path {
            config.log_path = path.clone();
        }
        if let Some(statistic) = self.statistic {
            config.statistic = statistic;
        }
        if self.no_background {
            config.sweep.background = false;
        }
        if self.no_elevation {
            config.sweep.elevation_sweep = false;
        }
    }
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ReplayCommand {
    /// Acquisition log to read
    #[arg(short = 'l', long = "log")]
    pub log_path: PathBuf,

    /// What each angle reports
    #[arg(short = 's', long = "statistic", value_enum, default_value_t = Statistic::Max)]
    pub statistic: Statistic,
}
