mod gui;

use antpattern::{
    acquisition_log::LogReader,
    dataset::{DatasetAggregator, EmittedDataset, Statistic},
};
use clap::Parser;
use env_logger::Env;
use gui::{engage_gui, Plot};
use log::{error, info};
use std::{error::Error, path::PathBuf, process};

/// Plots the patterns recorded in an acquisition log.
#[derive(Debug, Parser)]
#[clap(version, about)]
struct ViewerArgs {
    /// Acquisition log to plot
    log_path: PathBuf,

    /// What each angle reports
    #[arg(short = 's', long = "statistic", value_enum, default_value_t = Statistic::Max)]
    statistic: Statistic,
}

/// Turns `(display_angle, strength)` pairs into points on the unit disc. The
/// weakest reading of the dataset lands on the centre and the strongest on
/// the rim.
fn to_polar(dataset: &EmittedDataset) -> Vec<(f64, f64)> {
    let (lo, hi) = dataset
        .points()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, s)| {
            (lo.min(s), hi.max(s))
        });
    let span = hi - lo;

    dataset
        .points()
        .map(|(angle, strength)| {
            let radius = if span > 0.0 {
                (strength - lo) / span
            } else {
                1.0
            };
            let theta = (angle as f64).to_radians();
            (radius * theta.cos(), radius * theta.sin())
        })
        .collect()
}

fn plots(datasets: &[EmittedDataset]) -> Vec<Plot> {
    datasets
        .iter()
        .filter(|d| !d.is_empty())
        .map(|d| Plot {
            title: format!("{} ({})", d.name().unwrap_or("unnamed"), d.mode()),
            points: to_polar(d),
        })
        .collect()
}

fn run(args: ViewerArgs) -> Result<(), Box<dyn Error>> {
    let reader = LogReader::open(&args.log_path)?;
    let datasets =
        DatasetAggregator::new(args.statistic).replay(reader, |note| info!("# {}", note))?;

    let plots = plots(&datasets);
    if plots.is_empty() {
        return Err(format!("{} holds no samples", args.log_path.display()).into());
    }
    engage_gui(plots)
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    if let Err(e) = run(ViewerArgs::parse()) {
        error!("{}", e);
        process::exit(1);
    }
}
