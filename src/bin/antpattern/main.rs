//! Command line front end: `capture` runs a measurement, `replay` rebuilds
//! the patterns of an earlier one from its log. Emitted datasets go to
//! standard output, everything else to the log on stderr.

use antpattern::{
    acquisition_log::{AcquisitionLog, LogReader},
    args::{
        AntArgs,
        CommandTask::{Capture, Replay},
        CaptureCommand, ReplayCommand,
    },
    config::{ReceiverModel, RotatorModel, ScanConfig, SourceConfig},
    dataset::DatasetAggregator,
    dummy_rig::SimulatedRig,
    gui::choose_serial_port,
    hardware::{Positioner, Receiver, Rig, SourceControl},
    receiver::Ts2000Receiver,
    rotator::{Gs232Rotator, RotctldRotator},
    scan_controller::{ScanController, ScanError, SteerSettings},
    scan_plan::ScanPlan,
    session::AcquisitionSession,
    source::{CwSource, ManualSource},
};

use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::{
    error::Error,
    io,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

// Example:
// cargo run --bin antpattern -- capture
//                            -m gs232 -d /dev/ttyUSB0
//                            -r /dev/ttyUSB1
//                            -a 0,360
//                            -o 90
//                            -w run1.log
//
// cargo run --bin antpattern -- replay -l run1.log

const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = AntArgs::parse();

    let result = match args.command {
        Capture(cmd) => capture(cmd),
        Replay(cmd) => replay(cmd),
    };

    if let Err(e) = result {
        if let Some(ScanError::Interrupted) = e.downcast_ref::<ScanError>() {
            warn!("Measurement interrupted; replay the log to recover the open dataset");
            process::exit(EXIT_INTERRUPTED);
        }
        error!("{}", e);
        process::exit(1);
    }
}

fn replay(cmd: ReplayCommand) -> Result<(), Box<dyn Error>> {
    info!("Replaying {}", cmd.log_path.display());
    let reader = LogReader::open(&cmd.log_path)?;
    let datasets = DatasetAggregator::new(cmd.statistic).replay(reader, |note| info!("# {}", note))?;

    let mut out = io::stdout().lock();
    for dataset in datasets {
        dataset.write_to(&mut out)?;
    }
    Ok(())
}

fn capture(cmd: CaptureCommand) -> Result<(), Box<dyn Error>> {
    let mut config = match &cmd.config {
        Some(path) => ScanConfig::from_path(path)?,
        None => ScanConfig::default(),
    };
    cmd.apply(&mut config);

    let log = AcquisitionLog::create(&config.log_path).map_err(|e| {
        format!("could not create log {}: {}", config.log_path.display(), e)
    })?;
    info!("Logging to {}", config.log_path.display());
    let mut session = AcquisitionSession::new(log, config.statistic);

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            process::exit(EXIT_INTERRUPTED);
        }
        warn!("Interrupt received, stopping (press Ctrl-C again to quit now)");
    })?;

    let rig = open_rig(&config)?;
    let mut scan = ScanController::new(rig, SteerSettings::from(&config.steer))
        .with_interrupt(interrupted);

    let mut out = io::stdout().lock();
    let result = scan.current_position().and_then(|start| {
        info!("Rotator is at {}", start);
        let plan = ScanPlan::standard(&config.sweep, start.azimuth);
        scan.run(&mut session, plan, &mut out)
    });

    if let Err(ScanError::Interrupted) = &result {
        session.annotate("Interrupted")?;
    }
    // Closes the rotator and receiver before reporting.
    drop(scan);

    result.map_err(Into::into)
}

fn open_device(configured: Option<&str>, what: &str) -> Result<String, Box<dyn Error>> {
    match configured {
        Some(device) => Ok(device.to_owned()),
        None => Ok(choose_serial_port(what)?),
    }
}

/// The simulated world, if any device of the rig is simulated. Simulated
/// devices share it, so a simulated source is heard by a simulated receiver.
fn simulation(config: &ScanConfig) -> Option<SimulatedRig> {
    let wanted = config.rotator.model == RotatorModel::Simulated
        || config.receiver.model == ReceiverModel::Simulated
        || config.source == SourceConfig::Simulated;

    wanted.then(|| {
        SimulatedRig::builder()
            .noise(0.5)
            .boresight(config.sweep.origin_azimuth as f64)
            .build()
    })
}

fn simulated(sim: &Option<SimulatedRig>) -> Result<&SimulatedRig, Box<dyn Error>> {
    sim.as_ref()
        .ok_or_else(|| "simulated device requested without a simulation".into())
}

fn open_rig(config: &ScanConfig) -> Result<Rig, Box<dyn Error>> {
    let sim = simulation(config);

    let positioner: Box<dyn Positioner> = match config.rotator.model {
        RotatorModel::Gs232 => {
            let device = open_device(config.rotator.device.as_deref(), "rotator")?;
            info!("Opening GS-232 rotator on {}", device);
            Box::new(Gs232Rotator::open(&device, config.rotator.baud)?)
        }
        RotatorModel::Rotctld => {
            let address = config
                .rotator
                .device
                .as_deref()
                .unwrap_or("localhost:4533");
            info!("Connecting to rotctld at {}", address);
            Box::new(RotctldRotator::connect(address)?)
        }
        RotatorModel::Simulated => {
            info!("Using the simulated rotator");
            Box::new(simulated(&sim)?.positioner())
        }
    };

    let receiver: Box<dyn Receiver> = match config.receiver.model {
        ReceiverModel::Ts2000 => {
            let device = open_device(config.receiver.device.as_deref(), "receiver")?;
            info!(
                "Opening TS-2000 on {}, S-meter {}",
                device, config.receiver.unit
            );
            Box::new(Ts2000Receiver::open(
                &device,
                config.receiver.baud,
                config.receiver.unit,
            )?)
        }
        ReceiverModel::Simulated => {
            info!("Using the simulated receiver");
            Box::new(simulated(&sim)?.receiver())
        }
    };

    let source: Box<dyn SourceControl> = match &config.source {
        SourceConfig::Manual => Box::new(ManualSource::stdio()),
        SourceConfig::Cw {
            on_message,
            off_message,
        } => Box::new(CwSource::new(on_message.as_str(), off_message.as_str())),
        SourceConfig::Simulated => Box::new(simulated(&sim)?.source()),
    };

    Ok(Rig::new(positioner, receiver, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_only_when_asked_for() {
        let mut config = ScanConfig::default();
        assert!(simulation(&config).is_none());

        config.source = SourceConfig::Simulated;
        assert!(simulation(&config).is_some());
    }

    #[test]
    fn simulated_rig_shares_one_world() {
        let mut config = ScanConfig::default();
        config.rotator.model = RotatorModel::Simulated;
        config.receiver.model = ReceiverModel::Simulated;
        config.source = SourceConfig::Simulated;
        config.sweep.origin_azimuth = 0;

        let mut rig = open_rig(&config).unwrap();
        let off = rig.receiver.get_strength().unwrap();
        rig.source_on().unwrap();
        let on = rig.receiver.get_strength().unwrap();
        assert!(on > off + 10.0);
    }
}
