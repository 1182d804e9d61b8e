//! Drives the rotator through a [`ScanPlan`] and samples the receiver on
//! the way.
//!
//! Each move is supervised by [`ScanController::steer`]: command the target,
//! then poll the position until the rotator is within tolerance on both
//! axes. Every poll that lands short of the target can take a sample, which
//! is what turns a sweep into a pattern. Failed polls are retried after a
//! short backoff; too many in a row and the move is written off as done,
//! since flaky hardware should not hang a run. Running out of time is
//! different: a rotator that cannot reach its target makes the rest of the
//! plan meaningless, so the run is abandoned.

use crate::config::SteerConfig;
use crate::hardware::{HardwareError, Orientation, Rig};
use crate::scan_plan::{PlanStep, ScanPlan};
use crate::session::{AcquisitionSession, SessionError};
use crate::Sample;

use log::{debug, error, info, warn};
use std::{
    borrow::Cow,
    fmt,
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// Limits for a single move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerSettings {
    pub tolerance: f64,
    pub timeout: Duration,
    pub error_budget: u32,
    pub backoff: Duration,
    pub poll_interval: Duration,
}

impl From<&SteerConfig> for SteerSettings {
    fn from(config: &SteerConfig) -> Self {
        Self {
            tolerance: config.tolerance_deg,
            timeout: config.timeout(),
            error_budget: config.error_budget,
            backoff: config.backoff(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// How a move ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteerOutcome {
    /// The rotator reported a position within tolerance of the target.
    Arrived,
    /// Position reads kept failing and the move was treated as complete.
    Degraded { failures: u32 },
}

/// Reasons a scan run stops early.
#[derive(Debug)]
pub enum ScanError {
    /// The rotator did not reach `target` in time.
    Timeout {
        target: Orientation,
        elapsed: Duration,
    },

    /// The operator interrupted the run.
    Interrupted,

    /// The session refused an operation or could not write the log.
    Session(SessionError),

    /// Talking to the equipment failed somewhere it cannot be retried.
    Hardware(HardwareError),

    /// Emitted data could not be written out.
    IoError(io::Error),
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ScanError::Timeout { target, elapsed } => Cow::from(format!(
                "timeout: rotator took more than {:.0?} to reach {}",
                elapsed, target
            )),
            ScanError::Interrupted => Cow::from("interrupted"),
            ScanError::Session(error) => Cow::from(error.to_string()),
            ScanError::Hardware(error) => Cow::from(format!("hardware error: {}", error)),
            ScanError::IoError(error) => Cow::from(format!("output error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ScanError {}

impl From<SessionError> for ScanError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<HardwareError> for ScanError {
    fn from(value: HardwareError) -> Self {
        Self::Hardware(value)
    }
}

impl From<io::Error> for ScanError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        spin_sleep::sleep(duration);
    }
}

/// See the module documentation.
pub struct ScanController {
    rig: Rig,
    settings: SteerSettings,
    interrupted: Arc<AtomicBool>,
}

impl ScanController {
    pub fn new(rig: Rig, settings: SteerSettings) -> Self {
        Self {
            rig,
            settings,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a flag that, once raised, stops the run at the next poll.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    fn check_interrupt(&self) -> Result<(), ScanError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(ScanError::Interrupted);
        }
        Ok(())
    }

    /// Reads the rotator position, retrying within the error budget.
    pub fn current_position(&mut self) -> Result<Orientation, ScanError> {
        let mut failures = 0;
        loop {
            self.check_interrupt()?;
            match self.rig.positioner.get_position() {
                Ok(position) => return Ok(position),
                Err(e) if failures < self.settings.error_budget => {
                    failures += 1;
                    debug!("Position read failed ({}), retrying", e);
                    pause(self.settings.backoff);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Moves to `target` and blocks until the rotator gets there. With
    /// `collect` set, every poll short of the target records a sample.
    ///
    /// On timeout a "Timeout" annotation is written to the log before the
    /// error is returned.
    pub fn steer<W: Write>(
        &mut self,
        session: &mut AcquisitionSession<W>,
        target: Orientation,
        collect: bool,
    ) -> Result<SteerOutcome, ScanError> {
        info!(
            "===> {} to {}...",
            if collect { "Collecting" } else { "Rotating" },
            target
        );

        if let Err(e) = self.rig.positioner.set_position(target) {
            warn!("Rotator did not accept move to {}: {}", target, e);
        }

        let started = Instant::now();
        let mut failures = 0;

        loop {
            self.check_interrupt()?;

            let elapsed = started.elapsed();
            if elapsed > self.settings.timeout {
                error!("Timeout: rotator is taking too long");
                if let Err(e) = session.annotate("Timeout") {
                    error!("Could not annotate the timeout: {}", e);
                }
                return Err(ScanError::Timeout { target, elapsed });
            }

            let position = match self.rig.positioner.get_position() {
                Ok(position) => position,
                Err(e) => {
                    failures += 1;
                    if failures > self.settings.error_budget {
                        warn!(
                            "Giving up on reaching {} after {} failed reads: {}",
                            target, failures, e
                        );
                        return Ok(SteerOutcome::Degraded { failures });
                    }
                    debug!("Position read failed ({}), backing off", e);
                    pause(self.settings.backoff);
                    continue;
                }
            };
            failures = 0;

            if position.is_near(&target, self.settings.tolerance) {
                info!("Arrived at {}", position);
                return Ok(SteerOutcome::Arrived);
            }

            if collect {
                match self.rig.receiver.get_strength() {
                    Ok(strength) => session.record(Sample {
                        azimuth: position.azimuth,
                        elevation: position.elevation,
                        strength,
                    })?,
                    Err(e) => warn!("Skipping sample at {}: {}", position, e),
                }
            }

            pause(self.settings.poll_interval);
        }
    }

    /// Carries out every step of `plan`, writing each emitted dataset to
    /// `out`. A dataset still open when the plan ends is emitted too.
    pub fn run<W: Write>(
        &mut self,
        session: &mut AcquisitionSession<W>,
        plan: ScanPlan,
        out: &mut impl Write,
    ) -> Result<(), ScanError> {
        info!("===>>> Starting antenna measurement...");

        for step in plan {
            debug!("Plan step: {}", step);
            match step {
                PlanStep::Annotate(text) => session.annotate(&text)?,
                PlanStep::SourceOn => {
                    info!("===> Turning source on");
                    self.rig.source_on()?;
                }
                PlanStep::SourceOff => {
                    info!("===> Turning source off");
                    self.rig.source_off()?;
                }
                PlanStep::Start { name, origin, mode } => session.start(&name, origin, mode)?,
                PlanStep::Steer { target, collect } => {
                    self.steer(session, target, collect)?;
                }
                PlanStep::Emit => session.emit().write_to(out)?,
            }
        }

        if session.is_open() {
            session.emit().write_to(out)?;
        }

        info!("===>>> Data collection finished successfully.");
        Ok(())
    }

    pub fn rig(&mut self) -> &mut Rig {
        &mut self.rig
    }

    /// Hands the rig back; dropping it closes the equipment.
    pub fn into_rig(self) -> Rig {
        self.rig
    }
}
