//! The ordered list of things a measurement run does. A plan is plain data;
//! [`crate::scan_controller::ScanController::run`] carries it out.

use crate::config::SweepConfig;
use crate::dataset::Mode;
use crate::hardware::Orientation;

use std::fmt;

/// One step of a [`ScanPlan`].
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    /// Write a free-text note to the acquisition log.
    Annotate(String),
    SourceOn,
    SourceOff,
    /// Open a dataset.
    Start { name: String, origin: i32, mode: Mode },
    /// Move to `target`, sampling on the way if `collect` is set.
    Steer { target: Orientation, collect: bool },
    /// Close the open dataset and print it.
    Emit,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStep::Annotate(text) => write!(f, "note '{}'", text),
            PlanStep::SourceOn => write!(f, "source on"),
            PlanStep::SourceOff => write!(f, "source off"),
            PlanStep::Start { name, origin, mode } => {
                write!(f, "start {} dataset '{}' at origin {}", mode, name, origin)
            }
            PlanStep::Steer {
                target,
                collect: true,
            } => write!(f, "collect to {}", target),
            PlanStep::Steer { target, .. } => write!(f, "rotate to {}", target),
            PlanStep::Emit => write!(f, "emit"),
        }
    }
}

/// See the module documentation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPlan {
    steps: Vec<PlanStep>,
}

/// Orders the azimuth sweep endpoints so the nearer one comes first. A tie
/// goes to the minimum.
pub fn sweep_order(current_azimuth: f64, azimuth_min: f64, azimuth_max: f64) -> (f64, f64) {
    if (azimuth_max - current_azimuth).abs() < (azimuth_min - current_azimuth).abs() {
        (azimuth_max, azimuth_min)
    } else {
        (azimuth_min, azimuth_max)
    }
}

impl ScanPlan {
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn push(&mut self, step: PlanStep) {
        self.steps.push(step);
    }

    fn steer(&mut self, azimuth: f64, elevation: f64, collect: bool) {
        self.push(PlanStep::Steer {
            target: Orientation::new(azimuth, elevation),
            collect,
        });
    }

    fn start(&mut self, name: &str, origin: i32, mode: Mode) {
        self.push(PlanStep::Start {
            name: name.to_owned(),
            origin,
            mode,
        });
    }

    /// The standard measurement: an optional background sweep with the
    /// source off, then the azimuth plane and optionally the elevation plane
    /// with the source on.
    ///
    /// `current_azimuth` is where the rotator is before the run. The first
    /// sweep starts from whichever azimuth endpoint is nearer, and each
    /// following azimuth sweep starts where the previous one ended.
    pub fn standard(sweep: &SweepConfig, current_azimuth: f64) -> Self {
        let origin = sweep.origin_azimuth;
        let el_min = sweep.elevation_min as f64;
        let el_max = sweep.elevation_max as f64;
        let (mut near, mut far) = sweep_order(
            current_azimuth,
            sweep.azimuth_min as f64,
            sweep.azimuth_max as f64,
        );

        let mut plan = Self::default();
        plan.push(PlanStep::Annotate(format!(
            "Starting antenna measurement, origin {}",
            origin
        )));

        if sweep.background {
            plan.push(PlanStep::SourceOff);
            plan.start("background", origin, Mode::Azimuth);
            plan.steer(near, el_min, false);
            plan.steer(far, el_min, true);
            plan.push(PlanStep::Emit);
            std::mem::swap(&mut near, &mut far);
        }

        plan.push(PlanStep::SourceOn);
        plan.start("azimuth", origin, Mode::Azimuth);
        plan.steer(near, el_min, false);
        plan.steer(far, el_min, true);
        plan.push(PlanStep::Emit);

        if sweep.elevation_sweep {
            plan.start("elevation", origin, Mode::Elevation);
            plan.steer(origin as f64, el_min, false);
            plan.steer(origin as f64, el_max, true);
            plan.steer(origin as f64, el_min, true);
            plan.push(PlanStep::Emit);
        }

        plan.push(PlanStep::SourceOff);
        plan.push(PlanStep::Annotate(
            "Data collection finished successfully.".to_owned(),
        ));
        plan
    }
}

impl IntoIterator for ScanPlan {
    type Item = PlanStep;
    type IntoIter = std::vec::IntoIter<PlanStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steers(plan: &ScanPlan) -> Vec<(f64, f64, bool)> {
        plan.steps()
            .iter()
            .filter_map(|s| match s {
                PlanStep::Steer { target, collect } => {
                    Some((target.azimuth, target.elevation, *collect))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nearer_endpoint_first() {
        assert_eq!(sweep_order(350.0, 0.0, 360.0), (360.0, 0.0));
        assert_eq!(sweep_order(10.0, 0.0, 360.0), (0.0, 360.0));
        assert_eq!(sweep_order(180.0, 0.0, 360.0), (0.0, 360.0));
    }

    #[test]
    fn standard_plan_from_the_minimum_end() {
        let plan = ScanPlan::standard(&SweepConfig::default(), 20.0);
        assert_eq!(
            steers(&plan),
            vec![
                (0.0, 0.0, false),
                (360.0, 0.0, true),
                (360.0, 0.0, false),
                (0.0, 0.0, true),
                (0.0, 0.0, false),
                (0.0, 90.0, true),
                (0.0, 0.0, true),
            ]
        );

        let steps = plan.steps();
        assert_eq!(steps[1], PlanStep::SourceOff);
        assert!(matches!(steps.last(), Some(PlanStep::Annotate(_))));
        assert_eq!(steps[steps.len() - 2], PlanStep::SourceOff);
    }

    #[test]
    fn every_start_is_emitted() {
        let plan = ScanPlan::standard(&SweepConfig::default(), 0.0);
        let mut open = false;
        for step in plan.steps() {
            match step {
                PlanStep::Start { .. } => {
                    assert!(!open);
                    open = true;
                }
                PlanStep::Emit => {
                    assert!(open);
                    open = false;
                }
                _ => {}
            }
        }
        assert!(!open);
    }

    #[test]
    fn azimuth_only_without_background() {
        let sweep = SweepConfig {
            azimuth_min: 90,
            azimuth_max: 270,
            origin_azimuth: 180,
            background: false,
            elevation_sweep: false,
            ..SweepConfig::default()
        };
        let plan = ScanPlan::standard(&sweep, 300.0);
        assert_eq!(
            steers(&plan),
            vec![(270.0, 0.0, false), (90.0, 0.0, true)]
        );
        assert!(plan.steps().contains(&PlanStep::Start {
            name: "azimuth".to_owned(),
            origin: 180,
            mode: Mode::Azimuth,
        }));
        let offs = plan
            .steps()
            .iter()
            .filter(|s| **s == PlanStep::SourceOff)
            .count();
        assert_eq!(offs, 1);
    }
}
