//! A pretend rotator, receiver and source that share one little world, for
//! dry runs without equipment and for exercising the scan controller in
//! tests.

use crate::hardware::{HardwareError, Orientation, Positioner, Receiver, SourceControl};

use log::info;
use rand::prelude::*;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Strength reported with the source off, and at the null of the pattern.
const NOISE_FLOOR: f64 = -54.0;

/// Strength on boresight with the source on.
const PEAK: f64 = 0.0;

#[derive(Debug, Clone, Copy, Default)]
struct World {
    position: Orientation,
    target: Orientation,
    source_on: bool,
}

#[derive(Debug, Clone)]
struct Settings {
    step: f64,
    noise: f64,
    failure_rate: f64,
    stuck: bool,
    boresight: f64,
    seed: Option<u64>,
    start: Orientation,
}

/// Builds a [`SimulatedRig`].
#[derive(Debug, Clone)]
pub struct SimulatedRigBuilder {
    settings: Settings,
}

impl SimulatedRigBuilder {
    /// Degrees each axis moves per position poll.
    pub fn step(mut self, step: f64) -> Self {
        self.settings.step = step.abs();
        self
    }

    /// Half-width of the uniform noise added to every strength reading.
    pub fn noise(mut self, noise: f64) -> Self {
        self.settings.noise = noise.abs();
        self
    }

    /// Probability in `[0, 1]` that a position poll fails.
    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.settings.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// A stuck rotator accepts commands and never moves.
    pub fn stuck(mut self, stuck: bool) -> Self {
        self.settings.stuck = stuck;
        self
    }

    /// Azimuth the simulated antenna radiates best towards.
    pub fn boresight(mut self, azimuth: f64) -> Self {
        self.settings.boresight = azimuth;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.settings.seed = Some(seed);
        self
    }

    pub fn start(mut self, position: Orientation) -> Self {
        self.settings.start = position;
        self
    }

    pub fn build(self) -> SimulatedRig {
        let world = World {
            position: self.settings.start,
            target: self.settings.start,
            source_on: false,
        };

        SimulatedRig {
            world: Arc::new(Mutex::new(world)),
            settings: self.settings,
        }
    }
}

/// Hands out devices that all see the same simulated world.
#[derive(Debug, Clone)]
pub struct SimulatedRig {
    world: Arc<Mutex<World>>,
    settings: Settings,
}

fn lock(world: &Mutex<World>) -> MutexGuard<'_, World> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

fn approach(current: f64, target: f64, step: f64) -> f64 {
    let delta = target - current;
    if delta.abs() <= step {
        target
    } else {
        current + step * delta.signum()
    }
}

impl SimulatedRig {
    pub fn builder() -> SimulatedRigBuilder {
        SimulatedRigBuilder {
            settings: Settings {
                step: 5.0,
                noise: 0.0,
                failure_rate: 0.0,
                stuck: false,
                boresight: 0.0,
                seed: None,
                start: Orientation::default(),
            },
        }
    }

    fn rng(&self, stream: u64) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }

    pub fn positioner(&self) -> SimulatedPositioner {
        SimulatedPositioner {
            world: Arc::clone(&self.world),
            settings: self.settings.clone(),
            rng: self.rng(0),
        }
    }

    pub fn receiver(&self) -> SimulatedReceiver {
        SimulatedReceiver {
            world: Arc::clone(&self.world),
            settings: self.settings.clone(),
            rng: self.rng(1),
        }
    }

    pub fn source(&self) -> SimulatedSource {
        SimulatedSource {
            world: Arc::clone(&self.world),
        }
    }

    /// Where the simulated antenna points right now.
    pub fn position(&self) -> Orientation {
        lock(&self.world).position
    }

    pub fn source_on(&self) -> bool {
        lock(&self.world).source_on
    }
}

/// The simulated rotator. Each successful poll moves it one step closer to
/// its target.
pub struct SimulatedPositioner {
    world: Arc<Mutex<World>>,
    settings: Settings,
    rng: StdRng,
}

impl Positioner for SimulatedPositioner {
    fn get_position(&mut self) -> Result<Orientation, HardwareError> {
        if self.settings.failure_rate > 0.0 && self.rng.gen_bool(self.settings.failure_rate) {
            return Err(HardwareError::Protocol("simulated read failure".to_owned()));
        }

        let mut world = lock(&self.world);
        if !self.settings.stuck {
            let step = self.settings.step;
            world.position = Orientation::new(
                approach(world.position.azimuth, world.target.azimuth, step),
                approach(world.position.elevation, world.target.elevation, step),
            );
        }
        Ok(world.position)
    }

    fn set_position(&mut self, target: Orientation) -> Result<(), HardwareError> {
        lock(&self.world).target = target;
        Ok(())
    }
}

/// The simulated receiver: a cardioid pattern around the boresight while the
/// source is on, the noise floor while it is off.
pub struct SimulatedReceiver {
    world: Arc<Mutex<World>>,
    settings: Settings,
    rng: StdRng,
}

impl SimulatedReceiver {
    fn pattern(&self, world: &World) -> f64 {
        if !world.source_on {
            return NOISE_FLOOR;
        }
        let off_axis = (world.position.azimuth - self.settings.boresight).to_radians();
        let tilt = world.position.elevation.to_radians().cos().max(0.0);
        let gain = (1.0 + off_axis.cos()) / 2.0 * tilt;
        NOISE_FLOOR + (PEAK - NOISE_FLOOR) * gain
    }
}

impl Receiver for SimulatedReceiver {
    fn get_strength(&mut self) -> Result<f64, HardwareError> {
        let world = *lock(&self.world);
        let noise = self.settings.noise;
        let jitter = if noise > 0.0 {
            self.rng.gen_range(-noise..noise)
        } else {
            0.0
        };
        Ok(self.pattern(&world) + jitter)
    }

    fn send_message(&mut self, text: &str) -> Result<(), HardwareError> {
        info!("Simulated CW: {}", text);
        Ok(())
    }
}

/// Flips the simulated source instantly.
pub struct SimulatedSource {
    world: Arc<Mutex<World>>,
}

impl SourceControl for SimulatedSource {
    fn turn_on(&mut self, _receiver: &mut dyn Receiver) -> Result<(), HardwareError> {
        lock(&self.world).source_on = true;
        Ok(())
    }

    fn turn_off(&mut self, _receiver: &mut dyn Receiver) -> Result<(), HardwareError> {
        lock(&self.world).source_on = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotator_steps_towards_target() {
        let rig = SimulatedRig::builder().step(4.0).build();
        let mut rot = rig.positioner();
        rot.set_position(Orientation::new(10.0, -3.0)).unwrap();

        assert_eq!(rot.get_position().unwrap(), Orientation::new(4.0, -3.0));
        assert_eq!(rot.get_position().unwrap(), Orientation::new(8.0, -3.0));
        assert_eq!(rot.get_position().unwrap(), Orientation::new(10.0, -3.0));
        assert_eq!(rig.position(), Orientation::new(10.0, -3.0));
    }

    #[test]
    fn stuck_rotator_never_moves() {
        let rig = SimulatedRig::builder().stuck(true).build();
        let mut rot = rig.positioner();
        rot.set_position(Orientation::new(90.0, 0.0)).unwrap();
        for _ in 0..10 {
            assert_eq!(rot.get_position().unwrap(), Orientation::default());
        }
    }

    #[test]
    fn always_failing_rotator() {
        let rig = SimulatedRig::builder().failure_rate(1.0).seed(7).build();
        let mut rot = rig.positioner();
        assert!(rot.get_position().is_err());
    }

    #[test]
    fn pattern_follows_source_and_boresight() {
        let rig = SimulatedRig::builder()
            .boresight(90.0)
            .start(Orientation::new(90.0, 0.0))
            .build();
        let mut rx = rig.receiver();
        let mut src = rig.source();

        assert_eq!(rx.get_strength().unwrap(), NOISE_FLOOR);
        src.turn_on(&mut rx).unwrap();
        assert!(rig.source_on());
        assert_eq!(rx.get_strength().unwrap(), PEAK);

        let mut rot = rig.positioner();
        rot.set_position(Orientation::new(270.0, 0.0)).unwrap();
        while rot.get_position().unwrap().azimuth != 270.0 {}
        assert!((rx.get_strength().unwrap() - NOISE_FLOOR).abs() < 1e-9);

        src.turn_off(&mut rx).unwrap();
        assert!(!rig.source_on());
    }

    #[test]
    fn noise_stays_within_bounds() {
        let rig = SimulatedRig::builder().noise(0.5).seed(42).build();
        let mut rx = rig.receiver();
        for _ in 0..100 {
            let s = rx.get_strength().unwrap();
            assert!((s - NOISE_FLOOR).abs() < 0.5);
        }
    }
}
