//! The equipment a measurement needs, as traits so the scan controller does
//! not care whether it is talking to a real rotator, a network daemon or a
//! simulation.

use log::info;
use std::{borrow::Cow, fmt, io};

/// Where the antenna is pointing, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    pub azimuth: f64,
    pub elevation: f64,
}

impl Orientation {
    pub fn new(azimuth: f64, elevation: f64) -> Self {
        Self { azimuth, elevation }
    }

    /// True if both axes are within `tolerance` degrees of `target`.
    pub fn is_near(&self, target: &Orientation, tolerance: f64) -> bool {
        (self.azimuth - target.azimuth).abs() <= tolerance
            && (self.elevation - target.elevation).abs() <= tolerance
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}, {:.1}", self.azimuth, self.elevation)
    }
}

/// Anything that can go wrong talking to a device.
#[derive(Debug)]
pub enum HardwareError {
    /// The link to the device failed.
    IoError(io::Error),

    /// The device answered with something we could not make sense of.
    Protocol(String),

    /// The device understood the request and refused it.
    Rejected(i32),

    /// The requested receiver unit does not exist.
    InvalidUnit(u8),
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use HardwareError as HE;
        let msg = match self {
            HE::IoError(error) => Cow::from(format!("io error: {}", error)),
            HE::Protocol(reply) => Cow::from(format!("unexpected reply '{}'", reply.trim())),
            HE::Rejected(code) => Cow::from(format!("device returned error code {}", code)),
            HE::InvalidUnit(unit) => Cow::from(format!("no receiver unit {}", unit)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for HardwareError {}

impl From<io::Error> for HardwareError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

/// An antenna rotator.
pub trait Positioner {
    /// Reads the current orientation. Rotators fail reads now and then, so
    /// callers are expected to retry.
    fn get_position(&mut self) -> Result<Orientation, HardwareError>;

    /// Commands a move. Returns as soon as the command is accepted, not when
    /// the rotator gets there.
    fn set_position(&mut self, target: Orientation) -> Result<(), HardwareError>;

    /// Releases the device. Called once, when the rig is dropped.
    fn close(&mut self) {}
}

/// A receiver with a signal strength meter.
pub trait Receiver {
    /// Reads the current signal strength, in the receiver's calibrated units.
    fn get_strength(&mut self) -> Result<f64, HardwareError>;

    /// Sends a short text message, used to tell a remote operator what to
    /// do with the source. Receivers that cannot transmit refuse it.
    fn send_message(&mut self, text: &str) -> Result<(), HardwareError> {
        let _ = text;
        Err(HardwareError::Rejected(-1))
    }

    /// Releases the device. Called once, when the rig is dropped.
    fn close(&mut self) {}
}

/// Turns the transmitting source antenna on and off, either by itself or by
/// asking somebody to do it.
pub trait SourceControl {
    fn turn_on(&mut self, receiver: &mut dyn Receiver) -> Result<(), HardwareError>;
    fn turn_off(&mut self, receiver: &mut dyn Receiver) -> Result<(), HardwareError>;
}

/// The full set of equipment for one measurement. Dropping the rig closes
/// every device, so handles are released on every exit path.
pub struct Rig {
    pub positioner: Box<dyn Positioner>,
    pub receiver: Box<dyn Receiver>,
    pub source: Box<dyn SourceControl>,
}

impl Rig {
    pub fn new(
        positioner: Box<dyn Positioner>,
        receiver: Box<dyn Receiver>,
        source: Box<dyn SourceControl>,
    ) -> Self {
        Self {
            positioner,
            receiver,
            source,
        }
    }

    pub fn source_on(&mut self) -> Result<(), HardwareError> {
        self.source.turn_on(self.receiver.as_mut())
    }

    pub fn source_off(&mut self) -> Result<(), HardwareError> {
        self.source.turn_off(self.receiver.as_mut())
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        info!("Closing rotator and receiver");
        self.positioner.close();
        self.receiver.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn near_checks_both_axes() {
        let target = Orientation::new(180.0, 45.0);
        assert!(Orientation::new(177.0, 47.5).is_near(&target, 3.0));
        assert!(!Orientation::new(176.9, 45.0).is_near(&target, 3.0));
        assert!(!Orientation::new(180.0, 41.0).is_near(&target, 3.0));
    }
}
