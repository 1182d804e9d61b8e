//! Rotator drivers.
//!
//! [`Gs232Rotator`] talks to a Yaesu GS-232 style controller directly over a
//! serial line. [`RotctldRotator`] talks to hamlib's `rotctld` daemon over
//! TCP, which covers every rotator hamlib knows about.

use crate::hardware::{HardwareError, Orientation, Positioner};

use log::{debug, warn};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{i32, space0, space1, u32},
    combinator::map,
    sequence::{preceded, tuple},
    Finish, IResult,
};
use serial2::SerialPort;
use std::{
    io::{BufRead, BufReader, Read, Write},
    net::TcpStream,
    path::Path,
    time::Duration,
};

const MAX_REPLY: usize = 64;

// GS-232A answers `+0aaa+0eee`, GS-232B answers `AZ=aaa  EL=eee`.
fn parse_gs232_position(s: &str) -> IResult<&str, Orientation> {
    map(
        alt((
            tuple((preceded(tag("+0"), u32), preceded(tag("+0"), u32))),
            tuple((
                preceded(tag("AZ="), u32),
                preceded(tuple((space1, tag("EL="))), u32),
            )),
        )),
        |(azimuth, elevation)| Orientation::new(azimuth as f64, elevation as f64),
    )(s)
}

/// A GS-232 controller on any byte stream, normally a [`SerialPort`].
pub struct Gs232Rotator<T> {
    link: T,
}

impl Gs232Rotator<SerialPort> {
    pub fn open(device: impl AsRef<Path>, baud: u32) -> Result<Self, HardwareError> {
        let mut port = SerialPort::open(device.as_ref(), baud)?;
        port.set_read_timeout(Duration::from_secs(2))?;
        Ok(Self::new(port))
    }
}

impl<T: Read + Write> Gs232Rotator<T> {
    pub fn new(link: T) -> Self {
        Self { link }
    }

    fn command(&mut self, command: &str) -> Result<(), HardwareError> {
        debug!("GS-232 <- {}", command.trim_end());
        self.link.write_all(command.as_bytes())?;
        self.link.flush()?;
        Ok(())
    }

    /// Reads one reply line, skipping any line ends left over from the
    /// previous one.
    fn read_line(&mut self) -> Result<String, HardwareError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];

        while line.len() < MAX_REPLY {
            if self.link.read(&mut byte)? == 0 {
                break;
            }
            match byte[0] {
                b'\r' | b'\n' if line.is_empty() => continue,
                b'\r' | b'\n' => break,
                b => line.push(b),
            }
        }

        let line = String::from_utf8_lossy(&line).into_owned();
        debug!("GS-232 -> {}", line);
        Ok(line)
    }
}

impl<T: Read + Write> Positioner for Gs232Rotator<T> {
    fn get_position(&mut self) -> Result<Orientation, HardwareError> {
        self.command("C2\r")?;
        let reply = self.read_line()?;
        match parse_gs232_position(reply.trim()).finish() {
            Ok((_, position)) => Ok(position),
            Err(_) => Err(HardwareError::Protocol(reply)),
        }
    }

    fn set_position(&mut self, target: Orientation) -> Result<(), HardwareError> {
        let azimuth = target.azimuth.round().clamp(0.0, 450.0) as u32;
        let elevation = target.elevation.round().clamp(0.0, 180.0) as u32;
        self.command(&format!("W{:03} {:03}\r", azimuth, elevation))
    }
}

fn parse_rprt(s: &str) -> IResult<&str, i32> {
    preceded(tuple((space0, tag("RPRT"), space1)), i32)(s)
}

/// A rotator behind hamlib's `rotctld`, spoken to in its default protocol.
pub struct RotctldRotator<S: Read + Write> {
    stream: BufReader<S>,
}

impl RotctldRotator<TcpStream> {
    /// Connects to `host:port`; `rotctld` listens on 4533 by default.
    pub fn connect(address: &str) -> Result<Self, HardwareError> {
        let stream = TcpStream::connect(address)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        Ok(Self::new(stream))
    }
}

impl<S: Read + Write> RotctldRotator<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    fn command(&mut self, command: &str) -> Result<(), HardwareError> {
        debug!("rotctld <- {}", command.trim_end());
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String, HardwareError> {
        let mut line = String::new();
        if self.stream.read_line(&mut line)? == 0 {
            return Err(HardwareError::Protocol("connection closed".to_owned()));
        }
        debug!("rotctld -> {}", line.trim_end());
        Ok(line)
    }

    /// Reads a value line, turning an `RPRT` error report into an error.
    fn read_value(&mut self) -> Result<f64, HardwareError> {
        let line = self.read_line()?;
        if let Ok((_, code)) = parse_rprt(&line).finish() {
            return Err(HardwareError::Rejected(code));
        }
        line.trim()
            .parse()
            .map_err(|_| HardwareError::Protocol(line))
    }
}

impl<S: Read + Write> Positioner for RotctldRotator<S> {
    fn get_position(&mut self) -> Result<Orientation, HardwareError> {
        self.command("p\n")?;
        let azimuth = self.read_value()?;
        let elevation = self.read_value()?;
        Ok(Orientation::new(azimuth, elevation))
    }

    fn set_position(&mut self, target: Orientation) -> Result<(), HardwareError> {
        self.command(&format!("P {:.2} {:.2}\n", target.azimuth, target.elevation))?;
        let line = self.read_line()?;
        match parse_rprt(&line).finish() {
            Ok((_, 0)) => Ok(()),
            Ok((_, code)) => Err(HardwareError::Rejected(code)),
            Err(_) => Err(HardwareError::Protocol(line)),
        }
    }

    fn close(&mut self) {
        if let Err(e) = self.command("q\n") {
            warn!("Could not say goodbye to rotctld: {}", e);
        }
    }
}
