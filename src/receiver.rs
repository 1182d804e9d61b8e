//! Driver for a Kenwood TS-2000 used as the measuring receiver.
//!
//! The radio speaks its CAT protocol over a serial line: ASCII commands
//! terminated by `;`. We only need two of them. `SM<unit>;` reads the
//! S-meter and answers `SM<unit><four digits>;`, and `KY` keys a short CW
//! message, which is how the remote source operator is told what to do.

use crate::hardware::{HardwareError, Receiver};

use log::debug;
use nom::{
    bytes::complete::tag,
    character::complete::{char, one_of, u32},
    sequence::{preceded, terminated, tuple},
    Finish, IResult,
};
use serial2::{CharSize, FlowControl, Parity, SerialPort, Settings, StopBits};
use std::{
    io::{Read, Write},
    path::Path,
    time::Duration,
};

/// Longest message the radio accepts in one `KY` command.
const KEYER_CHUNK: usize = 24;

/// Longest reply we are willing to wait for before giving up on finding `;`.
const MAX_REPLY: usize = 32;

/// Piecewise linear map from raw meter readings to calibrated values.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationTable(pub &'static [(i32, f64)]);

/// S-meter calibration of the TS-2000 main receiver, raw 0..=30 to dB.
pub const TS2000_STRENGTH: CalibrationTable = CalibrationTable(&[
    (0x00, -54.0),
    (0x03, -48.0),
    (0x06, -36.0),
    (0x09, -24.0),
    (0x0C, -12.0),
    (0x0F, 0.0),
    (0x14, 20.0),
    (0x19, 40.0),
    (0x1E, 60.0),
]);

impl CalibrationTable {
    /// Converts a raw reading, clamping to the ends of the table.
    pub fn raw_to_value(&self, raw: i32) -> f64 {
        let table = self.0;
        let (Some(first), Some(last)) = (table.first(), table.last()) else {
            return raw as f64;
        };

        if raw < first.0 {
            return first.1;
        }
        if raw >= last.0 {
            return last.1;
        }

        // The clamps above guarantee an upper neighbour past index 0.
        let i = table.iter().position(|&(r, _)| raw < r).unwrap_or(table.len() - 1);
        let (hi_raw, hi_val) = table[i];
        let (lo_raw, lo_val) = table[i - 1];
        hi_val - (hi_raw - raw) as f64 * (hi_val - lo_val) / (hi_raw - lo_raw) as f64
    }
}

fn parse_meter_reply(s: &str) -> IResult<&str, (char, u32)> {
    preceded(tag("SM"), tuple((one_of("0123"), terminated(u32, char(';')))))(s)
}

/// A TS-2000 reachable through any byte stream, normally a [`SerialPort`].
pub struct Ts2000Receiver<T> {
    link: T,
    unit: u8,
}

impl Ts2000Receiver<SerialPort> {
    /// Opens the radio on a serial device: 8N1 with RTS/CTS flow control.
    pub fn open(device: impl AsRef<Path>, baud: u32, unit: u8) -> Result<Self, HardwareError> {
        let mut port = SerialPort::open(device.as_ref(), |mut settings: Settings| {
            settings.set_raw();
            settings.set_baud_rate(baud)?;
            settings.set_char_size(CharSize::Bits8);
            settings.set_stop_bits(StopBits::One);
            settings.set_parity(Parity::None);
            settings.set_flow_control(FlowControl::RtsCts);
            Ok(settings)
        })?;
        port.set_read_timeout(Duration::from_secs(2))?;
        Self::new(port, unit)
    }
}

impl<T: Read + Write> Ts2000Receiver<T> {
    /// Wraps an open link. `unit` selects the meter: 0 and 2 read the main
    /// receiver, 1 and 3 the sub receiver.
    pub fn new(link: T, unit: u8) -> Result<Self, HardwareError> {
        if unit > 3 {
            return Err(HardwareError::InvalidUnit(unit));
        }
        Ok(Self { link, unit })
    }

    fn command(&mut self, command: &str) -> Result<(), HardwareError> {
        debug!("TS-2000 <- {}", command);
        self.link.write_all(command.as_bytes())?;
        self.link.flush()?;
        Ok(())
    }

    fn read_reply(&mut self) -> Result<String, HardwareError> {
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];

        while reply.len() < MAX_REPLY {
            if self.link.read(&mut byte)? == 0 {
                break;
            }
            reply.push(byte[0]);
            if byte[0] == b';' {
                let reply = String::from_utf8_lossy(&reply).into_owned();
                debug!("TS-2000 -> {}", reply);
                return Ok(reply);
            }
        }

        Err(HardwareError::Protocol(
            String::from_utf8_lossy(&reply).into_owned(),
        ))
    }

    /// Reads the raw meter value of the configured unit.
    pub fn read_meter(&mut self) -> Result<u32, HardwareError> {
        self.command(&format!("SM{};", self.unit))?;
        let reply = self.read_reply()?;

        match parse_meter_reply(&reply).finish() {
            Ok((_, (unit, raw))) if unit.to_digit(10) == Some(self.unit as u32) => Ok(raw),
            _ => Err(HardwareError::Protocol(reply)),
        }
    }

    /// Converts a raw meter value of the configured unit.
    pub fn to_strength(&self, raw: u32) -> f64 {
        match self.unit {
            0 | 2 => TS2000_STRENGTH.raw_to_value(raw as i32),
            _ => raw as f64 / 15.0,
        }
    }
}

impl<T: Read + Write> Receiver for Ts2000Receiver<T> {
    fn get_strength(&mut self) -> Result<f64, HardwareError> {
        let raw = self.read_meter()?;
        Ok(self.to_strength(raw))
    }

    /// Keys `text` as CW, 24 characters per `KY` command.
    fn send_message(&mut self, text: &str) -> Result<(), HardwareError> {
        let chars: Vec<char> = text.to_uppercase().chars().collect();
        for chunk in chars.chunks(KEYER_CHUNK) {
            let chunk: String = chunk.iter().collect();
            self.command(&format!("KY {:<width$};", chunk, width = KEYER_CHUNK))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Plays back canned replies and captures everything written.
    struct MockLink {
        replies: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl MockLink {
        fn new(replies: &str) -> Self {
            Self {
                replies: Cursor::new(replies.as_bytes().to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for MockLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.replies.read(buf)
        }
    }

    impl Write for MockLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn calibration_interpolates_and_clamps() {
        assert_eq!(TS2000_STRENGTH.raw_to_value(0), -54.0);
        assert_eq!(TS2000_STRENGTH.raw_to_value(3), -48.0);
        assert_eq!(TS2000_STRENGTH.raw_to_value(1), -52.0);
        assert_eq!(TS2000_STRENGTH.raw_to_value(17), 8.0);
        assert_eq!(TS2000_STRENGTH.raw_to_value(30), 60.0);
        assert_eq!(TS2000_STRENGTH.raw_to_value(45), 60.0);
        assert_eq!(TS2000_STRENGTH.raw_to_value(-5), -54.0);
    }

    #[test]
    fn parses_meter_reply() {
        let (rest, reply) = parse_meter_reply("SM00015;").unwrap();
        assert_eq!(rest, "");
        assert_eq!(reply, ('0', 15));
        assert!(parse_meter_reply("SM0;").is_err());
        assert!(parse_meter_reply("?;").is_err());
    }

    #[test]
    fn reads_main_receiver_strength() {
        let mut rx = Ts2000Receiver::new(MockLink::new("SM00015;"), 0).unwrap();
        assert_eq!(rx.get_strength().unwrap(), 0.0);
        assert_eq!(rx.link.written, b"SM0;");
    }

    #[test]
    fn reads_sub_receiver_strength() {
        let mut rx = Ts2000Receiver::new(MockLink::new("SM10003;"), 1).unwrap();
        assert_eq!(rx.get_strength().unwrap(), 0.2);
    }

    #[test]
    fn wrong_unit_or_garbage_is_a_protocol_error() {
        let mut rx = Ts2000Receiver::new(MockLink::new("SM10003;"), 0).unwrap();
        assert!(matches!(rx.get_strength(), Err(HardwareError::Protocol(_))));

        let mut rx = Ts2000Receiver::new(MockLink::new("SM0"), 0).unwrap();
        assert!(matches!(rx.get_strength(), Err(HardwareError::Protocol(_))));
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(matches!(
            Ts2000Receiver::new(MockLink::new(""), 4),
            Err(HardwareError::InvalidUnit(4))
        ));
    }

    #[test]
    fn keys_messages_in_chunks() {
        let mut rx = Ts2000Receiver::new(MockLink::new(""), 0).unwrap();
        rx.send_message("test de n0call src on please").unwrap();
        assert_eq!(
            String::from_utf8(rx.link.written).unwrap(),
            "KY TEST DE N0CALL SRC ON PL;KY EASE                    ;"
        );
    }

    #[test]
    fn missing_serial_device_is_an_io_error() {
        assert!(matches!(
            Ts2000Receiver::open("/nonexistent/antpattern-radio", 9600, 0),
            Err(HardwareError::IoError(_))
        ));
    }
}
