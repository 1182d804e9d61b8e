//! Source control. The source antenna sits somewhere far away and is switched
//! by hand, so all we can do is ask: either on the terminal, or by keying a
//! CW message through the receiver for an operator listening at the source.

use crate::hardware::{HardwareError, Receiver, SourceControl};

use log::info;
use std::io::{self, BufRead, Stderr, StdinLock, Write};

/// Asks the person at the keyboard and waits for them to press ENTER.
pub struct ManualSource<R, W> {
    input: R,
    prompt: W,
}

impl ManualSource<StdinLock<'static>, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> ManualSource<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }

    fn ask(&mut self, state: &str) -> Result<(), HardwareError> {
        writeln!(self.prompt, "Please turn source {} and hit ENTER...", state)?;
        self.prompt.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> SourceControl for ManualSource<R, W> {
    fn turn_on(&mut self, _receiver: &mut dyn Receiver) -> Result<(), HardwareError> {
        self.ask("ON")
    }

    fn turn_off(&mut self, _receiver: &mut dyn Receiver) -> Result<(), HardwareError> {
        self.ask("OFF")
    }
}

/// Keys a CW message through the receiver. Does not wait for anybody.
#[derive(Debug, Clone)]
pub struct CwSource {
    on_message: String,
    off_message: String,
}

impl CwSource {
    pub fn new(on_message: impl Into<String>, off_message: impl Into<String>) -> Self {
        Self {
            on_message: on_message.into(),
            off_message: off_message.into(),
        }
    }
}

impl SourceControl for CwSource {
    fn turn_on(&mut self, receiver: &mut dyn Receiver) -> Result<(), HardwareError> {
        info!("Keying '{}'", self.on_message);
        receiver.send_message(&self.on_message)
    }

    fn turn_off(&mut self, receiver: &mut dyn Receiver) -> Result<(), HardwareError> {
        info!("Keying '{}'", self.off_message);
        receiver.send_message(&self.off_message)
    }
}
