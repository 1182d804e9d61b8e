use std::{borrow::Cow, error::Error, fmt::Display};

#[derive(Debug)]
pub enum GuiError {
    IoError(std::io::Error),
    /// There was nothing to choose from.
    NoDevices,
    /// The operator quit without choosing.
    Cancelled,
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            GuiError::IoError(error) => Cow::from(format!("terminal error: {}", error)),
            GuiError::NoDevices => Cow::from("no serial devices found"),
            GuiError::Cancelled => Cow::from("no device selected"),
        };

        write!(f, "{}", msg)
    }
}

impl Error for GuiError {}

impl From<std::io::Error> for GuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}
