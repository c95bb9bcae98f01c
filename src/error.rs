// src/error.rs  -  Error taxonomy for the pedal pipeline
use crate::pedal::Slot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PedalError {
    /// Trigger input was not exactly one ASCII character after trimming
    #[error("{slot} trigger must be exactly one ASCII character, got {value:?}")]
    InvalidTrigger { slot: Slot, value: String },

    /// Key input was not exactly one character after trimming
    #[error("{slot} key must be exactly one character, got {value:?}")]
    InvalidKey { slot: Slot, value: String },

    /// The serial device failed during a polling firing
    #[error("serial read failed: {0}")]
    TransportRead(#[source] std::io::Error),

    /// The host refused a synthetic key event
    #[error("key injection failed: {0}")]
    Injection(String),

    #[error("cannot open serial port '{port}': {source}")]
    Open {
        port:   String,
        #[source]
        source: serialport::Error,
    },
}

impl PedalError {
    /// Configuration errors are recoverable by correcting the input.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidTrigger { .. } | Self::InvalidKey { .. })
    }
}

impl From<serialport::Error> for PedalError {
    fn from(e: serialport::Error) -> Self {
        Self::TransportRead(e.into())
    }
}
