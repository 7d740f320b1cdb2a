//! Transport and wire-codec errors

use thiserror::Error;

/// Errors surfaced by the codec and by transport implementations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("CRC mismatch: expected {expected:04X}, got {actual:04X}")]
    CrcMismatch { expected: u16, actual: u16 },

    #[error("Frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("Unknown command ID: {0:#04X}")]
    UnknownCommand(u8),

    #[error("Serial port error: {0}")]
    SerialError(#[from] std::io::Error),

    #[error("Request timeout")]
    Timeout,

    #[error("Transport not connected")]
    NotConnected,

    #[error("Device returned error status: {0:?}")]
    DeviceError(Status),

    #[error("Codec construction failed: {0}")]
    CodecConstruction(String),
}

/// Device status codes reported by the radio coprocessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    Failure = 0x01,
    Busy = 0x02,
    Timeout = 0x03,
    Unsupported = 0x04,
    Error = 0x05,
    NoNetwork = 0x06,
    InvalidValue = 0x07,
}

impl TryFrom<u8> for Status {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(Status::Success),
            0x01 => Ok(Status::Failure),
            0x02 => Ok(Status::Busy),
            0x03 => Ok(Status::Timeout),
            0x04 => Ok(Status::Unsupported),
            0x05 => Ok(Status::Error),
            0x06 => Ok(Status::NoNetwork),
            0x07 => Ok(Status::InvalidValue),
            _ => Err(value),
        }
    }
}
