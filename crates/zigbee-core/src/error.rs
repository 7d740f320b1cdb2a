//! Network Manager error taxonomy

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("operation not legal in current lifecycle state")]
    InvalidState,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Codec(#[from] zigbee_transport::ProtocolError),

    #[error(transparent)]
    Command(#[from] zigbee_commands::CommandError),

    #[error("transport reported a send failure: {0}")]
    Transport(String),

    #[error("no matching response within the timeout window")]
    Timeout,

    #[error("unrecognized profile={profile:#06x} cluster={cluster:#06x} command={command:#04x}")]
    UnknownCommand {
        profile: u16,
        cluster: u16,
        command: u8,
    },

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
