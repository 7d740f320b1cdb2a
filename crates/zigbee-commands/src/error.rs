//! Errors raised while resolving or (de)serializing a catalogue command

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error(transparent)]
    Protocol(#[from] zigbee_transport::ProtocolError),

    #[error("no catalogue entry for profile={profile:#06x} cluster={cluster:#06x} command={command:#04x}")]
    Unresolved {
        profile: u16,
        cluster: u16,
        command: u8,
    },
}
