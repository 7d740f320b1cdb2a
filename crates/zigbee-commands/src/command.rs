//! The crate's top-level `Command` type: an addressed, directioned
//! catalogue entry ready to drop onto (or just parsed off of) the wire

use crate::zcl_generic::{
    DefaultResponse, OnOffCommandFrame, ReadAttributes, ReadAttributesResponse, WriteAttributes,
    WriteAttributesResponse,
};
use crate::zdo::ZdoCommand;
use zigbee_transport::Direction;

/// Where a `Command` is headed or came from. Kept to primitive fields
/// (not `zigbee_core::Address`) so this crate has no dependency back on
/// the core; `zigbee_core::pipeline` translates between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEndpoint {
    pub nwk_addr: u16,
    pub endpoint: u8,
}

#[derive(Debug, Clone)]
pub enum ZclCommand {
    ReadAttributes(ReadAttributes),
    ReadAttributesResponse(ReadAttributesResponse),
    WriteAttributes(WriteAttributes),
    WriteAttributesResponse(WriteAttributesResponse),
    DefaultResponse(DefaultResponse),
    OnOff(OnOffCommandFrame),
}

impl ZclCommand {
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut ser = zigbee_transport::ByteSerializer::new();
        match self {
            ZclCommand::ReadAttributes(c) => c.write(&mut ser),
            ZclCommand::ReadAttributesResponse(c) => c.write(&mut ser),
            ZclCommand::WriteAttributes(c) => c.write(&mut ser),
            ZclCommand::WriteAttributesResponse(_) => {}
            ZclCommand::DefaultResponse(c) => c.write(&mut ser),
            ZclCommand::OnOff(c) => c.write(&mut ser),
        }
        ser.into_bytes()
    }

    /// The ZCL command id this variant serializes to on the wire.
    #[must_use]
    pub fn command_id(&self) -> u8 {
        match self {
            ZclCommand::ReadAttributes(_) => 0x00,
            ZclCommand::ReadAttributesResponse(_) => 0x01,
            ZclCommand::WriteAttributes(_) => 0x02,
            ZclCommand::WriteAttributesResponse(_) => 0x04,
            ZclCommand::DefaultResponse(_) => 0x0B,
            ZclCommand::OnOff(c) => c.command as u8,
        }
    }

    /// Generic (entire-profile) commands use the shared global command
    /// table; everything else is cluster-specific.
    #[must_use]
    pub fn frame_type(&self) -> zigbee_transport::FrameType {
        match self {
            ZclCommand::ReadAttributes(_)
            | ZclCommand::ReadAttributesResponse(_)
            | ZclCommand::WriteAttributes(_)
            | ZclCommand::WriteAttributesResponse(_)
            | ZclCommand::DefaultResponse(_) => zigbee_transport::FrameType::EntireProfile,
            ZclCommand::OnOff(_) => zigbee_transport::FrameType::ClusterSpecific,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CommandPayload {
    Zdo(ZdoCommand),
    Zcl(ZclCommand),
}

/// A fully addressed catalogue command, independent of transport.
///
/// `source`/`destination` are `None` when the command has not yet been
/// placed on the wire (an outbound request still being built) or when
/// the originating indication did not carry endpoint detail (a
/// group-addressed send; see the `pipeline` module in `zigbee-core`).
#[derive(Debug, Clone)]
pub struct Command {
    pub profile_id: u16,
    pub cluster_id: u16,
    pub transaction_id: u8,
    pub direction: Direction,
    pub source: Option<CommandEndpoint>,
    pub destination: Option<CommandEndpoint>,
    pub payload: CommandPayload,
}

impl Command {
    #[must_use]
    pub fn new(
        profile_id: u16,
        cluster_id: u16,
        transaction_id: u8,
        direction: Direction,
        payload: CommandPayload,
    ) -> Self {
        Self {
            profile_id,
            cluster_id,
            transaction_id,
            direction,
            source: None,
            destination: None,
            payload,
        }
    }

    #[must_use]
    pub fn with_destination(mut self, destination: CommandEndpoint) -> Self {
        self.destination = Some(destination);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: CommandEndpoint) -> Self {
        self.source = Some(source);
        self
    }
}
