//! ZCL header layout inside an APS payload
//!
//! One frame-control octet encoding frame type (bits 0-1: 0 = entire
//! profile/global, 1 = cluster-specific), direction bit, manufacturer-
//! specific bit, default-response bit; optional 16-bit manufacturer code;
//! 8-bit transaction sequence number; 8-bit command id; then payload.

use crate::codec::{ByteDeserializer, ByteSerializer};
use crate::error::ProtocolError;

const FRAME_TYPE_MASK: u8 = 0x03;
const MANUFACTURER_SPECIFIC_BIT: u8 = 0x04;
const DIRECTION_BIT: u8 = 0x08;
const DISABLE_DEFAULT_RESPONSE_BIT: u8 = 0x10;

/// Frame type bits of the ZCL frame control octet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// ENTIRE_PROFILE_COMMAND - resolved against the generic command table
    EntireProfile = 0x00,
    /// CLUSTER_SPECIFIC_COMMAND - resolved against a per-cluster table
    ClusterSpecific = 0x01,
}

impl TryFrom<u8> for FrameType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value & FRAME_TYPE_MASK {
            0x00 => Ok(FrameType::EntireProfile),
            0x01 => Ok(FrameType::ClusterSpecific),
            other => Err(other),
        }
    }
}

/// ZCL command direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    ClientToServer = 0x00,
    ServerToClient = 0x01,
}

/// Parsed/built ZCL header plus the raw command payload that follows it
#[derive(Debug, Clone)]
pub struct ZclHeader {
    pub frame_type: FrameType,
    pub direction: Direction,
    pub manufacturer_code: Option<u16>,
    pub disable_default_response: bool,
    pub transaction_seq: u8,
    pub command_id: u8,
}

impl ZclHeader {
    #[must_use]
    pub fn new(
        frame_type: FrameType,
        direction: Direction,
        transaction_seq: u8,
        command_id: u8,
    ) -> Self {
        Self {
            frame_type,
            direction,
            manufacturer_code: None,
            disable_default_response: false,
            transaction_seq,
            command_id,
        }
    }

    fn frame_control(&self) -> u8 {
        let mut fc = self.frame_type as u8;
        if self.direction == Direction::ServerToClient {
            fc |= DIRECTION_BIT;
        }
        if self.manufacturer_code.is_some() {
            fc |= MANUFACTURER_SPECIFIC_BIT;
        }
        if self.disable_default_response {
            fc |= DISABLE_DEFAULT_RESPONSE_BIT;
        }
        fc
    }

    /// Serialize the header (not the trailing payload) into `ser`
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.frame_control());
        if let Some(mfr) = self.manufacturer_code {
            ser.write_u16(mfr);
        }
        ser.write_u8(self.transaction_seq);
        ser.write_u8(self.command_id);
    }

    /// Parse a header from the front of `des`; the remaining bytes in
    /// `des` are the command payload.
    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let frame_control = des.read_u8()?;
        let frame_type = FrameType::try_from(frame_control)
            .map_err(|v| ProtocolError::InvalidFrame(format!("unknown ZCL frame type: {v:#04x}")))?;
        let direction = if frame_control & DIRECTION_BIT != 0 {
            Direction::ServerToClient
        } else {
            Direction::ClientToServer
        };
        let disable_default_response = frame_control & DISABLE_DEFAULT_RESPONSE_BIT != 0;
        let manufacturer_code = if frame_control & MANUFACTURER_SPECIFIC_BIT != 0 {
            Some(des.read_u16()?)
        } else {
            None
        };
        let transaction_seq = des.read_u8()?;
        let command_id = des.read_u8()?;

        Ok(Self {
            frame_type,
            direction,
            manufacturer_code,
            disable_default_response,
            transaction_seq,
            command_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = ZclHeader::new(FrameType::ClusterSpecific, Direction::ClientToServer, 7, 0x01);
        let mut ser = ByteSerializer::new();
        header.write(&mut ser);
        ser.write_u8(0xAA); // stand-in payload byte
        let bytes = ser.into_bytes();

        let mut des = ByteDeserializer::new(&bytes);
        let parsed = ZclHeader::parse(&mut des).unwrap();
        assert_eq!(parsed.frame_type, FrameType::ClusterSpecific);
        assert_eq!(parsed.direction, Direction::ClientToServer);
        assert_eq!(parsed.transaction_seq, 7);
        assert_eq!(parsed.command_id, 0x01);
        assert_eq!(des.read_remaining(), &[0xAA]);
    }

    #[test]
    fn manufacturer_specific_round_trips() {
        let mut header = ZclHeader::new(FrameType::EntireProfile, Direction::ServerToClient, 3, 0x0A);
        header.manufacturer_code = Some(0x1135);
        let mut ser = ByteSerializer::new();
        header.write(&mut ser);
        let bytes = ser.into_bytes();

        let mut des = ByteDeserializer::new(&bytes);
        let parsed = ZclHeader::parse(&mut des).unwrap();
        assert_eq!(parsed.manufacturer_code, Some(0x1135));
        assert_eq!(parsed.direction, Direction::ServerToClient);
    }
}
