//! Frame pipeline: build outgoing APS frames from high-level commands,
//! and parse incoming APS frames into typed commands

use crate::address::{Address, DeviceAddress};
use crate::counters::Counter;
use tracing::debug;
use zigbee_commands::{registry, Command, CommandEndpoint, CommandPayload};
use zigbee_transport::{
    ApsAddressMode, ApsFrame, ByteDeserializer, ByteSerializer, Direction, ZclHeader,
};

/// Builds outbound APS frames and allocates the transaction id/APS
/// counter that go with them. Owns no transport handle: the caller hands
/// the built frame to one.
pub struct Pipeline {
    transaction_ids: Counter,
    aps_counters: Counter,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            transaction_ids: Counter::new(),
            aps_counters: Counter::new(),
        }
    }

    /// Builds the APS frame for `payload` addressed to `destination`, per
    /// §4.3 steps 1-5. Returns the frame and the transaction id that was
    /// allocated and bound to it (useful to callers managing their own
    /// correlation).
    pub fn build_outbound(
        &self,
        destination: Address,
        cluster_id: u16,
        direction: Direction,
        payload: &CommandPayload,
    ) -> (ApsFrame, u8) {
        let transaction_id = self.transaction_ids.next();
        let aps_counter = self.aps_counters.next();

        let profile_id = match payload {
            CommandPayload::Zdo(_) => zigbee_commands::profile::ZDO,
            CommandPayload::Zcl(_) => zigbee_commands::profile::HOME_AUTOMATION,
        };

        let body = match payload {
            CommandPayload::Zdo(zdo) => zdo.serialize(),
            CommandPayload::Zcl(zcl) => {
                let header = ZclHeader::new(zcl.frame_type(), direction, transaction_id, zcl.command_id());
                let mut ser = ByteSerializer::new();
                header.write(&mut ser);
                ser.write_bytes(&zcl.serialize());
                ser.into_bytes()
            }
        };

        // TODO(group-send): group-addressed sends drop endpoint info on
        // the wire frame; there is no per-member endpoint to target.
        let (address_mode, dest_addr, dest_endpoint) = match destination {
            Address::Device(d) => (ApsAddressMode::Device, d.nwk.0, d.endpoint),
            Address::Group(g) => (ApsAddressMode::Group, g.0, 0),
        };

        let frame = ApsFrame {
            profile_id,
            cluster_id,
            src_addr: ApsFrame::HOST_ADDRESS,
            src_endpoint: 1,
            dest_addr,
            dest_endpoint,
            aps_counter,
            sequence: transaction_id,
            radius: ApsFrame::DEFAULT_RADIUS,
            address_mode,
            payload: body,
        };

        (frame, transaction_id)
    }
}

/// Parses an inbound APS frame into a typed [`Command`], per §4.4.
/// Never returns an error that should crash the caller: every failure
/// mode here is logged and treated as "drop with diagnostic".
pub fn parse_inbound(frame: &ApsFrame) -> Option<Command> {
    let source = Some(CommandEndpoint {
        nwk_addr: frame.src_addr,
        endpoint: frame.src_endpoint,
    });

    let mut command = match frame.profile_id {
        zigbee_commands::profile::ZDO => {
            let transaction_seq = frame.sequence;
            match registry::parse_zdo(frame.cluster_id, transaction_seq, source, &frame.payload) {
                Ok(cmd) => cmd,
                Err(e) => {
                    debug!(cluster = frame.cluster_id, error = %e, "dropping unresolved ZDO frame");
                    return None;
                }
            }
        }
        zigbee_commands::profile::HOME_AUTOMATION => {
            let mut des = ByteDeserializer::new(&frame.payload);
            let header = match ZclHeader::parse(&mut des) {
                Ok(h) => h,
                Err(e) => {
                    debug!(error = %e, "dropping malformed ZCL header");
                    return None;
                }
            };
            let body = des.read_remaining();
            match registry::parse_zcl(frame.profile_id, frame.cluster_id, &header, source, body) {
                Ok(cmd) => cmd,
                Err(e) => {
                    debug!(cluster = frame.cluster_id, command = header.command_id, error = %e, "dropping unresolved ZCL frame");
                    return None;
                }
            }
        }
        other => {
            debug!(profile = other, "dropping frame for unsupported profile");
            return None;
        }
    };

    command.destination = Some(CommandEndpoint {
        nwk_addr: frame.dest_addr,
        endpoint: frame.dest_endpoint,
    });

    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::GroupId;
    use zigbee_commands::zcl_generic::ReadAttributes;
    use zigbee_commands::ZclCommand;

    #[test]
    fn build_outbound_allocates_sequential_transaction_ids() {
        let pipeline = Pipeline::new();
        let payload = CommandPayload::Zcl(ZclCommand::ReadAttributes(ReadAttributes {
            attribute_ids: vec![0x0000],
        }));
        let dest = Address::Device(DeviceAddress::new(0x1234, 1));

        let (_frame1, id1) =
            pipeline.build_outbound(dest, 0x0006, Direction::ClientToServer, &payload);
        let (_frame2, id2) =
            pipeline.build_outbound(dest, 0x0006, Direction::ClientToServer, &payload);

        assert_eq!(id2, id1.wrapping_add(1));
    }

    #[test]
    fn build_outbound_read_attributes_matches_expected_header() {
        let pipeline = Pipeline::new();
        let payload = CommandPayload::Zcl(ZclCommand::ReadAttributes(ReadAttributes {
            attribute_ids: vec![0x0000],
        }));
        let dest = Address::Device(DeviceAddress::new(0x1234, 1));

        let (frame, transaction_id) =
            pipeline.build_outbound(dest, 0x0006, Direction::ClientToServer, &payload);

        assert_eq!(frame.profile_id, zigbee_commands::profile::HOME_AUTOMATION);
        assert_eq!(frame.cluster_id, 0x0006);
        // frame control byte: entire-profile, client->server
        assert_eq!(frame.payload[0], 0x00);
        assert_eq!(frame.payload[1], transaction_id);
        assert_eq!(frame.payload[2], 0x00); // Read Attributes command id
        assert_eq!(&frame.payload[3..], &[0x00, 0x00]); // attribute id 0x0000 LE
    }

    #[test]
    fn build_outbound_group_destination_uses_group_address_mode() {
        let pipeline = Pipeline::new();
        let payload = CommandPayload::Zcl(ZclCommand::ReadAttributes(ReadAttributes {
            attribute_ids: vec![],
        }));
        let (frame, _) = pipeline.build_outbound(
            Address::Group(GroupId(0x0010)),
            0x0006,
            Direction::ClientToServer,
            &payload,
        );
        assert_eq!(frame.address_mode, ApsAddressMode::Group);
        assert_eq!(frame.dest_addr, 0x0010);
    }

    #[test]
    fn parse_inbound_drops_unknown_profile() {
        let frame = ApsFrame {
            profile_id: 0x9999,
            cluster_id: 0,
            src_addr: 0,
            src_endpoint: 1,
            dest_addr: 0,
            dest_endpoint: 1,
            aps_counter: 0,
            sequence: 0,
            radius: 31,
            address_mode: ApsAddressMode::Device,
            payload: vec![],
        };
        assert!(parse_inbound(&frame).is_none());
    }
}
