//! The command catalogue registry: resolves an inbound (profile, cluster,
//! command id, direction) tuple to a parsed [`Command`], replacing what
//! would otherwise be per-command-type reflection with an explicit table.

use crate::clusters::{profile, GlobalCommand, OnOffCommand, ZdoCluster};
use crate::command::{Command, CommandEndpoint, CommandPayload, ZclCommand};
use crate::error::CommandError;
use crate::zcl_generic::{
    DefaultResponse, OnOffCommandFrame, ReadAttributes, ReadAttributesResponse, WriteAttributes,
    WriteAttributesResponse,
};
use crate::zdo::{
    ActiveEndpointsRequest, ActiveEndpointsResponse, DeviceAnnounce, SimpleDescriptorRequest,
    SimpleDescriptorResponse, ZdoCommand,
};
use zigbee_transport::{ByteDeserializer, Direction, ZclHeader};

/// Parses an inbound ZDO frame (profile 0x0000). The APS cluster id is
/// the ZDO command type; there is no separate ZCL header on the wire.
pub fn parse_zdo(
    cluster_id: u16,
    transaction_seq: u8,
    source: Option<CommandEndpoint>,
    payload: &[u8],
) -> Result<Command, CommandError> {
    let cluster = ZdoCluster::try_from(cluster_id).map_err(|_| CommandError::Unresolved {
        profile: profile::ZDO,
        cluster: cluster_id,
        command: 0,
    })?;

    let mut des = ByteDeserializer::new(payload);
    let zdo = match cluster {
        ZdoCluster::ActiveEpRsp => {
            ZdoCommand::ActiveEndpointsResponse(ActiveEndpointsResponse::parse(&mut des)?)
        }
        ZdoCluster::ActiveEpReq => {
            let transaction_seq = des.read_u8()?;
            let nwk_addr_of_interest = des.read_u16()?;
            ZdoCommand::ActiveEndpointsRequest(ActiveEndpointsRequest {
                transaction_seq,
                nwk_addr_of_interest,
            })
        }
        ZdoCluster::SimpleDescRsp => {
            ZdoCommand::SimpleDescriptorResponse(SimpleDescriptorResponse::parse(&mut des)?)
        }
        ZdoCluster::SimpleDescReq => {
            let transaction_seq = des.read_u8()?;
            let nwk_addr = des.read_u16()?;
            let endpoint = des.read_u8()?;
            ZdoCommand::SimpleDescriptorRequest(SimpleDescriptorRequest {
                transaction_seq,
                nwk_addr,
                endpoint,
            })
        }
        ZdoCluster::DeviceAnnce => ZdoCommand::DeviceAnnounce(DeviceAnnounce::parse(&mut des)?),
        _ => {
            return Err(CommandError::Unresolved {
                profile: profile::ZDO,
                cluster: cluster_id,
                command: 0,
            });
        }
    };

    Ok(Command {
        profile_id: profile::ZDO,
        cluster_id,
        transaction_id: transaction_seq,
        direction: Direction::ServerToClient,
        source,
        destination: None,
        payload: CommandPayload::Zdo(zdo),
    })
}

/// Parses an inbound ZCL frame (profile 0x0104, or any non-ZDO profile).
/// `header` has already been stripped off the front of `payload` by the
/// caller (see `zigbee_core::pipeline::parse_inbound`).
pub fn parse_zcl(
    profile_id: u16,
    cluster_id: u16,
    header: &ZclHeader,
    source: Option<CommandEndpoint>,
    body: &[u8],
) -> Result<Command, CommandError> {
    let mut des = ByteDeserializer::new(body);

    let zcl = if header.frame_type == zigbee_transport::FrameType::EntireProfile {
        let global = GlobalCommand::try_from(header.command_id).map_err(|_| {
            CommandError::Unresolved {
                profile: profile_id,
                cluster: cluster_id,
                command: header.command_id,
            }
        })?;
        match global {
            GlobalCommand::ReadAttributes => {
                ZclCommand::ReadAttributes(ReadAttributes::parse(&mut des)?)
            }
            GlobalCommand::ReadAttributesResponse => {
                ZclCommand::ReadAttributesResponse(ReadAttributesResponse::parse(&mut des)?)
            }
            GlobalCommand::WriteAttributes => {
                ZclCommand::WriteAttributes(WriteAttributes::parse(&mut des)?)
            }
            GlobalCommand::WriteAttributesResponse => {
                ZclCommand::WriteAttributesResponse(WriteAttributesResponse::parse(&mut des)?)
            }
            GlobalCommand::DefaultResponse => {
                ZclCommand::DefaultResponse(DefaultResponse::parse(&mut des)?)
            }
        }
    } else {
        // Cluster-specific command. Only On/Off is catalogued today.
        match cluster_id {
            crate::clusters::cluster::ON_OFF => {
                let command =
                    OnOffCommand::try_from(header.command_id).map_err(|_| {
                        CommandError::Unresolved {
                            profile: profile_id,
                            cluster: cluster_id,
                            command: header.command_id,
                        }
                    })?;
                ZclCommand::OnOff(OnOffCommandFrame { command })
            }
            other => {
                return Err(CommandError::Unresolved {
                    profile: profile_id,
                    cluster: other,
                    command: header.command_id,
                });
            }
        }
    };

    Ok(Command {
        profile_id,
        cluster_id,
        transaction_id: header.transaction_seq,
        direction: header.direction,
        source,
        destination: None,
        payload: CommandPayload::Zcl(zcl),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zigbee_transport::ByteSerializer;

    #[test]
    fn resolves_active_endpoints_response() {
        let resp = ActiveEndpointsResponse {
            transaction_seq: 7,
            status: 0,
            nwk_addr: 0x1234,
            endpoints: vec![1, 2],
        };
        let mut ser = ByteSerializer::new();
        resp.write(&mut ser);
        let bytes = ser.into_bytes();

        let command = parse_zdo(ZdoCluster::ActiveEpRsp as u16, 7, None, &bytes).unwrap();
        match command.payload {
            CommandPayload::Zdo(ZdoCommand::ActiveEndpointsResponse(r)) => {
                assert_eq!(r.endpoints, vec![1, 2]);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unresolved_cluster_returns_descriptive_error() {
        let err = parse_zdo(0xFFFF, 1, None, &[]).unwrap_err();
        match err {
            CommandError::Unresolved { cluster, .. } => assert_eq!(cluster, 0xFFFF),
            _ => panic!("wrong error"),
        }
    }
}
