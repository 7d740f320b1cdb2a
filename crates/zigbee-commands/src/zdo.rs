//! ZDO (ZigBee Device Object) management command bodies

use zigbee_transport::{ByteDeserializer, ByteSerializer, ProtocolError};

/// A ZDO command body. The APS cluster id names which variant this is;
/// the registry (see `registry.rs`) is what maps cluster id to the right
/// `parse`/variant.
#[derive(Debug, Clone)]
pub enum ZdoCommand {
    ActiveEndpointsRequest(ActiveEndpointsRequest),
    ActiveEndpointsResponse(ActiveEndpointsResponse),
    SimpleDescriptorRequest(SimpleDescriptorRequest),
    SimpleDescriptorResponse(SimpleDescriptorResponse),
    DeviceAnnounce(DeviceAnnounce),
    ManagementPermitJoiningRequest(ManagementPermitJoiningRequest),
    ManagementLeaveRequest(ManagementLeaveRequest),
    /// Not implemented: the ZDO Bind Request payload is not wired through
    /// yet (see the `bind`/`unbind` stubs on `NetworkManager`).
    BindRequest(BindRequest),
}

impl ZdoCommand {
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut ser = ByteSerializer::new();
        match self {
            ZdoCommand::ActiveEndpointsRequest(c) => c.write(&mut ser),
            ZdoCommand::ActiveEndpointsResponse(c) => c.write(&mut ser),
            ZdoCommand::SimpleDescriptorRequest(c) => c.write(&mut ser),
            ZdoCommand::SimpleDescriptorResponse(c) => c.write(&mut ser),
            ZdoCommand::DeviceAnnounce(c) => c.write(&mut ser),
            ZdoCommand::ManagementPermitJoiningRequest(c) => c.write(&mut ser),
            ZdoCommand::ManagementLeaveRequest(c) => c.write(&mut ser),
            ZdoCommand::BindRequest(c) => c.write(&mut ser),
        }
        ser.into_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct ActiveEndpointsRequest {
    pub transaction_seq: u8,
    pub nwk_addr_of_interest: u16,
}

impl ActiveEndpointsRequest {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_u16(self.nwk_addr_of_interest);
    }
}

#[derive(Debug, Clone)]
pub struct ActiveEndpointsResponse {
    pub transaction_seq: u8,
    pub status: u8,
    pub nwk_addr: u16,
    pub endpoints: Vec<u8>,
}

impl ActiveEndpointsResponse {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_u8(self.status);
        ser.write_u16(self.nwk_addr);
        ser.write_u8(self.endpoints.len() as u8);
        for ep in &self.endpoints {
            ser.write_u8(*ep);
        }
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let transaction_seq = des.read_u8()?;
        let status = des.read_u8()?;
        let nwk_addr = des.read_u16()?;
        let endpoints = if status == 0 && des.remaining() > 0 {
            let count = des.read_u8()? as usize;
            let mut eps = Vec::with_capacity(count);
            for _ in 0..count {
                eps.push(des.read_u8()?);
            }
            eps
        } else {
            Vec::new()
        };
        Ok(Self {
            transaction_seq,
            status,
            nwk_addr,
            endpoints,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SimpleDescriptorRequest {
    pub transaction_seq: u8,
    pub nwk_addr: u16,
    pub endpoint: u8,
}

impl SimpleDescriptorRequest {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_u16(self.nwk_addr);
        ser.write_u8(self.endpoint);
    }
}

#[derive(Debug, Clone)]
pub struct SimpleDescriptorResponse {
    pub transaction_seq: u8,
    pub status: u8,
    pub nwk_addr: u16,
    pub endpoint: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub in_clusters: Vec<u16>,
    pub out_clusters: Vec<u16>,
}

impl SimpleDescriptorResponse {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_u8(self.status);
        ser.write_u16(self.nwk_addr);
        ser.write_u8(self.endpoint);
        ser.write_u16(self.profile_id);
        ser.write_u16(self.device_id);
        ser.write_u8(self.in_clusters.len() as u8);
        for c in &self.in_clusters {
            ser.write_u16(*c);
        }
        ser.write_u8(self.out_clusters.len() as u8);
        for c in &self.out_clusters {
            ser.write_u16(*c);
        }
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let transaction_seq = des.read_u8()?;
        let status = des.read_u8()?;
        let nwk_addr = des.read_u16()?;

        if status != 0 || des.remaining() == 0 {
            return Ok(Self {
                transaction_seq,
                status,
                nwk_addr,
                endpoint: 0,
                profile_id: 0,
                device_id: 0,
                in_clusters: Vec::new(),
                out_clusters: Vec::new(),
            });
        }

        let endpoint = des.read_u8()?;
        let profile_id = des.read_u16()?;
        let device_id = des.read_u16()?;

        let in_count = des.read_u8()? as usize;
        let mut in_clusters = Vec::with_capacity(in_count);
        for _ in 0..in_count {
            in_clusters.push(des.read_u16()?);
        }

        let out_count = des.read_u8()? as usize;
        let mut out_clusters = Vec::with_capacity(out_count);
        for _ in 0..out_count {
            out_clusters.push(des.read_u16()?);
        }

        Ok(Self {
            transaction_seq,
            status,
            nwk_addr,
            endpoint,
            profile_id,
            device_id,
            in_clusters,
            out_clusters,
        })
    }
}

/// Device_annce (cluster 0x0013): a device broadcasting its own join
#[derive(Debug, Clone)]
pub struct DeviceAnnounce {
    pub transaction_seq: u8,
    pub nwk_addr: u16,
    pub ieee_addr: [u8; 8],
    pub capability: u8,
}

impl DeviceAnnounce {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_u16(self.nwk_addr);
        ser.write_ieee(&self.ieee_addr);
        ser.write_u8(self.capability);
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            transaction_seq: des.read_u8()?,
            nwk_addr: des.read_u16()?,
            ieee_addr: des.read_ieee()?,
            capability: des.read_u8()?,
        })
    }

    #[must_use]
    pub fn is_router(&self) -> bool {
        self.capability & 0x02 != 0
    }
}

/// Mgmt_Permit_Joining_req (cluster 0x0036)
#[derive(Debug, Clone)]
pub struct ManagementPermitJoiningRequest {
    pub transaction_seq: u8,
    pub duration_secs: u8,
    pub tc_significance: bool,
}

impl ManagementPermitJoiningRequest {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_u8(self.duration_secs);
        ser.write_u8(u8::from(self.tc_significance));
    }
}

/// Mgmt_Leave_req (cluster 0x0034)
#[derive(Debug, Clone)]
pub struct ManagementLeaveRequest {
    pub transaction_seq: u8,
    pub device_address: [u8; 8],
    pub remove_children: bool,
    pub rejoin: bool,
}

impl ManagementLeaveRequest {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_ieee(&self.device_address);
        let mut flags = 0u8;
        if self.remove_children {
            flags |= 0x40;
        }
        if self.rejoin {
            flags |= 0x80;
        }
        ser.write_u8(flags);
    }
}

/// Bind_req (cluster 0x0021) — payload not implemented yet; see
/// `NetworkManager::bind`.
#[derive(Debug, Clone)]
pub struct BindRequest {
    pub transaction_seq: u8,
    pub source_ieee: [u8; 8],
    pub source_endpoint: u8,
    pub cluster_id: u16,
    pub dest_ieee: [u8; 8],
    pub dest_endpoint: u8,
}

impl BindRequest {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.transaction_seq);
        ser.write_ieee(&self.source_ieee);
        ser.write_u8(self.source_endpoint);
        ser.write_u16(self.cluster_id);
        ser.write_u8(0x03); // 64-bit extended address mode
        ser.write_ieee(&self.dest_ieee);
        ser.write_u8(self.dest_endpoint);
    }
}
