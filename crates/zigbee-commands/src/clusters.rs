//! Well-known cluster and profile identifiers

/// ZCL profile ids
pub mod profile {
    pub const ZDO: u16 = 0x0000;
    pub const HOME_AUTOMATION: u16 = 0x0104;
}

/// Common ZCL cluster ids
pub mod cluster {
    pub const BASIC: u16 = 0x0000;
    pub const POWER_CONFIG: u16 = 0x0001;
    pub const IDENTIFY: u16 = 0x0003;
    pub const GROUPS: u16 = 0x0004;
    pub const SCENES: u16 = 0x0005;
    pub const ON_OFF: u16 = 0x0006;
    pub const LEVEL_CONTROL: u16 = 0x0008;
    pub const COLOR_CONTROL: u16 = 0x0300;
    pub const TEMPERATURE_MEASUREMENT: u16 = 0x0402;
    pub const HUMIDITY_MEASUREMENT: u16 = 0x0405;
    pub const OCCUPANCY_SENSING: u16 = 0x0406;
    pub const IAS_ZONE: u16 = 0x0500;
    pub const ELECTRICAL_MEASUREMENT: u16 = 0x0B04;
}

/// ZDO cluster ids; for profile 0x0000 the APS cluster field doubles as
/// the ZDO command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ZdoCluster {
    NwkAddrReq = 0x0000,
    DeviceAnnce = 0x0013,
    NodeDescReq = 0x0002,
    NodeDescRsp = 0x8002,
    SimpleDescReq = 0x0004,
    SimpleDescRsp = 0x8004,
    ActiveEpReq = 0x0005,
    ActiveEpRsp = 0x8005,
    BindReq = 0x0021,
    BindRsp = 0x8021,
    MgmtLeaveReq = 0x0034,
    MgmtLeaveRsp = 0x8034,
    MgmtPermitJoiningReq = 0x0036,
    MgmtPermitJoiningRsp = 0x8036,
}

impl TryFrom<u16> for ZdoCluster {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, u16> {
        match value {
            0x0000 => Ok(ZdoCluster::NwkAddrReq),
            0x0013 => Ok(ZdoCluster::DeviceAnnce),
            0x0002 => Ok(ZdoCluster::NodeDescReq),
            0x8002 => Ok(ZdoCluster::NodeDescRsp),
            0x0004 => Ok(ZdoCluster::SimpleDescReq),
            0x8004 => Ok(ZdoCluster::SimpleDescRsp),
            0x0005 => Ok(ZdoCluster::ActiveEpReq),
            0x8005 => Ok(ZdoCluster::ActiveEpRsp),
            0x0021 => Ok(ZdoCluster::BindReq),
            0x8021 => Ok(ZdoCluster::BindRsp),
            0x0034 => Ok(ZdoCluster::MgmtLeaveReq),
            0x8034 => Ok(ZdoCluster::MgmtLeaveRsp),
            0x0036 => Ok(ZdoCluster::MgmtPermitJoiningReq),
            0x8036 => Ok(ZdoCluster::MgmtPermitJoiningRsp),
            other => Err(other),
        }
    }
}

/// ZCL global (entire-profile) command ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GlobalCommand {
    ReadAttributes = 0x00,
    ReadAttributesResponse = 0x01,
    WriteAttributes = 0x02,
    WriteAttributesResponse = 0x04,
    DefaultResponse = 0x0B,
}

impl TryFrom<u8> for GlobalCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(GlobalCommand::ReadAttributes),
            0x01 => Ok(GlobalCommand::ReadAttributesResponse),
            0x02 => Ok(GlobalCommand::WriteAttributes),
            0x04 => Ok(GlobalCommand::WriteAttributesResponse),
            0x0B => Ok(GlobalCommand::DefaultResponse),
            other => Err(other),
        }
    }
}

/// On/Off cluster (0x0006) cluster-specific command ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OnOffCommand {
    Off = 0x00,
    On = 0x01,
    Toggle = 0x02,
}

impl TryFrom<u8> for OnOffCommand {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0x00 => Ok(OnOffCommand::Off),
            0x01 => Ok(OnOffCommand::On),
            0x02 => Ok(OnOffCommand::Toggle),
            other => Err(other),
        }
    }
}
