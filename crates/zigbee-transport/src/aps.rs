//! The APS frame: the wire representation exchanged between the
//! `NetworkManager` and a `Transport` implementation.

/// How the destination address field of an APS frame should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApsAddressMode {
    /// `dest_addr` is a 16-bit network address qualified by `dest_endpoint`
    Device,
    /// `dest_addr` is a 16-bit group id; `dest_endpoint` is unused
    Group,
}

/// An APS Data Request/Indication frame
///
/// Profile id, cluster id, source/destination address + endpoint, APS
/// counter, sequence, radius, address mode, and an opaque payload — see
/// the wire-fields list in the external interfaces section.
#[derive(Debug, Clone)]
pub struct ApsFrame {
    pub profile_id: u16,
    pub cluster_id: u16,
    pub src_addr: u16,
    pub src_endpoint: u8,
    pub dest_addr: u16,
    pub dest_endpoint: u8,
    pub aps_counter: u8,
    pub sequence: u8,
    pub radius: u8,
    pub address_mode: ApsAddressMode,
    pub payload: Vec<u8>,
}

impl ApsFrame {
    /// Default hop-count radius used for outbound frames (spec: 31)
    pub const DEFAULT_RADIUS: u8 = 31;

    /// Profile id of the ZDO endpoint (0x0000)
    pub const PROFILE_ZDO: u16 = 0x0000;
    /// Profile id for Home Automation (0x0104), the default ZCL profile
    pub const PROFILE_HOME_AUTOMATION: u16 = 0x0104;

    /// Host's own network address, used as the source address on every
    /// outbound frame.
    pub const HOST_ADDRESS: u16 = 0x0000;
}
