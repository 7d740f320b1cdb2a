//! The `Transport` contract: everything the core requires of a radio
//! coprocessor driver, and nothing more.

use crate::aps::ApsFrame;
use crate::error::ProtocolError;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Outcome of `Transport::initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinResult {
    Joined,
    NotJoined,
    Failed,
}

/// Coarse network connectivity state reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Offline,
    Joining,
    Connected,
    Leaving,
}

/// Events a transport pushes to the core outside of direct request/
/// response flow: APS indications, network state changes, and ZDO device
/// announcements (capability byte, as broadcast on the air).
#[derive(Debug, Clone)]
pub enum TransportEvent {
    ApsIndication(ApsFrameIndication),
    NetworkStateChanged(NetworkState),
    DeviceAnnounced { nwk_addr: u16, capability: u8 },
}

/// An inbound APS frame as delivered by the transport, paired with link
/// quality metadata the mesh model likes to know about.
#[derive(Debug, Clone)]
pub struct ApsFrameIndication {
    pub frame: ApsFrame,
    pub lqi: u8,
    pub rssi: i8,
}

/// The radio coprocessor driver contract.
///
/// Implementations: `MockTransport` (tests) and `SerialTransport` (a
/// ConBee-II-style coordinator over a SLIP-framed serial link).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Attempt to join (or rejoin) the configured network.
    async fn initialize(&self) -> Result<JoinResult, ProtocolError>;

    /// Start the radio running. `reinitialize` requests that the
    /// transport re-derive its network parameters rather than resuming
    /// from its own persisted state.
    async fn startup(&self, reinitialize: bool) -> Result<bool, ProtocolError>;

    async fn shutdown(&self) -> Result<(), ProtocolError>;

    async fn get_channel(&self) -> Result<u8, ProtocolError>;
    async fn set_channel(&self, channel: u8) -> Result<(), ProtocolError>;

    async fn get_pan_id(&self) -> Result<u16, ProtocolError>;
    async fn set_pan_id(&self, pan_id: u16) -> Result<(), ProtocolError>;

    async fn get_extended_pan_id(&self) -> Result<u64, ProtocolError>;
    async fn set_extended_pan_id(&self, extended_pan_id: u64) -> Result<(), ProtocolError>;

    async fn set_security_key(&self, key: [u8; 16]) -> Result<(), ProtocolError>;

    async fn send_command(&self, frame: ApsFrame) -> Result<(), ProtocolError>;

    /// Subscribe to unsolicited transport events. Each call returns an
    /// independent receiver over the same broadcast.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}
