//! APS wire framing, ZCL header codec, and the `Transport` contract
//!
//! This crate is the collaborator layer the core Network Manager builds
//! on: it owns the byte-level serializer/deserializer, the APS frame and
//! ZCL header layouts, and the transport trait plus two implementations
//! (an in-memory mock for tests, and a SLIP/serial ConBee-II driver).

pub mod aps;
pub mod codec;
pub mod commands;
pub mod error;
pub mod mock;
pub mod serial;
pub mod serial_frame;
pub mod slip;
pub mod transport;
pub mod zcl;

pub use aps::{ApsAddressMode, ApsFrame};
pub use codec::{ByteDeserializer, ByteSerializer};
pub use error::{ProtocolError, Status};
pub use mock::MockTransport;
pub use serial::SerialTransport;
pub use transport::{ApsFrameIndication, JoinResult, NetworkState, Transport, TransportEvent};
pub use zcl::{Direction, FrameType, ZclHeader};
