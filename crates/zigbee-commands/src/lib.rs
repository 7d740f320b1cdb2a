//! The ZDO/ZCL command catalogue
//!
//! This crate is deliberately separate from `zigbee-core`: it owns the
//! concrete wire layout of every command the network manager knows how
//! to send or receive, resolved through an explicit registry rather than
//! runtime reflection over command types.

pub mod clusters;
pub mod command;
pub mod error;
pub mod registry;
pub mod zcl_generic;
pub mod zdo;

pub use clusters::{cluster, profile, GlobalCommand, OnOffCommand, ZdoCluster};
pub use command::{Command, CommandEndpoint, CommandPayload, ZclCommand};
pub use error::CommandError;
pub use zcl_generic::{
    AttributeReadResult, AttributeType, AttributeValue, AttributeWrite, AttributeWriteStatus,
    DefaultResponse, OnOffCommandFrame, ReadAttributes, ReadAttributesResponse, WriteAttributes,
    WriteAttributesResponse,
};
pub use zdo::{
    ActiveEndpointsRequest, ActiveEndpointsResponse, BindRequest, DeviceAnnounce,
    ManagementLeaveRequest, ManagementPermitJoiningRequest, SimpleDescriptorRequest,
    SimpleDescriptorResponse, ZdoCommand,
};
