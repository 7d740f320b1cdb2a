//! Address & identity model: network addresses, IEEE addresses, and the
//! device/group address variants the rest of the core routes by

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Routers and the coordinator; the permit-join broadcast destination.
pub const BROADCAST_ROUTERS: u16 = 0xFFFC;

/// A 16-bit ZigBee network ("short") address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkAddress(pub u16);

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u16> for NetworkAddress {
    fn from(v: u16) -> Self {
        Self(v)
    }
}

/// A 64-bit IEEE EUI-64 address, stored byte-order-agnostic and
/// displayed most-significant-byte-first (the array is stored
/// little-endian on the wire, same convention as the transport crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IeeeAddress(pub [u8; 8]);

impl fmt::Display for IeeeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().rev().map(|b| format!("{b:02x}")).collect();
        write!(f, "{}", parts.join(":"))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIeeeAddressError {
    #[error("expected 8 colon-separated hex octets, got {0}")]
    WrongLength(usize),
    #[error("invalid hex octet: {0}")]
    InvalidHex(String),
}

impl FromStr for IeeeAddress {
    type Err = ParseIeeeAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 8 {
            return Err(ParseIeeeAddressError::WrongLength(parts.len()));
        }
        let mut bytes = [0u8; 8];
        for (i, part) in parts.iter().enumerate() {
            bytes[7 - i] = u8::from_str_radix(part, 16)
                .map_err(|_| ParseIeeeAddressError::InvalidHex((*part).to_string()))?;
        }
        Ok(IeeeAddress(bytes))
    }
}

impl Serialize for IeeeAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IeeeAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IeeeAddress::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// A device (endpoint instance), keyed by (network address, endpoint).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub nwk: NetworkAddress,
    pub endpoint: u8,
}

impl DeviceAddress {
    #[must_use]
    pub fn new(nwk: u16, endpoint: u8) -> Self {
        Self {
            nwk: NetworkAddress(nwk),
            endpoint,
        }
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.nwk, self.endpoint)
    }
}

/// A 16-bit ZigBee group id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u16);

/// Where a command or APS frame is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    Device(DeviceAddress),
    Group(GroupId),
}

impl Address {
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self, Address::Group(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Device(d) => write!(f, "{d}"),
            Address::Group(g) => write!(f, "group:{:#06x}", g.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ieee_address_display_is_reversed() {
        let addr = IeeeAddress([0x67, 0x45, 0x23, 0x01, 0x00, 0x8d, 0x15, 0x00]);
        assert_eq!(addr.to_string(), "00:15:8d:00:01:23:45:67");
    }

    #[test]
    fn ieee_address_round_trips_through_display_and_parse() {
        let addr = IeeeAddress([0x67, 0x45, 0x23, 0x01, 0x00, 0x8d, 0x15, 0x00]);
        let parsed: IeeeAddress = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn ieee_address_rejects_wrong_length() {
        assert!(matches!(
            "00:15:8d".parse::<IeeeAddress>(),
            Err(ParseIeeeAddressError::WrongLength(3))
        ));
    }
}
