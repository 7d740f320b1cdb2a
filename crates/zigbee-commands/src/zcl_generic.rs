//! Generic (entire-profile) ZCL commands: attribute read/write and the
//! default response, plus the cluster-specific On/Off command wrapper

use zigbee_transport::{ByteDeserializer, ByteSerializer, ProtocolError};

/// ZCL attribute data type tags this catalogue understands. The ZCL
/// specification defines many more; only the ones this crate actually
/// encodes or decodes are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Int8,
    Int16,
    Enum8,
    OctetString,
}

impl AttributeType {
    #[must_use]
    pub fn type_id(self) -> u8 {
        match self {
            AttributeType::Bool => 0x10,
            AttributeType::Uint8 => 0x20,
            AttributeType::Uint16 => 0x21,
            AttributeType::Uint32 => 0x23,
            AttributeType::Int8 => 0x28,
            AttributeType::Int16 => 0x29,
            AttributeType::Enum8 => 0x30,
            AttributeType::OctetString => 0x41,
        }
    }

    pub fn from_type_id(id: u8) -> Result<Self, ProtocolError> {
        match id {
            0x10 => Ok(AttributeType::Bool),
            0x20 => Ok(AttributeType::Uint8),
            0x21 => Ok(AttributeType::Uint16),
            0x23 => Ok(AttributeType::Uint32),
            0x28 => Ok(AttributeType::Int8),
            0x29 => Ok(AttributeType::Int16),
            0x30 => Ok(AttributeType::Enum8),
            0x41 => Ok(AttributeType::OctetString),
            other => Err(ProtocolError::InvalidFrame(format!(
                "unknown ZCL attribute type {other:#04x}"
            ))),
        }
    }
}

/// A decoded attribute value, tagged by its wire type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Int8(i8),
    Int16(i16),
    Enum8(u8),
    OctetString(Vec<u8>),
}

impl AttributeValue {
    #[must_use]
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Uint8(_) => AttributeType::Uint8,
            AttributeValue::Uint16(_) => AttributeType::Uint16,
            AttributeValue::Uint32(_) => AttributeType::Uint32,
            AttributeValue::Int8(_) => AttributeType::Int8,
            AttributeValue::Int16(_) => AttributeType::Int16,
            AttributeValue::Enum8(_) => AttributeType::Enum8,
            AttributeValue::OctetString(_) => AttributeType::OctetString,
        }
    }

    pub fn write(&self, ser: &mut ByteSerializer) {
        match self {
            AttributeValue::Bool(v) => ser.write_u8(u8::from(*v)),
            AttributeValue::Uint8(v) => ser.write_u8(*v),
            AttributeValue::Uint16(v) => ser.write_u16(*v),
            AttributeValue::Uint32(v) => ser.write_u32(*v),
            AttributeValue::Int8(v) => ser.write_u8(*v as u8),
            AttributeValue::Int16(v) => ser.write_u16(*v as u16),
            AttributeValue::Enum8(v) => ser.write_u8(*v),
            AttributeValue::OctetString(v) => ser.write_octet_string(v),
        }
    }

    pub fn parse(ty: AttributeType, des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        Ok(match ty {
            AttributeType::Bool => AttributeValue::Bool(des.read_u8()? != 0),
            AttributeType::Uint8 => AttributeValue::Uint8(des.read_u8()?),
            AttributeType::Uint16 => AttributeValue::Uint16(des.read_u16()?),
            AttributeType::Uint32 => AttributeValue::Uint32(des.read_u32()?),
            AttributeType::Int8 => AttributeValue::Int8(des.read_u8()? as i8),
            AttributeType::Int16 => AttributeValue::Int16(des.read_u16()? as i16),
            AttributeType::Enum8 => AttributeValue::Enum8(des.read_u8()?),
            AttributeType::OctetString => AttributeValue::OctetString(des.read_octet_string()?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReadAttributes {
    pub attribute_ids: Vec<u16>,
}

impl ReadAttributes {
    pub fn write(&self, ser: &mut ByteSerializer) {
        for id in &self.attribute_ids {
            ser.write_u16(*id);
        }
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let mut attribute_ids = Vec::new();
        while des.remaining() >= 2 {
            attribute_ids.push(des.read_u16()?);
        }
        Ok(Self { attribute_ids })
    }
}

#[derive(Debug, Clone)]
pub struct AttributeReadResult {
    pub attribute_id: u16,
    pub status: u8,
    pub value: Option<AttributeValue>,
}

#[derive(Debug, Clone)]
pub struct ReadAttributesResponse {
    pub results: Vec<AttributeReadResult>,
}

impl ReadAttributesResponse {
    pub fn write(&self, ser: &mut ByteSerializer) {
        for r in &self.results {
            ser.write_u16(r.attribute_id);
            ser.write_u8(r.status);
            if let Some(v) = &r.value {
                ser.write_u8(v.attribute_type().type_id());
                v.write(ser);
            }
        }
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let mut results = Vec::new();
        while des.remaining() >= 3 {
            let attribute_id = des.read_u16()?;
            let status = des.read_u8()?;
            let value = if status == 0 {
                let ty = AttributeType::from_type_id(des.read_u8()?)?;
                Some(AttributeValue::parse(ty, des)?)
            } else {
                None
            };
            results.push(AttributeReadResult {
                attribute_id,
                status,
                value,
            });
        }
        Ok(Self { results })
    }
}

#[derive(Debug, Clone)]
pub struct AttributeWrite {
    pub attribute_id: u16,
    pub value: AttributeValue,
}

#[derive(Debug, Clone)]
pub struct WriteAttributes {
    pub writes: Vec<AttributeWrite>,
}

impl WriteAttributes {
    pub fn write(&self, ser: &mut ByteSerializer) {
        for w in &self.writes {
            ser.write_u16(w.attribute_id);
            ser.write_u8(w.value.attribute_type().type_id());
            w.value.write(ser);
        }
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let mut writes = Vec::new();
        while des.remaining() >= 3 {
            let attribute_id = des.read_u16()?;
            let ty = AttributeType::from_type_id(des.read_u8()?)?;
            let value = AttributeValue::parse(ty, des)?;
            writes.push(AttributeWrite { attribute_id, value });
        }
        Ok(Self { writes })
    }
}

#[derive(Debug, Clone)]
pub struct AttributeWriteStatus {
    pub status: u8,
    pub attribute_id: u16,
}

#[derive(Debug, Clone)]
pub struct WriteAttributesResponse {
    pub statuses: Vec<AttributeWriteStatus>,
}

impl WriteAttributesResponse {
    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        let mut statuses = Vec::new();
        while des.remaining() >= 3 {
            let status = des.read_u8()?;
            let attribute_id = des.read_u16()?;
            statuses.push(AttributeWriteStatus {
                status,
                attribute_id,
            });
        }
        Ok(Self { statuses })
    }
}

#[derive(Debug, Clone)]
pub struct DefaultResponse {
    pub command_id: u8,
    pub status: u8,
}

impl DefaultResponse {
    pub fn write(&self, ser: &mut ByteSerializer) {
        ser.write_u8(self.command_id);
        ser.write_u8(self.status);
    }

    pub fn parse(des: &mut ByteDeserializer) -> Result<Self, ProtocolError> {
        Ok(Self {
            command_id: des.read_u8()?,
            status: des.read_u8()?,
        })
    }
}

/// On/Off cluster (0x0006) cluster-specific command; no payload beyond
/// the command id itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnOffCommandFrame {
    pub command: crate::clusters::OnOffCommand,
}

impl OnOffCommandFrame {
    pub fn write(&self, _ser: &mut ByteSerializer) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_attributes_round_trips() {
        let cmd = ReadAttributes {
            attribute_ids: vec![0x0000, 0x0001],
        };
        let mut ser = ByteSerializer::new();
        cmd.write(&mut ser);
        let bytes = ser.into_bytes();
        let mut des = ByteDeserializer::new(&bytes);
        let parsed = ReadAttributes::parse(&mut des).unwrap();
        assert_eq!(parsed.attribute_ids, cmd.attribute_ids);
    }

    #[test]
    fn read_attributes_response_round_trips_uint8() {
        let resp = ReadAttributesResponse {
            results: vec![AttributeReadResult {
                attribute_id: 0x0021,
                status: 0,
                value: Some(AttributeValue::Uint8(42)),
            }],
        };
        let mut ser = ByteSerializer::new();
        resp.write(&mut ser);
        let bytes = ser.into_bytes();
        let mut des = ByteDeserializer::new(&bytes);
        let parsed = ReadAttributesResponse::parse(&mut des).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert_eq!(parsed.results[0].value, Some(AttributeValue::Uint8(42)));
    }
}
