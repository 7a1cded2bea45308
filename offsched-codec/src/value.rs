use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::AttributeId;

/// Map of attribute id to declared type, as published by the device profile
pub type AttributeTypes = BTreeMap<AttributeId, DataType>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    SInt8,
    SInt16,
    SInt32,
    SInt64,
    Float32,
    Float64,
    /// Signed fixed point, 15 integer bits and 16 fraction bits
    Q1516,
    /// Signed fixed point, 31 integer bits and 32 fraction bits
    Q3132,
    Bytes,
    Utf8S,
}

impl DataType {
    /// Encoded width in bytes, `None` for variable-length types
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Boolean | Self::SInt8 => Some(1),
            Self::SInt16 => Some(2),
            Self::SInt32 | Self::Float32 | Self::Q1516 => Some(4),
            Self::SInt64 | Self::Float64 | Self::Q3132 => Some(8),
            Self::Bytes | Self::Utf8S => None,
        }
    }

    /// Returns type name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::SInt8 => "sint8",
            Self::SInt16 => "sint16",
            Self::SInt32 => "sint32",
            Self::SInt64 => "sint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Q1516 => "q_15_16",
            Self::Q3132 => "q_31_32",
            Self::Bytes => "bytes",
            Self::Utf8S => "utf8s",
        }
    }
}

/// Typed attribute value; multi-byte values travel little-endian
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Boolean(bool),
    SInt8(i8),
    SInt16(i16),
    SInt32(i32),
    SInt64(i64),
    Float32(f32),
    Float64(f64),
    /// Raw Q15.16 representation
    Q1516(i32),
    /// Raw Q31.32 representation
    Q3132(i64),
    Bytes(Vec<u8>),
    Utf8S(String),
}

impl AttributeValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::SInt8(_) => DataType::SInt8,
            Self::SInt16(_) => DataType::SInt16,
            Self::SInt32(_) => DataType::SInt32,
            Self::SInt64(_) => DataType::SInt64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::Q1516(_) => DataType::Q1516,
            Self::Q3132(_) => DataType::Q3132,
            Self::Bytes(_) => DataType::Bytes,
            Self::Utf8S(_) => DataType::Utf8S,
        }
    }

    /// Encodes value to attribute bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Boolean(v) => alloc::vec![u8::from(*v)],
            Self::SInt8(v) => v.to_le_bytes().to_vec(),
            Self::SInt16(v) => v.to_le_bytes().to_vec(),
            Self::SInt32(v) | Self::Q1516(v) => v.to_le_bytes().to_vec(),
            Self::SInt64(v) | Self::Q3132(v) => v.to_le_bytes().to_vec(),
            Self::Float32(v) => v.to_le_bytes().to_vec(),
            Self::Float64(v) => v.to_le_bytes().to_vec(),
            Self::Bytes(v) => v.clone(),
            Self::Utf8S(v) => v.as_bytes().to_vec(),
        }
    }

    /// Decodes a value of `data_type`; fixed-width types need exactly their width
    pub fn decode(data_type: DataType, data: &[u8]) -> Option<Self> {
        if let Some(width) = data_type.fixed_width() {
            if data.len() != width {
                return None;
            }
        }

        let value = match data_type {
            DataType::Boolean => match data[0] {
                0 => Self::Boolean(false),
                1 => Self::Boolean(true),
                _ => return None,
            },
            DataType::SInt8 => Self::SInt8(i8::from_le_bytes([data[0]])),
            DataType::SInt16 => Self::SInt16(i16::from_le_bytes(data.try_into().ok()?)),
            DataType::SInt32 => Self::SInt32(i32::from_le_bytes(data.try_into().ok()?)),
            DataType::SInt64 => Self::SInt64(i64::from_le_bytes(data.try_into().ok()?)),
            DataType::Float32 => Self::Float32(f32::from_le_bytes(data.try_into().ok()?)),
            DataType::Float64 => Self::Float64(f64::from_le_bytes(data.try_into().ok()?)),
            DataType::Q1516 => Self::Q1516(i32::from_le_bytes(data.try_into().ok()?)),
            DataType::Q3132 => Self::Q3132(i64::from_le_bytes(data.try_into().ok()?)),
            DataType::Bytes => Self::Bytes(data.to_vec()),
            DataType::Utf8S => Self::Utf8S(String::from_utf8(data.to_vec()).ok()?),
        };

        Some(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i8> for AttributeValue {
    fn from(value: i8) -> Self {
        Self::SInt8(value)
    }
}

impl From<i16> for AttributeValue {
    fn from(value: i16) -> Self {
        Self::SInt16(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::SInt32(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::SInt64(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_widths() {
        assert_eq!(DataType::Boolean.fixed_width(), Some(1));
        assert_eq!(DataType::SInt16.fixed_width(), Some(2));
        assert_eq!(DataType::Q1516.fixed_width(), Some(4));
        assert_eq!(DataType::Q3132.fixed_width(), Some(8));
        assert_eq!(DataType::Bytes.fixed_width(), None);
        assert_eq!(DataType::Utf8S.fixed_width(), None);
    }

    #[test]
    fn test_little_endian_encoding() {
        assert_eq!(AttributeValue::SInt16(0x0102).encode(), [0x02, 0x01]);
        assert_eq!(
            AttributeValue::SInt32(-2).encode(),
            [0xFE, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(AttributeValue::Boolean(true).encode(), [0x01]);
    }

    #[test]
    fn test_decode_matches_encode() {
        let values = [
            AttributeValue::Boolean(false),
            AttributeValue::SInt8(-5),
            AttributeValue::SInt16(-1234),
            AttributeValue::SInt32(70_000),
            AttributeValue::SInt64(-9_000_000_000),
            AttributeValue::Float32(1.5),
            AttributeValue::Float64(-2.25),
            AttributeValue::Q1516(0x0001_8000),
            AttributeValue::Q3132(1 << 33),
        ];

        for value in values {
            let decoded = AttributeValue::decode(value.data_type(), &value.encode());
            assert_eq!(decoded, Some(value));
        }
    }

    #[test]
    fn test_decode_rejects_bad_bytes() {
        assert_eq!(AttributeValue::decode(DataType::Boolean, &[0x02]), None);
        assert_eq!(AttributeValue::decode(DataType::SInt16, &[0x01]), None);
        assert_eq!(AttributeValue::decode(DataType::Utf8S, &[0xFF, 0xFE]), None);
        assert_eq!(
            AttributeValue::decode(DataType::Utf8S, b"on"),
            Some(AttributeValue::Utf8S("on".into()))
        );
    }
}
