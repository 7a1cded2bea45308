use core::fmt;

use crate::AttributeId;
use crate::value::DataType;

/// Reason a time specification record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpecFault {
    /// Fewer bytes than a full record
    Truncated(usize),
    /// Non-compact day byte outside 1..=7
    InvalidDay(u8),
    /// Hour outside 0..=23
    InvalidHour(u8),
    /// Minute outside 0..=59
    InvalidMinute(u8),
}

impl fmt::Display for TimeSpecFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated(len) => write!(f, "need 4 bytes, have {}", len),
            Self::InvalidDay(day) => write!(f, "invalid day number {}", day),
            Self::InvalidHour(hour) => write!(f, "invalid hour {}", hour),
            Self::InvalidMinute(minute) => write!(f, "invalid minute {}", minute),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Time specification could not be built or decoded
    MalformedTimeSpec(TimeSpecFault),
    /// Attribute id has no entry in the type map
    UnknownAttributeType(AttributeId),
    /// Attribute type has no fixed byte width
    VariableWidthTypeUnsupported { id: AttributeId, data_type: DataType },
    /// Bytes do not form a value of the declared type
    MalformedAttributeValue { id: AttributeId, data_type: DataType },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedTimeSpec(fault) => write!(f, "Malformed time specification: {}", fault),
            Self::UnknownAttributeType(id) => write!(f, "No type for attribute {}", id),
            Self::VariableWidthTypeUnsupported { id, data_type } => write!(
                f,
                "Attribute {} has variable-width type {}",
                id,
                data_type.name()
            ),
            Self::MalformedAttributeValue { id, data_type } => write!(
                f,
                "Malformed {} value for attribute {}",
                data_type.name(),
                id
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

impl From<TimeSpecFault> for CodecError {
    fn from(fault: TimeSpecFault) -> Self {
        Self::MalformedTimeSpec(fault)
    }
}

pub type Result<T> = core::result::Result<T, CodecError>;
