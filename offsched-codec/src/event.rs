use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::AttributeId;
use crate::EMPTY_SLOT_SENTINEL;
use crate::error::{CodecError, Result};
use crate::time_spec::TimeSpecification;
use crate::value::{AttributeTypes, AttributeValue};

/// A scheduled write of one or more attributes.
///
/// Equality, ordering and hashing look only at the time specification: a
/// schedule holds at most one event per distinct time, whatever its payload.
/// Use [`ScheduleEvent::same_payload`] to compare the attributes too.
#[derive(Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    pub time_specification: TimeSpecification,
    pub attributes: BTreeMap<AttributeId, AttributeValue>,
}

impl ScheduleEvent {
    /// Size of an attribute id on the wire
    pub const ID_SIZE: usize = 2;

    /// Smallest buffer that can hold an event: header, one id, one byte of value
    pub const MIN_SERIALIZED_SIZE: usize = TimeSpecification::SERIALIZED_SIZE + Self::ID_SIZE + 1;

    pub fn new(time_specification: TimeSpecification) -> Self {
        Self {
            time_specification,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, id: AttributeId, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(id, value.into());
        self
    }

    /// Builds an event from `(id, value)` pairs; later duplicates win
    pub fn from_attributes<I>(time_specification: TimeSpecification, attributes: I) -> Self
    where
        I: IntoIterator<Item = (AttributeId, AttributeValue)>,
    {
        Self {
            time_specification,
            attributes: attributes.into_iter().collect(),
        }
    }

    pub fn uses_device_time_zone(&self) -> bool {
        self.time_specification.uses_device_time_zone()
    }

    pub fn repeats(&self) -> bool {
        self.time_specification.repeats()
    }

    /// True when both time and attribute payload match
    pub fn same_payload(&self, other: &Self) -> bool {
        self.time_specification == other.time_specification && self.attributes == other.attributes
    }

    /// Type map describing this event's attributes
    pub fn attribute_types(&self) -> AttributeTypes {
        self.attributes
            .iter()
            .map(|(id, value)| (*id, value.data_type()))
            .collect()
    }

    /// Encodes event: time specification followed by `[id LE][value]` in ascending id order
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(
            TimeSpecification::SERIALIZED_SIZE + self.attributes.len() * (Self::ID_SIZE + 8),
        );
        buffer.extend_from_slice(&self.time_specification.encode());

        for (id, value) in &self.attributes {
            let data_type = value.data_type();
            if data_type.fixed_width().is_none() {
                return Err(CodecError::VariableWidthTypeUnsupported { id: *id, data_type });
            }
            buffer.extend_from_slice(&id.to_le_bytes());
            buffer.extend_from_slice(&value.encode());
        }

        Ok(buffer)
    }

    /// Decodes one event from `data`, returns (event, bytes_consumed).
    ///
    /// Short input is not an error: it may be a partial chunk, or the one-byte
    /// empty-slot sentinel, and yields `(None, 0)`. Once enough bytes are
    /// present, an unparseable time specification, an id missing from `types`,
    /// a variable-width type or a bad value is an error.
    pub fn decode(data: &[u8], types: &AttributeTypes) -> Result<(Option<Self>, usize)> {
        if data.len() < Self::MIN_SERIALIZED_SIZE {
            return Ok((None, 0));
        }

        let time_specification = TimeSpecification::decode(data)?;
        let mut event = Self::new(time_specification);

        let mut offset = TimeSpecification::SERIALIZED_SIZE;
        while offset < data.len() {
            if data.len() < offset + Self::ID_SIZE {
                return Ok((None, 0));
            }

            let id = u16::from_le_bytes([data[offset], data[offset + 1]]);
            let data_type = *types.get(&id).ok_or(CodecError::UnknownAttributeType(id))?;
            let width = data_type
                .fixed_width()
                .ok_or(CodecError::VariableWidthTypeUnsupported { id, data_type })?;

            let value_offset = offset + Self::ID_SIZE;
            let end = value_offset + width;
            if data.len() < end {
                return Ok((None, 0));
            }

            let value = AttributeValue::decode(data_type, &data[value_offset..end])
                .ok_or(CodecError::MalformedAttributeValue { id, data_type })?;
            event.attributes.insert(id, value);

            offset = end;
        }

        Ok((Some(event), offset))
    }

    /// True for the one-byte value a cleared slot holds
    pub fn is_empty_slot(data: &[u8]) -> bool {
        data == EMPTY_SLOT_SENTINEL
    }
}

/// Concatenates encodings of `events`, returning the bytes and the merged type map
pub fn encode_events(events: &[ScheduleEvent]) -> Result<(Vec<u8>, AttributeTypes)> {
    let mut bytes = Vec::new();
    let mut types = AttributeTypes::new();

    for event in events {
        bytes.extend_from_slice(&event.encode()?);
        types.extend(event.attribute_types());
    }

    Ok((bytes, types))
}

impl PartialEq for ScheduleEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_specification == other.time_specification
    }
}

impl Eq for ScheduleEvent {}

impl Hash for ScheduleEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.time_specification.hash(state);
    }
}

impl Ord for ScheduleEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time_specification.cmp(&other.time_specification)
    }
}

impl PartialOrd for ScheduleEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ScheduleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleEvent")
            .field("time", &self.time_specification)
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl fmt::Display for ScheduleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} attributes)", self.time_specification, self.attributes.len())
    }
}
