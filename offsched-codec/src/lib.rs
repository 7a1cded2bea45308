#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

use core::ops::RangeInclusive;

pub mod day;
pub mod error;
pub mod event;
pub mod flags;
pub mod time_spec;
pub mod value;

pub use day::{DayOfWeek, DaySet};
pub use error::{CodecError, Result, TimeSpecFault};
pub use event::{ScheduleEvent, encode_events};
pub use flags::{ScheduleFlags, TimeSpecFlags};
pub use time_spec::{DayRepresentation, TimeSpecification};
pub use value::{AttributeTypes, AttributeValue, DataType};

/// Device attribute identifier; event slots are attribute ids too.
pub type AttributeId = u16;

/// Attribute carrying the schedule-level [`ScheduleFlags`].
pub const FLAGS_ATTRIBUTE_ID: AttributeId = 59001;

/// First attribute id of the reserved event slot range.
pub const FIRST_EVENT_ATTRIBUTE_ID: AttributeId = 59002;

/// Last attribute id of the reserved event slot range.
pub const LAST_EVENT_ATTRIBUTE_ID: AttributeId = 59999;

/// Value written to a slot that holds no event.
pub const EMPTY_SLOT_SENTINEL: [u8; 1] = [0x00];

/// Reserved event slot range as declared by the attribute registry.
pub fn event_attribute_ids() -> RangeInclusive<AttributeId> {
    FIRST_EVENT_ATTRIBUTE_ID..=LAST_EVENT_ATTRIBUTE_ID
}
