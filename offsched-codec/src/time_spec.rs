use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::day::{DayOfWeek, DaySet};
use crate::error::{CodecError, Result, TimeSpecFault};
use crate::flags::TimeSpecFlags;

/// How the day byte of a record is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayRepresentation {
    /// Day number 1..=7 in the day byte
    Single(DayOfWeek),
    /// Compact marker plus a seven-bit day mask
    Compact(DaySet),
}

impl DayRepresentation {
    pub fn days(&self) -> DaySet {
        match self {
            Self::Single(day) => DaySet::from(*day),
            Self::Compact(days) => *days,
        }
    }
}

/// When an event fires: day(s) of week, hour and minute, plus flags.
///
/// Wire layout is `[flags][day][hour][minute]`. Two specifications are equal
/// when they cover the same days, hour, minute and flags, regardless of whether
/// the day byte is stored single or compact.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSpecification")]
pub struct TimeSpecification {
    flags: TimeSpecFlags,
    days: DayRepresentation,
    hour: u8,
    minute: u8,
}

/// Deserialized fields, validated through [`TimeSpecification::with_representation`]
#[derive(Deserialize)]
struct RawTimeSpecification {
    flags: TimeSpecFlags,
    days: DayRepresentation,
    hour: u8,
    minute: u8,
}

impl TryFrom<RawTimeSpecification> for TimeSpecification {
    type Error = CodecError;

    fn try_from(raw: RawTimeSpecification) -> Result<Self> {
        Self::with_representation(raw.days, raw.hour, raw.minute, raw.flags)
    }
}

impl TimeSpecification {
    /// Marker bit of a compact day byte
    pub const COMPACT_FLAG: u8 = 0b1000_0000;

    pub const FLAGS_OFFSET: usize = 0;
    pub const DAY_OFFSET: usize = 1;
    pub const HOUR_OFFSET: usize = 2;
    pub const MINUTE_OFFSET: usize = 3;
    pub const SERIALIZED_SIZE: usize = 4;

    /// Creates a single-day specification
    pub fn new(day: DayOfWeek, hour: u8, minute: u8, flags: TimeSpecFlags) -> Result<Self> {
        Self::with_representation(DayRepresentation::Single(day), hour, minute, flags)
    }

    /// Creates a specification over a set of days; more than one day (or none)
    /// forces the compact representation
    pub fn on_days(days: DaySet, hour: u8, minute: u8, flags: TimeSpecFlags) -> Result<Self> {
        let representation = match (days.len(), days.first()) {
            (1, Some(day)) => DayRepresentation::Single(day),
            _ => DayRepresentation::Compact(days),
        };
        Self::with_representation(representation, hour, minute, flags)
    }

    /// Creates a specification with an explicit day representation
    pub fn with_representation(
        days: DayRepresentation,
        hour: u8,
        minute: u8,
        flags: TimeSpecFlags,
    ) -> Result<Self> {
        if hour > 23 {
            return Err(TimeSpecFault::InvalidHour(hour).into());
        }
        if minute > 59 {
            return Err(TimeSpecFault::InvalidMinute(minute).into());
        }

        Ok(Self {
            flags,
            days,
            hour,
            minute,
        })
    }

    pub fn flags(&self) -> TimeSpecFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: TimeSpecFlags) {
        self.flags = flags;
    }

    pub fn repeats(&self) -> bool {
        self.flags.repeats()
    }

    pub fn set_repeats(&mut self, repeats: bool) {
        self.flags.set(TimeSpecFlags::REPEATS, repeats);
    }

    pub fn uses_device_time_zone(&self) -> bool {
        self.flags.uses_device_time_zone()
    }

    pub fn set_uses_device_time_zone(&mut self, value: bool) {
        self.flags.set(TimeSpecFlags::USES_DEVICE_TIME_ZONE, value);
    }

    pub fn representation(&self) -> DayRepresentation {
        self.days
    }

    pub fn is_compact(&self) -> bool {
        matches!(self.days, DayRepresentation::Compact(_))
    }

    pub fn days(&self) -> DaySet {
        self.days.days()
    }

    /// Earliest day the event fires on; this is the day used for ordering
    pub fn first_day(&self) -> Option<DayOfWeek> {
        self.days().first()
    }

    /// Replaces the day set, switching to compact storage as setting days always does
    pub fn set_days(&mut self, days: DaySet) {
        self.days = DayRepresentation::Compact(days);
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Encodes specification to its 4-byte wire record
    pub fn encode(&self) -> [u8; Self::SERIALIZED_SIZE] {
        let day_byte = match self.days {
            DayRepresentation::Single(day) => day.day_number(),
            DayRepresentation::Compact(days) => Self::COMPACT_FLAG | days.mask(),
        };

        [self.flags.bits(), day_byte, self.hour, self.minute]
    }

    /// Decodes specification from the start of `data`
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return Err(TimeSpecFault::Truncated(data.len()).into());
        }

        let flags = TimeSpecFlags::from_bits(data[Self::FLAGS_OFFSET]);

        let day_byte = data[Self::DAY_OFFSET];
        let days = if day_byte & Self::COMPACT_FLAG != 0 {
            DayRepresentation::Compact(DaySet::from_mask(day_byte))
        } else {
            let day = DayOfWeek::from_day_number(day_byte)
                .ok_or(TimeSpecFault::InvalidDay(day_byte))?;
            DayRepresentation::Single(day)
        };

        Self::with_representation(days, data[Self::HOUR_OFFSET], data[Self::MINUTE_OFFSET], flags)
    }

    fn sort_key(&self) -> (Option<DayOfWeek>, u8, u8, u8, u8) {
        (
            self.first_day(),
            self.hour,
            self.minute,
            self.flags.bits(),
            self.days().mask(),
        )
    }
}

impl PartialEq for TimeSpecification {
    fn eq(&self, other: &Self) -> bool {
        self.days() == other.days()
            && self.hour == other.hour
            && self.minute == other.minute
            && self.flags == other.flags
    }
}

impl Eq for TimeSpecification {}

impl Hash for TimeSpecification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.days().hash(state);
        self.hour.hash(state);
        self.minute.hash(state);
        self.flags.hash(state);
    }
}

impl Ord for TimeSpecification {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for TimeSpecification {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for TimeSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeSpecification")
            .field("days", &self.days)
            .field("hour", &self.hour)
            .field("minute", &self.minute)
            .field("flags", &self.flags)
            .finish()
    }
}

impl fmt::Display for TimeSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut days = self.days().iter();
        match days.next() {
            Some(first) => {
                write!(f, "{}", first)?;
                for day in days {
                    write!(f, ",{}", day)?;
                }
            }
            None => f.write_str("never")?,
        }
        write!(f, " {:02}:{:02}", self.hour, self.minute)?;
        if !self.uses_device_time_zone() {
            f.write_str(" UTC")?;
        }
        if self.repeats() {
            f.write_str(" weekly")?;
        }
        Ok(())
    }
}
