use core::fmt;
use core::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

macro_rules! impl_bit_ops {
    ($name:ident) => {
        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                self.union(rhs)
            }
        }

        impl BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.insert(rhs);
            }
        }
    };
}

/// Per-event flags, first byte of a time specification record
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSpecFlags(u8);

impl TimeSpecFlags {
    pub const NONE: Self = Self(0);
    /// The event fires every week
    pub const REPEATS: Self = Self(0b0000_0001);
    /// Hour and minute are in the device's time zone rather than UTC
    pub const USES_DEVICE_TIME_ZONE: Self = Self(0b0000_0010);

    /// Keeps unknown bits so they survive a decode/encode cycle
    pub const fn from_bits(value: u8) -> Self {
        Self(value)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }

    pub fn repeats(&self) -> bool {
        self.contains(Self::REPEATS)
    }

    pub fn uses_device_time_zone(&self) -> bool {
        self.contains(Self::USES_DEVICE_TIME_ZONE)
    }
}

impl_bit_ops!(TimeSpecFlags);

impl fmt::Debug for TimeSpecFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeSpecFlags({:#04x}", self.0)?;
        if self.repeats() {
            f.write_str(" repeats")?;
        }
        if self.uses_device_time_zone() {
            f.write_str(" device-tz")?;
        }
        f.write_str(")")
    }
}

/// Schedule-level flags stored in the reserved flags attribute as a signed 16-bit value
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleFlags(i16);

impl ScheduleFlags {
    pub const NONE: Self = Self(0);
    pub const ENABLED: Self = Self(0b0000_0001);

    pub const SERIALIZED_SIZE: usize = 2;

    pub const fn from_bits(value: i16) -> Self {
        Self(value)
    }

    pub const fn bits(&self) -> i16 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn is_enabled(&self) -> bool {
        self.contains(Self::ENABLED)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.insert(Self::ENABLED);
        } else {
            self.remove(Self::ENABLED);
        }
    }

    /// Encodes flags to little-endian attribute bytes
    pub fn encode(&self) -> [u8; Self::SERIALIZED_SIZE] {
        self.0.to_le_bytes()
    }

    /// Decodes flags from attribute bytes; `None` if too short
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SERIALIZED_SIZE {
            return None;
        }
        Some(Self(i16::from_le_bytes([data[0], data[1]])))
    }
}

impl_bit_ops!(ScheduleFlags);

impl fmt::Debug for ScheduleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScheduleFlags({:#06x}", self.0)?;
        if self.is_enabled() {
            f.write_str(" enabled")?;
        }
        f.write_str(")")
    }
}
