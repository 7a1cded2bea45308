use core::fmt;

use serde::{Deserialize, Serialize};
use time::Weekday;

/// Day of week numbered the way firmware expects: Sunday == 1 .. Saturday == 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DayOfWeek {
    Sunday = 1,
    Monday = 2,
    Tuesday = 3,
    Wednesday = 4,
    Thursday = 5,
    Friday = 6,
    Saturday = 7,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Sunday,
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
    ];

    /// Creates a day from its wire number
    pub fn from_day_number(value: u8) -> Option<Self> {
        match value {
            1..=7 => Some(Self::ALL[(value - 1) as usize]),
            _ => None,
        }
    }

    pub fn day_number(self) -> u8 {
        self as u8
    }

    /// Zero-based index, Sunday == 0
    pub fn index(self) -> u8 {
        self.day_number() - 1
    }

    /// Bit of this day inside a compact day byte
    pub fn compact_bit(self) -> u8 {
        1 << (6 - self.index())
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sunday => "Sun",
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        Self::ALL[(weekday.number_from_sunday() - 1) as usize]
    }
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Sunday => Weekday::Sunday,
            DayOfWeek::Monday => Weekday::Monday,
            DayOfWeek::Tuesday => Weekday::Tuesday,
            DayOfWeek::Wednesday => Weekday::Wednesday,
            DayOfWeek::Thursday => Weekday::Thursday,
            DayOfWeek::Friday => Weekday::Friday,
            DayOfWeek::Saturday => Weekday::Saturday,
        }
    }
}

/// Set of days packed the same way as the compact day byte (without the marker bit)
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DaySet(u8);

impl DaySet {
    pub const MASK: u8 = 0b0111_1111;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self(Self::MASK)
    }

    /// Builds a set from a compact day mask; the marker bit is ignored
    pub const fn from_mask(mask: u8) -> Self {
        Self(mask & Self::MASK)
    }

    pub const fn mask(&self) -> u8 {
        self.0
    }

    pub fn with(mut self, day: DayOfWeek) -> Self {
        self.insert(day);
        self
    }

    pub fn insert(&mut self, day: DayOfWeek) {
        self.0 |= day.compact_bit();
    }

    pub fn remove(&mut self, day: DayOfWeek) {
        self.0 &= !day.compact_bit();
    }

    pub fn contains(&self, day: DayOfWeek) -> bool {
        (self.0 & day.compact_bit()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Earliest day in the week, starting from Sunday
    pub fn first(&self) -> Option<DayOfWeek> {
        self.iter().next()
    }

    /// Days in the set, Sunday first
    pub fn iter(self) -> impl Iterator<Item = DayOfWeek> {
        DayOfWeek::ALL
            .into_iter()
            .filter(move |day| self.contains(*day))
    }
}

impl From<DayOfWeek> for DaySet {
    fn from(day: DayOfWeek) -> Self {
        Self::empty().with(day)
    }
}

impl FromIterator<DayOfWeek> for DaySet {
    fn from_iter<I: IntoIterator<Item = DayOfWeek>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), DaySet::with)
    }
}

impl fmt::Debug for DaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
