use std::collections::BTreeSet;

use offsched_codec::{AttributeId, CodecError, TimeSpecification};

use crate::config::ConfigError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("All {capacity} schedule slots are in use")]
    CapacityExceeded { capacity: usize },

    #[error("Event not found in schedule")]
    EventNotFound,

    #[error("Another event is already scheduled for {0}")]
    DuplicateEvent(TimeSpecification),

    #[error("Index {index} out of range for {count} events")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Device has no time zone to migrate events into")]
    NoDestinationTimeZone,

    #[error("Commit failed for attributes {failed:?}, committed {committed:?}")]
    PartialCommitFailure {
        committed: BTreeSet<AttributeId>,
        failed: BTreeSet<AttributeId>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Device {0} does not support offline schedules")]
    Unsupported(String),

    #[error("Cannot replace {old} events with {new} events")]
    MismatchedReplacementCount { old: usize, new: usize },

    #[error("Time conversion failed: {0}")]
    TimeConversion(String),

    #[error("Migration batch {batch} made no progress")]
    MigrationStalled { batch: usize },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

impl From<time::error::ComponentRange> for ScheduleError {
    fn from(err: time::error::ComponentRange) -> Self {
        ScheduleError::TimeConversion(err.to_string())
    }
}
