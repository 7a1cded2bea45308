pub mod collator;
pub mod config;
pub mod error;
pub mod migration;
pub mod schedule;
pub mod slot;
pub mod storage;

pub use collator::{Collator, DefaultCollator, IndexDeltas};
pub use config::{ConfigError, MigrationConfig, ScheduleConfig};
pub use error::{Result, ScheduleError};
pub use migration::{MigrationCoordinator, MigrationSummary, convert_event, convert_time_specification};
pub use schedule::{CommitReport, ReplaceOutcome, ScheduleEngine, ScheduleNotification};
pub use slot::{SlotId, SlotTable};
pub use storage::{
    AttributeInstance, AttributeSubscription, AttributeUpdate, AttributeWriteResults,
    MemoryStorage, ScheduleStorage, StorageError, SubscriptionId,
};

pub use offsched_codec as codec;
