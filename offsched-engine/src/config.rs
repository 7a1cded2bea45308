use std::ops::RangeInclusive;
use std::time::Duration;

use offsched_codec::{
    AttributeId, FIRST_EVENT_ATTRIBUTE_ID, FLAGS_ATTRIBUTE_ID, LAST_EVENT_ATTRIBUTE_ID,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Migration batch size must be greater than zero")]
    InvalidBatchSize,

    #[error("Notification capacity must be greater than zero")]
    InvalidNotificationCapacity,

    #[error("Event slot range {first}..={last} is empty")]
    EmptySlotRange { first: AttributeId, last: AttributeId },

    #[error("Flags attribute {0} lies inside the event slot range")]
    FlagsInsideSlotRange(AttributeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Most events rewritten per batch
    pub max_batch_size: usize,
    pub wait_between_batches_ms: u64,
}

impl MigrationConfig {
    pub fn wait_between_batches(&self) -> Duration {
        Duration::from_millis(self.wait_between_batches_ms)
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 5,
            wait_between_batches_ms: 5_000,
        }
    }
}

/// Schedule engine settings, usually read from the `[schedule]` table of a TOML file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub flags_attribute_id: AttributeId,
    pub first_event_attribute_id: AttributeId,
    pub last_event_attribute_id: AttributeId,
    /// Buffered notifications per subscriber before slow receivers start lagging
    pub notification_capacity: usize,
    pub migration: MigrationConfig,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            flags_attribute_id: FLAGS_ATTRIBUTE_ID,
            first_event_attribute_id: FIRST_EVENT_ATTRIBUTE_ID,
            last_event_attribute_id: LAST_EVENT_ATTRIBUTE_ID,
            notification_capacity: 64,
            migration: MigrationConfig::default(),
        }
    }
}

impl ScheduleConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: ScheduleConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.migration.max_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::InvalidNotificationCapacity);
        }
        if self.first_event_attribute_id > self.last_event_attribute_id {
            return Err(ConfigError::EmptySlotRange {
                first: self.first_event_attribute_id,
                last: self.last_event_attribute_id,
            });
        }
        if self.event_attribute_ids().contains(&self.flags_attribute_id) {
            return Err(ConfigError::FlagsInsideSlotRange(self.flags_attribute_id));
        }
        Ok(())
    }

    pub fn event_attribute_ids(&self) -> RangeInclusive<AttributeId> {
        self.first_event_attribute_id..=self.last_event_attribute_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reserved_ids() {
        let config = ScheduleConfig::default();
        assert_eq!(config.flags_attribute_id, 59001);
        assert_eq!(config.event_attribute_ids(), 59002..=59999);
        assert_eq!(config.migration.max_batch_size, 5);
        assert_eq!(config.migration.wait_between_batches(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScheduleConfig::from_toml(
            r#"
            notification_capacity = 8

            [migration]
            max_batch_size = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.notification_capacity, 8);
        assert_eq!(config.migration.max_batch_size, 2);
        assert_eq!(config.migration.wait_between_batches_ms, 5_000);
        assert_eq!(config.first_event_attribute_id, FIRST_EVENT_ATTRIBUTE_ID);
    }

    #[test]
    fn test_validation_failures() {
        assert!(matches!(
            ScheduleConfig::from_toml("[migration]\nmax_batch_size = 0"),
            Err(ConfigError::InvalidBatchSize)
        ));
        assert!(matches!(
            ScheduleConfig::from_toml("first_event_attribute_id = 10\nlast_event_attribute_id = 5"),
            Err(ConfigError::EmptySlotRange { first: 10, last: 5 })
        ));
        assert!(matches!(
            ScheduleConfig::from_toml("flags_attribute_id = 59010"),
            Err(ConfigError::FlagsInsideSlotRange(59010))
        ));
        assert!(matches!(
            ScheduleConfig::from_toml("notification_capacity = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
