mod memory;

pub use memory::*;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use offsched_codec::{AttributeId, AttributeTypes, event_attribute_ids};
use time::UtcOffset;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type SubscriptionId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Device is not connected")]
    Disconnected,

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// One attribute value to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInstance {
    pub id: AttributeId,
    pub value: Vec<u8>,
}

impl AttributeInstance {
    pub fn new(id: AttributeId, value: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

/// A value change reported by storage; `None` means the attribute has no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub id: AttributeId,
    pub value: Option<Vec<u8>>,
}

/// Per-attribute outcome of a batched write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeWriteResults {
    results: BTreeMap<AttributeId, Result<(), String>>,
}

impl AttributeWriteResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, id: AttributeId) {
        self.results.insert(id, Ok(()));
    }

    pub fn record_failure(&mut self, id: AttributeId, reason: impl Into<String>) {
        self.results.insert(id, Err(reason.into()));
    }

    pub fn was_successful_for(&self, id: AttributeId) -> bool {
        matches!(self.results.get(&id), Some(Ok(())))
    }

    pub fn failure_reason(&self, id: AttributeId) -> Option<&str> {
        match self.results.get(&id) {
            Some(Err(reason)) => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn succeeded(&self) -> BTreeSet<AttributeId> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn failed(&self) -> BTreeSet<AttributeId> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_err())
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Live feed of attribute changes; released through [`ScheduleStorage::unsubscribe`]
#[derive(Debug)]
pub struct AttributeSubscription {
    pub id: SubscriptionId,
    pub updates: mpsc::UnboundedReceiver<AttributeUpdate>,
}

/// Device attribute store the schedule reads from and writes to
#[async_trait]
pub trait ScheduleStorage: Send + Sync {
    /// Human readable device name, used in logs and errors
    fn display_name(&self) -> String;

    fn writable_attribute_ids(&self) -> BTreeSet<AttributeId>;

    fn readable_attribute_ids(&self) -> BTreeSet<AttributeId>;

    /// Declared type of every attribute the device profile knows
    fn attribute_types(&self) -> AttributeTypes;

    /// Last known raw value of `id`
    fn current_value(&self, id: AttributeId) -> Option<Vec<u8>>;

    /// Writes all instances in one batch. Individual attributes may fail while
    /// the batch as a whole succeeds; check the returned results per id.
    async fn set_attributes(
        &self,
        instances: Vec<AttributeInstance>,
    ) -> Result<AttributeWriteResults, StorageError>;

    fn subscribe_to_attribute_changes(&self, ids: &BTreeSet<AttributeId>) -> AttributeSubscription;

    fn unsubscribe(&self, id: SubscriptionId);

    /// Offset of the device's local time zone, if known.
    ///
    /// This is a fixed offset. Conversions use it for every day of the week,
    /// so a daylight saving change between now and an event's day is not
    /// taken into account.
    fn time_zone(&self) -> Option<UtcOffset>;

    fn supports_offline_schedules(&self) -> bool {
        let range = event_attribute_ids();
        self.writable_attribute_ids()
            .iter()
            .any(|id| range.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_results() {
        let mut results = AttributeWriteResults::new();
        results.record_success(59002);
        results.record_failure(59003, "busy");

        assert!(results.was_successful_for(59002));
        assert!(!results.was_successful_for(59003));
        assert!(!results.was_successful_for(59004));
        assert_eq!(results.failure_reason(59003), Some("busy"));
        assert_eq!(results.succeeded(), BTreeSet::from([59002]));
        assert_eq!(results.failed(), BTreeSet::from([59003]));
    }
}
