use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use offsched_codec::{
    AttributeId, AttributeTypes, DataType, FIRST_EVENT_ATTRIBUTE_ID, FLAGS_ATTRIBUTE_ID,
    LAST_EVENT_ATTRIBUTE_ID,
};
use time::UtcOffset;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    AttributeInstance, AttributeSubscription, AttributeUpdate, AttributeWriteResults,
    ScheduleStorage, StorageError, SubscriptionId,
};

struct Subscriber {
    ids: BTreeSet<AttributeId>,
    sender: mpsc::UnboundedSender<AttributeUpdate>,
}

#[derive(Default)]
struct State {
    values: BTreeMap<AttributeId, Vec<u8>>,
    subscribers: BTreeMap<SubscriptionId, Subscriber>,
    failing: BTreeSet<AttributeId>,
    offline: bool,
    write_log: Vec<Vec<AttributeInstance>>,
}

impl State {
    fn publish(&mut self, id: AttributeId, value: Option<Vec<u8>>) {
        self.subscribers.retain(|_, subscriber| {
            if !subscriber.ids.contains(&id) {
                return true;
            }
            subscriber
                .sender
                .send(AttributeUpdate {
                    id,
                    value: value.clone(),
                })
                .is_ok()
        });
    }
}

/// Attribute store kept in process memory.
///
/// Successful writes are echoed to subscribers the way a device reports its
/// own attribute changes. Writes to ids marked with [`MemoryStorage::fail_writes_to`]
/// are reported as failed, and [`MemoryStorage::set_offline`] makes whole
/// batches fail.
pub struct MemoryStorage {
    name: String,
    writable: BTreeSet<AttributeId>,
    types: AttributeTypes,
    time_zone: Option<UtcOffset>,
    state: Mutex<State>,
}

impl MemoryStorage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writable: BTreeSet::new(),
            types: AttributeTypes::new(),
            time_zone: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Makes the flags attribute and the first `count` event slots writable
    pub fn with_event_slots(mut self, count: usize) -> Self {
        self.writable.insert(FLAGS_ATTRIBUTE_ID);
        self.types.insert(FLAGS_ATTRIBUTE_ID, DataType::SInt16);
        self.writable.extend(
            (FIRST_EVENT_ATTRIBUTE_ID..=LAST_EVENT_ATTRIBUTE_ID).take(count),
        );
        self
    }

    pub fn with_writable_attribute(mut self, id: AttributeId, data_type: DataType) -> Self {
        self.writable.insert(id);
        self.types.insert(id, data_type);
        self
    }

    /// Declares a type without making the attribute writable
    pub fn with_attribute_type(mut self, id: AttributeId, data_type: DataType) -> Self {
        self.types.insert(id, data_type);
        self
    }

    pub fn with_time_zone(mut self, offset: UtcOffset) -> Self {
        self.time_zone = Some(offset);
        self
    }

    pub fn with_value(self, id: AttributeId, value: impl Into<Vec<u8>>) -> Self {
        self.lock().values.insert(id, value.into());
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_writes_to(&self, id: AttributeId) {
        self.lock().failing.insert(id);
    }

    pub fn restore_writes_to(&self, id: AttributeId) {
        self.lock().failing.remove(&id);
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Every accepted batch, oldest first, including failed entries
    pub fn write_log(&self) -> Vec<Vec<AttributeInstance>> {
        self.lock().write_log.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Changes a value from the device side and notifies subscribers
    pub fn inject_update(&self, id: AttributeId, value: Option<Vec<u8>>) {
        let mut state = self.lock();
        match &value {
            Some(bytes) => {
                state.values.insert(id, bytes.clone());
            }
            None => {
                state.values.remove(&id);
            }
        }
        state.publish(id, value);
    }
}

#[async_trait]
impl ScheduleStorage for MemoryStorage {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn writable_attribute_ids(&self) -> BTreeSet<AttributeId> {
        self.writable.clone()
    }

    fn readable_attribute_ids(&self) -> BTreeSet<AttributeId> {
        self.types.keys().copied().chain(self.writable.iter().copied()).collect()
    }

    fn attribute_types(&self) -> AttributeTypes {
        self.types.clone()
    }

    fn current_value(&self, id: AttributeId) -> Option<Vec<u8>> {
        self.lock().values.get(&id).cloned()
    }

    async fn set_attributes(
        &self,
        instances: Vec<AttributeInstance>,
    ) -> Result<AttributeWriteResults, StorageError> {
        let mut state = self.lock();
        if state.offline {
            return Err(StorageError::Disconnected);
        }

        state.write_log.push(instances.clone());

        let mut results = AttributeWriteResults::new();
        for AttributeInstance { id, value } in instances {
            if !self.writable.contains(&id) {
                results.record_failure(id, "attribute is not writable");
                continue;
            }
            if state.failing.contains(&id) {
                results.record_failure(id, "write failed");
                continue;
            }

            tracing::trace!("{}: attribute {} <- {:02x?}", self.name, id, value);
            state.values.insert(id, value.clone());
            state.publish(id, Some(value));
            results.record_success(id);
        }

        Ok(results)
    }

    fn subscribe_to_attribute_changes(&self, ids: &BTreeSet<AttributeId>) -> AttributeSubscription {
        let (sender, updates) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        self.lock().subscribers.insert(
            id,
            Subscriber {
                ids: ids.clone(),
                sender,
            },
        );

        AttributeSubscription { id, updates }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.remove(&id);
    }

    fn time_zone(&self) -> Option<UtcOffset> {
        self.time_zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_are_echoed_to_subscribers() {
        let storage = MemoryStorage::new("blinds").with_event_slots(2);
        let mut subscription =
            storage.subscribe_to_attribute_changes(&BTreeSet::from([FIRST_EVENT_ATTRIBUTE_ID]));

        let results = storage
            .set_attributes(vec![
                AttributeInstance::new(FIRST_EVENT_ATTRIBUTE_ID, vec![0x00]),
                AttributeInstance::new(FIRST_EVENT_ATTRIBUTE_ID + 1, vec![0x00]),
            ])
            .await
            .unwrap();

        assert!(results.was_successful_for(FIRST_EVENT_ATTRIBUTE_ID));
        assert!(results.was_successful_for(FIRST_EVENT_ATTRIBUTE_ID + 1));
        assert_eq!(
            subscription.updates.try_recv().unwrap(),
            AttributeUpdate {
                id: FIRST_EVENT_ATTRIBUTE_ID,
                value: Some(vec![0x00])
            }
        );
        // Only subscribed ids are delivered
        assert!(subscription.updates.try_recv().is_err());
        assert_eq!(storage.write_log().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let storage = MemoryStorage::new("blinds").with_event_slots(2);
        storage.fail_writes_to(FIRST_EVENT_ATTRIBUTE_ID);

        let results = storage
            .set_attributes(vec![
                AttributeInstance::new(FIRST_EVENT_ATTRIBUTE_ID, vec![0x00]),
                AttributeInstance::new(LAST_EVENT_ATTRIBUTE_ID, vec![0x00]),
            ])
            .await
            .unwrap();

        assert_eq!(results.failed(), BTreeSet::from([FIRST_EVENT_ATTRIBUTE_ID, LAST_EVENT_ATTRIBUTE_ID]));
        assert_eq!(storage.current_value(FIRST_EVENT_ATTRIBUTE_ID), None);

        storage.restore_writes_to(FIRST_EVENT_ATTRIBUTE_ID);
        storage.set_offline(true);
        assert_eq!(
            storage.set_attributes(Vec::new()).await,
            Err(StorageError::Disconnected)
        );
    }

    #[test]
    fn test_unsubscribe() {
        let storage = MemoryStorage::new("blinds").with_event_slots(1);
        let subscription = storage.subscribe_to_attribute_changes(&BTreeSet::from([FLAGS_ATTRIBUTE_ID]));
        assert_eq!(storage.subscriber_count(), 1);

        storage.unsubscribe(subscription.id);
        assert_eq!(storage.subscriber_count(), 0);
    }

    #[test]
    fn test_supports_offline_schedules() {
        assert!(MemoryStorage::new("blinds").with_event_slots(1).supports_offline_schedules());
        assert!(!MemoryStorage::new("lamp")
            .with_writable_attribute(100, DataType::Boolean)
            .supports_offline_schedules());
    }
}
