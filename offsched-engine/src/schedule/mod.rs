mod mutation;
mod query;

pub use mutation::*;

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use offsched_codec::{AttributeId, EMPTY_SLOT_SENTINEL, ScheduleEvent, ScheduleFlags};
use tokio::sync::broadcast;

use crate::collator::{Collator, DefaultCollator, IndexDeltas};
use crate::config::ScheduleConfig;
use crate::error::{Result, ScheduleError};
use crate::slot::{SlotId, SlotTable};
use crate::storage::{AttributeInstance, AttributeSubscription, AttributeUpdate, ScheduleStorage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleNotification {
    EnabledStateChanged(bool),
    EventsChanged(IndexDeltas),
    /// The whole schedule was read again from storage
    EventsReloaded,
}

/// Which slots a commit managed to write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub committed: BTreeSet<SlotId>,
    pub failed: BTreeSet<SlotId>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Turns any failed slot into [`ScheduleError::PartialCommitFailure`]
    pub fn into_result(self) -> Result<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ScheduleError::PartialCommitFailure {
                committed: self.committed,
                failed: self.failed,
            })
        }
    }
}

/// Offline schedule of one device.
///
/// Mutations apply to the local slot table first and are then optionally
/// committed to storage. Storage changes come back through the attribute
/// subscription and are applied with [`ScheduleEngine::drain_storage_updates`]
/// or [`ScheduleEngine::next_storage_update`].
pub struct ScheduleEngine<S: ScheduleStorage> {
    storage: Arc<S>,
    config: ScheduleConfig,
    collator: Box<dyn Collator>,
    slots: SlotTable,
    flags: ScheduleFlags,
    collated: OnceLock<Vec<ScheduleEvent>>,
    notifier: broadcast::Sender<ScheduleNotification>,
    subscription: Option<AttributeSubscription>,
}

impl<S: ScheduleStorage> ScheduleEngine<S> {
    pub fn attach(storage: Arc<S>, config: ScheduleConfig) -> Result<Self> {
        Self::attach_with_collator(storage, config, Box::new(DefaultCollator))
    }

    pub fn attach_with_collator(
        storage: Arc<S>,
        config: ScheduleConfig,
        collator: Box<dyn Collator>,
    ) -> Result<Self> {
        config.validate()?;

        let name = storage.display_name();
        if !storage.supports_offline_schedules() {
            return Err(ScheduleError::Unsupported(name));
        }

        let range = config.event_attribute_ids();
        let reserved: BTreeSet<SlotId> = storage
            .writable_attribute_ids()
            .into_iter()
            .filter(|id| range.contains(id))
            .collect();
        if reserved.is_empty() {
            return Err(ScheduleError::Unsupported(name));
        }

        let mut subscribed = reserved.clone();
        subscribed.insert(config.flags_attribute_id);
        let subscription = storage.subscribe_to_attribute_changes(&subscribed);

        let (notifier, _) = broadcast::channel(config.notification_capacity);

        let mut engine = Self {
            storage,
            config,
            collator,
            slots: SlotTable::new(reserved),
            flags: ScheduleFlags::NONE,
            collated: OnceLock::new(),
            notifier,
            subscription: Some(subscription),
        };

        engine.prime();
        tracing::info!(
            "Attached offline schedule to {}: {} of {} slots in use, enabled: {}",
            name,
            engine.slots.len(),
            engine.slots.capacity(),
            engine.flags.is_enabled()
        );
        engine.notify(ScheduleNotification::EventsReloaded);

        Ok(engine)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    pub fn flags(&self) -> ScheduleFlags {
        self.flags
    }

    pub fn enabled(&self) -> bool {
        self.flags.is_enabled()
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleNotification> {
        self.notifier.subscribe()
    }

    fn notify(&self, notification: ScheduleNotification) {
        tracing::trace!("Schedule notification: {:?}", notification);
        // No receivers is fine
        let _ = self.notifier.send(notification);
    }

    fn invalidate(&mut self) {
        self.collated.take();
    }

    /// Runs a slot table change and announces the resulting index deltas
    fn mutate<T>(&mut self, change: impl FnOnce(&mut SlotTable) -> T) -> T {
        let before = self.events().to_vec();
        let result = change(&mut self.slots);
        self.invalidate();

        let deltas = self.collator.deltas(&before, self.events());
        self.notify(ScheduleNotification::EventsChanged(deltas));
        result
    }

    fn prime(&mut self) {
        self.slots.clear();
        self.invalidate();

        let reserved: Vec<SlotId> = self.slots.reserved_slot_ids().iter().copied().collect();
        for slot in reserved {
            let Some(bytes) = self.storage.current_value(slot) else {
                continue;
            };
            match self.decode_slot(slot, &bytes) {
                Ok(event) => {
                    self.slots.set(slot, event);
                }
                Err(err) => tracing::warn!("Ignoring slot {}: {}", slot, err),
            }
        }

        self.flags = self
            .storage
            .current_value(self.config.flags_attribute_id)
            .and_then(|bytes| ScheduleFlags::decode(&bytes))
            .unwrap_or_default();
    }

    fn decode_slot(&self, slot: SlotId, bytes: &[u8]) -> Result<Option<ScheduleEvent>> {
        if ScheduleEvent::is_empty_slot(bytes) {
            tracing::trace!("Slot {} is empty", slot);
            return Ok(None);
        }

        let (event, _) = ScheduleEvent::decode(bytes, &self.storage.attribute_types())?;
        if event.is_none() {
            tracing::debug!("Slot {} holds an incomplete event ({} bytes)", slot, bytes.len());
        }
        Ok(event)
    }

    fn slot_bytes(&self, slot: SlotId) -> Result<Vec<u8>> {
        match self.slots.get(slot) {
            Some(event) => Ok(event.encode()?),
            None => Ok(EMPTY_SLOT_SENTINEL.to_vec()),
        }
    }

    /// Re-reads every slot and the flags from storage
    pub fn reload(&mut self) {
        self.prime();
        tracing::debug!("Reloaded {} events", self.slots.len());
        self.notify(ScheduleNotification::EventsReloaded);
    }

    /// Writes the current content of `slot_ids` in one batch. Empty slots are
    /// written as the sentinel value. Nothing is rolled back on failure.
    pub async fn commit(&mut self, slot_ids: &BTreeSet<SlotId>) -> Result<CommitReport> {
        if slot_ids.is_empty() {
            return Ok(CommitReport::default());
        }

        let instances = slot_ids
            .iter()
            .map(|slot| -> Result<AttributeInstance> {
                Ok(AttributeInstance::new(*slot, self.slot_bytes(*slot)?))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Committing slots {:?}", slot_ids);
        let results = self.storage.set_attributes(instances).await?;

        let (committed, failed): (BTreeSet<SlotId>, BTreeSet<SlotId>) = slot_ids
            .iter()
            .partition(|slot| results.was_successful_for(**slot));

        if !failed.is_empty() {
            tracing::warn!(
                "Failed to commit slots {:?} to {}",
                failed,
                self.storage.display_name()
            );
        }

        Ok(CommitReport { committed, failed })
    }

    /// Commits the slots behind collated `indices`
    pub async fn commit_event_indices(&mut self, indices: &[usize]) -> Result<CommitReport> {
        let slot_ids = indices
            .iter()
            .map(|index| self.collator.slot_id_for_index(&self.slots, *index))
            .collect::<Result<BTreeSet<_>>>()?;

        self.commit(&slot_ids).await
    }

    /// Commits `pending` when asked to; returns what is still uncommitted
    async fn finish(&mut self, pending: BTreeSet<SlotId>, commit: bool) -> Result<BTreeSet<SlotId>> {
        if !commit || pending.is_empty() {
            return Ok(pending);
        }

        self.commit(&pending).await?.into_result()?;
        Ok(BTreeSet::new())
    }

    /// Applies a value reported by storage
    pub fn storage_updated(&mut self, id: AttributeId, value: Option<Vec<u8>>) {
        if id == self.config.flags_attribute_id {
            let was_enabled = self.flags.is_enabled();
            self.flags = value
                .as_deref()
                .and_then(ScheduleFlags::decode)
                .unwrap_or_default();
            tracing::debug!("Schedule flags now {:?}", self.flags);
            if self.flags.is_enabled() != was_enabled {
                self.notify(ScheduleNotification::EnabledStateChanged(self.flags.is_enabled()));
            }
            return;
        }

        if !self.slots.is_reserved(id) {
            tracing::trace!("Ignoring update for attribute {}", id);
            return;
        }

        let event = match value {
            Some(bytes) => match self.decode_slot(id, &bytes) {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!("Failed to decode slot {}: {}", id, err);
                    return;
                }
            },
            None => None,
        };

        let unchanged = match (self.slots.get(id), &event) {
            (Some(current), Some(incoming)) => current.same_payload(incoming),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return;
        }

        self.mutate(|slots| slots.set(id, event));
    }

    /// Applies every update already delivered, without waiting
    pub fn drain_storage_updates(&mut self) -> usize {
        let mut updates = Vec::new();
        if let Some(subscription) = self.subscription.as_mut() {
            while let Ok(update) = subscription.updates.try_recv() {
                updates.push(update);
            }
        }

        let count = updates.len();
        for AttributeUpdate { id, value } in updates {
            self.storage_updated(id, value);
        }
        count
    }

    /// Waits for the next storage update and applies it; `None` once detached
    /// or when storage dropped the subscription
    pub async fn next_storage_update(&mut self) -> Option<AttributeId> {
        let update = self.subscription.as_mut()?.updates.recv().await?;
        let id = update.id;
        self.storage_updated(update.id, update.value);
        Some(id)
    }

    /// Stops listening to storage. Called on drop too.
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.storage.unsubscribe(subscription.id);
            tracing::debug!("Detached offline schedule from {}", self.storage.display_name());
        }
    }
}

impl<S: ScheduleStorage> Drop for ScheduleEngine<S> {
    fn drop(&mut self) {
        self.detach();
    }
}
