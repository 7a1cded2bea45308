use std::collections::BTreeSet;

use offsched_codec::{DaySet, ScheduleEvent, ScheduleFlags};

use crate::error::{Result, ScheduleError};
use crate::slot::{SlotId, SlotTable};
use crate::storage::{AttributeInstance, ScheduleStorage};

use super::query::overlaps;
use super::{ScheduleEngine, ScheduleNotification};

/// Result of replacing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub old: ScheduleEvent,
    pub new: ScheduleEvent,
    pub slot_id: SlotId,
}

/// Puts `event` into the lowest free slot; `None` when its time is already taken
fn add_to(slots: &mut SlotTable, event: ScheduleEvent) -> Result<Option<SlotId>> {
    if slots.contains_event(&event) {
        tracing::debug!("Already scheduled for {}, skipping", event.time_specification);
        return Ok(None);
    }

    let slot = slots.allocate(event)?;
    tracing::debug!("Stored event in slot {}", slot);
    Ok(Some(slot))
}

/// Overwrites the slot holding `old`; the flag tells whether anything changed
fn replace_in(
    slots: &mut SlotTable,
    old: &ScheduleEvent,
    new: ScheduleEvent,
) -> Result<(ReplaceOutcome, bool)> {
    let slot_id = slots.slot_for_event(old).ok_or(ScheduleError::EventNotFound)?;

    let stored = slots.get(slot_id).cloned().unwrap_or_else(|| old.clone());
    if stored.same_payload(&new) {
        let outcome = ReplaceOutcome {
            old: stored,
            new,
            slot_id,
        };
        return Ok((outcome, false));
    }

    if let Some(other) = slots.slot_for_event(&new) {
        if other != slot_id {
            return Err(ScheduleError::DuplicateEvent(new.time_specification));
        }
    }

    slots.set(slot_id, Some(new.clone()));
    let outcome = ReplaceOutcome {
        old: stored,
        new,
        slot_id,
    };
    Ok((outcome, true))
}

impl<S: ScheduleStorage> ScheduleEngine<S> {
    /// Swaps in a changed copy of the slot table with a single notification
    fn apply_staged(&mut self, staged: SlotTable) {
        self.mutate(|slots| *slots = staged);
    }

    fn clear_slots(&mut self, slot_ids: &BTreeSet<SlotId>) {
        if slot_ids.is_empty() {
            return;
        }
        self.mutate(|slots| {
            for slot in slot_ids {
                slots.free(*slot);
            }
        });
    }

    /// Adds `event` to the first free slot. A duplicate time specification is
    /// a no-op. Returns slot ids still waiting to be committed.
    pub async fn add_event(&mut self, event: ScheduleEvent, commit: bool) -> Result<BTreeSet<SlotId>> {
        let mut staged = self.slots.clone();
        let pending: BTreeSet<SlotId> = add_to(&mut staged, event)?.into_iter().collect();
        if !pending.is_empty() {
            self.apply_staged(staged);
        }
        self.finish(pending, commit).await
    }

    /// Adds what fits; events that don't are logged and dropped
    pub async fn add_events(
        &mut self,
        events: Vec<ScheduleEvent>,
        commit: bool,
    ) -> Result<BTreeSet<SlotId>> {
        let mut staged = self.slots.clone();
        let mut pending = BTreeSet::new();
        for event in events {
            match add_to(&mut staged, event) {
                Ok(slot) => pending.extend(slot),
                Err(err) => tracing::warn!("Skipping event: {}", err),
            }
        }

        if !pending.is_empty() {
            self.apply_staged(staged);
        }
        self.finish(pending, commit).await
    }

    pub async fn remove_event(&mut self, event: &ScheduleEvent, commit: bool) -> Result<BTreeSet<SlotId>> {
        let Some(slot) = self.slots.slot_for_event(event) else {
            tracing::debug!("No event at {}, nothing to remove", event.time_specification);
            return Ok(BTreeSet::new());
        };

        let pending = BTreeSet::from([slot]);
        self.clear_slots(&pending);
        self.finish(pending, commit).await
    }

    pub async fn remove_event_at(&mut self, index: usize, commit: bool) -> Result<BTreeSet<SlotId>> {
        let slot = self.collator.slot_id_for_index(&self.slots, index)?;

        let pending = BTreeSet::from([slot]);
        self.clear_slots(&pending);
        self.finish(pending, commit).await
    }

    pub async fn remove_all_events(&mut self, commit: bool) -> Result<BTreeSet<SlotId>> {
        self.remove_events_matching(|_| true, commit).await
    }

    /// Removes events firing on any of `days`
    pub async fn remove_events_for_days(&mut self, days: DaySet, commit: bool) -> Result<BTreeSet<SlotId>> {
        self.remove_events_matching(|event| overlaps(event.time_specification.days(), days), commit)
            .await
    }

    /// Removes events firing on any of `days` in device time
    pub async fn remove_events_for_local_days(
        &mut self,
        days: DaySet,
        commit: bool,
    ) -> Result<BTreeSet<SlotId>> {
        let pending = self.slots_matching(|event| overlaps(self.local_days(event), days));
        self.remove_slots(pending, commit).await
    }

    pub async fn remove_events_matching(
        &mut self,
        predicate: impl Fn(&ScheduleEvent) -> bool,
        commit: bool,
    ) -> Result<BTreeSet<SlotId>> {
        let pending = self.slots_matching(predicate);
        self.remove_slots(pending, commit).await
    }

    fn slots_matching(&self, predicate: impl Fn(&ScheduleEvent) -> bool) -> BTreeSet<SlotId> {
        self.slots
            .iter()
            .filter(|(_, event)| predicate(*event))
            .map(|(slot, _)| slot)
            .collect()
    }

    async fn remove_slots(&mut self, pending: BTreeSet<SlotId>, commit: bool) -> Result<BTreeSet<SlotId>> {
        tracing::debug!("Removing {} events", pending.len());
        self.clear_slots(&pending);
        self.finish(pending, commit).await
    }

    /// Replaces `old` in place, keeping its slot
    pub async fn replace_event(
        &mut self,
        old: &ScheduleEvent,
        new: ScheduleEvent,
        commit: bool,
    ) -> Result<ReplaceOutcome> {
        let mut staged = self.slots.clone();
        let (outcome, changed) = replace_in(&mut staged, old, new)?;
        if changed {
            self.apply_staged(staged);
            self.finish(BTreeSet::from([outcome.slot_id]), commit).await?;
        }
        Ok(outcome)
    }

    pub async fn replace_event_at(
        &mut self,
        index: usize,
        new: ScheduleEvent,
        commit: bool,
    ) -> Result<ReplaceOutcome> {
        let old = self
            .event_at(index)
            .cloned()
            .ok_or(ScheduleError::IndexOutOfRange {
                index,
                count: self.number_of_events(),
            })?;
        self.replace_event(&old, new, commit).await
    }

    /// Applies each replacement on its own; failed ones are logged and left
    /// out. Changed slots are committed together.
    pub async fn perform_replacements(
        &mut self,
        replacements: Vec<(ScheduleEvent, ScheduleEvent)>,
        commit: bool,
    ) -> Result<Vec<ReplaceOutcome>> {
        let mut staged = self.slots.clone();
        let mut outcomes = Vec::with_capacity(replacements.len());
        let mut pending = BTreeSet::new();

        for (old, new) in replacements {
            match replace_in(&mut staged, &old, new) {
                Ok((outcome, changed)) => {
                    if changed {
                        pending.insert(outcome.slot_id);
                    }
                    outcomes.push(outcome);
                }
                Err(err) => {
                    tracing::warn!("Skipping replacement of {}: {}", old.time_specification, err)
                }
            }
        }

        if !pending.is_empty() {
            self.apply_staged(staged);
        }
        self.finish(pending, commit).await?;
        Ok(outcomes)
    }

    /// Pairwise replacement of `old_events[i]` with `new_events[i]`
    pub async fn replace_all(
        &mut self,
        old_events: Vec<ScheduleEvent>,
        new_events: Vec<ScheduleEvent>,
        commit: bool,
    ) -> Result<Vec<ReplaceOutcome>> {
        if old_events.len() != new_events.len() {
            return Err(ScheduleError::MismatchedReplacementCount {
                old: old_events.len(),
                new: new_events.len(),
            });
        }

        let replacements = old_events.into_iter().zip(new_events).collect();
        self.perform_replacements(replacements, commit).await
    }

    /// Writes the enabled bit to the flags attribute and announces a change
    /// of the bit right away. The storage echo of the same value is silent.
    pub async fn set_enabled(&mut self, enabled: bool) -> Result<ScheduleFlags> {
        let mut flags = self.flags;
        flags.set_enabled(enabled);

        let id = self.config.flags_attribute_id;
        let results = self
            .storage
            .set_attributes(vec![AttributeInstance::new(id, flags.encode())])
            .await?;

        if !results.was_successful_for(id) {
            tracing::warn!(
                "Failed to set schedule enabled={} on {}",
                enabled,
                self.storage.display_name()
            );
            return Err(ScheduleError::PartialCommitFailure {
                committed: BTreeSet::new(),
                failed: BTreeSet::from([id]),
            });
        }

        let changed = self.flags.is_enabled() != flags.is_enabled();
        self.flags = flags;
        if changed {
            self.notify(ScheduleNotification::EnabledStateChanged(enabled));
        }
        Ok(flags)
    }
}
