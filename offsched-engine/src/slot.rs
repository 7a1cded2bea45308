use std::collections::{BTreeMap, BTreeSet};

use offsched_codec::{AttributeId, ScheduleEvent};

use crate::error::{Result, ScheduleError};

/// Attribute id of an event slot
pub type SlotId = AttributeId;

/// Assignment of events to the device's fixed pool of event slots.
///
/// Every occupied slot is one of the reserved ids and holds exactly one event.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    reserved: BTreeSet<SlotId>,
    slots: BTreeMap<SlotId, ScheduleEvent>,
}

impl SlotTable {
    pub fn new(reserved: BTreeSet<SlotId>) -> Self {
        Self {
            reserved,
            slots: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.reserved.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.reserved.len()
    }

    pub fn is_reserved(&self, slot: SlotId) -> bool {
        self.reserved.contains(&slot)
    }

    pub fn reserved_slot_ids(&self) -> &BTreeSet<SlotId> {
        &self.reserved
    }

    pub fn used_slot_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.keys().copied()
    }

    /// Reserved ids without an event, ascending
    pub fn unused_slot_ids(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.reserved
            .iter()
            .copied()
            .filter(|slot| !self.slots.contains_key(slot))
    }

    pub fn get(&self, slot: SlotId) -> Option<&ScheduleEvent> {
        self.slots.get(&slot)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &ScheduleEvent)> {
        self.slots.iter().map(|(slot, event)| (*slot, event))
    }

    pub fn events(&self) -> impl Iterator<Item = &ScheduleEvent> {
        self.slots.values()
    }

    /// Slot of the event with the same time specification
    pub fn slot_for_event(&self, event: &ScheduleEvent) -> Option<SlotId> {
        self.slots
            .iter()
            .find(|(_, candidate)| *candidate == event)
            .map(|(slot, _)| *slot)
    }

    pub fn contains_event(&self, event: &ScheduleEvent) -> bool {
        self.slot_for_event(event).is_some()
    }

    /// Stores `event` in the lowest unused slot
    pub fn allocate(&mut self, event: ScheduleEvent) -> Result<SlotId> {
        let slot = self
            .unused_slot_ids()
            .next()
            .ok_or(ScheduleError::CapacityExceeded {
                capacity: self.capacity(),
            })?;

        self.slots.insert(slot, event);
        Ok(slot)
    }

    /// Empties `slot`, returning what it held
    pub fn free(&mut self, slot: SlotId) -> Option<ScheduleEvent> {
        self.slots.remove(&slot)
    }

    /// Overwrites `slot`; ids outside the reserved set are ignored and return `false`
    pub fn set(&mut self, slot: SlotId, event: Option<ScheduleEvent>) -> bool {
        if !self.is_reserved(slot) {
            return false;
        }

        match event {
            Some(event) => {
                self.slots.insert(slot, event);
            }
            None => {
                self.slots.remove(&slot);
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
