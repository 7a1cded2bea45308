use std::cmp::Ordering;
use std::collections::BTreeSet;

use offsched_codec::ScheduleEvent;

use crate::error::{Result, ScheduleError};
use crate::slot::{SlotId, SlotTable};

/// Index changes between two collated views
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDeltas {
    /// Positions in the old view that are gone
    pub deletions: BTreeSet<usize>,
    /// Positions in the new view that are new
    pub insertions: BTreeSet<usize>,
}

impl IndexDeltas {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty() && self.insertions.is_empty()
    }
}

/// Ordering policy for presenting a slot table as a list.
///
/// Every method has a default; override [`Collator::is_ordered_before`] to
/// change the order and the rest follows.
pub trait Collator: Send + Sync {
    fn is_ordered_before(&self, a: &ScheduleEvent, b: &ScheduleEvent) -> bool {
        a.time_specification < b.time_specification
    }

    fn compare(&self, a: &ScheduleEvent, b: &ScheduleEvent) -> Ordering {
        if self.is_ordered_before(a, b) {
            Ordering::Less
        } else if self.is_ordered_before(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Occupied slots in collated order; equal events keep slot id order
    fn collate_slots<'a>(&self, slots: &'a SlotTable) -> Vec<(SlotId, &'a ScheduleEvent)> {
        let mut pairs: Vec<(SlotId, &ScheduleEvent)> = slots.iter().collect();
        pairs.sort_by(|(a_slot, a), (b_slot, b)| self.compare(a, b).then(a_slot.cmp(b_slot)));
        pairs
    }

    fn collate(&self, slots: &SlotTable) -> Vec<ScheduleEvent> {
        self.collate_slots(slots)
            .into_iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    fn slot_id_for_index(&self, slots: &SlotTable, index: usize) -> Result<SlotId> {
        let pairs = self.collate_slots(slots);
        pairs
            .get(index)
            .map(|(slot, _)| *slot)
            .ok_or(ScheduleError::IndexOutOfRange {
                index,
                count: pairs.len(),
            })
    }

    /// Set-membership diff: events only in `after` are insertions at their new
    /// index, events only in `before` are deletions at their old index.
    fn deltas(&self, before: &[ScheduleEvent], after: &[ScheduleEvent]) -> IndexDeltas {
        let deletions = before
            .iter()
            .enumerate()
            .filter(|(_, event)| !after.contains(event))
            .map(|(index, _)| index)
            .collect();

        let insertions = after
            .iter()
            .enumerate()
            .filter(|(_, event)| !before.contains(event))
            .map(|(index, _)| index)
            .collect();

        IndexDeltas {
            deletions,
            insertions,
        }
    }
}

/// Chronological order through the week, Sunday first
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCollator;

impl Collator for DefaultCollator {}

#[cfg(test)]
mod tests {
    use offsched_codec::{DayOfWeek, TimeSpecFlags, TimeSpecification};

    use super::*;

    fn event(day: DayOfWeek, hour: u8) -> ScheduleEvent {
        ScheduleEvent::new(TimeSpecification::new(day, hour, 0, TimeSpecFlags::REPEATS).unwrap())
            .with_attribute(100, true)
    }

    fn table(events: &[ScheduleEvent]) -> SlotTable {
        let mut slots = SlotTable::new((59002..59012).collect());
        for event in events {
            slots.allocate(event.clone()).unwrap();
        }
        slots
    }

    #[test]
    fn test_collate_sorts_by_time() {
        let friday = event(DayOfWeek::Friday, 8);
        let sunday = event(DayOfWeek::Sunday, 20);
        let monday = event(DayOfWeek::Monday, 6);
        let slots = table(&[friday.clone(), sunday.clone(), monday.clone()]);

        let collated = DefaultCollator.collate(&slots);
        assert_eq!(collated, vec![sunday, monday, friday]);
        assert!(collated.windows(2).all(|pair| DefaultCollator.is_ordered_before(&pair[0], &pair[1])));
    }

    #[test]
    fn test_slot_id_for_index() {
        let slots = table(&[event(DayOfWeek::Friday, 8), event(DayOfWeek::Sunday, 20)]);

        // Friday went in first, Sunday sorts first
        assert_eq!(DefaultCollator.slot_id_for_index(&slots, 0).unwrap(), 59003);
        assert_eq!(DefaultCollator.slot_id_for_index(&slots, 1).unwrap(), 59002);
        assert!(matches!(
            DefaultCollator.slot_id_for_index(&slots, 2),
            Err(ScheduleError::IndexOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_deltas_by_membership() {
        let e1 = event(DayOfWeek::Monday, 1);
        let e2 = event(DayOfWeek::Monday, 2);
        let e3 = event(DayOfWeek::Monday, 3);

        let deltas = DefaultCollator.deltas(&[e1.clone(), e2], &[e1.clone(), e3.clone()]);
        assert_eq!(deltas.deletions, BTreeSet::from([1]));
        assert_eq!(deltas.insertions, BTreeSet::from([1]));

        let deltas = DefaultCollator.deltas(&[e1.clone()], &[e1.clone()]);
        assert!(deltas.is_empty());

        let deltas = DefaultCollator.deltas(&[], &[e1, e3]);
        assert_eq!(deltas.insertions, BTreeSet::from([0, 1]));
    }

    #[test]
    fn test_slot_id_for_index_with_equal_times() {
        let mut slots = SlotTable::new((59002..59012).collect());
        let spec = TimeSpecification::new(DayOfWeek::Monday, 8, 0, TimeSpecFlags::REPEATS).unwrap();
        slots.set(59005, Some(ScheduleEvent::new(spec).with_attribute(101, 90i16)));
        slots.set(59003, Some(ScheduleEvent::new(spec).with_attribute(101, 10i16)));
        slots.allocate(event(DayOfWeek::Sunday, 6)).unwrap();

        assert_eq!(DefaultCollator.slot_id_for_index(&slots, 0).unwrap(), 59002);
        assert_eq!(DefaultCollator.slot_id_for_index(&slots, 1).unwrap(), 59003);
        assert_eq!(DefaultCollator.slot_id_for_index(&slots, 2).unwrap(), 59005);

        let collated = DefaultCollator.collate(&slots);
        assert_eq!(collated[1].attributes, slots.get(59003).unwrap().attributes);
        assert_eq!(collated[2].attributes, slots.get(59005).unwrap().attributes);
    }

    struct LatestFirst;

    impl Collator for LatestFirst {
        fn is_ordered_before(&self, a: &ScheduleEvent, b: &ScheduleEvent) -> bool {
            a.time_specification > b.time_specification
        }
    }

    #[test]
    fn test_custom_order() {
        let early = event(DayOfWeek::Monday, 1);
        let late = event(DayOfWeek::Monday, 23);
        let slots = table(&[early.clone(), late.clone()]);

        assert_eq!(LatestFirst.collate(&slots), vec![late, early]);
        assert_eq!(LatestFirst.slot_id_for_index(&slots, 0).unwrap(), 59003);
    }
}
