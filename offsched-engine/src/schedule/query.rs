use std::collections::BTreeMap;

use offsched_codec::{DayOfWeek, DaySet, ScheduleEvent};
use time::OffsetDateTime;

use crate::migration::convert_time_specification;
use crate::slot::SlotId;
use crate::storage::ScheduleStorage;

use super::ScheduleEngine;

impl<S: ScheduleStorage> ScheduleEngine<S> {
    /// Events in collator order
    pub fn events(&self) -> &[ScheduleEvent] {
        self.collated
            .get_or_init(|| self.collator.collate(&self.slots))
    }

    pub fn number_of_events(&self) -> usize {
        self.slots.len()
    }

    pub fn event_at(&self, index: usize) -> Option<&ScheduleEvent> {
        self.events().get(index)
    }

    pub fn event_index(&self, event: &ScheduleEvent) -> Option<usize> {
        self.events().iter().position(|candidate| candidate == event)
    }

    pub fn slot_id_for_event(&self, event: &ScheduleEvent) -> Option<SlotId> {
        self.slots.slot_for_event(event)
    }

    pub fn number_of_supported_events(&self) -> usize {
        self.slots.capacity()
    }

    /// Slots spread evenly across the week
    pub fn number_of_supported_events_per_day(&self) -> usize {
        self.slots.capacity() / 7
    }

    fn count_by_day(&self, days_of: impl Fn(&ScheduleEvent) -> DaySet) -> BTreeMap<DayOfWeek, usize> {
        let mut counts: BTreeMap<DayOfWeek, usize> =
            DayOfWeek::ALL.into_iter().map(|day| (day, 0)).collect();

        for event in self.slots.events() {
            for day in days_of(event).iter() {
                *counts.entry(day).or_default() += 1;
            }
        }
        counts
    }

    fn days_below_limit(&self, counts: BTreeMap<DayOfWeek, usize>) -> DaySet {
        let limit = self.number_of_supported_events_per_day();
        counts
            .into_iter()
            .filter(|(_, count)| *count < limit)
            .map(|(day, _)| day)
            .collect()
    }

    /// Events per day; an event on several days counts once for each
    pub fn day_event_counts(&self) -> BTreeMap<DayOfWeek, usize> {
        self.count_by_day(|event| event.time_specification.days())
    }

    /// Days that can take another event
    pub fn available_days(&self) -> DaySet {
        self.days_below_limit(self.day_event_counts())
    }

    pub fn unavailable_days(&self) -> DaySet {
        complement(self.available_days())
    }

    pub fn events_for_day(&self, day: DayOfWeek) -> Vec<ScheduleEvent> {
        self.events_for_days(DaySet::from(day))
    }

    /// Events firing on any of `days`
    pub fn events_for_days(&self, days: DaySet) -> Vec<ScheduleEvent> {
        self.events_matching(|event| overlaps(event.time_specification.days(), days))
    }

    /// Days `event` fires on in device time. UTC events are moved with the
    /// storage time zone; without one their days are taken as they are.
    pub fn local_days(&self, event: &ScheduleEvent) -> DaySet {
        let spec = &event.time_specification;
        let Some(offset) = self.storage.time_zone() else {
            return spec.days();
        };

        match convert_time_specification(spec, offset, OffsetDateTime::now_utc()) {
            Ok(local) => local.days(),
            Err(err) => {
                tracing::warn!("Cannot resolve local days of {}: {}", spec, err);
                spec.days()
            }
        }
    }

    /// Like [`Self::day_event_counts`], by device-local day
    pub fn local_day_event_counts(&self) -> BTreeMap<DayOfWeek, usize> {
        self.count_by_day(|event| self.local_days(event))
    }

    pub fn available_local_days(&self) -> DaySet {
        self.days_below_limit(self.local_day_event_counts())
    }

    pub fn unavailable_local_days(&self) -> DaySet {
        complement(self.available_local_days())
    }

    pub fn events_for_local_day(&self, day: DayOfWeek) -> Vec<ScheduleEvent> {
        self.events_for_local_days(DaySet::from(day))
    }

    /// Events firing on any of `days` in device time
    pub fn events_for_local_days(&self, days: DaySet) -> Vec<ScheduleEvent> {
        self.events_matching(|event| overlaps(self.local_days(event), days))
    }

    pub fn events_matching(&self, predicate: impl Fn(&ScheduleEvent) -> bool) -> Vec<ScheduleEvent> {
        self.events()
            .iter()
            .filter(|event| predicate(*event))
            .cloned()
            .collect()
    }

    /// Events still expressed in UTC
    pub fn utc_events(&self) -> Vec<ScheduleEvent> {
        self.events_matching(|event| !event.uses_device_time_zone())
    }
}

pub(crate) fn overlaps(a: DaySet, b: DaySet) -> bool {
    a.iter().any(|day| b.contains(day))
}

fn complement(days: DaySet) -> DaySet {
    DayOfWeek::ALL
        .into_iter()
        .filter(|day| !days.contains(*day))
        .collect()
}
