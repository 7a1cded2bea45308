mod coordinator;

pub use coordinator::*;

use offsched_codec::{
    DayOfWeek, DayRepresentation, DaySet, ScheduleEvent, TimeSpecFlags, TimeSpecification,
};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::{Result, ScheduleError};
use crate::schedule::{ReplaceOutcome, ScheduleEngine};
use crate::storage::ScheduleStorage;

/// Sunday starting the week that contains `now`, in UTC
fn anchor_sunday(now: OffsetDateTime) -> Result<Date> {
    let today = now.to_offset(UtcOffset::UTC).date();
    let back = Duration::days(i64::from(today.weekday().number_days_from_sunday()));
    today
        .checked_sub(back)
        .ok_or_else(|| ScheduleError::TimeConversion(format!("no week start before {}", today)))
}

/// Moves one weekly UTC time into `offset`, returning the local day, hour and minute
fn shift(sunday: Date, day: DayOfWeek, hour: u8, minute: u8, offset: UtcOffset) -> Result<(DayOfWeek, u8, u8)> {
    let date = sunday
        .checked_add(Duration::days(i64::from(day.index())))
        .ok_or_else(|| ScheduleError::TimeConversion(format!("{} after {} out of range", day, sunday)))?;
    let utc = PrimitiveDateTime::new(date, Time::from_hms(hour, minute, 0)?).assume_utc();
    let local = utc.to_offset(offset);

    Ok((local.weekday().into(), local.hour(), local.minute()))
}

/// Rewrites a UTC time specification into device local time.
///
/// Each day is converted on its own within the week containing `now`, so a
/// shift across midnight moves the day too. Specifications already in device
/// time come back unchanged.
pub fn convert_time_specification(
    spec: &TimeSpecification,
    offset: UtcOffset,
    now: OffsetDateTime,
) -> Result<TimeSpecification> {
    if spec.uses_device_time_zone() {
        return Ok(*spec);
    }

    let sunday = anchor_sunday(now)?;
    let flags = spec.flags().union(TimeSpecFlags::USES_DEVICE_TIME_ZONE);

    let converted = match spec.representation() {
        DayRepresentation::Single(day) => {
            let (day, hour, minute) = shift(sunday, day, spec.hour(), spec.minute(), offset)?;
            TimeSpecification::new(day, hour, minute, flags)?
        }
        DayRepresentation::Compact(days) => {
            let first = days.first().unwrap_or(DayOfWeek::Sunday);
            let (_, hour, minute) = shift(sunday, first, spec.hour(), spec.minute(), offset)?;
            let local_days = days
                .iter()
                .map(|day| {
                    shift(sunday, day, spec.hour(), spec.minute(), offset).map(|(day, _, _)| day)
                })
                .collect::<Result<DaySet>>()?;

            TimeSpecification::with_representation(
                DayRepresentation::Compact(local_days),
                hour,
                minute,
                flags,
            )?
        }
    };

    Ok(converted)
}

/// Event with its time specification converted by [`convert_time_specification`]
pub fn convert_event(
    event: &ScheduleEvent,
    offset: UtcOffset,
    now: OffsetDateTime,
) -> Result<ScheduleEvent> {
    let mut converted = event.clone();
    converted.time_specification = convert_time_specification(&event.time_specification, offset, now)?;
    Ok(converted)
}

impl<S: ScheduleStorage> ScheduleEngine<S> {
    /// UTC events paired with their device time form. Events whose converted
    /// time is already held by another event are left out.
    fn utc_replacements(
        &self,
        offset: UtcOffset,
        now: OffsetDateTime,
    ) -> Result<Vec<(ScheduleEvent, ScheduleEvent)>> {
        let mut replacements = Vec::new();
        for event in self.utc_events() {
            let converted = convert_event(&event, offset, now)?;
            if self.slots().contains_event(&converted) {
                tracing::warn!(
                    "Not migrating {}: {} is already scheduled",
                    event.time_specification,
                    converted.time_specification
                );
                continue;
            }
            replacements.push((event, converted));
        }
        Ok(replacements)
    }

    /// Number of UTC events that can still be moved to device time
    pub fn pending_utc_migrations(&self) -> Result<usize> {
        match self.storage().time_zone() {
            Some(offset) => Ok(self.utc_replacements(offset, OffsetDateTime::now_utc())?.len()),
            None => Ok(0),
        }
    }

    /// Converts up to `max_count` UTC events to device time and commits them.
    /// Without a device time zone there is nothing to convert into and the
    /// result is empty.
    pub async fn migrate_utc_events(&mut self, max_count: usize) -> Result<Vec<ReplaceOutcome>> {
        let Some(offset) = self.storage().time_zone() else {
            tracing::debug!("{} has no time zone, not migrating", self.storage().display_name());
            return Ok(Vec::new());
        };

        let mut replacements = self.utc_replacements(offset, OffsetDateTime::now_utc())?;
        replacements.truncate(max_count);
        if replacements.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(
            "Migrating {} UTC events on {} to offset {}",
            replacements.len(),
            self.storage().display_name(),
            offset
        );
        self.perform_replacements(replacements, true).await
    }

    /// Converts and commits a single event
    pub async fn migrate_utc_event(&mut self, event: &ScheduleEvent) -> Result<ReplaceOutcome> {
        let offset = self
            .storage()
            .time_zone()
            .ok_or(ScheduleError::NoDestinationTimeZone)?;

        let slot_id = self
            .slot_id_for_event(event)
            .ok_or(ScheduleError::EventNotFound)?;

        if event.uses_device_time_zone() {
            return Ok(ReplaceOutcome {
                old: event.clone(),
                new: event.clone(),
                slot_id,
            });
        }

        let converted = convert_event(event, offset, OffsetDateTime::now_utc())?;
        tracing::debug!("Migrating {} to {}", event.time_specification, converted.time_specification);
        self.replace_event(event, converted, true).await
    }
}
