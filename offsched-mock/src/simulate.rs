use offsched_codec::{DaySet, ScheduleEvent, TimeSpecFlags, TimeSpecification};
use time::UtcOffset;

use crate::settings::Simulation;

pub const POWER_ATTRIBUTE_ID: u16 = 100;
pub const POSITION_ATTRIBUTE_ID: u16 = 101;

/// Shifts a local hour and minute back to UTC; the day offset is dropped
fn to_utc(hour: u8, minute: u8, offset: UtcOffset) -> (u8, u8) {
    let minutes = i32::from(hour) * 60 + i32::from(minute) - i32::from(offset.whole_minutes());
    let minutes = minutes.rem_euclid(24 * 60);
    ((minutes / 60) as u8, (minutes % 60) as u8)
}

fn routine_event(
    (hour, minute): (u8, u8),
    position: i16,
    flags: TimeSpecFlags,
) -> Result<ScheduleEvent, offsched_codec::CodecError> {
    let spec = TimeSpecification::on_days(DaySet::all(), hour, minute, flags)?;

    Ok(ScheduleEvent::new(spec)
        .with_attribute(POWER_ATTRIBUTE_ID, true)
        .with_attribute(POSITION_ATTRIBUTE_ID, position))
}

/// Daily open and close events. Legacy routines are stored in UTC the way
/// older firmware wrote them, so they can be migrated afterwards.
pub fn daily_routine(
    simulation: &Simulation,
    time_zone: Option<UtcOffset>,
) -> Result<Vec<ScheduleEvent>, offsched_codec::CodecError> {
    let mut flags = TimeSpecFlags::REPEATS;
    let (mut open_at, mut close_at) = (simulation.open_at, simulation.close_at);

    match (simulation.legacy_utc, time_zone) {
        (true, Some(offset)) => {
            open_at = to_utc(open_at.0, open_at.1, offset);
            close_at = to_utc(close_at.0, close_at.1, offset);
        }
        (true, None) => {}
        (false, _) => flags.insert(TimeSpecFlags::USES_DEVICE_TIME_ZONE),
    }

    Ok(vec![
        routine_event(open_at, simulation.open_position, flags)?,
        routine_event(close_at, simulation.close_position, flags)?,
    ])
}
