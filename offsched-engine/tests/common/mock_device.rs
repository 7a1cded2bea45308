use std::sync::Arc;

use offsched_engine::codec::{
    DataType, DayOfWeek, ScheduleEvent, TimeSpecFlags, TimeSpecification,
};
use offsched_engine::{MemoryStorage, ScheduleConfig, ScheduleEngine};
use time::UtcOffset;

pub const POWER_ATTRIBUTE_ID: u16 = 100;
pub const POSITION_ATTRIBUTE_ID: u16 = 101;

pub struct MockDevice {
    pub storage: Arc<MemoryStorage>,
}

impl MockDevice {
    pub fn new(slots: usize) -> Self {
        Self::with_storage(Self::blinds(slots))
    }

    pub fn with_time_zone(slots: usize, offset: UtcOffset) -> Self {
        Self::with_storage(Self::blinds(slots).with_time_zone(offset))
    }

    fn blinds(slots: usize) -> MemoryStorage {
        MemoryStorage::new("Living Room Blinds")
            .with_event_slots(slots)
            .with_writable_attribute(POWER_ATTRIBUTE_ID, DataType::Boolean)
            .with_writable_attribute(POSITION_ATTRIBUTE_ID, DataType::SInt16)
    }

    fn with_storage(storage: MemoryStorage) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    pub fn attach(&self) -> ScheduleEngine<MemoryStorage> {
        ScheduleEngine::attach(self.storage.clone(), ScheduleConfig::default()).unwrap()
    }
}

pub fn local_event(day: DayOfWeek, hour: u8, minute: u8, position: i16) -> ScheduleEvent {
    let spec = TimeSpecification::new(
        day,
        hour,
        minute,
        TimeSpecFlags::REPEATS | TimeSpecFlags::USES_DEVICE_TIME_ZONE,
    )
    .unwrap();

    ScheduleEvent::new(spec)
        .with_attribute(POWER_ATTRIBUTE_ID, true)
        .with_attribute(POSITION_ATTRIBUTE_ID, position)
}

pub fn utc_event(day: DayOfWeek, hour: u8, minute: u8, position: i16) -> ScheduleEvent {
    let mut event = local_event(day, hour, minute, position);
    event.time_specification.set_uses_device_time_zone(false);
    event
}
