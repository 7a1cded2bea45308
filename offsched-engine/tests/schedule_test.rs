use std::collections::BTreeSet;

use offsched_engine::codec::{
    AttributeValue, DayOfWeek, FIRST_EVENT_ATTRIBUTE_ID, FLAGS_ATTRIBUTE_ID, ScheduleEvent,
};
use offsched_engine::{
    Collator, IndexDeltas, ScheduleConfig, ScheduleEngine, ScheduleNotification, ScheduleStorage,
};

mod common;
use common::mock_device::{MockDevice, POSITION_ATTRIBUTE_ID, local_event};

#[tokio::test]
async fn test_known_event_bytes_reach_storage() {
    let device = MockDevice::new(7);
    let mut engine = device.attach();

    let event = ScheduleEvent::new(local_event(DayOfWeek::Monday, 14, 30, 0).time_specification)
        .with_attribute(100, true);
    engine.add_event(event, true).await.unwrap();

    assert_eq!(
        device.storage.current_value(FIRST_EVENT_ATTRIBUTE_ID),
        Some(vec![0x03, 0x02, 14, 30, 0x64, 0x00, 0x01])
    );
}

#[tokio::test]
async fn test_two_engines_stay_in_sync() {
    let device = MockDevice::new(7);
    let mut writer = device.attach();
    let mut reader = device.attach();
    let mut notifications = reader.subscribe();

    let morning = local_event(DayOfWeek::Tuesday, 7, 0, 100);
    let evening = local_event(DayOfWeek::Tuesday, 19, 30, 0);
    writer.add_events(vec![evening.clone(), morning.clone()], true).await.unwrap();

    assert_eq!(reader.drain_storage_updates(), 2);
    assert_eq!(reader.events(), &[morning.clone(), evening.clone()]);
    assert!(reader.events()[1].same_payload(&evening));

    // Evening landed first, then morning was inserted before it
    assert_eq!(
        notifications.try_recv().unwrap(),
        ScheduleNotification::EventsChanged(IndexDeltas {
            deletions: BTreeSet::new(),
            insertions: BTreeSet::from([0]),
        })
    );
    assert_eq!(
        notifications.try_recv().unwrap(),
        ScheduleNotification::EventsChanged(IndexDeltas {
            deletions: BTreeSet::new(),
            insertions: BTreeSet::from([0]),
        })
    );

    writer.remove_event(&morning, true).await.unwrap();
    reader.drain_storage_updates();
    assert_eq!(reader.events(), &[evening]);

    writer.set_enabled(true).await.unwrap();
    reader.drain_storage_updates();
    assert!(reader.enabled());
}

#[tokio::test]
async fn test_restart_primes_from_storage() {
    let device = MockDevice::new(7);
    {
        let mut engine = device.attach();
        engine
            .add_events(
                vec![
                    local_event(DayOfWeek::Saturday, 9, 0, 50),
                    local_event(DayOfWeek::Sunday, 10, 15, 75),
                ],
                true,
            )
            .await
            .unwrap();
        engine.set_enabled(true).await.unwrap();
    }
    assert_eq!(device.storage.subscriber_count(), 0);

    let engine = device.attach();
    assert_eq!(engine.number_of_events(), 2);
    assert_eq!(engine.event_at(0).unwrap().time_specification.first_day(), Some(DayOfWeek::Sunday));
    assert!(engine.enabled());
    assert_eq!(device.storage.current_value(FLAGS_ATTRIBUTE_ID), Some(vec![0x01, 0x00]));
}

#[tokio::test]
async fn test_fill_every_slot() {
    let device = MockDevice::new(14);
    let mut engine = device.attach();

    let events: Vec<ScheduleEvent> = (0..14)
        .map(|index| local_event(DayOfWeek::ALL[index % 7], (index / 7) as u8, 0, 0))
        .collect();
    let pending = engine.add_events(events, false).await.unwrap();
    assert_eq!(pending.len(), 14);
    assert!(engine.available_days().is_empty());

    let report = engine.commit(&pending).await.unwrap();
    assert_eq!(report.committed.len(), 14);
    assert!(engine.add_event(local_event(DayOfWeek::Monday, 12, 0, 0), false).await.is_err());

    engine.remove_events_for_days(DayOfWeek::Monday.into(), true).await.unwrap();
    assert_eq!(engine.number_of_events(), 12);
    assert_eq!(engine.unavailable_days().len(), 6);
}

#[tokio::test]
async fn test_equal_times_from_storage_resolve_by_slot() {
    let device = MockDevice::new(7);
    let mut engine = device.attach();
    let first = local_event(DayOfWeek::Monday, 8, 0, 10);
    let second = local_event(DayOfWeek::Monday, 8, 0, 90);

    device.storage.inject_update(FIRST_EVENT_ATTRIBUTE_ID, Some(first.encode().unwrap()));
    device.storage.inject_update(FIRST_EVENT_ATTRIBUTE_ID + 1, Some(second.encode().unwrap()));
    assert_eq!(engine.drain_storage_updates(), 2);
    assert_eq!(engine.number_of_events(), 2);
    assert!(engine.event_at(1).unwrap().same_payload(&second));

    let pending = engine.remove_event_at(1, false).await.unwrap();

    assert_eq!(pending, BTreeSet::from([FIRST_EVENT_ATTRIBUTE_ID + 1]));
    assert!(engine.slots().get(FIRST_EVENT_ATTRIBUTE_ID).unwrap().same_payload(&first));
    assert!(engine.slots().get(FIRST_EVENT_ATTRIBUTE_ID + 1).is_none());

    let report = engine.commit_event_indices(&[0]).await.unwrap();
    assert_eq!(report.committed, BTreeSet::from([FIRST_EVENT_ATTRIBUTE_ID]));
}

struct ByPosition;

fn position(event: &ScheduleEvent) -> i16 {
    match event.attributes.get(&POSITION_ATTRIBUTE_ID) {
        Some(AttributeValue::SInt16(position)) => *position,
        _ => 0,
    }
}

impl Collator for ByPosition {
    fn is_ordered_before(&self, a: &ScheduleEvent, b: &ScheduleEvent) -> bool {
        (position(a), a) < (position(b), b)
    }
}

#[tokio::test]
async fn test_custom_collator_drives_indices() {
    let device = MockDevice::new(7);
    let mut engine = ScheduleEngine::attach_with_collator(
        device.storage.clone(),
        ScheduleConfig::default(),
        Box::new(ByPosition),
    )
    .unwrap();

    let high = local_event(DayOfWeek::Monday, 6, 0, 2);
    let low = local_event(DayOfWeek::Friday, 6, 0, 1);
    engine.add_events(vec![high.clone(), low.clone()], false).await.unwrap();

    assert_eq!(engine.events(), &[low.clone(), high]);
    engine.remove_event_at(0, false).await.unwrap();
    assert_eq!(engine.event_index(&low), None);
}
