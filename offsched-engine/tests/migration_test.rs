use std::sync::Arc;

use offsched_engine::codec::DayOfWeek;
use offsched_engine::{MigrationCoordinator, MigrationConfig, ScheduleError};
use time::UtcOffset;
use tokio::sync::Mutex;

mod common;
use common::mock_device::{MockDevice, local_event, utc_event};

#[tokio::test(start_paused = true)]
async fn test_mixed_schedule_migrates_only_utc_events() {
    let device = MockDevice::with_time_zone(14, UtcOffset::from_hms(-8, 0, 0).unwrap());
    let mut engine = device.attach();

    let local = local_event(DayOfWeek::Monday, 9, 0, 10);
    engine
        .add_events(
            vec![
                local.clone(),
                utc_event(DayOfWeek::Monday, 3, 0, 20),
                utc_event(DayOfWeek::Wednesday, 16, 45, 30),
            ],
            true,
        )
        .await
        .unwrap();

    let coordinator = MigrationCoordinator::new(Arc::new(Mutex::new(engine))).with_config(
        MigrationConfig {
            max_batch_size: 1,
            wait_between_batches_ms: 5_000,
        },
    );
    let summary = coordinator.migrate().await.unwrap();

    assert_eq!(summary.batches, 2);
    let engine = coordinator.engine().lock().await;
    assert!(engine.utc_events().is_empty());
    assert_eq!(engine.number_of_events(), 3);

    let sunday = engine.events_for_day(DayOfWeek::Sunday);
    assert_eq!(sunday.len(), 1);
    assert_eq!(sunday[0].time_specification.hour(), 19);
    assert!(sunday[0].attributes.contains_key(&101));

    let local_slot = engine.slot_id_for_event(&local).unwrap();
    assert!(engine.slots().get(local_slot).unwrap().same_payload(&local));
}

#[tokio::test]
async fn test_single_event_migration() {
    let device = MockDevice::with_time_zone(7, UtcOffset::from_hms(2, 0, 0).unwrap());
    let mut engine = device.attach();
    let event = utc_event(DayOfWeek::Friday, 23, 0, 0);
    engine.add_event(event.clone(), true).await.unwrap();

    let outcome = engine.migrate_utc_event(&event).await.unwrap();

    assert_eq!(outcome.new.time_specification.first_day(), Some(DayOfWeek::Saturday));
    assert_eq!(outcome.new.time_specification.hour(), 1);
    assert_eq!(engine.slot_id_for_event(&outcome.new), Some(outcome.slot_id));

    // Already local: handed back untouched
    let again = engine.migrate_utc_event(&outcome.new).await.unwrap();
    assert_eq!(again.old, again.new);

    assert!(matches!(
        engine.migrate_utc_event(&utc_event(DayOfWeek::Monday, 1, 0, 0)).await,
        Err(ScheduleError::EventNotFound)
    ));
}

#[tokio::test]
async fn test_single_event_migration_needs_time_zone() {
    let device = MockDevice::new(7);
    let mut engine = device.attach();
    let event = utc_event(DayOfWeek::Friday, 23, 0, 0);
    engine.add_event(event.clone(), true).await.unwrap();

    assert!(matches!(
        engine.migrate_utc_event(&event).await,
        Err(ScheduleError::NoDestinationTimeZone)
    ));
    assert!(engine.migrate_utc_events(5).await.unwrap().is_empty());
}
