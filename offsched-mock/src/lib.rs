use std::error::Error;
use std::sync::Arc;

use offsched_engine::codec::{DataType, ScheduleEvent};
use offsched_engine::{
    MemoryStorage, MigrationCoordinator, ScheduleEngine, ScheduleNotification, ScheduleStorage,
};
use tokio::sync::{Mutex, broadcast};

use crate::settings::Settings;
use crate::simulate::{POSITION_ATTRIBUTE_ID, POWER_ATTRIBUTE_ID, daily_routine};

pub mod settings;
mod simulate;

fn build_storage(settings: &Settings) -> Result<MemoryStorage, Box<dyn Error>> {
    let mut storage = MemoryStorage::new(settings.device.name.clone())
        .with_event_slots(settings.device.event_slots)
        .with_writable_attribute(POWER_ATTRIBUTE_ID, DataType::Boolean)
        .with_writable_attribute(POSITION_ATTRIBUTE_ID, DataType::SInt16);

    if let Some(offset) = settings.device.time_zone()? {
        storage = storage.with_time_zone(offset);
    }
    Ok(storage)
}

async fn log_notifications(mut receiver: broadcast::Receiver<ScheduleNotification>) {
    loop {
        match receiver.recv().await {
            Ok(ScheduleNotification::EventsChanged(deltas)) => tracing::debug!(
                "Schedule changed: -{:?} +{:?}",
                deltas.deletions,
                deltas.insertions
            ),
            Ok(ScheduleNotification::EnabledStateChanged(enabled)) => {
                tracing::info!("Schedule enabled: {}", enabled)
            }
            Ok(ScheduleNotification::EventsReloaded) => tracing::info!("Schedule reloaded"),
            Err(broadcast::error::RecvError::Lagged(count)) => {
                tracing::warn!("Missed {} schedule notifications", count)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// What a simulated device ended up with
#[derive(Debug)]
pub struct RunReport {
    pub events: Vec<ScheduleEvent>,
    pub migrated: usize,
    pub enabled: bool,
}

/// Seeds a simulated device with a daily routine, enables it and moves any
/// UTC events into device time.
pub async fn run(settings: &Arc<Settings>) -> Result<RunReport, Box<dyn Error>> {
    let storage = Arc::new(build_storage(settings)?);
    let mut engine = ScheduleEngine::attach(storage.clone(), settings.schedule.clone())?;

    let listener = tokio::spawn(log_notifications(engine.subscribe()));

    let routine = daily_routine(&settings.simulation, storage.time_zone())?;
    engine.add_events(routine, true).await?;
    engine.set_enabled(true).await?;
    engine.drain_storage_updates();

    tracing::info!(
        "{} has {} of {} events, {} in UTC",
        settings.device.name,
        engine.number_of_events(),
        engine.number_of_supported_events(),
        engine.utc_events().len()
    );

    let engine = Arc::new(Mutex::new(engine));
    let coordinator = MigrationCoordinator::new(engine.clone());
    let summary = coordinator.migrate().await?;
    tracing::info!(
        "Migrated {} events in {} batches",
        summary.migrated.len(),
        summary.batches
    );

    let report = {
        let mut engine = engine.lock().await;
        engine.drain_storage_updates();
        for event in engine.events() {
            tracing::info!("{} {}", event.time_specification, serde_json::to_string(&event.attributes)?);
        }
        engine.detach();

        RunReport {
            events: engine.events().to_vec(),
            migrated: summary.migrated.len(),
            enabled: engine.enabled(),
        }
    };

    listener.abort();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_with_default_settings() {
        let settings = Arc::new(Settings::new().unwrap());
        let report = run(&settings).await.unwrap();

        assert!(report.enabled);
        assert_eq!(report.migrated, 2);
        assert_eq!(report.events.len(), 2);
        assert!(report.events.iter().all(|event| event.uses_device_time_zone()));

        let open = &report.events[0].time_specification;
        assert_eq!((open.hour(), open.minute()), (7, 30));
        assert!(open.is_compact());
        let close = &report.events[1].time_specification;
        assert_eq!((close.hour(), close.minute()), (21, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_local_routine_needs_no_migration() {
        let mut settings = Settings::new().unwrap();
        settings.simulation.legacy_utc = false;

        let report = run(&Arc::new(settings)).await.unwrap();

        assert_eq!(report.migrated, 0);
        assert_eq!(report.events.len(), 2);
    }

    #[test]
    fn test_build_storage() {
        let settings = Settings::new().unwrap();
        let storage = build_storage(&settings).unwrap();

        assert!(storage.supports_offline_schedules());
        assert_eq!(storage.writable_attribute_ids().len(), settings.device.event_slots + 3);
        assert!(storage.time_zone().is_some());
    }
}
