use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::config::MigrationConfig;
use crate::error::{Result, ScheduleError};
use crate::schedule::{ReplaceOutcome, ScheduleEngine};
use crate::storage::ScheduleStorage;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Batches that wrote something
    pub batches: usize,
    pub migrated: Vec<ReplaceOutcome>,
    /// Another run was already in flight, nothing was done
    pub skipped: bool,
}

/// Clears the in-flight flag however the run ends
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Moves all UTC events of one schedule to device time, a few at a time.
///
/// Batches are written one after another with a pause in between so the
/// device is never flooded with writes. Only one run per coordinator is in
/// flight at any time. Batch size and pause come from the engine's
/// [`ScheduleConfig::migration`](crate::ScheduleConfig) unless overridden.
pub struct MigrationCoordinator<S: ScheduleStorage> {
    engine: Arc<Mutex<ScheduleEngine<S>>>,
    config: Option<MigrationConfig>,
    in_progress: AtomicBool,
}

impl<S: ScheduleStorage> MigrationCoordinator<S> {
    pub fn new(engine: Arc<Mutex<ScheduleEngine<S>>>) -> Self {
        Self {
            engine,
            config: None,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Overrides the engine's migration settings
    pub fn with_config(mut self, config: MigrationConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn engine(&self) -> &Arc<Mutex<ScheduleEngine<S>>> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub async fn migrate(&self) -> Result<MigrationSummary> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("UTC migration already running, skipping");
            return Ok(MigrationSummary {
                skipped: true,
                ..MigrationSummary::default()
            });
        }
        let _guard = InFlight(&self.in_progress);

        let config = match &self.config {
            Some(config) => config.clone(),
            None => self.engine.lock().await.config().migration.clone(),
        };
        let max_batch_size = config.max_batch_size.max(1);
        let mut summary = MigrationSummary::default();

        loop {
            let batch = summary.batches + 1;

            let remaining = {
                let mut engine = self.engine.lock().await;
                if engine.storage().time_zone().is_none() {
                    tracing::debug!("No device time zone, skipping UTC migration");
                    break;
                }

                let before = engine.pending_utc_migrations()?;
                if before == 0 {
                    break;
                }

                tracing::info!("UTC migration batch {}: {} events left", batch, before);
                let outcomes = engine.migrate_utc_events(max_batch_size).await?;
                let remaining = engine.pending_utc_migrations()?;
                if remaining >= before {
                    tracing::error!("UTC migration batch {} made no progress", batch);
                    return Err(ScheduleError::MigrationStalled { batch });
                }

                summary.batches = batch;
                summary.migrated.extend(outcomes);
                remaining
            };

            if remaining == 0 {
                break;
            }
            tokio::time::sleep(config.wait_between_batches()).await;
        }

        tracing::info!(
            "UTC migration finished: {} events in {} batches",
            summary.migrated.len(),
            summary.batches
        );
        Ok(summary)
    }
}
