use std::error::Error;

use offsched_engine::ScheduleConfig;
use serde::{Deserialize, Serialize};
use time::UtcOffset;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub event_slots: usize,
    pub utc_offset_minutes: Option<i32>,
}

impl Device {
    pub fn time_zone(&self) -> Result<Option<UtcOffset>, Box<dyn Error>> {
        let Some(minutes) = self.utc_offset_minutes else {
            return Ok(None);
        };
        let offset = UtcOffset::from_whole_seconds(minutes * 60)?;
        Ok(Some(offset))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Hour and minute the blinds open every day
    pub open_at: (u8, u8),
    pub close_at: (u8, u8),
    pub open_position: i16,
    pub close_position: i16,
    pub legacy_utc: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub device: Device,
    pub simulation: Simulation,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        Self::from_toml(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../",
            "configs/default.toml"
        )))
    }

    pub fn from_toml(source: &str) -> Result<Self, Box<dyn Error>> {
        let settings: Settings = toml::from_str(source)?;
        settings.schedule.validate()?;
        settings.device.time_zone()?;

        Ok(settings)
    }
}
