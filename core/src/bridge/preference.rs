use crate::bridge::durable::{DurableStore, APPLICATION_KEY};
use crate::prelude::{DashboardError, DashboardResult};
use crate::telemetry::LogManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Sensing application the dashboard is operating in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationMode {
    #[serde(rename = "TPMS")]
    Tpms,
    Bluetooth,
    SmartParking,
    AssetTracking,
    TrafficMonitoring,
    EnvSensing,
}

impl ApplicationMode {
    pub const ALL: [ApplicationMode; 6] = [
        ApplicationMode::Tpms,
        ApplicationMode::Bluetooth,
        ApplicationMode::SmartParking,
        ApplicationMode::AssetTracking,
        ApplicationMode::TrafficMonitoring,
        ApplicationMode::EnvSensing,
    ];

    /// Stored form of the mode.
    pub fn key(&self) -> &'static str {
        match self {
            ApplicationMode::Tpms => "TPMS",
            ApplicationMode::Bluetooth => "Bluetooth",
            ApplicationMode::SmartParking => "SmartParking",
            ApplicationMode::AssetTracking => "AssetTracking",
            ApplicationMode::TrafficMonitoring => "TrafficMonitoring",
            ApplicationMode::EnvSensing => "EnvSensing",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ApplicationMode::Tpms => "TPMS",
            ApplicationMode::Bluetooth => "Bluetooth",
            ApplicationMode::SmartParking => "Smart Parking",
            ApplicationMode::AssetTracking => "Asset Tracking",
            ApplicationMode::TrafficMonitoring => "Traffic Monitoring",
            ApplicationMode::EnvSensing => "Environmental Sensing",
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ApplicationMode::Tpms | ApplicationMode::Bluetooth)
    }
}

impl fmt::Display for ApplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for ApplicationMode {
    type Err = DashboardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ApplicationMode::ALL
            .into_iter()
            .find(|mode| mode.key() == value.trim())
            .ok_or_else(|| DashboardError::Parse(format!("unknown application mode '{value}'")))
    }
}

/// The stored operating-mode preference, read once at startup.
pub struct PreferenceSlot<S> {
    store: Arc<S>,
    logger: LogManager,
}

impl<S: DurableStore> PreferenceSlot<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            logger: LogManager::new("preference"),
        }
    }

    /// `None` means the mode-selection screen should be shown. Unreadable or
    /// unknown values are treated the same way.
    pub fn load(&self) -> Option<ApplicationMode> {
        let stored = match self.store.get(APPLICATION_KEY) {
            Ok(stored) => stored?,
            Err(err) => {
                self.logger
                    .warn(&format!("could not read application preference: {err}"));
                return None;
            }
        };
        match stored.parse::<ApplicationMode>() {
            Ok(mode) => Some(mode),
            Err(err) => {
                self.logger.warn(&err.to_string());
                None
            }
        }
    }

    pub fn select(&self, mode: ApplicationMode) -> DashboardResult<()> {
        if !mode.is_available() {
            return Err(DashboardError::Validation(format!(
                "{} is not available yet",
                mode.title()
            )));
        }
        self.store.set(APPLICATION_KEY, mode.key())?;
        self.logger.record(&format!("application mode set to {mode}"));
        Ok(())
    }

    pub fn clear(&self) -> DashboardResult<()> {
        self.store.remove(APPLICATION_KEY)
    }
}
