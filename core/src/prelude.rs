use serde::{Deserialize, Serialize};

pub use crate::geo::GeoPoint;
use crate::map::CoordinateFallback;

/// Common error type shared by every dashboard component.
///
/// The variants follow how a failure is handled: transport errors stay with the
/// surface that issued the request, parse errors are logged and the previous
/// state is kept, validation errors are rejected before any request is made,
/// and configuration errors disable only the affected surface.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("parse failure: {0}")]
    Parse(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

pub type DashboardResult<T> = Result<T, DashboardError>;

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Storage(err.to_string())
    }
}

/// Settings for the tracked-entity position stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    pub initial: GeoPoint,
    pub emit_interval_ms: u64,
    pub max_step_deg: f64,
    pub path_capacity: usize,
    pub seed: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            initial: GeoPoint::new(42.3601, -71.0589),
            emit_interval_ms: 1000,
            max_step_deg: 0.0005,
            path_capacity: crate::tracking::DEFAULT_PATH_CAPACITY,
            seed: 0,
        }
    }
}

impl TrackingConfig {
    pub fn validate(&self) -> DashboardResult<()> {
        if self.path_capacity == 0 {
            return Err(DashboardError::Configuration(
                "path capacity must be greater than zero".into(),
            ));
        }
        if self.emit_interval_ms == 0 {
            return Err(DashboardError::Configuration(
                "emit interval must be greater than zero".into(),
            ));
        }
        if !self.max_step_deg.is_finite() || self.max_step_deg < 0.0 {
            return Err(DashboardError::Configuration(format!(
                "max step {} is not a non-negative number of degrees",
                self.max_step_deg
            )));
        }
        Ok(())
    }
}

/// Settings for the durable-channel poller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 6000 }
    }
}

/// Credentials for the mapping provider backing the map surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MapProviderConfig {
    pub api_key: Option<String>,
    pub map_id: Option<String>,
}

impl MapProviderConfig {
    pub fn require_key(&self) -> DashboardResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            DashboardError::Configuration("mapping-provider credential is not configured".into())
        })
    }
}

/// Settings for the map composition surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapConfig {
    pub fallback: CoordinateFallback,
    pub ring_radius_m: f64,
    pub initial_zoom: f64,
    pub follow_target: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            fallback: CoordinateFallback::Unplaced,
            ring_radius_m: 60.0,
            initial_zoom: 15.0,
            follow_target: true,
        }
    }
}
