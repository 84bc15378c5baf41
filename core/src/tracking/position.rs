use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single timestamped sample of the tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    pub fn at(point: GeoPoint, timestamp: i64) -> Self {
        Self::new(point.latitude, point.longitude, timestamp)
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Timestamp for a sample following `self`, never earlier than `self`.
    pub fn next_timestamp(&self, now_ms: i64) -> i64 {
        now_ms.max(self.timestamp)
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
