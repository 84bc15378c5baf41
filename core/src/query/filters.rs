use crate::geo::{haversine_km, GeoPoint};
use crate::prelude::{DashboardError, DashboardResult};
use crate::query::detection::Detection;

pub const MAX_DESCRIPTION_WORDS: usize = 200;
pub const MIN_RADIUS_KM: f64 = 1.0;
pub const MAX_RADIUS_KM: f64 = 100.0;

/// Free-text vehicle description, at most 200 words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionQuery(String);

impl DescriptionQuery {
    pub fn new(text: &str) -> DashboardResult<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(DashboardError::Validation("Please enter a description.".into()));
        }
        if trimmed.split_whitespace().count() > MAX_DESCRIPTION_WORDS {
            return Err(DashboardError::Validation(format!(
                "Description cannot exceed {MAX_DESCRIPTION_WORDS} words."
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Area of interest drawn on the map as a range circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFilter {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl RangeFilter {
    pub fn new(center: GeoPoint, radius_km: f64) -> DashboardResult<Self> {
        if !center.is_finite() || center.latitude.abs() > 90.0 || center.longitude.abs() > 180.0 {
            return Err(DashboardError::Validation(
                "range centre must be a valid coordinate".into(),
            ));
        }
        if !(MIN_RADIUS_KM..=MAX_RADIUS_KM).contains(&radius_km) {
            return Err(DashboardError::Validation(format!(
                "radius must be between {MIN_RADIUS_KM} and {MAX_RADIUS_KM} km"
            )));
        }
        Ok(Self { center, radius_km })
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        haversine_km(self.center, point) <= self.radius_km
    }

    pub fn retain(&self, detections: &[Detection]) -> Vec<Detection> {
        detections
            .iter()
            .filter(|d| d.point().map(|p| self.contains(p)).unwrap_or(false))
            .cloned()
            .collect()
    }
}

/// Inclusive time window over RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub from: String,
    pub to: String,
}

impl TimeWindow {
    /// Timestamps must share the `YYYY-MM-DDTHH:MM` prefix shape, which makes
    /// lexical order equal chronological order for same-offset values.
    pub fn new(from: &str, to: &str) -> DashboardResult<Self> {
        let from = from.trim();
        let to = to.trim();
        for value in [from, to] {
            if !looks_like_timestamp(value) {
                return Err(DashboardError::Validation(format!(
                    "'{value}' is not a date and time"
                )));
            }
        }
        if from > to {
            return Err(DashboardError::Validation(
                "start of the window is after its end".into(),
            ));
        }
        Ok(Self {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// The end bound covers its whole last unit: with a minute-precision `to`,
    /// any second inside that minute is still in the window.
    pub fn contains(&self, timestamp: &str) -> bool {
        let head = timestamp.get(..self.to.len()).unwrap_or(timestamp);
        timestamp >= self.from.as_str() && head <= self.to.as_str()
    }
}

fn looks_like_timestamp(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < 16 {
        return false;
    }
    bytes[..16].iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        10 => *b == b'T',
        13 => *b == b':',
        _ => b.is_ascii_digit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_word_limit() {
        let ok = vec!["word"; 200].join(" ");
        let too_long = vec!["word"; 201].join(" ");
        assert!(DescriptionQuery::new(&ok).is_ok());
        assert!(DescriptionQuery::new(&too_long).is_err());
        assert!(DescriptionQuery::new("   ").is_err());
    }

    #[test]
    fn range_filter_bounds_and_membership() {
        let centre = GeoPoint::new(42.3601, -71.0589);
        assert!(RangeFilter::new(centre, 0.5).is_err());
        assert!(RangeFilter::new(centre, 101.0).is_err());
        let filter = RangeFilter::new(centre, 2.0).unwrap();
        assert!(filter.contains(GeoPoint::new(42.3598, -71.0589)));
        assert!(!filter.contains(GeoPoint::new(42.3732, -71.1189)));
    }

    #[test]
    fn range_filter_skips_detections_without_coordinates() {
        let filter = RangeFilter::new(GeoPoint::new(0.0, 0.0), 5.0).unwrap();
        let detections = vec![
            Detection {
                id: "near".into(),
                latitude: Some(0.01),
                longitude: Some(0.01),
                ..Default::default()
            },
            Detection {
                id: "unplaced".into(),
                ..Default::default()
            },
        ];
        let kept = filter.retain(&detections);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "near");
    }

    #[test]
    fn time_window_validation() {
        assert!(TimeWindow::new("2025-01-01T00:00", "2025-01-02T00:00").is_ok());
        assert!(TimeWindow::new("2025-01-02T00:00", "2025-01-01T00:00").is_err());
        assert!(TimeWindow::new("yesterday", "2025-01-01T00:00").is_err());
        let window = TimeWindow::new("2025-01-01T00:00", "2025-01-01T23:59").unwrap();
        assert!(window.contains("2025-01-01T12:00:00Z"));
        assert!(!window.contains("2025-01-02T00:00:00Z"));
    }

    #[test]
    fn time_window_end_minute_is_inclusive() {
        let window = TimeWindow::new("2025-01-01T00:00", "2025-01-01T23:59").unwrap();
        assert!(window.contains("2025-01-01T23:59:00Z"));
        assert!(window.contains("2025-01-01T23:59:30Z"));
        assert!(window.contains("2025-01-01T00:00:00Z"));
        assert!(!window.contains("2024-12-31T23:59:59Z"));
        assert!(!window.contains("2025-01-02T00:00:00Z"));
    }
}
