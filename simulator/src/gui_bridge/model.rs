use async_trait::async_trait;
use std::sync::RwLock;
use trackcore::geo::GeoPoint;
use trackcore::prelude::{DashboardError, DashboardResult};
use trackcore::query::{Detection, DetectionQuery, RangeFilter, TimeWindow, TireIds};

/// Number of detections the latest endpoint returns.
pub const LATEST_COUNT: usize = 3;

/// In-memory detection backend served by the mock HTTP bridge.
#[derive(Debug, Default)]
pub struct DetectionStore {
    detections: RwLock<Vec<Detection>>,
}

impl DetectionStore {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections: RwLock::new(detections),
        }
    }

    pub fn replace(&self, detections: Vec<Detection>) -> DashboardResult<()> {
        let mut guard = self
            .detections
            .write()
            .map_err(|_| DashboardError::Storage("detection store lock poisoned".into()))?;
        *guard = detections;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.detections.read().map(|d| d.len()).unwrap_or(0)
    }

    fn filtered<F>(&self, keep: F) -> DashboardResult<Vec<Detection>>
    where
        F: Fn(&Detection) -> bool,
    {
        let guard = self
            .detections
            .read()
            .map_err(|_| DashboardError::Storage("detection store lock poisoned".into()))?;
        Ok(guard.iter().filter(|d| keep(d)).cloned().collect())
    }
}

fn same_model(stored: &str, requested: &str) -> bool {
    stored.eq_ignore_ascii_case(requested.trim())
}

#[async_trait]
impl DetectionQuery for DetectionStore {
    async fn list_detections(&self) -> DashboardResult<Vec<Detection>> {
        self.filtered(|_| true)
    }

    async fn get_detection(&self, id: &str) -> DashboardResult<Option<Detection>> {
        Ok(self.filtered(|d| d.id == id)?.into_iter().next())
    }

    async fn latest_detections(&self) -> DashboardResult<Vec<Detection>> {
        let mut all = self.filtered(|_| true)?;
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(LATEST_COUNT);
        Ok(all)
    }

    async fn search_by_ids(&self, ids: &[String]) -> DashboardResult<Vec<Detection>> {
        let ids = TireIds::new(ids)?;
        self.filtered(|d| ids.as_slice().contains(&d.tpms_id))
    }

    async fn search_by_model(&self, model: &str) -> DashboardResult<Vec<Detection>> {
        self.filtered(|d| same_model(&d.tpms_model, model))
    }

    async fn search_by_model_and_id(
        &self,
        model: &str,
        tpms_id: &str,
    ) -> DashboardResult<Vec<Detection>> {
        self.filtered(|d| same_model(&d.tpms_model, model) && d.tpms_id == tpms_id.trim())
    }

    async fn search_ids_summary(&self, ids: &[String]) -> DashboardResult<Vec<Detection>> {
        Ok(self
            .search_by_ids(ids)
            .await?
            .iter()
            .map(Detection::summary)
            .collect())
    }

    async fn search_by_time(&self, from: &str, to: &str) -> DashboardResult<Vec<Detection>> {
        let window = TimeWindow::new(from, to)?;
        self.filtered(|d| window.contains(&d.timestamp))
    }

    async fn search_by_location(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> DashboardResult<Vec<Detection>> {
        let range = RangeFilter::new(center, radius_km)?;
        Ok(range.retain(&self.filtered(|_| true)?))
    }
}
