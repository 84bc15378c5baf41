use crate::geo::GeoPoint;
use crate::prelude::DashboardResult;
use crate::query::detection::Detection;
use async_trait::async_trait;

/// Operations offered by the detection backend.
///
/// Implementations report unreachable or non-2xx backends as
/// [`DashboardError::Transport`](crate::prelude::DashboardError::Transport).
/// Model names match case-insensitively on the backend side.
#[async_trait]
pub trait DetectionQuery: Send + Sync {
    async fn list_detections(&self) -> DashboardResult<Vec<Detection>>;

    async fn get_detection(&self, id: &str) -> DashboardResult<Option<Detection>>;

    /// The three most recent detections.
    async fn latest_detections(&self) -> DashboardResult<Vec<Detection>>;

    async fn search_by_ids(&self, ids: &[String]) -> DashboardResult<Vec<Detection>>;

    async fn search_by_model(&self, model: &str) -> DashboardResult<Vec<Detection>>;

    async fn search_by_model_and_id(
        &self,
        model: &str,
        tpms_id: &str,
    ) -> DashboardResult<Vec<Detection>>;

    /// Like [`search_by_ids`](Self::search_by_ids) but each record only
    /// carries timestamp, location and coordinates.
    async fn search_ids_summary(&self, ids: &[String]) -> DashboardResult<Vec<Detection>>;

    async fn search_by_time(&self, from: &str, to: &str) -> DashboardResult<Vec<Detection>>;

    async fn search_by_location(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> DashboardResult<Vec<Detection>>;
}
