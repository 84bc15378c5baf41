use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use trackcore::geo::GeoPoint;
use trackcore::prelude::{DashboardError, DashboardResult};
use trackcore::query::{
    Detection, DetectionQuery, DetectionResponse, DetectionsResponse, LatestResponse,
};

/// Detection backend reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDetectionQuery {
    base: Url,
    client: Client,
}

impl HttpDetectionQuery {
    pub fn new(base: &str) -> DashboardResult<Self> {
        let base = Url::parse(base).map_err(|err| {
            DashboardError::Configuration(format!("invalid backend URL '{base}': {err}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(DashboardError::Configuration(format!(
                "backend URL '{base}' cannot carry a path"
            )));
        }
        Ok(Self {
            base,
            client: Client::new(),
        })
    }

    /// Joins percent-encoded path segments onto the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> DashboardResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DashboardError::Configuration("backend URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url) -> DashboardResult<T> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| DashboardError::Transport(format!("{url}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Transport(format!("{status}: {body}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| DashboardError::Parse(err.to_string()))
    }

    async fn detections(&self, url: Url) -> DashboardResult<Vec<Detection>> {
        Ok(self.fetch::<DetectionsResponse>(url).await?.detections)
    }

    fn ids_url(&self, segments: &[&str], ids: &[String]) -> DashboardResult<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("ids", &ids.join(","));
        Ok(url)
    }
}

#[async_trait]
impl DetectionQuery for HttpDetectionQuery {
    async fn list_detections(&self) -> DashboardResult<Vec<Detection>> {
        self.detections(self.endpoint(&["api", "detection"])?).await
    }

    async fn get_detection(&self, id: &str) -> DashboardResult<Option<Detection>> {
        let url = self.endpoint(&["api", "detection", id])?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| DashboardError::Transport(format!("{url}: {err}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DashboardError::Transport(response.status().to_string()));
        }
        let body = response
            .json::<DetectionResponse>()
            .await
            .map_err(|err| DashboardError::Parse(err.to_string()))?;
        Ok(Some(body.detection))
    }

    async fn latest_detections(&self) -> DashboardResult<Vec<Detection>> {
        let url = self.endpoint(&["api", "detection", "latest"])?;
        Ok(self.fetch::<LatestResponse>(url).await?.latest)
    }

    async fn search_by_ids(&self, ids: &[String]) -> DashboardResult<Vec<Detection>> {
        self.detections(self.ids_url(&["api", "search", "ids"], ids)?)
            .await
    }

    async fn search_by_model(&self, model: &str) -> DashboardResult<Vec<Detection>> {
        self.detections(self.endpoint(&["api", "search", "model", model])?)
            .await
    }

    async fn search_by_model_and_id(
        &self,
        model: &str,
        tpms_id: &str,
    ) -> DashboardResult<Vec<Detection>> {
        self.detections(self.endpoint(&["api", "search", "model", model, "id", tpms_id])?)
            .await
    }

    async fn search_ids_summary(&self, ids: &[String]) -> DashboardResult<Vec<Detection>> {
        self.detections(self.ids_url(&["api", "search", "ids", "summary"], ids)?)
            .await
    }

    async fn search_by_time(&self, from: &str, to: &str) -> DashboardResult<Vec<Detection>> {
        self.detections(self.endpoint(&["api", "search", "time", from, to])?)
            .await
    }

    async fn search_by_location(
        &self,
        center: GeoPoint,
        radius_km: f64,
    ) -> DashboardResult<Vec<Detection>> {
        let lat = center.latitude.to_string();
        let lng = center.longitude.to_string();
        let radius = radius_km.to_string();
        self.detections(self.endpoint(&["api", "search", "location", &lat, &lng, &radius])?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_encode_segments() {
        let client = HttpDetectionQuery::new("http://127.0.0.1:9000/").unwrap();
        let url = client
            .endpoint(&["api", "search", "model", "Model X"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/api/search/model/Model%20X");
    }

    #[test]
    fn id_lists_are_comma_separated() {
        let client = HttpDetectionQuery::new("http://127.0.0.1:9000").unwrap();
        let url = client
            .ids_url(&["api", "search", "ids"], &["T1".into(), "T2".into()])
            .unwrap();
        assert_eq!(url.path(), "/api/search/ids");
        assert_eq!(url.query(), Some("ids=T1%2CT2"));
    }

    #[test]
    fn bad_base_url_is_a_configuration_error() {
        let err = HttpDetectionQuery::new("not a url").unwrap_err();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }
}
