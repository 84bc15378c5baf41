use crate::prelude::{DashboardError, DashboardResult};
use crate::query::client::DetectionQuery;
use crate::query::detection::Detection;

pub const MAX_TIRE_IDS: usize = 4;

/// Between one and four non-blank tire sensor ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TireIds(Vec<String>);

impl TireIds {
    pub fn new<I, S>(ids: I) -> DashboardResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(DashboardError::Validation(
                "at least one tire ID is required".into(),
            ));
        }
        if ids.len() > MAX_TIRE_IDS {
            return Err(DashboardError::Validation(format!(
                "at most {MAX_TIRE_IDS} tire IDs can be searched at once"
            )));
        }
        Ok(Self(ids))
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Which backend calls a search turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPlan {
    ByIds(TireIds),
    ByModel(String),
    ByModelAndIds { model: String, ids: TireIds },
}

/// Raw contents of the vehicle search form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleSearch {
    pub tire_ids: [String; MAX_TIRE_IDS],
    pub sensor_model: String,
    pub license_plate: String,
}

impl VehicleSearch {
    /// Validates the form and decides which calls to issue. Runs before any
    /// request, so the same input always yields the same answer.
    pub fn plan(&self) -> DashboardResult<SearchPlan> {
        let first_blank = self.tire_ids[0].trim().is_empty();
        let any_ids = self.tire_ids.iter().any(|id| !id.trim().is_empty());
        let model = self.sensor_model.trim();

        if first_blank && any_ids {
            return Err(DashboardError::Validation("Tire ID 1 is required.".into()));
        }
        match (any_ids, model.is_empty()) {
            (false, true) => Err(DashboardError::Validation(
                "enter at least one tire ID or a sensor model".into(),
            )),
            (false, false) => Ok(SearchPlan::ByModel(model.to_string())),
            (true, true) => Ok(SearchPlan::ByIds(TireIds::new(&self.tire_ids)?)),
            (true, false) => Ok(SearchPlan::ByModelAndIds {
                model: model.to_string(),
                ids: TireIds::new(&self.tire_ids)?,
            }),
        }
    }
}

/// Runs a validated plan against the backend.
///
/// Model plus ids concatenates one model-and-id lookup per id, in id order;
/// it does not also run the plain id search.
pub async fn execute_plan(
    plan: &SearchPlan,
    backend: &dyn DetectionQuery,
) -> DashboardResult<Vec<Detection>> {
    match plan {
        SearchPlan::ByIds(ids) => backend.search_by_ids(ids.as_slice()).await,
        SearchPlan::ByModel(model) => backend.search_by_model(model).await,
        SearchPlan::ByModelAndIds { model, ids } => {
            let mut results = Vec::new();
            for id in ids.as_slice() {
                results.extend(backend.search_by_model_and_id(model, id).await?);
            }
            Ok(results)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend double that records each call and answers with one detection
    /// per call, tagged with the call.
    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub calls: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingBackend {
        fn answer(&self, call: String) -> DashboardResult<Vec<Detection>> {
            self.calls.lock().unwrap().push(call.clone());
            if self.fail {
                return Err(DashboardError::Transport("backend unreachable".into()));
            }
            Ok(vec![Detection {
                id: call,
                ..Default::default()
            }])
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DetectionQuery for RecordingBackend {
        async fn list_detections(&self) -> DashboardResult<Vec<Detection>> {
            self.answer("list".into())
        }

        async fn get_detection(&self, id: &str) -> DashboardResult<Option<Detection>> {
            Ok(self.answer(format!("get:{id}"))?.pop())
        }

        async fn latest_detections(&self) -> DashboardResult<Vec<Detection>> {
            self.answer("latest".into())
        }

        async fn search_by_ids(&self, ids: &[String]) -> DashboardResult<Vec<Detection>> {
            self.answer(format!("ids:{}", ids.join(",")))
        }

        async fn search_by_model(&self, model: &str) -> DashboardResult<Vec<Detection>> {
            self.answer(format!("model:{model}"))
        }

        async fn search_by_model_and_id(
            &self,
            model: &str,
            tpms_id: &str,
        ) -> DashboardResult<Vec<Detection>> {
            self.answer(format!("model_id:{model}:{tpms_id}"))
        }

        async fn search_ids_summary(&self, ids: &[String]) -> DashboardResult<Vec<Detection>> {
            self.answer(format!("summary:{}", ids.join(",")))
        }

        async fn search_by_time(&self, from: &str, to: &str) -> DashboardResult<Vec<Detection>> {
            self.answer(format!("time:{from}:{to}"))
        }

        async fn search_by_location(
            &self,
            center: GeoPoint,
            radius_km: f64,
        ) -> DashboardResult<Vec<Detection>> {
            self.answer(format!(
                "location:{}:{}:{radius_km}",
                center.latitude, center.longitude
            ))
        }
    }

    fn form(ids: [&str; 4], model: &str) -> VehicleSearch {
        VehicleSearch {
            tire_ids: ids.map(String::from),
            sensor_model: model.into(),
            license_plate: String::new(),
        }
    }

    #[tokio::test]
    async fn ids_without_model_use_a_single_id_search() {
        let backend = RecordingBackend::default();
        let plan = form(["T1", "T2", "", ""], "").plan().unwrap();
        let results = execute_plan(&plan, &backend).await.unwrap();
        assert_eq!(backend.calls(), vec!["ids:T1,T2"]);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn model_and_ids_only_use_model_and_id_lookups() {
        let backend = RecordingBackend::default();
        let plan = form(["T1", "", "", ""], "X").plan().unwrap();
        let results = execute_plan(&plan, &backend).await.unwrap();
        assert_eq!(backend.calls(), vec!["model_id:X:T1"]);
        assert_eq!(results[0].id, "model_id:X:T1");
    }

    #[tokio::test]
    async fn model_and_several_ids_concatenate_in_id_order() {
        let backend = RecordingBackend::default();
        let plan = form(["T1", "T2", "T3", ""], "X").plan().unwrap();
        let results = execute_plan(&plan, &backend).await.unwrap();
        let ids: Vec<_> = results.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["model_id:X:T1", "model_id:X:T2", "model_id:X:T3"]);
    }

    #[tokio::test]
    async fn model_only_searches_by_model() {
        let backend = RecordingBackend::default();
        let plan = form(["", "", "", ""], " ModelX ").plan().unwrap();
        execute_plan(&plan, &backend).await.unwrap();
        assert_eq!(backend.calls(), vec!["model:ModelX"]);
    }

    #[test]
    fn empty_form_is_rejected_before_any_call() {
        let err = form(["", " ", "", ""], "").plan().unwrap_err();
        assert!(matches!(err, DashboardError::Validation(_)));
        // Re-validating the same input gives the same answer.
        assert_eq!(form(["", " ", "", ""], "").plan().unwrap_err(), err);
    }

    #[test]
    fn later_id_without_first_is_rejected() {
        let err = form(["", "T2", "", ""], "").plan().unwrap_err();
        assert_eq!(err, DashboardError::Validation("Tire ID 1 is required.".into()));
    }

    #[test]
    fn tire_ids_bounds() {
        assert!(TireIds::new(["a", "b", "c", "d"]).is_ok());
        assert!(TireIds::new(["a", "b", "c", "d", "e"]).is_err());
        assert!(TireIds::new(Vec::<String>::new()).is_err());
    }

    #[tokio::test]
    async fn transport_errors_propagate_to_the_caller() {
        let backend = RecordingBackend {
            fail: true,
            ..Default::default()
        };
        let plan = form(["T1", "", "", ""], "").plan().unwrap();
        let err = execute_plan(&plan, &backend).await.unwrap_err();
        assert!(matches!(err, DashboardError::Transport(_)));
    }
}
