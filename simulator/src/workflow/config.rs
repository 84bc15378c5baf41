use crate::generator::profile::DetectionProfile;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use trackcore::query::search::MAX_TIRE_IDS;
use trackcore::query::VehicleSearch;
use trackcore::SessionConfig;

/// Search the workflow issues before mounting the map.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpec {
    pub tire_ids: Vec<String>,
    pub sensor_model: Option<String>,
    pub license_plate: Option<String>,
}

impl SearchSpec {
    pub fn is_empty(&self) -> bool {
        self.tire_ids.iter().all(|id| id.trim().is_empty())
            && self
                .sensor_model
                .as_deref()
                .map_or(true, |model| model.trim().is_empty())
    }

    /// Fills the search form slot by slot, as an operator would.
    pub fn to_form(&self) -> anyhow::Result<VehicleSearch> {
        ensure!(
            self.tire_ids.len() <= MAX_TIRE_IDS,
            "the search form has {} tire ID slots, {} ids given",
            MAX_TIRE_IDS,
            self.tire_ids.len()
        );
        let mut form = VehicleSearch {
            sensor_model: self.sensor_model.clone().unwrap_or_default(),
            license_plate: self.license_plate.clone().unwrap_or_default(),
            ..VehicleSearch::default()
        };
        for (slot, id) in form.tire_ids.iter_mut().zip(&self.tire_ids) {
            *slot = id.clone();
        }
        Ok(form)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub session: SessionConfig,
    pub detections: DetectionProfile,
    pub search: SearchSpec,
    /// Position updates the offline run waits for before tearing down.
    pub ticks: usize,
    /// Profile directory for the durable slots; in-memory when unset.
    pub store_dir: Option<PathBuf>,
    /// JSON node list replacing the built-in lantern deployment.
    pub nodes_file: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            detections: DetectionProfile::default(),
            search: SearchSpec::default(),
            ticks: 10,
            store_dir: None,
            nodes_file: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        ticks: usize,
        search_ids: Option<&str>,
        search_model: Option<String>,
        store_dir: Option<PathBuf>,
    ) -> Self {
        let tire_ids = search_ids
            .map(|ids| ids.split(',').map(|id| id.trim().to_string()).collect())
            .unwrap_or_default();
        Self {
            ticks,
            search: SearchSpec {
                tire_ids,
                sensor_model: search_model,
                license_plate: None,
            },
            store_dir,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use trackcore::map::CoordinateFallback;
    use trackcore::query::SearchPlan;

    #[test]
    fn config_from_args_builds_search_form() {
        let cfg = WorkflowConfig::from_args(5, Some("T1, T2"), None, None);
        assert_eq!(cfg.ticks, 5);
        let form = cfg.search.to_form().unwrap();
        assert_eq!(form.tire_ids[1], "T2");
        assert!(matches!(form.plan().unwrap(), SearchPlan::ByIds(_)));
    }

    #[test]
    fn too_many_ids_do_not_fit_the_form() {
        let cfg = WorkflowConfig::from_args(1, Some("a,b,c,d,e"), None, None);
        assert!(cfg.search.to_form().is_err());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"ticks: 3\nsession:\n  poll:\n    interval_ms: 2000\n  map:\n    fallback: anchor_to_node\nsearch:\n  sensor_model: ModelX\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.ticks, 3);
        assert_eq!(cfg.session.poll.interval_ms, 2000);
        assert_eq!(cfg.session.map.fallback, CoordinateFallback::AnchorToNode);
        assert_eq!(cfg.session.tracking.path_capacity, 100);
        assert!(!cfg.search.is_empty());
    }
}
