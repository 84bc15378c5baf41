use crate::generator::profile::generate_detections;
use crate::gui_bridge::model::DetectionStore;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use std::sync::Arc;
use trackcore::bridge::{
    publish_search_results, DashboardContexts, DurableChannel, DurableStore, FileStore,
    MemoryStore,
};
use trackcore::geo::GeoPoint;
use trackcore::map::{
    lantern_nodes, load_nodes, CameraChange, CameraState, MapEngine, OverlayDiff, OverlaySet,
    StaticNode,
};
use trackcore::prelude::DashboardError;
use trackcore::query::execute_plan;
use trackcore::telemetry::MetricsRecorder;
use trackcore::tracking::PositionSource;
use trackcore::{DashboardSession, SessionSummary};

/// Headless engine that only logs and counts what it is asked to draw.
#[derive(Debug, Default)]
pub struct LogEngine {
    pub pans: usize,
    pub overlay_pushes: usize,
}

impl MapEngine for LogEngine {
    fn pan_to(&mut self, center: GeoPoint) {
        self.pans += 1;
        log::debug!("pan to {:.5},{:.5}", center.latitude, center.longitude);
    }

    fn apply_camera(&mut self, camera: &CameraState) {
        log::debug!(
            "camera tilt {} heading {} zoom {} follow {}",
            camera.tilt(),
            camera.heading(),
            camera.zoom(),
            camera.follow_target
        );
    }

    fn apply_overlays(&mut self, overlays: &OverlaySet, diff: &OverlayDiff) {
        self.overlay_pushes += 1;
        log::debug!(
            "{} overlays (+{} -{} ~{})",
            overlays.len(),
            diff.added.len(),
            diff.removed.len(),
            diff.changed.len()
        );
    }

    fn release(&mut self) {
        log::debug!("headless engine released");
    }
}

/// Outcome of the search step.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Skipped,
    Published { results: usize, highlighted: usize },
    Rejected(String),
    Failed(String),
}

pub struct WorkflowResult {
    pub detections_generated: usize,
    pub search: SearchOutcome,
    pub session: SessionSummary,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn nodes(&self) -> anyhow::Result<Arc<Vec<StaticNode>>> {
        let nodes = match &self.config.nodes_file {
            Some(path) => load_nodes(path)
                .with_context(|| format!("loading nodes from {}", path.display()))?,
            None => lantern_nodes(),
        };
        Ok(Arc::new(nodes))
    }

    pub fn detection_store(&self, nodes: &[StaticNode]) -> anyhow::Result<Arc<DetectionStore>> {
        let detections =
            generate_detections(&self.config.detections, nodes).context("generating detections")?;
        Ok(Arc::new(DetectionStore::new(detections)))
    }

    /// Search, durable publish, then a map session that picks the results up
    /// from the durable slot.
    pub async fn execute(&self) -> anyhow::Result<WorkflowResult> {
        match &self.config.store_dir {
            Some(dir) => {
                let store = FileStore::open(dir)
                    .with_context(|| format!("opening profile store {}", dir.display()))?;
                self.execute_with(Arc::new(store)).await
            }
            None => self.execute_with(Arc::new(MemoryStore::new())).await,
        }
    }

    pub async fn execute_with<S: DurableStore + 'static>(
        &self,
        store: Arc<S>,
    ) -> anyhow::Result<WorkflowResult> {
        let nodes = self.nodes()?;
        let backend = self.detection_store(&nodes)?;
        let metrics = Arc::new(MetricsRecorder::new());

        let channel = DurableChannel::new(Arc::clone(&store));
        let search = self
            .search_and_publish(&backend, &channel, &nodes, &metrics)
            .await?;

        let mut session: DashboardSession<LogEngine> = DashboardSession::mount(
            &self.config.session,
            PositionSource::simulated(&self.config.session.tracking),
            Arc::clone(&nodes),
            store,
            metrics,
        )
        .context("mounting dashboard session")?;
        session
            .surface_mut()
            .on_camera_change(CameraChange::with_engine(LogEngine::default()));
        let summary = session.run_for_updates(self.config.ticks).await;

        Ok(WorkflowResult {
            detections_generated: backend.len(),
            search,
            session: summary,
        })
    }

    /// Runs the configured search the way the search page does and hands the
    /// results over. Validation and transport failures stay here.
    pub async fn search_and_publish<S: DurableStore>(
        &self,
        backend: &DetectionStore,
        channel: &DurableChannel<S>,
        nodes: &[StaticNode],
        metrics: &MetricsRecorder,
    ) -> anyhow::Result<SearchOutcome> {
        if self.config.search.is_empty() {
            return Ok(SearchOutcome::Skipped);
        }
        let plan = match self.config.search.to_form()?.plan() {
            Ok(plan) => plan,
            Err(err) => {
                log::warn!("search rejected: {}", err);
                return Ok(SearchOutcome::Rejected(err.to_string()));
            }
        };
        let results = match execute_plan(&plan, backend).await {
            Ok(results) => results,
            Err(err @ DashboardError::Validation(_)) => {
                metrics.record_search(false);
                return Ok(SearchOutcome::Rejected(err.to_string()));
            }
            Err(err) => {
                metrics.record_search(false);
                log::warn!("search failed: {}", err);
                return Ok(SearchOutcome::Failed(err.to_string()));
            }
        };
        metrics.record_search(true);

        // The search page has its own contexts; the map only sees the slot.
        let producer = DashboardContexts::new();
        let count = results.len();
        let highlights = publish_search_results(results, &producer, channel, nodes)
            .context("publishing search results")?;
        Ok(SearchOutcome::Published {
            results: count,
            highlighted: highlights.len(),
        })
    }
}
