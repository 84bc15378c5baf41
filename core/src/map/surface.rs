use crate::geo::GeoPoint;
use crate::map::camera::{CameraAdjustment, CameraControlPanel, CameraState};
use crate::map::engine::{CameraChange, MapEngine};
use crate::map::nodes::StaticNode;
use crate::map::overlay::{OverlayDiff, OverlayInputs, OverlaySet, PathLayer};
use crate::prelude::{MapConfig, MapProviderConfig};
use crate::query::{Detection, HighlightSet, NetworkResponse, RangeFilter};
use crate::telemetry::LogManager;
use crate::tracking::{Path, Position, TrackingUpdate};
use std::sync::Arc;

/// Whether the map can be shown at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapAvailability {
    Ready,
    Unavailable(String),
}

impl MapAvailability {
    pub fn from_config(config: &MapProviderConfig) -> Self {
        match config.require_key() {
            Ok(_) => MapAvailability::Ready,
            Err(err) => MapAvailability::Unavailable(err.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, MapAvailability::Ready)
    }
}

/// Path layer memoized on path identity.
#[derive(Debug, Default)]
struct PathLayerCache {
    source: Option<Path>,
    layer: Option<Arc<PathLayer>>,
    builds: usize,
}

impl PathLayerCache {
    fn layer_for(&mut self, path: &Path) -> Arc<PathLayer> {
        if let (Some(source), Some(layer)) = (&self.source, &self.layer) {
            if source.same(path) {
                return Arc::clone(layer);
            }
        }
        let layer = Arc::new(PathLayer::from_path(path));
        self.source = Some(path.clone());
        self.layer = Some(Arc::clone(&layer));
        self.builds += 1;
        layer
    }
}

/// Owns the camera and the captured engine, and keeps the engine's overlays
/// in step with the current inputs.
pub struct MapSurface<E: MapEngine> {
    camera: CameraState,
    panel: CameraControlPanel,
    engine: Option<E>,
    config: MapConfig,
    nodes: Arc<Vec<StaticNode>>,
    position: Option<Position>,
    path_layer: Option<Arc<PathLayer>>,
    path_cache: PathLayerCache,
    results: Vec<Detection>,
    highlights: HighlightSet,
    range: Option<RangeFilter>,
    route: Vec<GeoPoint>,
    overlays: OverlaySet,
    logger: LogManager,
}

impl<E: MapEngine> MapSurface<E> {
    pub fn new(nodes: Arc<Vec<StaticNode>>, config: MapConfig) -> Self {
        let camera = CameraState::new(0.0, 0.0, config.initial_zoom, config.follow_target);
        let mut surface = Self {
            camera,
            panel: CameraControlPanel::default(),
            engine: None,
            config,
            nodes,
            position: None,
            path_layer: None,
            path_cache: PathLayerCache::default(),
            results: Vec::new(),
            highlights: HighlightSet::new(),
            range: None,
            route: Vec::new(),
            overlays: OverlaySet::default(),
            logger: LogManager::new("map"),
        };
        surface.reconcile();
        surface
    }

    /// Captures the engine the first time one is offered. Later offers are
    /// dropped so the held instance is never replaced.
    pub fn on_camera_change(&mut self, change: CameraChange<E>) {
        if let Some(engine) = change.engine {
            if self.engine.is_none() {
                self.logger.debug("map engine captured");
                self.engine = Some(engine);
                self.sync_engine();
            }
        }
        if let Some(center) = change.center.filter(GeoPoint::is_finite) {
            self.camera.center = Some(center);
        }
    }

    /// Applies one position update. The first position always sets the
    /// centre; after that the centre moves only while following.
    pub fn on_tracking_update(&mut self, update: &TrackingUpdate) {
        let point = update.position.point();
        let recenter = self.camera.center.is_none() || self.camera.follow_target;
        self.position = Some(update.position);
        self.path_layer = Some(self.path_cache.layer_for(&update.path));
        if recenter {
            self.camera.center = Some(point);
            if let Some(engine) = self.engine.as_mut() {
                engine.pan_to(point);
            }
        }
        self.reconcile();
    }

    pub fn adjust_camera(&mut self, adjustment: CameraAdjustment) {
        let was_following = self.camera.follow_target;
        self.camera.apply(adjustment);
        if self.camera.follow_target && !was_following {
            if let Some(position) = self.position {
                self.camera.center = Some(position.point());
            }
        }
        let camera = self.camera;
        if let Some(engine) = self.engine.as_mut() {
            engine.apply_camera(&camera);
        }
    }

    /// Replaces the result set wholesale.
    pub fn on_results(&mut self, results: Vec<Detection>) {
        self.results = results;
        self.reconcile();
    }

    pub fn on_highlights(&mut self, highlights: HighlightSet) {
        self.highlights = highlights;
        self.reconcile();
    }

    pub fn set_range_filter(&mut self, range: Option<RangeFilter>) {
        self.range = range;
        self.reconcile();
    }

    pub fn on_network(&mut self, network: &NetworkResponse) {
        self.route = network.route_points();
        self.reconcile();
    }

    /// Recomposes every overlay from the current inputs and pushes the result
    /// to the engine when anything moved.
    pub fn reconcile(&mut self) -> OverlayDiff {
        let next = OverlaySet::compose(&OverlayInputs {
            position: self.position.as_ref(),
            path_layer: self.path_layer.as_ref(),
            nodes: &self.nodes,
            results: &self.results,
            highlights: &self.highlights,
            range: self.range.as_ref(),
            route: &self.route,
            fallback: self.config.fallback,
            ring_radius_m: self.config.ring_radius_m,
        });
        let diff = next.diff(&self.overlays);
        self.overlays = next;
        if !diff.is_empty() {
            if let Some(engine) = self.engine.as_mut() {
                engine.apply_overlays(&self.overlays, &diff);
            }
        }
        diff
    }

    /// Hands the engine back after releasing it. The surface keeps its state
    /// but renders nothing until another engine is captured.
    pub fn release(&mut self) -> Option<E> {
        let mut engine = self.engine.take()?;
        engine.release();
        self.logger.debug("map engine released");
        Some(engine)
    }

    fn sync_engine(&mut self) {
        let camera = self.camera;
        let diff = OverlayDiff {
            added: self.overlays.iter().map(|(key, _)| key.clone()).collect(),
            ..OverlayDiff::default()
        };
        if let Some(engine) = self.engine.as_mut() {
            engine.apply_camera(&camera);
            if let Some(center) = camera.center {
                engine.pan_to(center);
            }
            engine.apply_overlays(&self.overlays, &diff);
        }
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn panel(&self) -> &CameraControlPanel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut CameraControlPanel {
        &mut self.panel
    }

    pub fn overlays(&self) -> &OverlaySet {
        &self.overlays
    }

    pub fn nodes(&self) -> &[StaticNode] {
        &self.nodes
    }

    pub fn results(&self) -> &[Detection] {
        &self.results
    }

    pub fn highlights(&self) -> &HighlightSet {
        &self.highlights
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    pub fn path_layer_builds(&self) -> usize {
        self.path_cache.builds
    }
}

impl<E: MapEngine> Drop for MapSurface<E> {
    fn drop(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.release();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::map::overlay::OverlayKey;
    use crate::query::HighlightedNode;

    /// Engine double that records every call it receives.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingEngine {
        pub id: u32,
        pub pans: Vec<GeoPoint>,
        pub cameras: Vec<CameraState>,
        pub overlay_pushes: usize,
        pub last_diff: Option<OverlayDiff>,
        pub released: bool,
    }

    impl RecordingEngine {
        pub fn with_id(id: u32) -> Self {
            Self {
                id,
                ..Self::default()
            }
        }
    }

    impl MapEngine for RecordingEngine {
        fn pan_to(&mut self, center: GeoPoint) {
            self.pans.push(center);
        }

        fn apply_camera(&mut self, camera: &CameraState) {
            self.cameras.push(*camera);
        }

        fn apply_overlays(&mut self, _overlays: &OverlaySet, diff: &OverlayDiff) {
            self.overlay_pushes += 1;
            self.last_diff = Some(diff.clone());
        }

        fn release(&mut self) {
            self.released = true;
        }
    }

    fn surface() -> MapSurface<RecordingEngine> {
        let nodes = vec![
            StaticNode::new("A", 42.0, -71.0),
            StaticNode::new("B", 42.1, -71.1),
        ];
        MapSurface::new(Arc::new(nodes), MapConfig::default())
    }

    fn updates(count: i64) -> Vec<TrackingUpdate> {
        let mut path = Path::with_capacity(10).unwrap();
        (0..count)
            .map(|i| {
                let position = Position::new(42.0 + i as f64 * 0.001, -71.0, i);
                path = path.append(position);
                TrackingUpdate {
                    position,
                    path: path.clone(),
                }
            })
            .collect()
    }

    #[test]
    fn engine_is_captured_once() {
        let mut surface = surface();
        surface.on_camera_change(CameraChange::with_engine(RecordingEngine::with_id(1)));
        surface.on_camera_change(CameraChange::with_engine(RecordingEngine::with_id(2)));
        assert_eq!(surface.engine().map(|e| e.id), Some(1));
    }

    #[test]
    fn following_camera_tracks_latest_position() {
        let mut surface = surface();
        surface.on_camera_change(CameraChange::with_engine(RecordingEngine::default()));
        for update in updates(5) {
            surface.on_tracking_update(&update);
            assert_eq!(surface.camera().center, Some(update.position.point()));
        }
        assert_eq!(surface.engine().map(|e| e.pans.len()), Some(5));
    }

    #[test]
    fn not_following_leaves_centre_alone_after_the_first_position() {
        let mut surface = surface();
        surface.adjust_camera(CameraAdjustment::Follow(false));
        let all = updates(6);
        surface.on_tracking_update(&all[0]);
        let first = surface.camera().center;
        assert_eq!(first, Some(all[0].position.point()));
        for update in &all[1..] {
            surface.on_tracking_update(update);
        }
        assert_eq!(surface.camera().center, first);
        assert_eq!(surface.position(), Some(&all[5].position));
    }

    #[test]
    fn turning_follow_back_on_recenters() {
        let mut surface = surface();
        surface.adjust_camera(CameraAdjustment::Follow(false));
        let all = updates(3);
        for update in &all {
            surface.on_tracking_update(update);
        }
        surface.adjust_camera(CameraAdjustment::ToggleFollow);
        assert_eq!(surface.camera().center, Some(all[2].position.point()));
    }

    #[test]
    fn user_pan_is_kept_while_not_following() {
        let mut surface = surface();
        surface.adjust_camera(CameraAdjustment::Follow(false));
        let all = updates(2);
        surface.on_tracking_update(&all[0]);
        let panned = GeoPoint::new(40.0, -70.0);
        surface.on_camera_change(CameraChange::panned(panned));
        surface.on_tracking_update(&all[1]);
        assert_eq!(surface.camera().center, Some(panned));
    }

    #[test]
    fn path_layer_is_rebuilt_only_on_new_path() {
        let mut surface = surface();
        let all = updates(3);
        surface.on_tracking_update(&all[0]);
        surface.on_tracking_update(&all[0]);
        surface.on_results(Vec::new());
        assert_eq!(surface.path_layer_builds(), 1);
        surface.on_tracking_update(&all[1]);
        assert_eq!(surface.path_layer_builds(), 2);
    }

    #[test]
    fn highlight_transition_removes_stale_ring_from_engine() {
        let mut surface = surface();
        surface.on_camera_change(CameraChange::with_engine(RecordingEngine::default()));
        let set = |ids: &[&str]| -> HighlightSet {
            ids.iter()
                .map(|id| HighlightedNode {
                    id: id.to_string(),
                    position: GeoPoint::new(0.0, 0.0),
                })
                .collect()
        };
        surface.on_highlights(set(&["A", "B"]));
        surface.on_highlights(set(&["B"]));
        let diff = surface.engine().and_then(|e| e.last_diff.clone()).unwrap();
        assert_eq!(diff.removed, vec![OverlayKey::Ring("A".into())]);
        assert!(surface.overlays().contains(&OverlayKey::Ring("B".into())));
    }

    #[test]
    fn identical_results_do_not_push_to_engine() {
        let mut surface = surface();
        surface.on_camera_change(CameraChange::with_engine(RecordingEngine::default()));
        let results = vec![Detection {
            id: "1".into(),
            latitude: Some(42.0),
            longitude: Some(-71.0),
            ..Default::default()
        }];
        surface.on_results(results.clone());
        let pushes = surface.engine().map(|e| e.overlay_pushes);
        surface.on_results(results);
        assert_eq!(surface.engine().map(|e| e.overlay_pushes), pushes);
    }

    #[test]
    fn release_hands_back_a_released_engine() {
        let mut surface = surface();
        surface.on_camera_change(CameraChange::with_engine(RecordingEngine::default()));
        let engine = surface.release().unwrap();
        assert!(engine.released);
        assert!(!surface.has_engine());
        assert!(surface.release().is_none());
    }

    #[test]
    fn missing_credential_reports_unavailable() {
        let availability = MapAvailability::from_config(&MapProviderConfig::default());
        assert!(matches!(availability, MapAvailability::Unavailable(_)));
        let ready = MapAvailability::from_config(&MapProviderConfig {
            api_key: Some("key".into()),
            map_id: None,
        });
        assert!(ready.is_ready());
    }
}
