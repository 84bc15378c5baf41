use crate::bridge::{ChannelPoller, ContextReader, DashboardContexts, DurableChannel, DurableStore};
use crate::map::{CameraState, MapEngine, MapSurface, Overlay, OverlayKey, StaticNode};
use crate::prelude::{DashboardResult, MapConfig, PollConfig, TrackingConfig};
use crate::query::{Detection, HighlightSet};
use crate::task::TimerHandle;
use crate::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use crate::tracking::{
    now_millis, spawn_emitter, PathAccumulator, Position, PositionSource, TrackingUpdate,
};
use serde::{Deserialize, Serialize};
use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const UPDATE_BUFFER: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tracking: TrackingConfig,
    pub poll: PollConfig,
    pub map: MapConfig,
}

/// What a session did between mount and teardown.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub updates_applied: usize,
    pub result_sets_applied: usize,
    pub highlight_sets_applied: usize,
    pub path_len: usize,
    pub camera: CameraState,
    pub overlay_count: usize,
    pub unplaced: usize,
    pub engine_released: bool,
    pub metrics: MetricsSnapshot,
}

/// A mounted map dashboard: the surface plus the two timers that feed it.
///
/// Both timers start in [`mount`](Self::mount) and are stopped by
/// [`teardown`](Self::teardown); dropping the session stops them too.
pub struct DashboardSession<E: MapEngine> {
    surface: MapSurface<E>,
    contexts: DashboardContexts,
    results: ContextReader<Vec<Detection>>,
    highlights: ContextReader<HighlightSet>,
    updates: mpsc::Receiver<TrackingUpdate>,
    emitter: Option<TimerHandle>,
    poller: Option<TimerHandle>,
    metrics: Arc<MetricsRecorder>,
    counts: Counts,
    logger: LogManager,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counts {
    updates: usize,
    results: usize,
    highlights: usize,
}

impl<E: MapEngine> DashboardSession<E> {
    pub fn mount<S: DurableStore + 'static>(
        config: &SessionConfig,
        source: PositionSource,
        nodes: Arc<Vec<StaticNode>>,
        store: Arc<S>,
        metrics: Arc<MetricsRecorder>,
    ) -> DashboardResult<Self> {
        config.tracking.validate()?;
        let logger = LogManager::new("session");
        let contexts = DashboardContexts::new();
        let results = contexts.results.subscribe();
        let highlights = contexts.highlights.subscribe();

        let (tx, updates) = mpsc::channel(UPDATE_BUFFER);
        let initial = Position::at(config.tracking.initial, now_millis());
        let seed = PathAccumulator::seeded(config.tracking.path_capacity, initial)?;
        let mut surface = MapSurface::new(Arc::clone(&nodes), config.map.clone());
        // The camera starts on the first known position, before any emission.
        surface.on_tracking_update(&TrackingUpdate {
            position: initial,
            path: seed.path().clone(),
        });
        let emitter = spawn_emitter(
            source,
            initial,
            config.tracking.path_capacity,
            tx,
            Arc::clone(&metrics),
        )?;
        let poller = ChannelPoller::new(
            DurableChannel::new(store),
            contexts.clone(),
            Arc::clone(&nodes),
            Arc::clone(&metrics),
        )
        .spawn(Duration::from_millis(config.poll.interval_ms))?;

        logger.record(&format!(
            "dashboard mounted with {} static nodes, polling every {}ms",
            nodes.len(),
            config.poll.interval_ms
        ));
        Ok(Self {
            surface,
            contexts,
            results,
            highlights,
            updates,
            emitter: Some(emitter),
            poller: Some(poller),
            metrics,
            counts: Counts::default(),
            logger,
        })
    }

    /// Contexts a search surface mounted next to the map can write to.
    pub fn contexts(&self) -> &DashboardContexts {
        &self.contexts
    }

    pub fn surface(&self) -> &MapSurface<E> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut MapSurface<E> {
        &mut self.surface
    }

    /// Applies updates until `shutdown` resolves or the position stream ends,
    /// then tears down.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) -> SessionSummary {
        self.drive(shutdown, None).await;
        self.teardown().await
    }

    /// Like [`run`](Self::run) but also stops after `count` position updates.
    pub async fn run_for_updates(mut self, count: usize) -> SessionSummary {
        self.drive(pending::<()>(), Some(count)).await;
        self.teardown().await
    }

    async fn drive<F: Future<Output = ()>>(&mut self, shutdown: F, limit: Option<usize>) {
        tokio::pin!(shutdown);
        loop {
            if limit.is_some_and(|limit| self.counts.updates >= limit) {
                break;
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                update = self.updates.recv() => match update {
                    Some(update) => {
                        self.surface.on_tracking_update(&update);
                        self.counts.updates += 1;
                    }
                    None => {
                        self.logger.record("position stream ended");
                        break;
                    }
                },
                Some(results) = self.results.changed() => {
                    self.surface.on_results(results);
                    self.counts.results += 1;
                }
                Some(highlights) = self.highlights.changed() => {
                    self.surface.on_highlights(highlights);
                    self.counts.highlights += 1;
                }
            }
        }
        self.flush_contexts();
    }

    /// Applies context writes that landed after the last loop iteration.
    fn flush_contexts(&mut self) {
        if let Some(results) = self.results.take_update() {
            self.surface.on_results(results);
            self.counts.results += 1;
        }
        if let Some(highlights) = self.highlights.take_update() {
            self.surface.on_highlights(highlights);
            self.counts.highlights += 1;
        }
    }

    /// Stops both timers and releases the engine.
    pub async fn teardown(mut self) -> SessionSummary {
        if let Some(emitter) = self.emitter.take() {
            emitter.stop().await;
        }
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
        let engine_released = self.surface.release().is_some();
        self.logger.record("dashboard torn down");

        SessionSummary {
            updates_applied: self.counts.updates,
            result_sets_applied: self.counts.results,
            highlight_sets_applied: self.counts.highlights,
            path_len: self
                .surface
                .overlays()
                .get(&OverlayKey::Path)
                .map(|overlay| match overlay {
                    Overlay::PathLine(layer) => layer.vertices.len(),
                    _ => 0,
                })
                .unwrap_or(0),
            camera: *self.surface.camera(),
            overlay_count: self.surface.overlays().len(),
            unplaced: self.surface.overlays().unplaced().len(),
            engine_released,
            metrics: self.metrics.snapshot(),
        }
    }
}
