use crate::geo::GeoPoint;
use crate::prelude::{DashboardResult, TrackingConfig};
use crate::task::TimerHandle;
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::tracking::path::{Path, PathAccumulator};
use crate::tracking::position::{now_millis, Position};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// One emission of the position stream: the new sample and the path that
/// now ends with it.
#[derive(Debug, Clone)]
pub struct TrackingUpdate {
    pub position: Position,
    pub path: Path,
}

/// Bounded random perturbation used for the simulated feed.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    rng: StdRng,
    half_step: f64,
}

impl RandomWalk {
    pub fn new(max_step_deg: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            half_step: (max_step_deg / 2.0).abs(),
        }
    }

    pub fn from_config(config: &TrackingConfig) -> Self {
        Self::new(config.max_step_deg, config.seed)
    }

    pub fn step(&mut self, previous: &Position, now_ms: i64) -> Position {
        let d_lat = self.rng.gen_range(-self.half_step..=self.half_step);
        let d_lon = self.rng.gen_range(-self.half_step..=self.half_step);
        Position::new(
            previous.latitude + d_lat,
            previous.longitude + d_lon,
            previous.next_timestamp(now_ms),
        )
    }
}

/// Where new positions come from.
pub enum PositionSource {
    /// Random walk advanced once per `interval`.
    Simulated { walk: RandomWalk, interval: Duration },
    /// Externally reported positions, emitted as they arrive.
    Live(mpsc::Receiver<GeoPoint>),
}

impl PositionSource {
    pub fn simulated(config: &TrackingConfig) -> Self {
        PositionSource::Simulated {
            walk: RandomWalk::from_config(config),
            interval: Duration::from_millis(config.emit_interval_ms.max(1)),
        }
    }
}

enum Feed {
    Simulated { walk: RandomWalk, ticker: Interval },
    Live(mpsc::Receiver<GeoPoint>),
}

impl Feed {
    fn start(source: PositionSource) -> Self {
        match source {
            PositionSource::Simulated { walk, interval: period } => {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Feed::Simulated { walk, ticker }
            }
            PositionSource::Live(rx) => Feed::Live(rx),
        }
    }

    async fn next(&mut self, previous: &Position) -> Option<Position> {
        match self {
            Feed::Simulated { walk, ticker } => {
                ticker.tick().await;
                Some(walk.step(previous, now_millis()))
            }
            Feed::Live(rx) => {
                let point = rx.recv().await?;
                Some(Position::at(point, previous.next_timestamp(now_millis())))
            }
        }
    }
}

/// Starts the position emitter.
///
/// The simulated source emits immediately and then once per interval; the
/// live source emits once per reported point. Updates are sent in emission
/// order on `updates`. The loop ends when the handle is cancelled or dropped,
/// when the live feed closes, or when the consumer goes away.
pub fn spawn_emitter(
    source: PositionSource,
    initial: Position,
    capacity: usize,
    updates: mpsc::Sender<TrackingUpdate>,
    metrics: Arc<MetricsRecorder>,
) -> DashboardResult<TimerHandle> {
    let mut accumulator = PathAccumulator::seeded(capacity, initial)?;
    let logger = LogManager::new("tracking");

    Ok(TimerHandle::spawn("position-emitter", move |cancel| async move {
        let mut feed = Feed::start(source);
        let mut current = initial;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = feed.next(&current) => next,
            };
            let Some(position) = next else {
                logger.record("live position feed closed");
                break;
            };

            current = position;
            let update = TrackingUpdate {
                position,
                path: accumulator.push(position).clone(),
            };
            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                sent = updates.send(update) => sent.is_ok(),
            };
            if !delivered {
                logger.record("position consumer dropped; stopping emitter");
                break;
            }
            metrics.record_emitted();
        }
    }))
}
