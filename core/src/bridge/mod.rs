//! Carries search results from the surfaces that produce them to the map.
//!
//! Two routes exist: in-memory contexts for surfaces mounted at the same time,
//! and a durable slot polled by the map for surfaces that are not.

pub mod context;
pub mod durable;
pub mod preference;

pub use context::{ContextReader, DashboardContexts, SharedContext};
pub use durable::{
    ChannelPoller, ChannelRead, DurableChannel, DurableStore, FileStore, MemoryStore,
    PollOutcome, APPLICATION_KEY, MIN_POLL_INTERVAL, SEARCH_RESULTS_KEY,
};
pub use preference::{ApplicationMode, PreferenceSlot};

use crate::map::StaticNode;
use crate::prelude::DashboardResult;
use crate::query::{Detection, HighlightSet};
use crate::telemetry::LogManager;

/// Hands a completed search to the map: contexts first, then the durable
/// slot. The previous result set is replaced in both. A storage failure is
/// returned after the contexts were already updated.
pub fn publish_search_results<S: DurableStore>(
    detections: Vec<Detection>,
    contexts: &DashboardContexts,
    channel: &DurableChannel<S>,
    nodes: &[StaticNode],
) -> DashboardResult<HighlightSet> {
    let highlights = HighlightSet::from_detections(&detections, nodes);
    let count = detections.len();
    contexts.results.set(detections.clone());
    contexts.highlights.set(highlights.clone());
    channel.publish(&detections)?;
    LogManager::new("bridge").record(&format!(
        "published {count} search results ({} highlighted nodes)",
        highlights.len()
    ));
    Ok(highlights)
}
