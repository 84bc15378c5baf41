use crate::bridge::context::DashboardContexts;
use crate::map::StaticNode;
use crate::prelude::{DashboardError, DashboardResult};
use crate::query::{Detection, HighlightSet};
use crate::task::TimerHandle;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

pub const SEARCH_RESULTS_KEY: &str = "vehicleSearchResults";
pub const APPLICATION_KEY: &str = "selectedApplication";

/// Shortest poll interval the channel accepts.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Persistent string slots that outlive any one dashboard session.
pub trait DurableStore: Send + Sync {
    fn get(&self, key: &str) -> DashboardResult<Option<String>>;

    /// Replaces whatever the slot held.
    fn set(&self, key: &str, value: &str) -> DashboardResult<()>;

    fn remove(&self, key: &str) -> DashboardResult<()>;
}

/// One file per key under a profile directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> DashboardResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> DashboardResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(DashboardError::Validation(format!(
                "'{key}' is not a usable storage key"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DurableStore for FileStore {
    fn get(&self, key: &str) -> DashboardResult<Option<String>> {
        match fs::read_to_string(self.slot_path(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> DashboardResult<()> {
        let target = self.slot_path(key)?;
        let staging = self.dir.join(format!(".{key}.tmp"));
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&staging, &target)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> DashboardResult<()> {
        match fs::remove_file(self.slot_path(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> DashboardResult<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.slots
            .lock()
            .map_err(|_| DashboardError::Storage("memory store lock poisoned".into()))
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> DashboardResult<Option<String>> {
        Ok(self.slots()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DashboardResult<()> {
        self.slots()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DashboardResult<()> {
        self.slots()?.remove(key);
        Ok(())
    }
}

/// Result of reading the search-results slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelRead {
    Absent,
    Parsed(Vec<Detection>),
    Malformed(String),
}

impl ChannelRead {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => ChannelRead::Absent,
            Some(raw) => match serde_json::from_str::<Vec<Detection>>(raw) {
                Ok(detections) => ChannelRead::Parsed(detections),
                Err(err) => ChannelRead::Malformed(err.to_string()),
            },
        }
    }
}

/// The search-results slot: one JSON array of detections, overwritten per
/// completed search.
#[derive(Debug)]
pub struct DurableChannel<S> {
    store: Arc<S>,
    key: &'static str,
}

impl<S> Clone for DurableChannel<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key,
        }
    }
}

impl<S: DurableStore> DurableChannel<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_key(store, SEARCH_RESULTS_KEY)
    }

    pub fn with_key(store: Arc<S>, key: &'static str) -> Self {
        Self { store, key }
    }

    pub fn publish(&self, detections: &[Detection]) -> DashboardResult<()> {
        let payload = serde_json::to_string(detections)?;
        self.store.set(self.key, &payload)
    }

    pub fn read_raw(&self) -> DashboardResult<Option<String>> {
        self.store.get(self.key)
    }

    pub fn read(&self) -> DashboardResult<ChannelRead> {
        Ok(ChannelRead::parse(self.read_raw()?.as_deref()))
    }

    pub fn clear(&self) -> DashboardResult<()> {
        self.store.remove(self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Same payload as the previous poll; nothing touched.
    Unchanged,
    /// A new result set of this many detections was written to the contexts.
    Applied(usize),
    /// The slot could not be used; the previous results stay in place.
    Retained(String),
}

/// Re-reads the durable channel and forwards new result sets into the
/// in-memory contexts.
pub struct ChannelPoller<S> {
    channel: DurableChannel<S>,
    contexts: DashboardContexts,
    nodes: Arc<Vec<StaticNode>>,
    last_seen: Option<Option<String>>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S: DurableStore + 'static> ChannelPoller<S> {
    pub fn new(
        channel: DurableChannel<S>,
        contexts: DashboardContexts,
        nodes: Arc<Vec<StaticNode>>,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            channel,
            contexts,
            nodes,
            last_seen: None,
            metrics,
            logger: LogManager::new("bridge"),
        }
    }

    /// An absent slot counts as an empty result set. A malformed payload is
    /// logged once and leaves the contexts untouched.
    pub fn poll_once(&mut self) -> PollOutcome {
        self.metrics.record_poll();
        let raw = match self.channel.read_raw() {
            Ok(raw) => raw,
            Err(err) => {
                self.logger
                    .warn(&format!("could not read stored search results: {err}"));
                return PollOutcome::Retained(err.to_string());
            }
        };
        if self.last_seen.as_ref() == Some(&raw) {
            return PollOutcome::Unchanged;
        }

        let detections = match ChannelRead::parse(raw.as_deref()) {
            ChannelRead::Absent => Vec::new(),
            ChannelRead::Parsed(detections) => detections,
            ChannelRead::Malformed(reason) => {
                self.metrics.record_parse_failure();
                self.logger.warn(&format!(
                    "stored search results are malformed, keeping previous results: {reason}"
                ));
                self.last_seen = Some(raw);
                return PollOutcome::Retained(reason);
            }
        };
        self.last_seen = Some(raw);

        let count = detections.len();
        let highlights = HighlightSet::from_detections(&detections, &self.nodes);
        self.contexts.results.set(detections);
        self.contexts.highlights.set(highlights);
        self.metrics.record_update_applied();
        self.logger
            .debug(&format!("applied {count} stored search results"));
        PollOutcome::Applied(count)
    }

    /// Polls immediately and then once per `period` until the handle is
    /// stopped or dropped.
    pub fn spawn(mut self, period: Duration) -> DashboardResult<TimerHandle> {
        if period < MIN_POLL_INTERVAL {
            return Err(DashboardError::Configuration(format!(
                "poll interval {}ms is below the {}ms minimum",
                period.as_millis(),
                MIN_POLL_INTERVAL.as_millis()
            )));
        }
        Ok(TimerHandle::spawn("channel-poller", move |cancel| async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.poll_once();
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn detection(id: &str, location: &str) -> Detection {
        Detection {
            id: id.into(),
            location: location.into(),
            latitude: Some(42.0),
            longitude: Some(-71.0),
            ..Default::default()
        }
    }

    fn poller(store: Arc<MemoryStore>) -> (ChannelPoller<MemoryStore>, DashboardContexts) {
        let contexts = DashboardContexts::new();
        let nodes = Arc::new(vec![StaticNode::new("Lantern 1", 42.0, -71.0)]);
        let poller = ChannelPoller::new(
            DurableChannel::new(store),
            contexts.clone(),
            nodes,
            Arc::new(MetricsRecorder::new()),
        );
        (poller, contexts)
    }

    #[test]
    fn file_store_round_trips_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(SEARCH_RESULTS_KEY).unwrap(), None);
        store.set(SEARCH_RESULTS_KEY, "[]").unwrap();
        store.set(SEARCH_RESULTS_KEY, "[1]").unwrap();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(SEARCH_RESULTS_KEY).unwrap().as_deref(), Some("[1]"));
        reopened.remove(SEARCH_RESULTS_KEY).unwrap();
        reopened.remove(SEARCH_RESULTS_KEY).unwrap();
        assert_eq!(reopened.get(SEARCH_RESULTS_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(DashboardError::Validation(_))
        ));
    }

    #[test]
    fn absent_slot_is_an_empty_result_set() {
        let (mut poller, contexts) = poller(Arc::new(MemoryStore::new()));
        assert_eq!(poller.poll_once(), PollOutcome::Applied(0));
        assert!(contexts.results.get().is_empty());
    }

    #[test]
    fn same_payload_twice_yields_identical_state() {
        let store = Arc::new(MemoryStore::new());
        let channel = DurableChannel::new(Arc::clone(&store));
        let (mut poller, contexts) = poller(store);
        let results = vec![detection("1", "Lantern 1")];

        channel.publish(&results).unwrap();
        assert_eq!(poller.poll_once(), PollOutcome::Applied(1));
        let first = (contexts.results.get(), contexts.highlights.get());

        channel.publish(&results).unwrap();
        assert_eq!(poller.poll_once(), PollOutcome::Unchanged);
        assert_eq!((contexts.results.get(), contexts.highlights.get()), first);
        assert!(first.1.contains("Lantern 1"));
    }

    #[test]
    fn malformed_payload_keeps_previous_results() {
        let store = Arc::new(MemoryStore::new());
        let channel = DurableChannel::new(Arc::clone(&store));
        let (mut poller, contexts) = poller(Arc::clone(&store));
        channel.publish(&[detection("1", "Lantern 1")]).unwrap();
        poller.poll_once();

        store.set(SEARCH_RESULTS_KEY, "{not json").unwrap();
        assert!(matches!(poller.poll_once(), PollOutcome::Retained(_)));
        assert_eq!(contexts.results.get().len(), 1);
        assert_eq!(poller.poll_once(), PollOutcome::Unchanged);
    }

    #[test]
    fn publish_overwrites_instead_of_merging() {
        let channel = DurableChannel::new(Arc::new(MemoryStore::new()));
        channel.publish(&[detection("1", "a"), detection("2", "b")]).unwrap();
        channel.publish(&[detection("3", "c")]).unwrap();
        match channel.read().unwrap() {
            ChannelRead::Parsed(detections) => {
                assert_eq!(detections.len(), 1);
                assert_eq!(detections[0].id, "3");
            }
            other => panic!("unexpected read {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn poll_interval_below_one_second_is_rejected() {
        let (poller, _) = poller(Arc::new(MemoryStore::new()));
        let err = poller.spawn(Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_poller_picks_up_writes_and_stops_on_drop() {
        let store = Arc::new(MemoryStore::new());
        let channel = DurableChannel::new(Arc::clone(&store));
        let (poller, contexts) = poller(store);
        let mut reader = contexts.results.subscribe();
        let handle = poller.spawn(Duration::from_secs(6)).unwrap();

        channel.publish(&[detection("1", "Lantern 1")]).unwrap();
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(reader.take_update().map(|r| r.len()), Some(1));

        drop(handle);
        channel.publish(&[]).unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(reader.take_update(), None);
    }
}
