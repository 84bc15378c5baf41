use std::sync::Mutex;

/// Counters for the live parts of the dashboard.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub emitted: usize,
    pub polls: usize,
    pub updates_applied: usize,
    pub parse_failures: usize,
    pub searches_completed: usize,
    pub searches_failed: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn bump(&self, field: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            field(&mut metrics);
        }
    }

    pub fn record_emitted(&self) {
        self.bump(|m| m.emitted += 1);
    }

    pub fn record_poll(&self) {
        self.bump(|m| m.polls += 1);
    }

    pub fn record_update_applied(&self) {
        self.bump(|m| m.updates_applied += 1);
    }

    pub fn record_parse_failure(&self) {
        self.bump(|m| m.parse_failures += 1);
    }

    pub fn record_search(&self, succeeded: bool) {
        self.bump(|m| {
            if succeeded {
                m.searches_completed += 1;
            } else {
                m.searches_failed += 1;
            }
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
