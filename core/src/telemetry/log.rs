use log::{debug, info, warn};

/// Component-scoped logger; every message is tagged with the component name
/// as its log target.
#[derive(Debug, Clone, Copy)]
pub struct LogManager {
    component: &'static str,
}

impl LogManager {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn record(&self, message: &str) {
        info!(target: self.component, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(target: self.component, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        debug!(target: self.component, "{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("trackcore")
    }
}
