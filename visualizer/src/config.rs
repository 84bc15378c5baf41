use std::path::PathBuf;
use std::time::Duration;
use trackcore::bridge::MIN_POLL_INTERVAL;
use trackcore::prelude::{MapConfig, MapProviderConfig, PollConfig, TrackingConfig};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:9000";
pub const DEFAULT_STORE_DIR: &str = ".dashboard-profile";

/// Environment-driven settings for the dashboard window.
#[derive(Debug, Clone)]
pub struct VisualizerConfig {
    pub api_url: String,
    pub store_dir: PathBuf,
    pub nodes_file: Option<PathBuf>,
    pub tracking: TrackingConfig,
    pub poll: PollConfig,
    pub map: MapConfig,
    pub provider: MapProviderConfig,
    /// Settings that were present but unusable, already replaced by defaults.
    pub warnings: Vec<String>,
}

impl VisualizerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();
        let mut millis = |key: &str, default: u64, minimum: u64| -> u64 {
            let Some(raw) = lookup(key) else {
                return default;
            };
            match raw.trim().parse::<u64>() {
                Ok(value) if value >= minimum => value,
                Ok(value) => {
                    warnings.push(format!(
                        "{key}={value} is below the {minimum}ms minimum; using {default}ms"
                    ));
                    default
                }
                Err(_) => {
                    warnings.push(format!("{key}='{raw}' is not a number; using {default}ms"));
                    default
                }
            }
        };

        let poll = PollConfig {
            interval_ms: millis(
                "DASHBOARD_POLL_MS",
                PollConfig::default().interval_ms,
                MIN_POLL_INTERVAL.as_millis() as u64,
            ),
        };
        let tracking = TrackingConfig {
            emit_interval_ms: millis(
                "DASHBOARD_EMIT_MS",
                TrackingConfig::default().emit_interval_ms,
                1,
            ),
            ..TrackingConfig::default()
        };

        Self {
            api_url: lookup("DASHBOARD_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()),
            store_dir: lookup("DASHBOARD_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR)),
            nodes_file: lookup("DASHBOARD_NODES_FILE").map(PathBuf::from),
            tracking,
            poll,
            map: MapConfig::default(),
            provider: MapProviderConfig {
                api_key: lookup("DASHBOARD_MAP_KEY").filter(|key| !key.trim().is_empty()),
                map_id: lookup("DASHBOARD_MAP_ID"),
            },
            warnings,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.tracking.emit_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> VisualizerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        VisualizerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let cfg = config(&[]);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert_eq!(cfg.poll_interval(), Duration::from_secs(6));
        assert_eq!(cfg.emit_interval(), Duration::from_secs(1));
        assert!(cfg.provider.api_key.is_none());
        assert!(cfg.warnings.is_empty());
    }

    #[test]
    fn poll_interval_below_a_second_falls_back() {
        let cfg = config(&[("DASHBOARD_POLL_MS", "200"), ("DASHBOARD_EMIT_MS", "soon")]);
        assert_eq!(cfg.poll.interval_ms, 6000);
        assert_eq!(cfg.tracking.emit_interval_ms, 1000);
        assert_eq!(cfg.warnings.len(), 2);
    }

    #[test]
    fn explicit_values_are_used() {
        let cfg = config(&[
            ("DASHBOARD_API_URL", "http://backend:8080"),
            ("DASHBOARD_POLL_MS", "2000"),
            ("DASHBOARD_MAP_KEY", "abc"),
        ]);
        assert_eq!(cfg.api_url, "http://backend:8080");
        assert_eq!(cfg.poll.interval_ms, 2000);
        assert_eq!(cfg.provider.api_key.as_deref(), Some("abc"));
    }
}
