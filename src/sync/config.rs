use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on a single mirror round trip
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Mirror sync configuration (`[sync]` in config.toml)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SyncConfig {
    /// Whether sync is enabled
    pub enabled: bool,
    /// Mirror base URL (e.g., "https://sync.example.workers.dev")
    pub base_url: String,
    /// Per-request timeout in seconds; startup never waits longer than this
    /// for a pull
    pub timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SyncConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Enabled and pointing somewhere
    pub fn is_active(&self) -> bool {
        self.enabled && !self.base_url.trim().is_empty()
    }
}

/// What a pull did to the local value of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PullOutcome {
    /// Remote snapshot replaced the local value
    Applied { records: usize },
    /// Mirror had nothing (or could not be reached)
    Absent,
    /// Mirror returned something that is not a JSON array; local kept
    Malformed,
    /// Mirror did not answer in time; local kept
    TimedOut,
}

impl PullOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Result of a sync operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    /// Keys whose local value was replaced by the remote one
    pub keys_pulled: Vec<String>,
    /// Keys successfully saved to the mirror
    pub keys_pushed: Vec<String>,
    /// Keys where the mirror call failed or timed out
    pub keys_failed: Vec<String>,
    /// Duration of sync in milliseconds
    pub duration_ms: u64,
}

impl SyncResult {
    pub fn success(&self) -> bool {
        self.keys_failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert!(!config.is_active());
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_active_requires_url() {
        let config = SyncConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(!config.is_active());

        let config = SyncConfig {
            enabled: true,
            base_url: "https://mirror.example".into(),
            timeout_secs: 0,
        };
        assert!(config.is_active());
        assert_eq!(config.timeout(), Duration::from_secs(1));
    }
}
