use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::storage::{FlatStore, FlatStoreError};

use super::config::{PullOutcome, SyncResult};
use super::mirror::RemoteMirror;

/// Whole-snapshot, last-writer-wins reconciliation between the local flat
/// store and the remote mirror.
///
/// A pull replaces the local value of a key with the remote one when the
/// remote one is a JSON array; a push sends the full local value. Nothing is
/// merged: if two devices edit between one pull and the next push, the later
/// push wins entirely.
pub struct SyncReconciler {
    mirror: Arc<dyn RemoteMirror>,
    flat_store: FlatStore,
    timeout: Duration,
}

impl SyncReconciler {
    pub fn new(mirror: Arc<dyn RemoteMirror>, flat_store: FlatStore, timeout: Duration) -> Self {
        Self {
            mirror,
            flat_store,
            timeout,
        }
    }

    /// Fetch `key` from the mirror and, if it is well formed, overwrite the
    /// local value. Only a local write failure is an error.
    pub async fn pull(&self, key: &str) -> Result<PullOutcome, FlatStoreError> {
        let remote = match tokio::time::timeout(self.timeout, self.mirror.load(key)).await {
            Ok(Some(remote)) => remote,
            Ok(None) => return Ok(PullOutcome::Absent),
            Err(_) => {
                log::warn!(
                    "Sync: pull of {:?} timed out after {:?}, keeping local state",
                    key,
                    self.timeout
                );
                return Ok(PullOutcome::TimedOut);
            }
        };

        let records = match serde_json::from_str::<Vec<serde_json::Value>>(&remote) {
            Ok(records) => records.len(),
            Err(e) => {
                log::warn!("Sync: remote {:?} is not a JSON array ({}), keeping local state", key, e);
                return Ok(PullOutcome::Malformed);
            }
        };

        self.flat_store.set(key, &remote)?;
        log::info!("Sync: pulled {:?} ({} records)", key, records);
        Ok(PullOutcome::Applied { records })
    }

    /// Send `value` for `key` to the mirror. Best effort.
    pub async fn push(&self, key: &str, value: &str) -> bool {
        match tokio::time::timeout(self.timeout, self.mirror.save(key, value)).await {
            Ok(true) => {
                log::debug!("Sync: pushed {:?} ({} bytes)", key, value.len());
                true
            }
            Ok(false) => false,
            Err(_) => {
                log::warn!("Sync: push of {:?} timed out after {:?}", key, self.timeout);
                false
            }
        }
    }

    /// Push the current local value of `key`, if any.
    pub async fn push_local(&self, key: &str) -> Result<bool, FlatStoreError> {
        match self.flat_store.get(key)? {
            Some(value) => Ok(self.push(key, &value).await),
            None => Ok(false),
        }
    }

    /// Pull every key. Keys are independent; one failing does not stop the
    /// others.
    pub async fn pull_all(&self, keys: &[&str]) -> Result<SyncResult, FlatStoreError> {
        let start = Instant::now();
        let mut result = SyncResult::default();

        for key in keys {
            match self.pull(key).await? {
                PullOutcome::Applied { .. } => result.keys_pulled.push(key.to_string()),
                PullOutcome::Absent => {}
                PullOutcome::Malformed | PullOutcome::TimedOut => {
                    result.keys_failed.push(key.to_string())
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Push the local value of every key.
    pub async fn push_all(&self, keys: &[&str]) -> Result<SyncResult, FlatStoreError> {
        let start = Instant::now();
        let mut result = SyncResult::default();

        for key in keys {
            if self.flat_store.get(key)?.is_none() {
                continue;
            }
            if self.push_local(key).await? {
                result.keys_pushed.push(key.to_string());
            } else {
                result.keys_failed.push(key.to_string());
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-process mirror double
    #[derive(Default)]
    pub(crate) struct MemoryMirror {
        pub values: Mutex<HashMap<String, String>>,
        pub saves: Mutex<Vec<String>>,
        pub offline: bool,
        pub delay: Option<Duration>,
    }

    impl MemoryMirror {
        pub(crate) fn with(key: &str, value: &str) -> Self {
            let mirror = Self::default();
            mirror
                .values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            mirror
        }

        pub(crate) fn get(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        pub(crate) fn save_count(&self) -> usize {
            self.saves.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl RemoteMirror for MemoryMirror {
        async fn save(&self, key: &str, value: &str) -> bool {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.offline {
                return false;
            }
            self.saves.lock().unwrap().push(key.to_string());
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            true
        }

        async fn load(&self, key: &str) -> Option<String> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.offline {
                return None;
            }
            self.get(key)
        }
    }

    fn create_test_reconciler(mirror: Arc<MemoryMirror>) -> (SyncReconciler, FlatStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let flat = FlatStore::new(temp_dir.path().join("kv"));
        let reconciler = SyncReconciler::new(mirror, flat.clone(), Duration::from_millis(200));
        (reconciler, flat, temp_dir)
    }

    #[tokio::test]
    async fn test_pull_overwrites_local() {
        let mirror = Arc::new(MemoryMirror::with("ll_srs_v1", r#"[{"front":"a"},{"front":"b"}]"#));
        let (reconciler, flat, _temp) = create_test_reconciler(mirror);
        flat.set("ll_srs_v1", r#"[{"front":"local"}]"#).unwrap();

        let outcome = reconciler.pull("ll_srs_v1").await.unwrap();
        assert_eq!(outcome, PullOutcome::Applied { records: 2 });
        assert_eq!(
            flat.get("ll_srs_v1").unwrap().as_deref(),
            Some(r#"[{"front":"a"},{"front":"b"}]"#)
        );
    }

    #[tokio::test]
    async fn test_pull_keeps_local_on_malformed() {
        let mirror = Arc::new(MemoryMirror::with("ll_srs_v1", r#"{"front":"a"}"#));
        let (reconciler, flat, _temp) = create_test_reconciler(mirror);
        flat.set("ll_srs_v1", "[]").unwrap();

        let outcome = reconciler.pull("ll_srs_v1").await.unwrap();
        assert_eq!(outcome, PullOutcome::Malformed);
        assert_eq!(flat.get("ll_srs_v1").unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_pull_absent_and_offline() {
        let (reconciler, flat, _temp) = create_test_reconciler(Arc::new(MemoryMirror::default()));
        assert_eq!(reconciler.pull("ll_srs_v1").await.unwrap(), PullOutcome::Absent);
        assert_eq!(flat.get("ll_srs_v1").unwrap(), None);

        let offline = MemoryMirror {
            offline: true,
            ..MemoryMirror::with("ll_srs_v1", "[]")
        };
        let (reconciler, _flat, _temp) = create_test_reconciler(Arc::new(offline));
        assert_eq!(reconciler.pull("ll_srs_v1").await.unwrap(), PullOutcome::Absent);
    }

    #[tokio::test]
    async fn test_pull_times_out() {
        let slow = MemoryMirror {
            delay: Some(Duration::from_secs(5)),
            ..MemoryMirror::with("ll_srs_v1", "[]")
        };
        let (reconciler, flat, _temp) = create_test_reconciler(Arc::new(slow));
        flat.set("ll_srs_v1", "[1]").unwrap();

        let outcome = reconciler.pull("ll_srs_v1").await.unwrap();
        assert_eq!(outcome, PullOutcome::TimedOut);
        assert_eq!(flat.get("ll_srs_v1").unwrap().as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_push_and_push_all() {
        let mirror = Arc::new(MemoryMirror::default());
        let (reconciler, flat, _temp) = create_test_reconciler(Arc::clone(&mirror));

        assert!(reconciler.push("ll_favs_v1", "[]").await);
        assert_eq!(mirror.get("ll_favs_v1").as_deref(), Some("[]"));

        flat.set("ll_srs_v1", "[3]").unwrap();
        let result = reconciler.push_all(&["ll_srs_v1", "ll_missing"]).await.unwrap();
        assert_eq!(result.keys_pushed, vec!["ll_srs_v1".to_string()]);
        assert!(result.success());
        assert_eq!(mirror.get("ll_srs_v1").as_deref(), Some("[3]"));
    }

    #[tokio::test]
    async fn test_push_failure_is_reported_not_raised() {
        let offline = Arc::new(MemoryMirror {
            offline: true,
            ..Default::default()
        });
        let (reconciler, flat, _temp) = create_test_reconciler(offline);
        flat.set("ll_srs_v1", "[]").unwrap();

        let result = reconciler.push_all(&["ll_srs_v1"]).await.unwrap();
        assert!(!result.success());
        assert_eq!(result.keys_failed, vec!["ll_srs_v1".to_string()]);
    }

    #[tokio::test]
    async fn test_pull_all_mixed() {
        let mirror = MemoryMirror::with("ll_srs_v1", "[]");
        mirror
            .values
            .lock()
            .unwrap()
            .insert("ll_favs_v1".into(), "oops".into());
        let (reconciler, _flat, _temp) = create_test_reconciler(Arc::new(mirror));

        let result = reconciler
            .pull_all(&["ll_srs_v1", "ll_favs_v1", "ll_other"])
            .await
            .unwrap();
        assert_eq!(result.keys_pulled, vec!["ll_srs_v1".to_string()]);
        assert_eq!(result.keys_failed, vec!["ll_favs_v1".to_string()]);
    }
}
