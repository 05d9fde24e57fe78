//! Trainer-facing facade over the card store, favorites and sync.
//!
//! Startup order:
//! 1. pull the deck snapshot and favorites from the mirror (bounded by the
//!    sync timeout; local state is kept on any failure),
//! 2. open `cards.db`,
//! 3. when the deck was pulled, make it the whole contents of the store
//!    (the later push wins entirely); otherwise import whatever the flat
//!    store holds under the deck key.
//!
//! After every successful mutation the full deck snapshot is written back to
//! the flat store and pushed to the mirror. A failed write or push is logged;
//! the mutation itself has already committed.

use std::fs;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::{AppConfig, ConfigError, CARDS_DB_FILE, FLAT_STORE_DIR};
use crate::favorites::{Favorite, FavoritesStore};
use crate::flashcards::algorithm::Rating;
use crate::flashcards::models::{
    Card, CardId, CreateOutcome, GradeOutcome, ReviewStats, UpdateOutcome,
};
use crate::flashcards::storage::{CardStore, StoreError};
use crate::storage::{
    apply_deck_snapshot, migrate_legacy_deck, FlatStore, FlatStoreError, MigrationError,
    MigrationReport,
};
use crate::sync::{HttpMirror, MirrorError, RemoteMirror, SyncReconciler, SyncResult};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Card store error: {0}")]
    Store(#[from] StoreError),

    #[error("Flat store error: {0}")]
    FlatStore(#[from] FlatStoreError),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// What happened while opening a session
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupReport {
    /// `None` when sync is not configured
    pub sync: Option<SyncResult>,
    pub migration: MigrationReport,
}

pub struct Session {
    config: AppConfig,
    store: Arc<CardStore>,
    flat_store: FlatStore,
    favorites: FavoritesStore,
    reconciler: Option<SyncReconciler>,
    startup: StartupReport,
}

impl Session {
    /// Open a session, reaching the HTTP mirror when `[sync]` is active.
    pub async fn open(config: AppConfig) -> Result<Self> {
        let mirror: Option<Arc<dyn RemoteMirror>> = if config.sync.is_active() {
            let flat_store = FlatStore::new(config.flat_store_dir()?);
            let uid = flat_store.installation_id()?;
            let mirror = HttpMirror::new(&config.sync.base_url, uid, config.sync.timeout())?;
            Some(Arc::new(mirror))
        } else {
            None
        };
        Self::open_with_mirror(config, mirror).await
    }

    /// Open a session against an explicit mirror (or none).
    pub async fn open_with_mirror(
        config: AppConfig,
        mirror: Option<Arc<dyn RemoteMirror>>,
    ) -> Result<Self> {
        let data_dir = config.resolved_data_dir()?;
        fs::create_dir_all(&data_dir)?;

        let flat_store = FlatStore::new(data_dir.join(FLAT_STORE_DIR));
        flat_store.init()?;

        let reconciler =
            mirror.map(|m| SyncReconciler::new(m, flat_store.clone(), config.sync.timeout()));

        let sync = match &reconciler {
            Some(reconciler) => Some(
                reconciler
                    .pull_all(&[config.legacy_deck_key.as_str(), config.favorites_key.as_str()])
                    .await?,
            ),
            None => None,
        };

        let db_path = data_dir.join(CARDS_DB_FILE);
        let store = Arc::new(tokio::task::spawn_blocking(move || CardStore::open(db_path)).await??);

        let deck_pulled = sync
            .as_ref()
            .is_some_and(|s| s.keys_pulled.contains(&config.legacy_deck_key));
        let migration = load_deck(
            Arc::clone(&store),
            flat_store.clone(),
            config.legacy_deck_key.clone(),
            deck_pulled,
        )
        .await?;

        log::info!(
            "Session opened at {} ({} imported, sync {})",
            data_dir.display(),
            migration.imported,
            if reconciler.is_some() { "on" } else { "off" }
        );

        let favorites = FavoritesStore::new(flat_store.clone(), config.favorites_key.clone());
        Ok(Self {
            config,
            store,
            flat_store,
            favorites,
            reconciler,
            startup: StartupReport { sync, migration },
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn startup(&self) -> &StartupReport {
        &self.startup
    }

    pub fn sync_enabled(&self) -> bool {
        self.reconciler.is_some()
    }

    /// Run `f` against the card store on the blocking pool
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&CardStore) -> std::result::Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let value = tokio::task::spawn_blocking(move || f(&store)).await??;
        Ok(value)
    }

    // ==================== Cards ====================

    /// Add a card. Missing languages fall back to the configured defaults.
    pub async fn create(
        &self,
        front: &str,
        back: &str,
        src: Option<&str>,
        dst: Option<&str>,
        tags: Vec<String>,
    ) -> Result<CreateOutcome> {
        let front = front.to_string();
        let back = back.to_string();
        let src = src.unwrap_or(self.config.default_src.as_str()).to_string();
        let dst = dst.unwrap_or(self.config.default_dst.as_str()).to_string();

        let outcome = self
            .with_store(move |store| store.create(&front, &back, &src, &dst, tags))
            .await?;
        if outcome.is_created() {
            self.publish_after("create").await;
        }
        Ok(outcome)
    }

    pub async fn grade(&self, id: &CardId, grade: i32) -> Result<GradeOutcome> {
        self.grade_at(id, grade, Utc::now()).await
    }

    pub async fn grade_at(&self, id: &CardId, grade: i32, now: DateTime<Utc>) -> Result<GradeOutcome> {
        let id = id.clone();
        let outcome = self
            .with_store(move |store| store.grade_at(&id, grade, now))
            .await?;
        if matches!(outcome, GradeOutcome::Graded(_)) {
            self.publish_after("grade").await;
        }
        Ok(outcome)
    }

    /// Grade with a trainer button instead of a raw quality
    pub async fn rate(&self, id: &CardId, rating: Rating) -> Result<GradeOutcome> {
        self.grade(id, rating.quality()).await
    }

    pub async fn get(&self, id: &CardId) -> Result<Option<Card>> {
        let id = id.clone();
        self.with_store(move |store| store.get(&id)).await
    }

    /// Due queue; `None` uses the configured limit
    pub async fn due(&self, limit: Option<usize>) -> Result<Vec<Card>> {
        let limit = limit.unwrap_or(self.config.due_limit);
        self.with_store(move |store| store.due_records(limit)).await
    }

    pub async fn due_at(&self, now: DateTime<Utc>, limit: Option<usize>) -> Result<Vec<Card>> {
        let limit = limit.unwrap_or(self.config.due_limit);
        self.with_store(move |store| store.due_records_at(now, limit)).await
    }

    pub async fn created_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Card>> {
        self.with_store(move |store| store.created_range(from, to, limit))
            .await
    }

    pub async fn all(&self) -> Result<Vec<Card>> {
        self.with_store(|store| store.all()).await
    }

    pub async fn update(&self, card: Card) -> Result<UpdateOutcome> {
        let outcome = self.with_store(move |store| store.update(&card)).await?;
        if matches!(outcome, UpdateOutcome::Updated(_)) {
            self.publish_after("update").await;
        }
        Ok(outcome)
    }

    pub async fn remove(&self, id: &CardId) -> Result<bool> {
        let id = id.clone();
        let removed = self.with_store(move |store| store.remove(&id)).await?;
        if removed {
            self.publish_after("remove").await;
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<usize> {
        self.with_store(|store| store.count()).await
    }

    pub async fn stats(&self) -> Result<ReviewStats> {
        self.with_store(|store| store.stats()).await
    }

    /// Import the legacy deck under `key` (the configured deck key when
    /// `None`). Already known ids are skipped.
    pub async fn migrate(&self, key: Option<&str>) -> Result<MigrationReport> {
        let key = key.unwrap_or(self.config.legacy_deck_key.as_str());
        let report = load_deck(
            Arc::clone(&self.store),
            self.flat_store.clone(),
            key.to_string(),
            false,
        )
        .await?;
        if report.imported > 0 {
            self.publish_after("migration").await;
        }
        Ok(report)
    }

    // ==================== Favorites ====================

    pub fn favorites(&self) -> Result<Vec<Favorite>> {
        Ok(self.favorites.list()?)
    }

    pub async fn add_favorite(&self, input: &str, src: &str, dst: &str, out: &str) -> Result<Favorite> {
        let favorite = self.favorites.add(input, src, dst, out)?;
        self.push_favorites().await;
        Ok(favorite)
    }

    pub async fn remove_favorite(&self, index: usize) -> Result<Option<Favorite>> {
        let removed = self.favorites.remove(index)?;
        if removed.is_some() {
            self.push_favorites().await;
        }
        Ok(removed)
    }

    // ==================== Sync ====================

    /// Write the deck snapshot to the flat store and push it.
    /// Returns whether the mirror accepted it.
    pub async fn publish_deck(&self) -> Result<bool> {
        let snapshot = self
            .with_store(|store| {
                let cards = store.all()?;
                Ok(serde_json::to_string(&cards)?)
            })
            .await?;
        self.flat_store.set(&self.config.legacy_deck_key, &snapshot)?;
        self.push_key(&self.config.legacy_deck_key).await
    }

    async fn publish_after(&self, action: &str) {
        if let Err(e) = self.publish_deck().await {
            log::warn!("Deck snapshot not published after {}: {}", action, e);
        }
    }

    async fn push_favorites(&self) {
        if let Err(e) = self.push_key(self.favorites.key()).await {
            log::warn!("Favorites not pushed: {}", e);
        }
    }

    async fn push_key(&self, key: &str) -> Result<bool> {
        match &self.reconciler {
            Some(reconciler) => Ok(reconciler.push_local(key).await?),
            None => Ok(false),
        }
    }

    /// Pull both keys, apply a pulled deck to the store, then push the deck
    /// snapshot and favorites back.
    pub async fn sync_now(&self) -> Result<SyncResult> {
        let Some(reconciler) = &self.reconciler else {
            log::info!("Sync: not configured, nothing to do");
            return Ok(SyncResult::default());
        };
        let keys = [
            self.config.legacy_deck_key.as_str(),
            self.config.favorites_key.as_str(),
        ];

        let pulled = reconciler.pull_all(&keys).await?;

        let deck_pulled = pulled.keys_pulled.contains(&self.config.legacy_deck_key);
        let report = load_deck(
            Arc::clone(&self.store),
            self.flat_store.clone(),
            self.config.legacy_deck_key.clone(),
            deck_pulled,
        )
        .await?;
        log::debug!("Sync: {} card(s) loaded from the deck", report.imported);

        let snapshot = self
            .with_store(|store| Ok(serde_json::to_string(&store.all()?)?))
            .await?;
        self.flat_store.set(&self.config.legacy_deck_key, &snapshot)?;
        let pushed = reconciler.push_all(&keys).await?;

        let mut result = pushed;
        result.keys_pulled = pulled.keys_pulled;
        result.keys_failed.extend(pulled.keys_failed);
        result.keys_failed.sort();
        result.keys_failed.dedup();
        result.duration_ms += pulled.duration_ms;
        Ok(result)
    }
}

/// Replace the store with the deck under `key` when it came from the
/// mirror, otherwise import it additively.
async fn load_deck(
    store: Arc<CardStore>,
    flat_store: FlatStore,
    key: String,
    replace: bool,
) -> Result<MigrationReport> {
    let report = tokio::task::spawn_blocking(move || {
        if replace {
            apply_deck_snapshot(&store, &flat_store, &key)
        } else {
            migrate_legacy_deck(&store, &flat_store, &key)
        }
    })
    .await??;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryMirror;
    use tempfile::TempDir;

    const DECK_KEY: &str = "ll_srs_v1";
    const FAVS_KEY: &str = "ll_favs_v1";

    fn test_config(temp_dir: &TempDir) -> AppConfig {
        AppConfig {
            data_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    async fn open_session(mirror: Option<Arc<MemoryMirror>>) -> (Session, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mirror = mirror.map(|m| m as Arc<dyn RemoteMirror>);
        let session = Session::open_with_mirror(test_config(&temp_dir), mirror)
            .await
            .unwrap();
        (session, temp_dir)
    }

    async fn reopen(temp_dir: &TempDir, mirror: &Arc<MemoryMirror>) -> Session {
        let mirror: Arc<dyn RemoteMirror> = Arc::clone(mirror) as Arc<dyn RemoteMirror>;
        Session::open_with_mirror(test_config(temp_dir), Some(mirror))
            .await
            .unwrap()
    }

    fn snapshot_cards(raw: &str) -> Vec<Card> {
        serde_json::from_str(raw).unwrap()
    }

    #[tokio::test]
    async fn test_create_dedups_and_writes_snapshot() {
        let (session, temp_dir) = open_session(None).await;

        let first = session
            .create("casa", "house", Some("pt"), Some("en"), vec![])
            .await
            .unwrap();
        let second = session
            .create("casa", "home", Some("pt"), Some("en"), vec![])
            .await
            .unwrap();

        assert!(first.is_created());
        assert_eq!(second, CreateOutcome::Exists(first.id().clone()));
        assert_eq!(session.count().await.unwrap(), 1);

        let flat = FlatStore::new(temp_dir.path().join(FLAT_STORE_DIR));
        let cards = snapshot_cards(&flat.get(DECK_KEY).unwrap().unwrap());
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].back, "house");
    }

    #[tokio::test]
    async fn test_create_uses_default_languages() {
        let (session, _temp) = open_session(None).await;
        let outcome = session.create("olá", "hi", None, None, vec![]).await.unwrap();

        let card = session.get(outcome.id()).await.unwrap().unwrap();
        assert_eq!(card.src_lang, "auto");
        assert_eq!(card.dst_lang, "pt");
    }

    #[tokio::test]
    async fn test_mutations_push_snapshot() {
        let mirror = Arc::new(MemoryMirror::default());
        let (session, _temp) = open_session(Some(Arc::clone(&mirror))).await;
        assert!(session.sync_enabled());

        let id = session
            .create("casa", "house", Some("pt"), Some("en"), vec![])
            .await
            .unwrap()
            .id()
            .clone();
        assert_eq!(mirror.save_count(), 1);

        let outcome = session.rate(&id, Rating::Good).await.unwrap();
        assert!(matches!(outcome, GradeOutcome::Graded(_)));
        assert_eq!(mirror.save_count(), 2);

        let remote = snapshot_cards(&mirror.get(DECK_KEY).unwrap());
        assert_eq!(remote[0].state.history.len(), 1);

        // Outcomes that change nothing do not push
        let missing = CardId::new("id_missing");
        assert_eq!(session.grade(&missing, 4).await.unwrap(), GradeOutcome::NotFound);
        assert!(!session.remove(&missing).await.unwrap());
        assert_eq!(mirror.save_count(), 2);

        assert!(session.remove(&id).await.unwrap());
        assert_eq!(mirror.save_count(), 3);
        assert!(snapshot_cards(&mirror.get(DECK_KEY).unwrap()).is_empty());
    }

    #[tokio::test]
    async fn test_startup_imports_legacy_deck() {
        let temp_dir = TempDir::new().unwrap();
        let flat = FlatStore::new(temp_dir.path().join(FLAT_STORE_DIR));
        flat.set(
            DECK_KEY,
            r#"[{"front":"gato","back":"cat","src":"pt","dst":"en","ef":2.1,"rep":2,"int":6}]"#,
        )
        .unwrap();

        let session = Session::open_with_mirror(test_config(&temp_dir), None)
            .await
            .unwrap();
        assert_eq!(session.startup().migration.imported, 1);
        assert!(session.startup().sync.is_none());

        let card = session.all().await.unwrap().remove(0);
        assert_eq!(card.front, "gato");
        assert_eq!(card.state.repetitions, 2);
        assert!(card.tags.contains(&"legacy".to_string()));
        drop(session);

        // Reopening imports nothing new
        let session = Session::open_with_mirror(test_config(&temp_dir), None)
            .await
            .unwrap();
        assert_eq!(session.startup().migration.imported, 0);
        assert_eq!(session.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_startup_pulls_before_import() {
        let mirror = Arc::new(MemoryMirror::with(
            DECK_KEY,
            r#"[{"front":"casa","back":"house","srcLang":"pt","dstLang":"en"}]"#,
        ));
        let (session, _temp) = open_session(Some(mirror)).await;

        let sync = session.startup().sync.clone().unwrap();
        assert_eq!(sync.keys_pulled, vec![DECK_KEY.to_string()]);
        assert_eq!(session.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_malformed_remote_keeps_local() {
        let temp_dir = TempDir::new().unwrap();
        let flat = FlatStore::new(temp_dir.path().join(FLAT_STORE_DIR));
        flat.set(DECK_KEY, r#"[{"front":"gato","back":"cat"}]"#).unwrap();

        let mirror: Arc<dyn RemoteMirror> = Arc::new(MemoryMirror::with(DECK_KEY, "<html>"));
        let session = Session::open_with_mirror(test_config(&temp_dir), Some(mirror))
            .await
            .unwrap();

        let sync = session.startup().sync.clone().unwrap();
        assert_eq!(sync.keys_failed, vec![DECK_KEY.to_string()]);
        assert_eq!(session.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_two_devices_share_cards() {
        let mirror = Arc::new(MemoryMirror::default());

        let (laptop, _laptop_dir) = open_session(Some(Arc::clone(&mirror))).await;
        laptop
            .create("casa", "house", Some("pt"), Some("en"), vec![])
            .await
            .unwrap();

        let (phone, _phone_dir) = open_session(Some(Arc::clone(&mirror))).await;
        assert_eq!(phone.count().await.unwrap(), 1);
        phone
            .create("gato", "cat", Some("pt"), Some("en"), vec![])
            .await
            .unwrap();

        let result = laptop.sync_now().await.unwrap();
        assert!(result.success());
        assert_eq!(laptop.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_favorites_are_pushed() {
        let mirror = Arc::new(MemoryMirror::default());
        let (session, _temp) = open_session(Some(Arc::clone(&mirror))).await;

        session.add_favorite("bom dia", "pt", "en", "good morning").await.unwrap();
        session.add_favorite("boa noite", "pt", "en", "good night").await.unwrap();

        let favorites = session.favorites().unwrap();
        assert_eq!(favorites[0].input, "boa noite");

        let remote: Vec<Favorite> = serde_json::from_str(&mirror.get(FAVS_KEY).unwrap()).unwrap();
        assert_eq!(remote.len(), 2);

        let removed = session.remove_favorite(0).await.unwrap().unwrap();
        assert_eq!(removed.out, "good night");
        assert_eq!(session.favorites().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_migrate_from_other_key() {
        let (session, temp_dir) = open_session(None).await;
        let flat = FlatStore::new(temp_dir.path().join(FLAT_STORE_DIR));
        flat.set("ll_srs_old", r#"[{"front":"casa","back":"house","src":"pt","dst":"en"}]"#)
            .unwrap();

        let report = session.migrate(Some("ll_srs_old")).await.unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(session.migrate(Some("ll_srs_old")).await.unwrap().imported, 0);

        // The imported card is now part of the deck snapshot
        let cards = snapshot_cards(&flat.get(DECK_KEY).unwrap().unwrap());
        assert_eq!(cards.len(), 1);
        assert!(flat.get("ll_srs_old").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_now_without_mirror() {
        let (session, _temp) = open_session(None).await;
        let result = session.sync_now().await.unwrap();
        assert!(result.success());
        assert!(result.keys_pushed.is_empty());
    }

    #[tokio::test]
    async fn test_pulled_cards_keep_history() {
        let mirror = Arc::new(MemoryMirror::default());
        let (laptop, _laptop_dir) = open_session(Some(Arc::clone(&mirror))).await;
        let id = laptop
            .create("casa", "house", Some("pt"), Some("en"), vec![])
            .await
            .unwrap()
            .id()
            .clone();
        laptop.grade(&id, 4).await.unwrap();
        laptop.grade(&id, 4).await.unwrap();

        let (phone, _phone_dir) = open_session(Some(Arc::clone(&mirror))).await;
        let card = phone.get(&id).await.unwrap().unwrap();

        assert_eq!(card.state.repetitions, 2);
        assert_eq!(card.state.history.len(), 2);
        assert!(card.tags.is_empty());
        assert_eq!(Some(card), laptop.get(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remote_changes_win_on_startup_and_sync() {
        let mirror = Arc::new(MemoryMirror::default());
        let laptop_dir = TempDir::new().unwrap();
        let laptop = reopen(&laptop_dir, &mirror).await;
        let casa = laptop
            .create("casa", "house", Some("pt"), Some("en"), vec![])
            .await
            .unwrap()
            .id()
            .clone();
        let gato = laptop
            .create("gato", "cat", Some("pt"), Some("en"), vec![])
            .await
            .unwrap()
            .id()
            .clone();
        laptop.grade(&casa, 4).await.unwrap();
        laptop.grade(&casa, 4).await.unwrap();
        drop(laptop);

        let (tablet, _tablet_dir) = open_session(Some(Arc::clone(&mirror))).await;
        let (phone, _phone_dir) = open_session(Some(Arc::clone(&mirror))).await;
        phone.grade(&casa, 1).await.unwrap();
        assert!(phone.remove(&gato).await.unwrap());

        // restart picks up the later push
        let laptop = reopen(&laptop_dir, &mirror).await;
        let card = laptop.get(&casa).await.unwrap().unwrap();
        assert_eq!(card.state.repetitions, 0);
        assert_eq!(card.state.history.len(), 3);
        assert!(laptop.get(&gato).await.unwrap().is_none());

        // so does an explicit sync, without pushing the stale copy back
        tablet.sync_now().await.unwrap();
        let card = tablet.get(&casa).await.unwrap().unwrap();
        assert_eq!(card.state.history.len(), 3);
        assert_eq!(tablet.count().await.unwrap(), 1);
        let remote = snapshot_cards(&mirror.get(DECK_KEY).unwrap());
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].state.repetitions, 0);
    }

    #[tokio::test]
    async fn test_snapshot_write_failure_keeps_outcome() {
        let (session, temp_dir) = open_session(None).await;
        let kv = temp_dir.path().join(FLAT_STORE_DIR);
        fs::remove_dir_all(&kv).unwrap();
        fs::write(&kv, "not a directory").unwrap();

        let outcome = session
            .create("casa", "house", Some("pt"), Some("en"), vec![])
            .await
            .unwrap();
        assert!(outcome.is_created());

        let graded = session.grade(outcome.id(), 4).await.unwrap();
        assert!(matches!(graded, GradeOutcome::Graded(_)));
        assert_eq!(session.count().await.unwrap(), 1);
    }
}
