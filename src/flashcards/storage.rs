//! Durable card store backed by SQLite
//!
//! Schema:
//! ```text
//! cards(id PK, front, back, src_lang, dst_lang, tags, created, ease,
//!       interval_days, repetitions, due, history)
//!   idx_cards_due      on cards(due)
//!   idx_cards_created  on cards(created)
//! meta(key PK, value)  # store-level metadata (schema_version)
//! ```
//!
//! Timestamps are stored as milliseconds since the epoch; `tags` and
//! `history` as JSON arrays.
//!
//! Every mutation is a single statement or a single transaction on a
//! connection guarded by a mutex, so a read-modify-write on one id (grading,
//! updating) can never interleave with another writer.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};
use thiserror::Error;

use super::algorithm::schedule;
use super::identity::make_id;
use super::models::*;

/// Current on-disk schema version, recorded in `meta`
pub const SCHEMA_VERSION: u32 = 1;

const CARD_COLUMNS: &str = "id, front, back, src_lang, dst_lang, tags, created, ease, \
                            interval_days, repetitions, due, history";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid timestamp in store: {0}")]
    InvalidTimestamp(i64),

    #[error("Card store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage manager for cards
pub struct CardStore {
    conn: Mutex<Connection>,
    /// `None` for in-memory stores
    db_path: Option<PathBuf>,
}

impl CardStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&db_path)?;
        Self::init_schema(&conn)?;
        log::debug!("Opened card store at {:?}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        })
    }

    /// Open a throwaway store that lives only as long as the value.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cards (
                id TEXT PRIMARY KEY,
                front TEXT NOT NULL,
                back TEXT NOT NULL,
                src_lang TEXT NOT NULL,
                dst_lang TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                created INTEGER NOT NULL,
                ease REAL NOT NULL,
                interval_days INTEGER NOT NULL,
                repetitions INTEGER NOT NULL,
                due INTEGER NOT NULL,
                history TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX IF NOT EXISTS idx_cards_due ON cards(due);
            CREATE INDEX IF NOT EXISTS idx_cards_created ON cards(created);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION.to_string()],
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ==================== Card Operations ====================

    /// Create a card unless one with the same identity exists.
    pub fn create(
        &self,
        front: &str,
        back: &str,
        src: &str,
        dst: &str,
        tags: Vec<String>,
    ) -> Result<CreateOutcome> {
        self.create_at(front, back, src, dst, tags, Utc::now())
    }

    pub fn create_at(
        &self,
        front: &str,
        back: &str,
        src: &str,
        dst: &str,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<CreateOutcome> {
        let id = make_id(front, src, dst);
        let card = Card::new(
            id.clone(),
            front.to_string(),
            back.to_string(),
            src.to_string(),
            dst.to_string(),
            tags,
            truncate_to_millis(now),
        );

        let conn = self.conn()?;
        if insert_if_absent(&conn, &card)? {
            log::debug!("Created card {}", id);
            Ok(CreateOutcome::Created(id))
        } else {
            log::debug!("Card {} already exists", id);
            Ok(CreateOutcome::Exists(id))
        }
    }

    /// Insert every card whose id is not stored yet, in one transaction.
    /// Returns how many were inserted.
    pub fn insert_missing(&self, cards: &[Card]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        for card in cards {
            if insert_if_absent(&tx, card)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Make `cards` the whole contents of the store, in one transaction.
    /// The first record wins when an id repeats. Returns how many were stored.
    pub fn replace_all(&self, cards: &[Card]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let removed = tx.execute("DELETE FROM cards", [])?;
        let mut inserted = 0;
        for card in cards {
            if insert_if_absent(&tx, card)? {
                inserted += 1;
            }
        }
        tx.commit()?;
        log::debug!("Replaced {} card(s) with {}", removed, inserted);
        Ok(inserted)
    }

    /// Get a specific card
    pub fn get(&self, id: &CardId) -> Result<Option<Card>> {
        let conn = self.conn()?;
        select_card(&conn, id)
    }

    pub fn contains(&self, id: &CardId) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM cards WHERE id = ?1", params![id.as_str()], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM cards", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    /// Apply a grade through the scheduler and persist the result.
    pub fn grade(&self, id: &CardId, grade: i32) -> Result<GradeOutcome> {
        self.grade_at(id, grade, Utc::now())
    }

    pub fn grade_at(&self, id: &CardId, grade: i32, now: DateTime<Utc>) -> Result<GradeOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut card) = select_card(&tx, id)? else {
            return Ok(GradeOutcome::NotFound);
        };

        card.state = schedule(&card.state, grade, truncate_to_millis(now));
        write_state(&tx, &card)?;
        tx.commit()?;

        log::debug!(
            "Graded card {} with {}: interval={}d repetitions={} ease={:.2}",
            id,
            grade,
            card.state.interval,
            card.state.repetitions,
            card.state.ease
        );
        Ok(GradeOutcome::Graded(card))
    }

    /// Overwrite the mutable fields of a stored card.
    ///
    /// Identity fields (`id`, `front`, `back`, languages, `created`) always
    /// keep their stored values. `ease` is held at the floor, `due` is never
    /// earlier than `created`, and a history that does not extend the stored
    /// one is ignored.
    pub fn update(&self, card: &Card) -> Result<UpdateOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(mut stored) = select_card(&tx, &card.id)? else {
            return Ok(UpdateOutcome::NotFound);
        };

        stored.tags = normalize_tags(&card.tags);
        stored.state.ease = card.state.ease.max(MIN_EASE);
        stored.state.interval = card.state.interval;
        stored.state.repetitions = card.state.repetitions;
        stored.state.due = truncate_to_millis(card.state.due).max(stored.created);
        if card.state.history.starts_with(&stored.state.history) {
            stored.state.history = card.state.history.clone();
        } else {
            log::warn!(
                "Ignoring history for card {}: it does not extend the stored history",
                card.id
            );
        }

        write_state(&tx, &stored)?;
        tx.commit()?;
        Ok(UpdateOutcome::Updated(stored))
    }

    /// Delete a card. Returns whether it existed.
    pub fn remove(&self, id: &CardId) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM cards WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    // ==================== Range Scans ====================

    /// Cards due at or before now, oldest due first.
    pub fn due_records(&self, limit: usize) -> Result<Vec<Card>> {
        self.due_records_at(Utc::now(), limit)
    }

    pub fn due_records_at(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        query_cards(
            &conn,
            &format!(
                "SELECT {} FROM cards WHERE due <= ?1 ORDER BY due ASC, created ASC, id ASC LIMIT ?2",
                CARD_COLUMNS
            ),
            params![now.timestamp_millis(), clamp_limit(limit)],
        )
    }

    /// Cards created in `[from, to)`, oldest first. Open bounds when `None`.
    pub fn created_range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Card>> {
        let from = from.map_or(i64::MIN, |t| t.timestamp_millis());
        let to = to.map_or(i64::MAX, |t| t.timestamp_millis());
        let conn = self.conn()?;
        query_cards(
            &conn,
            &format!(
                "SELECT {} FROM cards WHERE created >= ?1 AND created < ?2 \
                 ORDER BY created ASC, id ASC LIMIT ?3",
                CARD_COLUMNS
            ),
            params![from, to, clamp_limit(limit)],
        )
    }

    /// Every card, oldest first. This is the sync snapshot.
    pub fn all(&self) -> Result<Vec<Card>> {
        let conn = self.conn()?;
        query_cards(
            &conn,
            &format!("SELECT {} FROM cards ORDER BY created ASC, id ASC", CARD_COLUMNS),
            [],
        )
    }

    pub fn stats(&self) -> Result<ReviewStats> {
        self.stats_at(Utc::now())
    }

    /// Get review statistics at `now`
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<ReviewStats> {
        let conn = self.conn()?;
        let (total, due, new, review): (i64, i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN due <= ?1 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN repetitions = 0 AND history = '[]' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN repetitions >= 2 THEN 1 ELSE 0 END), 0)
             FROM cards",
            params![now.timestamp_millis()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

        Ok(ReviewStats {
            total_cards: total as usize,
            due_cards: due as usize,
            new_cards: new as usize,
            learning_cards: (total - new - review) as usize,
            review_cards: review as usize,
        })
    }

    // ==================== Metadata ====================

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<Option<u32>> {
        Ok(self
            .get_meta("schema_version")?
            .and_then(|v| v.parse().ok()))
    }
}

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn insert_if_absent(conn: &Connection, card: &Card) -> Result<bool> {
    let inserted = conn.execute(
        &format!(
            "INSERT OR IGNORE INTO cards ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            CARD_COLUMNS
        ),
        params![
            card.id.as_str(),
            card.front,
            card.back,
            card.src_lang,
            card.dst_lang,
            serde_json::to_string(&card.tags)?,
            card.created.timestamp_millis(),
            card.state.ease,
            card.state.interval,
            card.state.repetitions,
            card.state.due.timestamp_millis(),
            serde_json::to_string(&card.state.history)?,
        ],
    )?;
    Ok(inserted > 0)
}

/// Persist the mutable columns of `card`.
fn write_state(conn: &Connection, card: &Card) -> Result<()> {
    conn.execute(
        "UPDATE cards SET tags = ?2, ease = ?3, interval_days = ?4, repetitions = ?5, due = ?6, history = ?7
         WHERE id = ?1",
        params![
            card.id.as_str(),
            serde_json::to_string(&card.tags)?,
            card.state.ease,
            card.state.interval,
            card.state.repetitions,
            card.state.due.timestamp_millis(),
            serde_json::to_string(&card.state.history)?,
        ],
    )?;
    Ok(())
}

fn select_card(conn: &Connection, id: &CardId) -> Result<Option<Card>> {
    let row = conn
        .query_row(
            &format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS),
            params![id.as_str()],
            CardRow::from_row,
        )
        .optional()?;
    row.map(Card::try_from).transpose()
}

fn query_cards<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Card>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, CardRow::from_row)?;
    let cards = rows
        .map(|row| row.map_err(StoreError::from).and_then(Card::try_from))
        .collect::<Result<Vec<_>>>();
    cards
}

/// Raw column values, decoded into a [`Card`] outside the row callback so
/// JSON and timestamp errors keep their own variants.
struct CardRow {
    id: String,
    front: String,
    back: String,
    src_lang: String,
    dst_lang: String,
    tags: String,
    created: i64,
    ease: f64,
    interval: u32,
    repetitions: u32,
    due: i64,
    history: String,
}

impl CardRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            front: row.get(1)?,
            back: row.get(2)?,
            src_lang: row.get(3)?,
            dst_lang: row.get(4)?,
            tags: row.get(5)?,
            created: row.get(6)?,
            ease: row.get(7)?,
            interval: row.get(8)?,
            repetitions: row.get(9)?,
            due: row.get(10)?,
            history: row.get(11)?,
        })
    }
}

impl TryFrom<CardRow> for Card {
    type Error = StoreError;

    fn try_from(row: CardRow) -> Result<Self> {
        Ok(Card {
            id: CardId::new(row.id),
            front: row.front,
            back: row.back,
            src_lang: row.src_lang,
            dst_lang: row.dst_lang,
            tags: serde_json::from_str(&row.tags)?,
            created: from_millis(row.created)?,
            state: SchedulingState {
                ease: row.ease,
                interval: row.interval,
                repetitions: row.repetitions,
                due: from_millis(row.due)?,
                history: serde_json::from_str(&row.history)?,
            },
        })
    }
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(StoreError::InvalidTimestamp(ms))
}
