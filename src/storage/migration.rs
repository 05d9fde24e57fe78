//! Import of the legacy flat deck into the card store.
//!
//! The legacy deck is a JSON array of card-like objects kept under a single
//! key of the flat store (`ll_srs_v1` by default; the key is always passed
//! in explicitly). Two record shapes are accepted:
//!
//! - snapshot records, as written by this crate's deck snapshot, are taken
//!   as they are, grading history included;
//! - anything else is a legacy record: scheduling fields are carried over,
//!   grading history is not, and the card is tagged `legacy`.
//!
//! Ids are always the content-derived ones, so a later create of the same
//! front/src/dst collides with the imported card. An embedded id is kept
//! only when it already matches, or when it is a random fallback id.
//!
//! [`migrate_legacy_deck`] is additive and idempotent: ids already in the
//! store are skipped, the source value is never modified, and all inserts of
//! one run commit together. [`apply_deck_snapshot`] instead makes the deck
//! the whole contents of the store; it is used after a sync pull.
//!
//! A missing or malformed source imports nothing rather than failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flashcards::identity::{is_random_id, make_id};
use crate::flashcards::models::{
    normalize_tags, truncate_to_millis, Card, CardId, SchedulingState, INITIAL_EASE, MIN_EASE,
};
use crate::flashcards::storage::{CardStore, StoreError};

use super::flat_store::{FlatStore, FlatStoreError};

/// Tag added to every card imported from a legacy record
pub const LEGACY_TAG: &str = "legacy";

const DEFAULT_SRC: &str = "auto";
const DEFAULT_DST: &str = "pt";

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Card store error: {0}")]
    Store(#[from] StoreError),

    #[error("Flat store error: {0}")]
    FlatStore(#[from] FlatStoreError),
}

/// Outcome of one migration run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Records found in the source
    pub scanned: usize,
    /// Records newly inserted
    pub imported: usize,
    /// Records whose id already existed (or repeated within the source)
    pub skipped: usize,
    /// Records that could not be read
    pub invalid: usize,
}

/// A card as found in the legacy deck, with the old short field names.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct LegacyCard {
    id: Option<String>,
    front: Option<String>,
    back: Option<String>,
    #[serde(alias = "srcLang")]
    src: Option<String>,
    #[serde(alias = "dstLang")]
    dst: Option<String>,
    tags: Option<Vec<String>>,
    created: Option<f64>,
    #[serde(alias = "ef")]
    ease: Option<f64>,
    #[serde(alias = "rep")]
    repetitions: Option<f64>,
    #[serde(alias = "int")]
    interval: Option<f64>,
    due: Option<f64>,
}

impl LegacyCard {
    fn into_card(self, now: DateTime<Utc>) -> Card {
        let front = self.front.unwrap_or_default();
        let src = self.src.unwrap_or_else(|| DEFAULT_SRC.to_string());
        let dst = self.dst.unwrap_or_else(|| DEFAULT_DST.to_string());
        let id = resolve_id(self.id, &front, &src, &dst);

        let due = self.due.and_then(millis_to_datetime).unwrap_or(now);
        let created = self
            .created
            .and_then(millis_to_datetime)
            .unwrap_or(now)
            .min(due);

        let mut tags = self.tags.unwrap_or_default();
        tags.push(LEGACY_TAG.to_string());

        Card {
            id,
            front,
            back: self.back.unwrap_or_default(),
            src_lang: src,
            dst_lang: dst,
            tags: normalize_tags(tags),
            created,
            state: SchedulingState {
                ease: self.ease.unwrap_or(INITIAL_EASE).max(MIN_EASE),
                interval: to_count(self.interval),
                repetitions: to_count(self.repetitions),
                due,
                history: Vec::new(),
            },
        }
    }
}

/// Keep an embedded id only when it is the derived one or a random fallback.
fn resolve_id(embedded: Option<String>, front: &str, src: &str, dst: &str) -> CardId {
    let derived = make_id(front, src, dst);
    match embedded.map(CardId::new) {
        Some(id) if id == derived || is_random_id(&id) => id,
        Some(id) => {
            log::debug!("Migration: re-keying {} as {}", id, derived);
            derived
        }
        None => derived,
    }
}

/// A record written by the deck snapshot, kept with its history.
fn snapshot_card(mut card: Card) -> Card {
    card.id = resolve_id(
        Some(card.id.into_string()),
        &card.front,
        &card.src_lang,
        &card.dst_lang,
    );
    card.tags = normalize_tags(std::mem::take(&mut card.tags));
    card.created = truncate_to_millis(card.created.min(card.state.due));
    card.state.ease = card.state.ease.max(MIN_EASE);
    card
}

fn millis_to_datetime(ms: f64) -> Option<DateTime<Utc>> {
    if !ms.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(ms.round() as i64)
}

fn to_count(value: Option<f64>) -> u32 {
    // float-to-int `as` saturates and maps NaN to 0
    value.map_or(0, |v| v.round().max(0.0) as u32)
}

/// Parse a deck payload. `None` when it is not a JSON array; unreadable
/// items are counted and dropped.
fn parse_deck(raw: &str, now: DateTime<Utc>) -> Option<(Vec<Card>, usize)> {
    let items: Vec<serde_json::Value> = match serde_json::from_str(raw) {
        Ok(items) => items,
        Err(e) => {
            log::warn!("Migration: deck is not a JSON array ({})", e);
            return None;
        }
    };

    let mut cards = Vec::with_capacity(items.len());
    let mut invalid = 0;
    for item in items {
        if let Ok(card) = serde_json::from_value::<Card>(item.clone()) {
            cards.push(snapshot_card(card));
            continue;
        }
        match serde_json::from_value::<LegacyCard>(item) {
            Ok(legacy) => cards.push(legacy.into_card(now)),
            Err(e) => {
                log::warn!("Migration: skipping unreadable legacy card: {}", e);
                invalid += 1;
            }
        }
    }
    Some((cards, invalid))
}

/// Import the legacy deck stored under `source_key` into `store`.
pub fn migrate_legacy_deck(
    store: &CardStore,
    flat_store: &FlatStore,
    source_key: &str,
) -> Result<MigrationReport, MigrationError> {
    migrate_legacy_deck_at(store, flat_store, source_key, Utc::now())
}

pub fn migrate_legacy_deck_at(
    store: &CardStore,
    flat_store: &FlatStore,
    source_key: &str,
    now: DateTime<Utc>,
) -> Result<MigrationReport, MigrationError> {
    let Some(raw) = flat_store.get(source_key)? else {
        log::debug!("Migration: no legacy deck under {:?}", source_key);
        return Ok(MigrationReport::default());
    };

    let (cards, invalid) = parse_deck(&raw, truncate_to_millis(now)).unwrap_or_default();
    let scanned = cards.len() + invalid;
    let imported = store.insert_missing(&cards)?;

    let report = MigrationReport {
        scanned,
        imported,
        skipped: cards.len() - imported,
        invalid,
    };

    store.set_meta(
        &format!("migration:{}", source_key),
        &serde_json::to_string(&report).unwrap_or_default(),
    )?;

    if report.imported > 0 {
        log::info!(
            "Migration: imported {} card(s) from {:?} ({} skipped, {} invalid)",
            report.imported,
            source_key,
            report.skipped,
            report.invalid
        );
    }

    Ok(report)
}

/// Replace the store contents with the deck stored under `key`.
///
/// Cards missing from the deck are deleted and cards present in both take
/// the deck's version. A missing key or a payload that is not an array
/// leaves the store untouched.
pub fn apply_deck_snapshot(
    store: &CardStore,
    flat_store: &FlatStore,
    key: &str,
) -> Result<MigrationReport, MigrationError> {
    apply_deck_snapshot_at(store, flat_store, key, Utc::now())
}

pub fn apply_deck_snapshot_at(
    store: &CardStore,
    flat_store: &FlatStore,
    key: &str,
    now: DateTime<Utc>,
) -> Result<MigrationReport, MigrationError> {
    let Some(raw) = flat_store.get(key)? else {
        return Ok(MigrationReport::default());
    };
    let Some((cards, invalid)) = parse_deck(&raw, truncate_to_millis(now)) else {
        return Ok(MigrationReport::default());
    };

    let imported = store.replace_all(&cards)?;
    log::info!(
        "Sync: store replaced by deck {:?} ({} card(s), {} invalid)",
        key,
        imported,
        invalid
    );

    Ok(MigrationReport {
        scanned: cards.len() + invalid,
        imported,
        skipped: cards.len() - imported,
        invalid,
    })
}
