//! Data models for the card store

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum ease factor allowed
pub const MIN_EASE: f64 = 1.3;

/// Ease factor given to every new card
pub const INITIAL_EASE: f64 = 2.5;

/// Drop sub-millisecond precision; the store and the snapshot format keep
/// milliseconds only.
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Content-derived card identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CardId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One grading event. `grade` is on the SM-2 quality scale (0-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    pub grade: u8,
}

/// Spaced repetition state of a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingState {
    /// SM-2 ease factor (default 2.5, never below 1.3)
    pub ease: f64,
    /// Current interval in days
    pub interval: u32,
    /// Consecutive passing reviews since the last reset
    pub repetitions: u32,
    /// When the card is due for review
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub due: DateTime<Utc>,
    /// Every grade ever applied, oldest first
    #[serde(default)]
    pub history: Vec<ReviewEntry>,
}

impl SchedulingState {
    /// Fresh state for a card created at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            ease: INITIAL_EASE,
            interval: 0,
            repetitions: 0,
            due: now,
            history: Vec::new(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due <= now
    }
}

/// A vocabulary or sentence pair under review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: CardId,
    pub front: String,
    pub back: String,
    pub src_lang: String,
    pub dst_lang: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    pub state: SchedulingState,
}

impl Card {
    pub fn new(
        id: CardId,
        front: String,
        back: String,
        src_lang: String,
        dst_lang: String,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            front,
            back,
            src_lang,
            dst_lang,
            tags: normalize_tags(tags),
            created: now,
            state: SchedulingState::new(now),
        }
    }

    pub fn is_new(&self) -> bool {
        self.state.history.is_empty() && self.state.repetitions == 0
    }
}

/// Tags are a set: trimmed, empty ones dropped, sorted and deduplicated.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = tags
        .into_iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Result of a create request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(CardId),
    /// A card with the same identity already exists; nothing was written.
    Exists(CardId),
}

impl CreateOutcome {
    pub fn id(&self) -> &CardId {
        match self {
            Self::Created(id) | Self::Exists(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Result of a grade request
#[derive(Debug, Clone, PartialEq)]
pub enum GradeOutcome {
    Graded(Card),
    NotFound,
}

/// Result of an update request
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Card),
    NotFound,
}

/// Statistics over the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_cards: usize,
    pub due_cards: usize,
    /// Never graded
    pub new_cards: usize,
    /// Graded, but fewer than two consecutive passes
    pub learning_cards: usize,
    /// Two or more consecutive passes
    pub review_cards: usize,
}
