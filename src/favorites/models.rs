use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of favorites kept; older entries fall off the end
pub const MAX_FAVORITES: usize = 200;

/// A saved translation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Favorite {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ts: DateTime<Utc>,
    /// Text as typed
    pub input: String,
    pub src: String,
    pub dst: String,
    /// Translation shown for `input`
    pub out: String,
}
