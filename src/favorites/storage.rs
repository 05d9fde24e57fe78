//! Favorites list kept as one JSON array in the flat store, newest first.

use chrono::{DateTime, Utc};

use crate::flashcards::models::truncate_to_millis;
use crate::storage::flat_store::{FlatStore, Result};

use super::models::{Favorite, MAX_FAVORITES};

/// Default flat-store key of the favorites list
pub const FAVORITES_KEY: &str = "ll_favs_v1";

pub struct FavoritesStore {
    flat_store: FlatStore,
    key: String,
}

impl FavoritesStore {
    pub fn new(flat_store: FlatStore, key: impl Into<String>) -> Self {
        Self {
            flat_store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// All favorites, newest first. Unreadable content reads as empty;
    /// unreadable entries are dropped.
    pub fn list(&self) -> Result<Vec<Favorite>> {
        let Some(raw) = self.flat_store.get(&self.key)? else {
            return Ok(Vec::new());
        };

        let items: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Favorites under {:?} are unreadable ({}), treating as empty", self.key, e);
                return Ok(Vec::new());
            }
        };

        let favorites = items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Favorite>(item).ok())
            .collect();
        Ok(favorites)
    }

    /// Save a translation at the front of the list
    pub fn add(&self, input: &str, src: &str, dst: &str, out: &str) -> Result<Favorite> {
        self.add_at(input, src, dst, out, Utc::now())
    }

    pub fn add_at(
        &self,
        input: &str,
        src: &str,
        dst: &str,
        out: &str,
        now: DateTime<Utc>,
    ) -> Result<Favorite> {
        let favorite = Favorite {
            ts: truncate_to_millis(now),
            input: input.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            out: out.to_string(),
        };

        let mut favorites = self.list()?;
        favorites.insert(0, favorite.clone());
        self.save(favorites)?;
        Ok(favorite)
    }

    /// Remove the entry at `index` (0 = newest)
    pub fn remove(&self, index: usize) -> Result<Option<Favorite>> {
        let mut favorites = self.list()?;
        if index >= favorites.len() {
            return Ok(None);
        }
        let removed = favorites.remove(index);
        self.save(favorites)?;
        Ok(Some(removed))
    }

    fn save(&self, mut favorites: Vec<Favorite>) -> Result<()> {
        favorites.truncate(MAX_FAVORITES);
        let json = serde_json::to_string(&favorites).unwrap_or_else(|_| "[]".to_string());
        self.flat_store.set(&self.key, &json)
    }
}
