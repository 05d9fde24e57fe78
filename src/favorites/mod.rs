//! Saved translations ("favorites")

pub mod models;
pub mod storage;

pub use models::{Favorite, MAX_FAVORITES};
pub use storage::{FavoritesStore, FAVORITES_KEY};
