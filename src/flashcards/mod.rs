//! Flashcard and spaced repetition system
//!
//! This module provides:
//! - Content-derived card identity (dedup without a central counter)
//! - Text normalization and answer matching
//! - SM-2 spaced repetition algorithm
//! - SQLite-backed card store with due/created indexes

pub mod algorithm;
pub mod identity;
pub mod matching;
pub mod models;
pub mod storage;

pub use identity::make_id;
pub use models::*;
pub use storage::{CardStore, StoreError};
