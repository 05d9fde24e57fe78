//! LinguaLab: a persistent spaced-repetition card store.
//!
//! - [`flashcards`]: card identity, matching, SM-2 scheduling and the SQLite
//!   card store
//! - [`storage`]: the flat key-value area and the legacy deck import
//! - [`sync`]: whole-snapshot sync against a remote mirror
//! - [`favorites`]: saved translations
//! - [`session`]: the facade tying them together

pub mod config;
pub mod favorites;
pub mod flashcards;
pub mod session;
pub mod storage;
pub mod sync;

pub use config::AppConfig;
pub use session::{Session, SessionError, StartupReport};
