//! Cross-device sync against a remote key-value mirror
//!
//! Whole-snapshot, last-writer-wins: a pull replaces the local flat-store
//! value of a key, a push uploads the full local value.

pub mod config;
pub mod mirror;

mod manager;

pub use config::{PullOutcome, SyncConfig, SyncResult, DEFAULT_TIMEOUT_SECS};
pub use manager::SyncReconciler;
pub use mirror::{HttpMirror, MirrorError, RemoteMirror};

#[cfg(test)]
pub(crate) use manager::tests::MemoryMirror;
