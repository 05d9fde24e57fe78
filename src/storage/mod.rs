pub mod flat_store;
pub mod migration;

pub use flat_store::{FlatStore, FlatStoreError};
pub use migration::{apply_deck_snapshot, migrate_legacy_deck, MigrationError, MigrationReport};
