//! tinymem-storage: Vault, Ledger and StateMap persistence for the tinymem
//! state-transition engine, backed by SQLite in WAL mode.

pub mod db;
pub mod error;
pub mod hydration_tracking;
pub mod ledger;
pub mod migrations;
pub mod state_map;
pub mod tombstones;
pub mod vault;

pub use db::Db;
pub use error::{Result, StorageError};
pub use hydration_tracking::HydrationTracker;
pub use ledger::Ledger;
pub use state_map::StateMap;
pub use tombstones::{Tombstone, TombstoneTracker};
pub use vault::Vault;
