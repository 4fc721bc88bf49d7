//! tinymem-core: shared types, errors and configuration for the tinymem
//! state-transition engine.
//!
//! Externalizes working memory for small-model chat completion into a
//! strictly typed state map keyed by source-code entity identity
//! (`filepath::symbol`).

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::{EngineConfig, EtvConfig, HydrationConfig, StorageConfig, TombstoneConfig};
pub use error::{Error, Result};
pub use hash::{compute_hash, verify_hash};
pub use types::{
    Artifact, AuditResult, AuditStatus, Confidence, ContentType, Episode, EntityKey,
    EntityMetadata, EntityState, State, StateTransition,
};
