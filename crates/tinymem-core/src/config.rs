//! Configuration types for the state-transition engine

use serde::{Deserialize, Serialize};

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Storage configuration
    pub storage: StorageConfig,
    /// ETV configuration
    pub etv: EtvConfig,
    /// Hydration configuration
    pub hydration: HydrationConfig,
    /// Tombstone retention configuration
    pub tombstone: TombstoneConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            etv: EtvConfig::default(),
            hydration: HydrationConfig::default(),
            tombstone: TombstoneConfig::default(),
        }
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,
    /// Enable WAL journal mode (canonical; disabling is for tests only)
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "tinymem.sqlite3".to_string(),
            wal_mode: true,
        }
    }
}

/// External Truth Verification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtvConfig {
    /// Short-TTL in-memory cache lifetime, in milliseconds
    pub cache_ttl_ms: u64,
    /// Whether the disk-hash cache is enabled at all
    pub cache_enabled: bool,
}

impl Default for EtvConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 5_000,
            cache_enabled: true,
        }
    }
}

/// Hydration budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydrationConfig {
    /// Maximum tokens injected per episode
    pub max_tokens: u32,
    /// Maximum distinct entities injected per episode
    pub max_entities: u32,
    /// Enable the optional semantic ranking pass
    pub semantic_ranking_enabled: bool,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4_000,
            max_entities: 16,
            semantic_ranking_enabled: false,
        }
    }
}

/// Tombstone retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneConfig {
    /// Number of episodes a tombstoned entity's row survives before deletion
    pub retention_episodes: u32,
}

impl Default for TombstoneConfig {
    fn default() -> Self {
        Self {
            retention_episodes: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.etv.cache_ttl_ms, 5_000);
        assert_eq!(cfg.tombstone.retention_episodes, 10);
        assert!(cfg.storage.wal_mode);
    }
}
