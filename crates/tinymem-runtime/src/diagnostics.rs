//! Read-only diagnostics (SPEC_FULL.md section 4.9): plain query functions
//! backing the out-of-scope HTTP boundary's `/state`, `/doctor`, `/recent`
//! and `/debug/last-prompt` endpoints. No I/O beyond the storage layer's own
//! reads, and no transport of any kind lives here.

use crate::error::Result;
use tinymem_core::{Artifact, Episode, EntityKey, EntityState};
use tinymem_storage::{Ledger, StateMap, TombstoneTracker, Vault};

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub artifact_count: u64,
    pub state_map_count: u64,
    pub tracked_episode_count: u64,
    pub pending_tombstone_count: u64,
}

pub struct Diagnostics {
    vault: Vault,
    ledger: Ledger,
    state_map: StateMap,
    tombstones: TombstoneTracker,
}

impl Diagnostics {
    pub fn new(vault: Vault, ledger: Ledger, state_map: StateMap, tombstones: TombstoneTracker) -> Self {
        Self {
            vault,
            ledger,
            state_map,
            tombstones,
        }
    }

    /// Backs `/state`: every entity currently tracked, in any state.
    pub fn state_snapshot(&self) -> Result<Vec<EntityState>> {
        Ok(self.state_map.get_all()?)
    }

    /// Backs `/doctor`: aggregate health counters.
    pub fn doctor(&self) -> Result<DoctorReport> {
        let pending_tombstones = self
            .state_map
            .get_all()?
            .into_iter()
            .filter(|e| e.state == tinymem_core::State::Tombstoned)
            .count() as u64;

        Ok(DoctorReport {
            artifact_count: self.vault.count()?,
            state_map_count: self.state_map.count()?,
            tracked_episode_count: self.ledger.recent_episodes(u32::MAX)?.len() as u64,
            pending_tombstone_count: pending_tombstones,
        })
    }

    /// Used specifically to check whether a given entity's tombstone
    /// countdown is still live (not yet swept by `Runtime::expire_tombstones`).
    pub fn tombstone_remaining(&self, entity_key: &EntityKey) -> Result<Option<u32>> {
        Ok(self
            .tombstones
            .get(entity_key)?
            .map(|t| t.retention_episodes_remaining))
    }

    /// Backs `/recent`: the last `n` episodes, most recent first.
    pub fn recent_episodes(&self, n: u32) -> Result<Vec<Episode>> {
        Ok(self.ledger.recent_episodes(n)?)
    }

    /// Backs `/debug/last-prompt`: the stored prompt artifact for an episode.
    pub fn last_prompt(&self, episode_id: &str) -> Result<Option<Artifact>> {
        let Some(episode) = self.ledger.get_episode(episode_id)? else {
            return Ok(None);
        };
        Ok(self.vault.get(&episode.user_prompt_hash)?)
    }
}
