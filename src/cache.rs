//! In-memory cache of active blocks.
//!
//! Loaded from the database at startup and kept in step by the service as
//! blocks are added and removed. The resolver never touches the database:
//! each request takes an immutable snapshot from here. Expired blocks are
//! lazily filtered at snapshot time; `prune_expired` handles cleanup.

use crate::block::Block;
use dashmap::DashMap;
use tracing::debug;

/// Cache of registered blocks keyed by block id.
#[derive(Debug, Default)]
pub struct BlockCache {
    blocks: DashMap<i64, Block>,
}

impl BlockCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            blocks: DashMap::new(),
        }
    }

    /// Populate a cache from blocks loaded out of the store.
    pub fn load(blocks: Vec<Block>) -> Self {
        let cache = Self::new();
        for block in blocks {
            cache.blocks.insert(block.id, block);
        }
        debug!(blocks = cache.blocks.len(), "Block cache loaded");
        cache
    }

    /// Insert or replace a block.
    pub fn insert(&self, block: Block) {
        self.blocks.insert(block.id, block);
    }

    /// Remove a block by id. Returns whether it was present.
    pub fn remove(&self, id: i64) -> bool {
        self.blocks.remove(&id).is_some()
    }

    /// Immutable snapshot of all unexpired blocks, for one resolution pass.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Drop expired blocks. Called periodically by a background task.
    pub fn prune_expired(&self) -> usize {
        let mut removed = 0;
        self.blocks.retain(|_, block| {
            if block.is_expired() {
                removed += 1;
                false
            } else {
                true
            }
        });
        if removed > 0 {
            debug!(count = removed, "Pruned expired blocks from cache");
        }
        removed
    }

    /// Number of cached blocks, expired ones included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the cache holds no blocks at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
