//! Request-facing block service.
//!
//! Ties the store, the in-memory cache, and the precedence policy together
//! behind the `resolve` surface the request-authorization layer consumes.
//! Mutations go through here so the cache never drifts from the database.

use crate::block::{Block, NewBlock};
use crate::cache::BlockCache;
use crate::config::Config;
use crate::policy::PrecedencePolicy;
use crate::resolver;
use crate::store::{Database, DbError};
use tracing::info;

/// Block resolution service.
pub struct BlockService {
    db: Database,
    cache: BlockCache,
    policy: PrecedencePolicy,
    max_candidates: usize,
}

impl BlockService {
    /// Open the store and warm the cache with all active blocks.
    pub async fn open(config: &Config) -> Result<Self, DbError> {
        let db = Database::new(&config.database.path).await?;
        let blocks = db.blocks().list_active().await?;
        let cache = BlockCache::load(blocks);
        Ok(Self {
            db,
            cache,
            policy: config.resolver.precedence.clone(),
            max_candidates: config.resolver.max_candidates,
        })
    }

    /// Resolve the single block applying to a request identity, or `None`.
    ///
    /// `candidate_list` is the raw XFF-style header; malformed entries are
    /// skipped. `anon` tells matching whether address softblocks apply.
    pub fn resolve(
        &self,
        username: Option<&str>,
        candidate_list: &str,
        anon: bool,
    ) -> Option<Block> {
        let addresses = resolver::parse_candidate_list(candidate_list, self.max_candidates);
        let snapshot = self.cache.snapshot();
        resolver::resolve(&snapshot, username, &addresses, anon, &self.policy).cloned()
    }

    /// Register a new block in store and cache, returning its id.
    pub async fn insert(&self, new: NewBlock) -> Result<i64, DbError> {
        let repo = self.db.blocks();
        let id = repo.insert_block(&new).await?;
        if let Some(block) = repo.get_by_id(id).await? {
            self.cache.insert(block);
        }
        info!(id, target = %new.target, set_by = %new.set_by, "Block registered");
        Ok(id)
    }

    /// Remove a block from store and cache.
    pub async fn remove(&self, id: i64) -> Result<bool, DbError> {
        let removed = self.db.blocks().delete_block(id).await?;
        self.cache.remove(id);
        if removed {
            info!(id, "Block removed");
        }
        Ok(removed)
    }

    /// Drop expired blocks from store and cache.
    pub async fn prune_expired(&self) -> Result<u64, DbError> {
        let removed = self.db.blocks().prune_expired().await?;
        self.cache.prune_expired();
        Ok(removed)
    }

    /// The in-memory cache.
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}
