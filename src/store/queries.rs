//! Database query methods for block operations.

use crate::block::{Block, NewBlock, Restriction};
use crate::store::DbError;
use crate::target::{AddressFamily, BlockTarget};
use sqlx::SqlitePool;

/// One row of the blocks table.
type BlockRow = (
    i64,            // id
    String,         // target
    Option<i64>,    // user_id
    Option<String>, // reason
    String,         // set_by
    i64,            // set_at
    Option<i64>,    // expires_at
    bool,           // sitewide
    bool,           // hardblock
    bool,           // create_account_blocked
    bool,           // autoblock
);

const BLOCK_COLUMNS: &str = "id, target, user_id, reason, set_by, set_at, expires_at, \
     sitewide, hardblock, create_account_blocked, autoblock";

/// Repository for block operations.
pub struct BlockRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BlockRepository<'a> {
    /// Create a new block repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new block, returning its id.
    ///
    /// Fails with [`DbError::DuplicateBlock`] when an unexpired block for
    /// the same target already exists; an expired leftover is treated as
    /// absent.
    pub async fn insert_block(&self, new: &NewBlock) -> Result<i64, DbError> {
        let target = new.target.to_string();
        let now = chrono::Utc::now().timestamp();

        // Transaction covers the duplicate check and every row, so a failed
        // restriction insert (or a racing insert on the same target) leaves
        // no partial block behind.
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM blocks WHERE target = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(&target)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_some() {
            return Err(DbError::DuplicateBlock(target));
        }

        let family = new.target.family().map(AddressFamily::as_str);
        let user_id = match &new.target {
            BlockTarget::Account { id, .. } => Some(*id as i64),
            _ => None,
        };

        let result = sqlx::query(
            r#"
            INSERT INTO blocks
                (target, family, user_id, reason, set_by, set_at, expires_at,
                 sitewide, hardblock, create_account_blocked, autoblock)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&target)
        .bind(family)
        .bind(user_id)
        .bind(&new.reason)
        .bind(&new.set_by)
        .bind(now)
        .bind(new.expires_at)
        .bind(new.sitewide)
        .bind(new.hardblock)
        .bind(new.create_account_blocked)
        .bind(new.autoblock)
        .execute(&mut *tx)
        .await?;

        let id = result.last_insert_rowid();

        for restriction in &new.restrictions {
            let (kind, value) = restriction.to_row();
            sqlx::query("INSERT INTO block_restrictions (block_id, kind, value) VALUES (?, ?, ?)")
                .bind(id)
                .bind(kind)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(id)
    }

    /// Delete a block. Restriction rows cascade.
    pub async fn delete_block(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM blocks WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Look up a block by id, expired or not.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Block>, DbError> {
        let query = format!("SELECT {} FROM blocks WHERE id = ?", BLOCK_COLUMNS);
        let row = sqlx::query_as::<_, BlockRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        self.hydrate_optional(row).await
    }

    /// Look up the unexpired block registered against an exact target.
    pub async fn get_by_target(&self, target: &BlockTarget) -> Result<Option<Block>, DbError> {
        let now = chrono::Utc::now().timestamp();
        let query = format!(
            "SELECT {} FROM blocks WHERE target = ? AND (expires_at IS NULL OR expires_at > ?)",
            BLOCK_COLUMNS
        );
        let row = sqlx::query_as::<_, BlockRow>(&query)
            .bind(target.to_string())
            .bind(now)
            .fetch_optional(self.pool)
            .await?;
        self.hydrate_optional(row).await
    }

    /// All unexpired blocks, for cache warm-up.
    pub async fn list_active(&self) -> Result<Vec<Block>, DbError> {
        let now = chrono::Utc::now().timestamp();
        let query = format!(
            "SELECT {} FROM blocks WHERE expires_at IS NULL OR expires_at > ?",
            BLOCK_COLUMNS
        );
        let rows = sqlx::query_as::<_, BlockRow>(&query)
            .bind(now)
            .fetch_all(self.pool)
            .await?;
        self.hydrate_all(rows).await
    }

    /// Unexpired IP and range blocks of one address family.
    pub async fn list_active_for_family(
        &self,
        family: AddressFamily,
    ) -> Result<Vec<Block>, DbError> {
        let now = chrono::Utc::now().timestamp();
        let query = format!(
            "SELECT {} FROM blocks WHERE family = ? AND (expires_at IS NULL OR expires_at > ?)",
            BLOCK_COLUMNS
        );
        let rows = sqlx::query_as::<_, BlockRow>(&query)
            .bind(family.as_str())
            .bind(now)
            .fetch_all(self.pool)
            .await?;
        self.hydrate_all(rows).await
    }

    /// Unexpired account blocks against one username.
    pub async fn list_active_for_user(&self, username: &str) -> Result<Vec<Block>, DbError> {
        let now = chrono::Utc::now().timestamp();
        let query = format!(
            "SELECT {} FROM blocks \
             WHERE family IS NULL AND target = ? AND (expires_at IS NULL OR expires_at > ?)",
            BLOCK_COLUMNS
        );
        let rows = sqlx::query_as::<_, BlockRow>(&query)
            .bind(username)
            .bind(now)
            .fetch_all(self.pool)
            .await?;
        self.hydrate_all(rows).await
    }

    /// Delete expired rows outright. Returns the number removed.
    pub async fn prune_expired(&self) -> Result<u64, DbError> {
        let now = chrono::Utc::now().timestamp();
        let result =
            sqlx::query("DELETE FROM blocks WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(now)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn load_restrictions(&self, block_id: i64) -> Result<Vec<Restriction>, DbError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT kind, value FROM block_restrictions WHERE block_id = ?",
        )
        .bind(block_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|(kind, value)| Restriction::from_row(kind, value))
            .collect())
    }

    async fn hydrate_optional(&self, row: Option<BlockRow>) -> Result<Option<Block>, DbError> {
        match row {
            Some(row) => self.hydrate(row).await,
            None => Ok(None),
        }
    }

    async fn hydrate_all(&self, rows: Vec<BlockRow>) -> Result<Vec<Block>, DbError> {
        let mut blocks = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(block) = self.hydrate(row).await? {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    /// Build a `Block` from a row plus its restrictions. Rows whose stored
    /// target no longer parses are skipped with a warning rather than
    /// failing the whole listing.
    async fn hydrate(&self, row: BlockRow) -> Result<Option<Block>, DbError> {
        let (
            id,
            target,
            user_id,
            reason,
            set_by,
            set_at,
            expires_at,
            sitewide,
            hardblock,
            create_account_blocked,
            autoblock,
        ) = row;

        let target = match BlockTarget::parse(&target, user_id.unwrap_or(0) as u64) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(block_id = id, target = %target, error = %e, "Skipping block with unparsable target");
                return Ok(None);
            }
        };

        let restrictions = self.load_restrictions(id).await?;

        Ok(Some(Block {
            id,
            target,
            reason,
            set_by,
            set_at,
            expires_at,
            sitewide,
            restrictions,
            hardblock,
            create_account_blocked,
            autoblock,
        }))
    }
}
