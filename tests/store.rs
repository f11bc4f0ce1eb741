//! Block store round-trips and lifecycle behavior.

use blockd::{AddressFamily, BlockTarget, Database, DbError, NewBlock, Restriction};
use chrono::Utc;

#[tokio::test]
async fn insert_and_reload_roundtrip() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    let mut new = NewBlock::new("70.2.0.0/16".parse().unwrap(), "sysop");
    new.reason = Some("Range Hardblock".to_string());
    new.hardblock = true;
    new.autoblock = true;
    let id = repo.insert_block(&new).await.unwrap();

    let block = repo.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(block.id, id);
    assert_eq!(block.target.to_string(), "70.2.0.0/16");
    assert_eq!(block.reason.as_deref(), Some("Range Hardblock"));
    assert_eq!(block.set_by, "sysop");
    assert!(block.hardblock);
    assert!(block.autoblock);
    assert!(block.sitewide);
    assert!(block.expires_at.is_none());
    assert!(block.set_at > 0);
}

#[tokio::test]
async fn get_by_target_finds_the_active_block() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    let target: BlockTarget = "50.1.1.1".parse().unwrap();
    repo.insert_block(&NewBlock::new(target.clone(), "sysop"))
        .await
        .unwrap();

    let found = repo.get_by_target(&target).await.unwrap();
    assert!(found.is_some());

    let other: BlockTarget = "50.1.1.2".parse().unwrap();
    assert!(repo.get_by_target(&other).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_insert_is_rejected() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    let new = NewBlock::new("UserOnForeignWiki".parse().unwrap(), "sysop");
    repo.insert_block(&new).await.unwrap();

    let err = repo.insert_block(&new).await.unwrap_err();
    assert!(matches!(err, DbError::DuplicateBlock(t) if t == "UserOnForeignWiki"));
}

#[tokio::test]
async fn failed_insert_leaves_no_partial_block_behind() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    // A repeated (kind, value) pair violates the restriction primary key,
    // failing the insert midway through its restriction rows.
    let mut bad = NewBlock::new("Vandal".parse().unwrap(), "sysop");
    bad.sitewide = false;
    bad.restrictions = vec![
        Restriction::Page("Sandbox".to_string()),
        Restriction::Page("Sandbox".to_string()),
    ];
    assert!(repo.insert_block(&bad).await.is_err());

    // The whole insert rolled back: no block row, no restriction rows, and
    // the target is still free to block.
    assert!(repo.list_active().await.unwrap().is_empty());
    let leftovers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM block_restrictions")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(leftovers, 0);

    let good = NewBlock::new("Vandal".parse().unwrap(), "sysop");
    repo.insert_block(&good).await.unwrap();
}

#[tokio::test]
async fn expired_block_does_not_count_as_duplicate() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    let mut stale = NewBlock::new("10.0.0.1".parse().unwrap(), "sysop");
    stale.expires_at = Some(Utc::now().timestamp() - 3600);
    repo.insert_block(&stale).await.unwrap();

    // The leftover is treated as absent: re-blocking succeeds.
    let fresh = NewBlock::new("10.0.0.1".parse().unwrap(), "sysop");
    repo.insert_block(&fresh).await.unwrap();

    let active = repo
        .list_active_for_family(AddressFamily::V4)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].expires_at.is_none());
}

#[tokio::test]
async fn listing_is_split_by_family_and_user() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    for target in ["70.2.0.0/16", "50.1.1.1", "2001:4860:4001::/48", "Vandal"] {
        let new = NewBlock::new(target.parse().unwrap(), "sysop");
        repo.insert_block(&new).await.unwrap();
    }

    let v4 = repo
        .list_active_for_family(AddressFamily::V4)
        .await
        .unwrap();
    assert_eq!(v4.len(), 2);

    let v6 = repo
        .list_active_for_family(AddressFamily::V6)
        .await
        .unwrap();
    assert_eq!(v6.len(), 1);
    assert_eq!(v6[0].target.to_string(), "2001:4860:4001::/48");

    let user = repo.list_active_for_user("Vandal").await.unwrap();
    assert_eq!(user.len(), 1);
    assert!(user[0].target.matches_name("Vandal"));
    assert!(repo.list_active_for_user("Nobody").await.unwrap().is_empty());

    assert_eq!(repo.list_active().await.unwrap().len(), 4);
}

#[tokio::test]
async fn restrictions_roundtrip_with_their_block() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    let mut new = NewBlock::new("Vandal".parse().unwrap(), "sysop");
    new.sitewide = false;
    new.restrictions = vec![
        Restriction::Page("Sandbox".to_string()),
        Restriction::Namespace(4),
    ];
    let id = repo.insert_block(&new).await.unwrap();

    let block = repo.get_by_id(id).await.unwrap().unwrap();
    assert!(!block.sitewide);
    assert_eq!(block.restrictions.len(), 2);
    assert!(block.applies_to_page("Sandbox", 0));
    assert!(block.applies_to_namespace(4));
    assert!(!block.applies_to_page("Main Page", 0));
}

#[tokio::test]
async fn delete_removes_block_and_restrictions() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();

    let mut new = NewBlock::new("Vandal".parse().unwrap(), "sysop");
    new.sitewide = false;
    new.restrictions = vec![Restriction::Page("Sandbox".to_string())];
    let id = repo.insert_block(&new).await.unwrap();

    assert!(repo.delete_block(id).await.unwrap());
    assert!(repo.get_by_id(id).await.unwrap().is_none());
    assert!(!repo.delete_block(id).await.unwrap());

    // Cascade left no orphaned restriction rows behind.
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM block_restrictions")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(orphans, 0);
}

#[tokio::test]
async fn prune_deletes_only_expired_rows() {
    let db = Database::new(":memory:").await.unwrap();
    let repo = db.blocks();
    let now = Utc::now().timestamp();

    let mut expired = NewBlock::new("10.0.0.1".parse().unwrap(), "sysop");
    expired.expires_at = Some(now - 60);
    repo.insert_block(&expired).await.unwrap();

    let mut live = NewBlock::new("10.0.0.2".parse().unwrap(), "sysop");
    live.expires_at = Some(now + 3600);
    repo.insert_block(&live).await.unwrap();

    repo.insert_block(&NewBlock::new("10.0.0.3".parse().unwrap(), "sysop"))
        .await
        .unwrap();

    assert_eq!(repo.prune_expired().await.unwrap(), 1);
    assert_eq!(repo.list_active().await.unwrap().len(), 2);
}

#[tokio::test]
async fn blocks_survive_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocks.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new(path).await.unwrap();
        let mut new = NewBlock::new("70.2.0.0/16".parse().unwrap(), "sysop");
        new.hardblock = true;
        db.blocks().insert_block(&new).await.unwrap();
    }

    let db = Database::new(path).await.unwrap();
    let blocks = db.blocks().list_active().await.unwrap();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].hardblock);
    assert_eq!(blocks[0].target.to_string(), "70.2.0.0/16");
}
