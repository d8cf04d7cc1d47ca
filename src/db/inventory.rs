/// Inventory table operations
use crate::{
    catalog::ItemId,
    db::account::AccountId,
    error::MarketResult,
};
use sqlx::{SqliteConnection, SqlitePool};

/// Persistent ownership records
#[derive(Clone)]
pub struct InventoryStore {
    db: SqlitePool,
}

impl InventoryStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Item ids owned by an account, ascending
    pub async fn list_owned_items(&self, account: AccountId) -> MarketResult<Vec<ItemId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT item_id FROM inventory WHERE account_id = ?1 ORDER BY item_id",
        )
        .bind(account.0)
        .fetch_all(&self.db)
        .await?;

        Ok(ids.into_iter().map(ItemId).collect())
    }

    pub async fn owns(&self, account: AccountId, item: ItemId) -> MarketResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM inventory WHERE account_id = ?1 AND item_id = ?2",
        )
        .bind(account.0)
        .bind(item.0)
        .fetch_one(&self.db)
        .await?;

        Ok(count > 0)
    }
}

/// Insert an ownership record on the caller's connection
///
/// Returns `false` if the record already existed.
pub async fn insert(conn: &mut SqliteConnection, account: AccountId, item: ItemId) -> MarketResult<bool> {
    let inserted = sqlx::query(
        "INSERT INTO inventory (account_id, item_id) VALUES (?1, ?2)
         ON CONFLICT(account_id, item_id) DO NOTHING",
    )
    .bind(account.0)
    .bind(item.0)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(inserted == 1)
}

/// Remove an ownership record on the caller's connection
///
/// Returns `false` if there was nothing to remove.
pub async fn remove(conn: &mut SqliteConnection, account: AccountId, item: ItemId) -> MarketResult<bool> {
    let removed = sqlx::query("DELETE FROM inventory WHERE account_id = ?1 AND item_id = ?2")
        .bind(account.0)
        .bind(item.0)
        .execute(conn)
        .await?
        .rows_affected();

    Ok(removed == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{account::AccountStore, test_pool};

    #[tokio::test]
    async fn test_insert_is_unique_per_pair() {
        let (_dir, pool) = test_pool().await;
        let accounts = AccountStore::new(pool.clone());
        let inventory = InventoryStore::new(pool.clone());

        let (id, _) = accounts.find_or_create("erin").await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        assert!(insert(&mut *conn, id, ItemId(3)).await.unwrap());
        assert!(!insert(&mut *conn, id, ItemId(3)).await.unwrap());
        assert!(insert(&mut *conn, id, ItemId(1)).await.unwrap());
        drop(conn);

        assert_eq!(
            inventory.list_owned_items(id).await.unwrap(),
            vec![ItemId(1), ItemId(3)]
        );
        assert!(inventory.owns(id, ItemId(3)).await.unwrap());
        assert!(!inventory.owns(id, ItemId(2)).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let (_dir, pool) = test_pool().await;
        let accounts = AccountStore::new(pool.clone());
        let inventory = InventoryStore::new(pool.clone());

        let (id, _) = accounts.find_or_create("frank").await.unwrap();
        let (other, _) = accounts.find_or_create("grace").await.unwrap();

        let mut conn = pool.acquire().await.unwrap();
        insert(&mut *conn, id, ItemId(5)).await.unwrap();
        insert(&mut *conn, other, ItemId(5)).await.unwrap();

        assert!(remove(&mut *conn, id, ItemId(5)).await.unwrap());
        assert!(!remove(&mut *conn, id, ItemId(5)).await.unwrap());
        drop(conn);

        assert!(inventory.list_owned_items(id).await.unwrap().is_empty());
        // Other accounts are untouched
        assert_eq!(inventory.list_owned_items(other).await.unwrap(), vec![ItemId(5)]);
    }
}
