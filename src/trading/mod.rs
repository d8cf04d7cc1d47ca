/// Trading engine
///
/// Buy and sell are the only operations that touch both the balance and the
/// inventory of an account. Each runs as one database transaction under a
/// per-account lock, so operations on the same account are serialized while
/// different accounts trade in parallel.

mod locks;

pub use locks::AccountLocks;

use crate::{
    catalog::{Catalog, ItemId},
    db::{
        account::{self, AccountId},
        inventory,
    },
    error::{MarketError, MarketResult},
    metrics,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Which side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    Sell,
}

impl TradeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeKind::Buy => "buy",
            TradeKind::Sell => "sell",
        }
    }

    /// Confirmation shown to the player
    pub fn success_message(&self) -> &'static str {
        match self {
            TradeKind::Buy => "Item was purchased successfully.",
            TradeKind::Sell => "Item was sold successfully.",
        }
    }
}

/// Result of a committed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub kind: TradeKind,
    pub item_id: ItemId,
    pub price: i64,
    pub balance: i64,
}

/// Transactional buy/sell logic over the account and inventory tables
pub struct TradingEngine {
    db: SqlitePool,
    catalog: Arc<Catalog>,
    locks: AccountLocks,
}

impl TradingEngine {
    pub fn new(db: SqlitePool, catalog: Arc<Catalog>, lock_timeout: Duration) -> Self {
        Self {
            db,
            catalog,
            locks: AccountLocks::new(AccountLocks::DEFAULT_SHARDS, lock_timeout),
        }
    }

    /// Buy `item_id` for `account_id`
    ///
    /// Checks, in order: the item is in the catalog, the account does not own
    /// it yet, the balance covers the price. The debit and the ownership
    /// record commit together or not at all.
    pub async fn buy(&self, account_id: AccountId, item_id: ItemId) -> MarketResult<TradeReceipt> {
        let result = self.try_buy(account_id, item_id).await;
        record_outcome(TradeKind::Buy, &result);
        result
    }

    /// Sell `item_id` from `account_id`'s inventory at the catalog price
    pub async fn sell(&self, account_id: AccountId, item_id: ItemId) -> MarketResult<TradeReceipt> {
        let result = self.try_sell(account_id, item_id).await;
        record_outcome(TradeKind::Sell, &result);
        result
    }

    async fn try_buy(&self, account_id: AccountId, item_id: ItemId) -> MarketResult<TradeReceipt> {
        let price = self.catalog.price_of(item_id)?;
        let _guard = self.locks.lock(account_id).await?;

        // Both statements are writes, so the transaction takes the write lock
        // up front instead of upgrading from a stale read snapshot.
        let mut tx = self.db.begin().await?;

        if !inventory::insert(&mut *tx, account_id, item_id).await? {
            return Err(MarketError::AlreadyOwned);
        }

        if !account::debit(&mut *tx, account_id, price).await? {
            // Dropping `tx` rolls back the inventory insert
            return Err(MarketError::InsufficientCredits);
        }

        let balance = current_balance(&mut tx, account_id).await?;
        tx.commit().await?;

        tracing::info!(
            account = %account_id,
            item = %item_id,
            price,
            balance,
            "item purchased"
        );

        Ok(TradeReceipt {
            kind: TradeKind::Buy,
            item_id,
            price,
            balance,
        })
    }

    async fn try_sell(&self, account_id: AccountId, item_id: ItemId) -> MarketResult<TradeReceipt> {
        // The refund is the catalog price, never a recorded purchase price
        let price = self.catalog.price_of(item_id)?;
        let _guard = self.locks.lock(account_id).await?;

        let mut tx = self.db.begin().await?;

        if !inventory::remove(&mut *tx, account_id, item_id).await? {
            return Err(MarketError::NotOwned);
        }

        account::credit(&mut *tx, account_id, price).await?;

        let balance = current_balance(&mut tx, account_id).await?;
        tx.commit().await?;

        tracing::info!(
            account = %account_id,
            item = %item_id,
            price,
            balance,
            "item sold"
        );

        Ok(TradeReceipt {
            kind: TradeKind::Sell,
            item_id,
            price,
            balance,
        })
    }
}

async fn current_balance(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    account_id: AccountId,
) -> MarketResult<i64> {
    let balance: i64 = sqlx::query_scalar("SELECT credits FROM account WHERE id = ?1")
        .bind(account_id.0)
        .fetch_one(&mut **tx)
        .await?;
    Ok(balance)
}

fn record_outcome(kind: TradeKind, result: &MarketResult<TradeReceipt>) {
    metrics::record_trade(kind.as_str(), metrics::outcome_label(result));
}
