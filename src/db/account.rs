/// Account table models and operations
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use std::fmt;

/// Account identity (SQLite rowid)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account record in the database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub nickname: String,
    pub credits: i64,
}

/// Public view of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub nickname: String,
    pub credits: i64,
}

impl From<Account> for AccountInfo {
    fn from(account: Account) -> Self {
        Self {
            nickname: account.nickname,
            credits: account.credits,
        }
    }
}

/// Persistent account store
#[derive(Clone)]
pub struct AccountStore {
    db: SqlitePool,
}

impl AccountStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Look up an account by nickname (case-insensitive), creating it with a
    /// zero balance when absent
    ///
    /// Returns the id and whether the account was created by this call.
    pub async fn find_or_create(&self, nickname: &str) -> MarketResult<(AccountId, bool)> {
        let inserted = sqlx::query(
            "INSERT INTO account (nickname, credits) VALUES (?1, 0)
             ON CONFLICT(nickname) DO NOTHING",
        )
        .bind(nickname)
        .execute(&self.db)
        .await?
        .rows_affected();

        let id: i64 = sqlx::query_scalar("SELECT id FROM account WHERE nickname = ?1")
            .bind(nickname)
            .fetch_one(&self.db)
            .await?;

        Ok((AccountId(id), inserted == 1))
    }

    /// Unconditionally add `amount` to the balance
    pub async fn add_credits(&self, id: AccountId, amount: i64) -> MarketResult<()> {
        let updated = sqlx::query("UPDATE account SET credits = credits + ?1 WHERE id = ?2")
            .bind(amount)
            .bind(id.0)
            .execute(&self.db)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(MarketError::AccountNotFound);
        }

        Ok(())
    }

    /// Get account by id
    pub async fn get(&self, id: AccountId) -> MarketResult<Account> {
        sqlx::query_as::<_, Account>("SELECT id, nickname, credits FROM account WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.db)
            .await?
            .ok_or(MarketError::AccountNotFound)
    }

    pub async fn get_info(&self, id: AccountId) -> MarketResult<AccountInfo> {
        Ok(self.get(id).await?.into())
    }

    pub async fn count(&self) -> MarketResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM account")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

/// Subtract `amount` if the balance covers it
///
/// Runs on the caller's connection so it can share a transaction with the
/// inventory change. Returns `false` when the balance is too low.
pub async fn debit(conn: &mut SqliteConnection, id: AccountId, amount: i64) -> MarketResult<bool> {
    let updated = sqlx::query(
        "UPDATE account SET credits = credits - ?1 WHERE id = ?2 AND credits >= ?1",
    )
    .bind(amount)
    .bind(id.0)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

/// Add `amount` on the caller's connection
pub async fn credit(conn: &mut SqliteConnection, id: AccountId, amount: i64) -> MarketResult<()> {
    let updated = sqlx::query("UPDATE account SET credits = credits + ?1 WHERE id = ?2")
        .bind(amount)
        .bind(id.0)
        .execute(conn)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(MarketError::AccountNotFound);
    }

    Ok(())
}
