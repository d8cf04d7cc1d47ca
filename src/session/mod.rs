/// In-memory session registry
///
/// Tracks which accounts currently hold a live login. There is exactly one
/// registry per server process, owned by the application context: it starts
/// empty, is never persisted, and is cleared on shutdown, so every session is
/// lost when the process restarts. There is no expiry timer; a client that
/// disappears without logging out keeps its session until restart.

use crate::{
    db::account::AccountId,
    error::{MarketError, MarketResult},
    metrics,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A live login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
}

/// Process-wide registry of live sessions, at most one per account
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<AccountId, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `account_id`
    ///
    /// The existence check and the insert happen under one write lock, so two
    /// racing logins for the same account cannot both succeed.
    pub async fn create(&self, account_id: AccountId) -> MarketResult<Session> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&account_id) {
            return Err(MarketError::SessionAlreadyActive);
        }

        let session = Session {
            account_id,
            created_at: Utc::now(),
        };
        sessions.insert(account_id, session.clone());
        metrics::SESSIONS_ACTIVE.set(sessions.len() as i64);

        Ok(session)
    }

    /// Close the session for `account_id`; returns whether one existed
    pub async fn destroy(&self, account_id: AccountId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&account_id).is_some();
        metrics::SESSIONS_ACTIVE.set(sessions.len() as i64);
        removed
    }

    pub async fn is_active(&self, account_id: AccountId) -> bool {
        self.sessions.read().await.contains_key(&account_id)
    }

    pub async fn get(&self, account_id: AccountId) -> Option<Session> {
        self.sessions.read().await.get(&account_id).cloned()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session, returning how many were live
    pub async fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let count = sessions.len();
        sessions.clear();
        metrics::SESSIONS_ACTIVE.set(0);
        count
    }
}
