use crate::{
    db::account::AccountId,
    error::{MarketError, MarketResult},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Fixed set of async mutexes keyed by account id
///
/// Two accounts may share a shard; that only costs parallelism, never
/// correctness.
pub struct AccountLocks {
    shards: Vec<Arc<Mutex<()>>>,
    timeout: Duration,
}

impl AccountLocks {
    pub const DEFAULT_SHARDS: usize = 256;

    pub fn new(shards: usize, timeout: Duration) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Arc::new(Mutex::new(()))).collect(),
            timeout,
        }
    }

    fn shard(&self, account_id: AccountId) -> &Arc<Mutex<()>> {
        let idx = account_id.0.rem_euclid(self.shards.len() as i64) as usize;
        &self.shards[idx]
    }

    /// Wait for the account's shard, giving up after the configured timeout
    pub async fn lock(&self, account_id: AccountId) -> MarketResult<OwnedMutexGuard<()>> {
        let mutex = Arc::clone(self.shard(account_id));
        tokio::time::timeout(self.timeout, mutex.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(account = %account_id, "timed out waiting for account lock");
                MarketError::Timeout(format!("account {} is busy", account_id))
            })
    }
}
