/// Login/logout state machine and caller authentication

use crate::{
    account::validate_nickname,
    auth::{AuthContext, TokenService},
    catalog::ItemId,
    config::CreditsConfig,
    db::{
        account::{AccountId, AccountInfo, AccountStore},
        inventory::InventoryStore,
    },
    error::{MarketError, MarketResult},
    metrics,
    session::SessionRegistry,
};
use std::sync::Arc;

/// Everything a successful login hands back
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub account_id: AccountId,
    pub info: AccountInfo,
    pub token: String,
    pub bonus: i64,
    pub created: bool,
}

/// Account manager service
pub struct AccountManager {
    accounts: AccountStore,
    inventory: InventoryStore,
    sessions: Arc<SessionRegistry>,
    tokens: Arc<TokenService>,
    credits: CreditsConfig,
}

impl AccountManager {
    pub fn new(
        accounts: AccountStore,
        inventory: InventoryStore,
        sessions: Arc<SessionRegistry>,
        tokens: Arc<TokenService>,
        credits: CreditsConfig,
    ) -> Self {
        Self {
            accounts,
            inventory,
            sessions,
            tokens,
            credits,
        }
    }

    /// Log in with a nickname, creating the account on first use
    ///
    /// Fails with `SessionAlreadyActive` if the account is already logged in,
    /// in which case no bonus is granted.
    pub async fn login(&self, nickname: &str) -> MarketResult<LoginOutcome> {
        let result = self.try_login(nickname).await;
        metrics::record_login(metrics::outcome_label(&result));
        result
    }

    async fn try_login(&self, nickname: &str) -> MarketResult<LoginOutcome> {
        validate_nickname(nickname)?;

        let (account_id, created) = self.accounts.find_or_create(nickname).await?;
        if created {
            metrics::record_account_created();
            tracing::info!(account = %account_id, nickname, "account created");
        }

        self.sessions.create(account_id).await?;

        match self.grant_bonus_and_issue(account_id).await {
            Ok((info, token, bonus)) => {
                tracing::info!(
                    account = %account_id,
                    bonus,
                    credits = info.credits,
                    "logged in"
                );
                Ok(LoginOutcome {
                    account_id,
                    info,
                    token,
                    bonus,
                    created,
                })
            }
            Err(e) => {
                // Do not leave the account logged in without its bonus
                self.sessions.destroy(account_id).await;
                tracing::warn!(account = %account_id, error = %e, "login aborted");
                Err(e)
            }
        }
    }

    async fn grant_bonus_and_issue(
        &self,
        account_id: AccountId,
    ) -> MarketResult<(AccountInfo, String, i64)> {
        let bonus = self.credits.roll_login_bonus();
        self.accounts.add_credits(account_id, bonus).await?;

        let info = self.accounts.get_info(account_id).await?;
        let token = self.tokens.issue(account_id)?;

        Ok((info, token, bonus))
    }

    /// End the caller's session
    pub async fn logout(&self, token: &str) -> MarketResult<()> {
        let account_id = self.tokens.resolve(token)?;

        if !self.sessions.destroy(account_id).await {
            return Err(MarketError::SessionNotFound);
        }

        tracing::info!(account = %account_id, "logged out");
        Ok(())
    }

    /// Resolve a token and require a live session for its account
    pub async fn authenticate(&self, token: &str) -> MarketResult<AuthContext> {
        let account_id = self.tokens.resolve(token)?;

        let session = self
            .sessions
            .get(account_id)
            .await
            .ok_or(MarketError::SessionNotFound)?;

        Ok(AuthContext {
            account_id,
            session,
        })
    }

    pub async fn account_info(&self, account_id: AccountId) -> MarketResult<AccountInfo> {
        self.accounts.get_info(account_id).await
    }

    pub async fn owned_items(&self, account_id: AccountId) -> MarketResult<Vec<ItemId>> {
        self.inventory.list_owned_items(account_id).await
    }
}
