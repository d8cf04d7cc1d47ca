/// Marketplace client
///
/// A thin wrapper over the HTTP API that keeps the login token and two
/// caches:
///
/// - the catalog, fetched once and kept for the lifetime of the client. The
///   server never changes its catalog while running, so a cached copy can only
///   go stale across a server restart;
/// - the account info, filled by login and discarded after every successful
///   buy or sell, then refetched on the next read.
///
/// Nothing is retried automatically.
use crate::{
    account::{validate_nickname, LoginRequest, TokenRequest, TradeRequest},
    catalog::{Catalog, ItemId, RawItemId},
    config::ClientConfig,
    db::account::AccountInfo,
    error::{Envelope, EnvelopeStatus},
};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Shown for every transport failure; the cause goes to the log
pub const TRANSPORT_ERROR_MESSAGE: &str = "Error during getting data!";

#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error envelope
    #[error("{0}")]
    Rejected(String),

    /// Timeout, connection failure or unreadable response
    #[error("{}", TRANSPORT_ERROR_MESSAGE)]
    Transport(#[from] reqwest::Error),

    /// Envelope arrived but its payload has an unexpected shape
    #[error("{}", TRANSPORT_ERROR_MESSAGE)]
    Malformed(#[from] serde_json::Error),

    /// Operation needs a token and there is none
    #[error("Not logged in!")]
    NotLoggedIn,
}

pub type ClientResult<T> = Result<T, ClientError>;

pub struct MarketClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    account_info: Option<AccountInfo>,
    catalog: Option<Catalog>,
}

impl MarketClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("bazaar-client/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.server_url.trim_end_matches('/').to_string(),
            token: None,
            account_info: None,
            catalog: None,
        })
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Log in, storing the token and the returned account info
    ///
    /// The nickname is checked locally first, so an invalid one never reaches
    /// the server.
    pub async fn login(&mut self, nickname: &str) -> ClientResult<AccountInfo> {
        validate_nickname(nickname).map_err(|e| ClientError::Rejected(e.to_string()))?;

        let envelope = self
            .post(
                "login",
                &LoginRequest {
                    nickname: nickname.to_string(),
                },
            )
            .await?;

        let token = envelope.token.clone();
        let info: AccountInfo = unwrap_envelope(envelope)?;
        let token = token.ok_or_else(|| ClientError::Rejected("Login returned no token!".to_string()))?;

        self.token = Some(token);
        self.account_info = Some(info.clone());

        Ok(info)
    }

    /// Log out on a best-effort basis
    ///
    /// The local token is dropped whatever the server says.
    pub async fn logout(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        self.account_info = None;

        let result = self
            .post("logout", &TokenRequest { token })
            .await
            .and_then(unwrap_envelope::<String>);

        if let Err(e) = result {
            tracing::info!(error = ?e, "logout request failed, token discarded anyway");
        }
    }

    /// Account info, served from cache when present
    pub async fn account_info(&mut self) -> ClientResult<AccountInfo> {
        if let Some(info) = &self.account_info {
            return Ok(info.clone());
        }

        let info: AccountInfo = self.request_with_token("get_account_info").await?;
        self.account_info = Some(info.clone());

        Ok(info)
    }

    /// Full catalog, fetched at most once
    pub async fn all_items(&mut self) -> ClientResult<Catalog> {
        if let Some(catalog) = &self.catalog {
            return Ok(catalog.clone());
        }

        let catalog: Catalog = self.request_with_token("get_all_items").await?;
        self.catalog = Some(catalog.clone());

        Ok(catalog)
    }

    pub async fn my_items(&mut self) -> ClientResult<Vec<ItemId>> {
        self.request_with_token("get_my_items").await
    }

    /// Buy an item, returning the server's confirmation message
    pub async fn buy(&mut self, item_id: impl Into<RawItemId>) -> ClientResult<String> {
        self.trade("buy_item", item_id.into()).await
    }

    /// Sell an item, returning the server's confirmation message
    pub async fn sell(&mut self, item_id: impl Into<RawItemId>) -> ClientResult<String> {
        self.trade("sell_item", item_id.into()).await
    }

    async fn trade(&mut self, endpoint: &str, id: RawItemId) -> ClientResult<String> {
        let token = self.token.clone().ok_or(ClientError::NotLoggedIn)?;

        let envelope = self.post(endpoint, &TradeRequest { token, id }).await?;
        let message: String = unwrap_envelope(envelope)?;

        // Balance changed; refetch on next read
        self.account_info = None;

        Ok(message)
    }

    async fn request_with_token<T: DeserializeOwned>(&self, endpoint: &str) -> ClientResult<T> {
        let token = self.token.clone().ok_or(ClientError::NotLoggedIn)?;
        let envelope = self.post(endpoint, &TokenRequest { token }).await?;
        unwrap_envelope(envelope)
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ClientResult<Envelope<serde_json::Value>> {
        let url = format!("{}/{}", self.base_url, endpoint);

        // Error envelopes come with non-2xx statuses, so the status is not checked
        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        response
            .json::<Envelope<serde_json::Value>>()
            .await
            .map_err(|e| transport_error(&url, e))
    }
}

fn transport_error(url: &str, e: reqwest::Error) -> ClientError {
    tracing::warn!(url, error = %e, "request failed");
    ClientError::Transport(e)
}

fn unwrap_envelope<T: DeserializeOwned>(envelope: Envelope<serde_json::Value>) -> ClientResult<T> {
    match envelope.status {
        EnvelopeStatus::Ok => Ok(serde_json::from_value(envelope.data)?),
        EnvelopeStatus::Error => Err(ClientError::Rejected(
            envelope
                .data
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| envelope.data.to_string()),
        )),
    }
}
