/// Account management system
///
/// Handles nickname login, logout and the token plus session checks every
/// protected operation goes through.

mod manager;

pub use manager::{AccountManager, LoginOutcome};

use crate::catalog::RawItemId;
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};

pub const NICKNAME_MIN_LEN: usize = 3;
pub const NICKNAME_MAX_LEN: usize = 20;

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub nickname: String,
}

/// Body of every endpoint that only needs the caller's identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

/// Buy or sell request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub token: String,
    pub id: RawItemId,
}

/// Check a nickname against `[a-z0-9_]{3,20}`, ignoring ASCII case
pub fn validate_nickname(nickname: &str) -> MarketResult<()> {
    let len = nickname.chars().count();
    if !(NICKNAME_MIN_LEN..=NICKNAME_MAX_LEN).contains(&len) {
        return Err(MarketError::InvalidNickname);
    }

    if !nickname
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(MarketError::InvalidNickname);
    }

    Ok(())
}
