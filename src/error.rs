/// Unified error types for the Bazaar server
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the marketplace
///
/// The `Display` text of the business-rule variants is exactly what a client
/// sees in the `data` field of an error envelope.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Nickname does not match `[a-z0-9_]{3,20}`
    #[error("Invalid nickname!")]
    InvalidNickname,

    /// Item id is not in the catalog
    #[error("Unknown item id!")]
    UnknownItem,

    /// Request body could not be parsed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Item is already in the account's inventory
    #[error("Item was already purchased!")]
    AlreadyOwned,

    /// Account already holds a live session
    #[error("Session already exists!")]
    SessionAlreadyActive,

    /// Item is not in the account's inventory
    #[error("There is no such item in account!")]
    NotOwned,

    /// Balance is lower than the item price
    #[error("Not enough credits to buy item!")]
    InsufficientCredits,

    /// Token resolved, but the account is not logged in
    #[error("Session not found!")]
    SessionNotFound,

    /// Token signature or structure is invalid
    #[error("Invalid token!")]
    InvalidToken,

    /// Account id does not exist
    #[error("Account not found!")]
    AccountNotFound,

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// A bounded wait ran out
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`MarketError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before storage is touched
    Validation,
    /// Business-rule rejection
    Conflict,
    /// Precondition failure on current state
    State,
    /// Timeouts, storage or transport faults
    Transport,
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MarketError::InvalidNickname | MarketError::UnknownItem | MarketError::BadRequest(_) => {
                ErrorKind::Validation
            }
            MarketError::AlreadyOwned | MarketError::SessionAlreadyActive => ErrorKind::Conflict,
            MarketError::NotOwned
            | MarketError::InsufficientCredits
            | MarketError::SessionNotFound
            | MarketError::InvalidToken
            | MarketError::AccountNotFound => ErrorKind::State,
            _ => ErrorKind::Transport,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            MarketError::InvalidNickname | MarketError::UnknownItem | MarketError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            MarketError::AlreadyOwned | MarketError::SessionAlreadyActive => StatusCode::CONFLICT,
            MarketError::NotOwned | MarketError::InsufficientCredits => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            MarketError::SessionNotFound | MarketError::InvalidToken => StatusCode::UNAUTHORIZED,
            MarketError::AccountNotFound => StatusCode::NOT_FOUND,
            MarketError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            MarketError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to put on the wire
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Transport => match self {
                MarketError::RateLimitExceeded { .. } => self.to_string(),
                MarketError::Timeout(_) => "Server is busy, try again later!".to_string(),
                _ => "Internal server error".to_string(), // Don't leak details
            },
            _ => self.to_string(),
        }
    }
}

/// Response envelope shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: EnvelopeStatus,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Ok,
    Error,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            status: EnvelopeStatus::Ok,
            data,
            token: None,
        }
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl Envelope<String> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: message.into(),
            token: None,
        }
    }
}

/// Convert MarketError to HTTP response
impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.kind() == ErrorKind::Transport {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let mut response = (status, Json(Envelope::error(self.public_message()))).into_response();

        if let MarketError::RateLimitExceeded { retry_after } = &self {
            let secs = retry_after.as_secs().max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

impl From<JsonRejection> for MarketError {
    fn from(rejection: JsonRejection) -> Self {
        MarketError::BadRequest(rejection.body_text())
    }
}

impl From<jsonwebtoken::errors::Error> for MarketError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        MarketError::Jwt(e.to_string())
    }
}

/// Result type alias for marketplace operations
pub type MarketResult<T> = Result<T, MarketError>;
