/// Token issuance and verification
///
/// Tokens are HS256 JWTs carrying the account id. They have no expiry: a
/// token only proves identity. Whether the holder is still logged in is a
/// separate question answered by the session registry.
use crate::{
    db::account::AccountId,
    error::{MarketError, MarketResult},
    session::Session,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    jti: String,
}

/// Signs and verifies tokens with a process-wide key
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Use `secret` if configured, otherwise a fresh random one
    pub fn from_optional_secret(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) => Self::new(secret),
            None => {
                tracing::warn!("No BAZAAR_JWT_SECRET configured, generating a random signing key");
                Self::new(&generate_secret())
            }
        }
    }

    pub fn issue(&self, account_id: AccountId) -> MarketResult<String> {
        let claims = Claims {
            sub: account_id.to_string(),
            iat: Utc::now().timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| MarketError::Jwt(format!("Failed to generate token: {}", e)))
    }

    /// Verify signature and structure, returning the embedded account id
    pub fn resolve(&self, token: &str) -> MarketResult<AccountId> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("Token verification failed: {}", e);
            MarketError::InvalidToken
        })?;

        data.claims
            .sub
            .parse::<i64>()
            .map(AccountId)
            .map_err(|_| MarketError::InvalidToken)
    }
}

fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Caller identity after both authentication steps passed
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub account_id: AccountId,
    pub session: Session,
}
