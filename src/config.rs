/// Configuration management for Bazaar
use crate::error::{MarketError, MarketResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub credits: CreditsConfig,
    pub trading: TradingConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub account_db: PathBuf,
    pub catalog: PathBuf,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub busy_timeout_secs: u64,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign tokens. Generated at startup when unset.
    pub jwt_secret: Option<String>,
}

/// Login bonus range, both ends inclusive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditsConfig {
    pub range_begin: i64,
    pub range_end: i64,
}

/// Trading engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub lock_timeout_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub login_requests_per_second: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl CreditsConfig {
    /// Draw a login bonus uniformly from the configured range
    pub fn roll_login_bonus(&self) -> i64 {
        rand::thread_rng().gen_range(self.range_begin..=self.range_end)
    }
}

impl StorageConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

impl TradingConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MarketResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("BAZAAR_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("BAZAAR_PORT")
            .unwrap_or_else(|_| "1234".to_string())
            .parse()
            .map_err(|_| MarketError::Config("Invalid port number".to_string()))?;

        let data_directory: PathBuf = env::var("BAZAAR_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let account_db = env::var("BAZAAR_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("bazaar.sqlite"));
        let catalog = env::var("BAZAAR_CATALOG_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("all_items.json"));

        let jwt_secret = env::var("BAZAAR_JWT_SECRET").ok().filter(|s| !s.is_empty());

        let range_begin = env::var("BAZAAR_CREDITS_RANGE_BEGIN")
            .unwrap_or_else(|_| "50000".to_string())
            .parse()
            .map_err(|_| MarketError::Config("Invalid credits range begin".to_string()))?;
        let range_end = env::var("BAZAAR_CREDITS_RANGE_END")
            .unwrap_or_else(|_| "100000".to_string())
            .parse()
            .map_err(|_| MarketError::Config("Invalid credits range end".to_string()))?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                data_directory,
                account_db,
                catalog,
                max_connections: env_parse("BAZAAR_DB_MAX_CONNECTIONS", 10),
                acquire_timeout_secs: env_parse("BAZAAR_DB_ACQUIRE_TIMEOUT_SECS", 5),
                busy_timeout_secs: env_parse("BAZAAR_DB_BUSY_TIMEOUT_SECS", 5),
            },
            authentication: AuthConfig { jwt_secret },
            credits: CreditsConfig {
                range_begin,
                range_end,
            },
            trading: TradingConfig {
                lock_timeout_secs: env_parse("BAZAAR_TRADE_LOCK_TIMEOUT_SECS", 5),
            },
            rate_limit: RateLimitConfig {
                enabled: env_parse("BAZAAR_RATE_LIMITS_ENABLED", true),
                requests_per_second: env_parse("BAZAAR_RATE_LIMIT_RPS", 100),
                login_requests_per_second: env_parse("BAZAAR_RATE_LIMIT_LOGIN_RPS", 10),
                burst_size: env_parse("BAZAAR_RATE_LIMIT_BURST", 50),
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Configuration rooted at `data_directory`, with defaults everywhere else
    pub fn with_data_directory(data_directory: impl Into<PathBuf>) -> Self {
        let data_directory = data_directory.into();
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
            },
            storage: StorageConfig {
                account_db: data_directory.join("bazaar.sqlite"),
                catalog: data_directory.join("all_items.json"),
                data_directory,
                max_connections: 10,
                acquire_timeout_secs: 5,
                busy_timeout_secs: 5,
            },
            authentication: AuthConfig { jwt_secret: None },
            credits: CreditsConfig {
                range_begin: 50_000,
                range_end: 100_000,
            },
            trading: TradingConfig {
                lock_timeout_secs: 5,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_second: 100,
                login_requests_per_second: 10,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> MarketResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MarketError::Config("Hostname cannot be empty".to_string()));
        }

        if self.credits.range_begin < 0 {
            return Err(MarketError::Config(
                "Credits range cannot start below zero".to_string(),
            ));
        }

        if self.credits.range_begin > self.credits.range_end {
            return Err(MarketError::Config(format!(
                "Credits range is empty: {}..={}",
                self.credits.range_begin, self.credits.range_end
            )));
        }

        if self.storage.max_connections == 0 {
            return Err(MarketError::Config(
                "Database pool needs at least one connection".to_string(),
            ));
        }

        if self.storage.acquire_timeout_secs == 0
            || self.storage.busy_timeout_secs == 0
            || self.trading.lock_timeout_secs == 0
        {
            return Err(MarketError::Config("Timeouts must be positive".to_string()));
        }

        if let Some(secret) = &self.authentication.jwt_secret {
            if secret.len() < 16 {
                return Err(MarketError::Config(
                    "JWT secret must be at least 16 characters".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    pub timeout_secs: u64,
}

impl ClientConfig {
    /// Load client configuration from environment variables
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let server_url = env::var("BAZAAR_SERVER_URL").unwrap_or_else(|_| {
            let host = env::var("BAZAAR_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
            let port = env::var("BAZAAR_PORT").unwrap_or_else(|_| "1234".to_string());
            format!("http://{}:{}", host, port)
        });

        Self {
            server_url,
            timeout_secs: env_parse("BAZAAR_CLIENT_TIMEOUT_SECS", 3),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:1234".to_string(),
            timeout_secs: 3,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
