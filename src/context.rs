/// Application context and dependency injection
use crate::{
    account::AccountManager,
    auth::TokenService,
    catalog::Catalog,
    config::ServerConfig,
    db::{self, account::AccountStore, inventory::InventoryStore},
    error::{MarketError, MarketResult},
    rate_limit::RateLimiter,
    session::SessionRegistry,
    trading::TradingEngine,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub catalog: Arc<Catalog>,
    /// Live sessions; empty at startup and cleared on shutdown
    pub sessions: Arc<SessionRegistry>,
    pub account_manager: Arc<AccountManager>,
    pub trading_engine: Arc<TradingEngine>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> MarketResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let db = db::create_pool(&config.storage.account_db, (&config.storage).into()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        let catalog = Catalog::load(&config.storage.catalog).await?;

        Ok(Self::from_parts(config, db, catalog))
    }

    /// Wire services around an already opened database and loaded catalog
    pub fn from_parts(config: ServerConfig, db: SqlitePool, catalog: Catalog) -> Self {
        let catalog = Arc::new(catalog);
        let sessions = Arc::new(SessionRegistry::new());
        let tokens = Arc::new(TokenService::from_optional_secret(
            config.authentication.jwt_secret.as_deref(),
        ));

        let account_manager = Arc::new(AccountManager::new(
            AccountStore::new(db.clone()),
            InventoryStore::new(db.clone()),
            Arc::clone(&sessions),
            tokens,
            config.credits.clone(),
        ));

        let trading_engine = Arc::new(TradingEngine::new(
            db.clone(),
            Arc::clone(&catalog),
            config.trading.lock_timeout(),
        ));

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config: Arc::new(config),
            db,
            catalog,
            sessions,
            account_manager,
            trading_engine,
            rate_limiter,
        }
    }

    /// Ensure required directories exist
    async fn ensure_directories(config: &ServerConfig) -> MarketResult<()> {
        let dir = &config.storage.data_directory;
        if !dir.exists() {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                MarketError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }

        Ok(())
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
