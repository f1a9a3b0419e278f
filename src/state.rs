use std::{future::Future, sync::Arc, time::Duration};

use tracing::info;

use crate::{
    auth::repo::TokenStore,
    categories::repo::CategoryRepo,
    config::{AppConfig, JwtConfig, StorageKind, ThrottleConfig},
    db::{self, PgStore, RepoResult},
    memory::MemoryStore,
    recipes::repo::RecipeRepo,
    throttle::{Clock, FixedWindowLimiter, ManualClock, RateLimiter, SystemClock},
    users::repo::UserRepo,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepo>,
    pub categories: Arc<dyn CategoryRepo>,
    pub recipes: Arc<dyn RecipeRepo>,
    pub tokens: Arc<dyn TokenStore>,
    pub limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let limiter = Self::limiter(&config.throttle, Arc::new(SystemClock));

        match config.storage {
            StorageKind::Postgres => {
                let store = Arc::new(PgStore::connect(&config).await?);
                info!("using postgres storage");
                Ok(Self::from_parts(config, store, limiter))
            }
            StorageKind::Memory => {
                info!("using in-memory storage; data is lost on restart");
                Ok(Self::from_parts(config, Arc::new(MemoryStore::new()), limiter))
            }
        }
    }

    pub fn from_parts<S>(config: Arc<AppConfig>, store: Arc<S>, limiter: Arc<dyn RateLimiter>) -> Self
    where
        S: UserRepo + CategoryRepo + RecipeRepo + TokenStore + 'static,
    {
        Self {
            config,
            users: store.clone(),
            categories: store.clone(),
            recipes: store.clone(),
            tokens: store,
            limiter,
        }
    }

    fn limiter(cfg: &ThrottleConfig, clock: Arc<dyn Clock>) -> Arc<dyn RateLimiter> {
        Arc::new(FixedWindowLimiter::new(
            cfg.max_attempts,
            Duration::from_secs(cfg.window_secs),
            clock,
        ))
    }

    /// Runs a gateway call under the configured timeout.
    pub async fn bounded<T, F>(&self, fut: F) -> RepoResult<T>
    where
        F: Future<Output = RepoResult<T>>,
    {
        db::bounded(Duration::from_secs(self.config.db_timeout_secs), fut).await
    }

    pub fn fake() -> Self {
        Self::fake_with_clock(Arc::new(ManualClock::new()))
    }

    /// In-memory state with fixed secrets and a limiter driven by `clock`.
    pub fn fake_with_clock(clock: Arc<ManualClock>) -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            storage: StorageKind::Memory,
            database_url: None,
            db_max_connections: 1,
            db_timeout_secs: 5,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            throttle: ThrottleConfig::default(),
        });
        let limiter = Self::limiter(&config.throttle, clock);
        Self::from_parts(config, Arc::new(MemoryStore::new()), limiter)
    }
}
