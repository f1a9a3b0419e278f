use std::{future::Future, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::AppConfig;

pub const DEFAULT_PER_PAGE: i64 = 15;
pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Unique, foreign key or check constraint rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("database operation timed out")]
    Timeout,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl RepoError {
    /// Whether the same call could succeed if the client tries again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            RepoError::Timeout => true,
            RepoError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed
            ),
            RepoError::Constraint(_) => false,
        }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db) if db.constraint().is_some() => RepoError::Constraint(db.message().to_string()),
            _ => RepoError::Database(e),
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Runs a gateway call, failing with [`RepoError::Timeout`] once `limit` elapses.
pub async fn bounded<T, F>(limit: Duration, fut: F) -> RepoResult<T>
where
    F: Future<Output = RepoResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res,
        Err(_) => {
            warn!(timeout_ms = limit.as_millis() as u64, "gateway call timed out");
            Err(RepoError::Timeout)
        }
    }
}

/// Query string for list endpoints: `?page=2&per_page=15`.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    /// Saturates for absurd page numbers; such pages are simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl From<Pagination> for PageRequest {
    fn from(p: Pagination) -> Self {
        Self {
            page: p.page.unwrap_or(1).max(1),
            per_page: p.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, req: PageRequest, total: i64) -> Self {
        let last_page = ((total + req.per_page - 1) / req.per_page).max(1);
        Self {
            data,
            current_page: req.page,
            per_page: req.per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

/// Postgres-backed gateway; the per-entity queries live in each feature's `repo.rs`.
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL is not configured")?;
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_timeout_secs))
            .connect(url)
            .await
            .context("connect to database")?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
            warn!(error = %e, "migration failed; continuing");
        } else {
            info!("migrations applied");
        }

        Ok(Self { pool })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let req = PageRequest::from(Pagination::default());
        assert_eq!(req, PageRequest { page: 1, per_page: 15 });

        let req = PageRequest::from(Pagination {
            page: Some(0),
            per_page: Some(1000),
        });
        assert_eq!(req.page, 1);
        assert_eq!(req.per_page, MAX_PER_PAGE);
        assert_eq!(
            PageRequest { page: 3, per_page: 15 }.offset(),
            30
        );
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let req = PageRequest::from(Pagination {
            page: Some(i64::MAX),
            per_page: Some(100),
        });
        assert_eq!(req.offset(), i64::MAX);
        assert!(req.offset() >= 0);
    }

    #[test]
    fn page_computes_last_page() {
        let req = PageRequest { page: 1, per_page: 15 };
        assert_eq!(Page::new(Vec::<i32>::new(), req, 0).last_page, 1);
        assert_eq!(Page::new(vec![1], req, 15).last_page, 1);
        assert_eq!(Page::new(vec![1], req, 16).last_page, 2);
    }

    #[tokio::test]
    async fn bounded_times_out_slow_calls() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, RepoError>(1)
        };
        let err = bounded(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, RepoError::Timeout));
        assert!(err.is_retryable());

        let fast = async { Ok::<_, RepoError>(7) };
        assert_eq!(bounded(Duration::from_secs(1), fast).await.unwrap(), 7);
    }
}
