//! Fixed-window limiter guarding the mutating routes (`store.throttle`).
//!
//! Each key gets a counter that starts with its first accepted hit and
//! expires `window` later. While the counter is at `max_attempts` further
//! requests are refused with the seconds left until expiry; refused requests
//! are not counted.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{auth::services::authenticate_header, error::ApiError, state::AppState};

const KEY_PREFIX: &str = "store-actions";

/// Time source for the limiter, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_ms: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { limit: u32, remaining: u32 },
    Limited { retry_after: u64 },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one attempt for `key` if the window still has room.
    async fn hit(&self, key: &str) -> RateLimitDecision;
    /// Drops expired windows; returns how many were removed.
    async fn cleanup(&self) -> usize;
    fn window(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    hits: u32,
    expires_at: Instant,
}

pub struct FixedWindowLimiter {
    entries: RwLock<HashMap<String, WindowEntry>>,
    max_attempts: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(max_attempts: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_attempts,
            window,
            clock,
        }
    }
}

fn seconds_until(now: Instant, deadline: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
    secs.max(1)
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn hit(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        // Held across read-compare-increment so concurrent hits cannot both pass.
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key.to_string()).or_insert(WindowEntry {
            hits: 0,
            expires_at: now + self.window,
        });
        if now >= entry.expires_at {
            *entry = WindowEntry {
                hits: 0,
                expires_at: now + self.window,
            };
        }

        if entry.hits >= self.max_attempts {
            return RateLimitDecision::Limited {
                retry_after: seconds_until(now, entry.expires_at),
            };
        }
        entry.hits += 1;
        RateLimitDecision::Allowed {
            limit: self.max_attempts,
            remaining: self.max_attempts - entry.hits,
        }
    }

    async fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    fn window(&self) -> Duration {
        self.window
    }
}

/// Periodically evicts expired windows for the lifetime of the process.
pub fn spawn_cleanup(limiter: Arc<dyn RateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window());
        loop {
            interval.tick().await;
            let removed = limiter.cleanup().await;
            if removed > 0 {
                debug!(removed, "expired rate limit windows evicted");
            }
        }
    })
}

fn client_addr(request: &Request) -> String {
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Limiter key: the authenticated user when the bearer token is valid, the client address otherwise.
///
/// Takes owned parts so the middleware future never borrows the request across an await.
async fn throttle_key(state: &AppState, headers: HeaderMap, addr: String) -> String {
    match authenticate_header(state, &headers).await {
        Ok(user) => format!("{KEY_PREFIX}:user:{}", user.id),
        Err(_) => format!("{KEY_PREFIX}:ip:{addr}"),
    }
}

pub async fn store_throttle(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let headers = request.headers().clone();
    let addr = client_addr(&request);
    let key = throttle_key(&state, headers, addr).await;
    match state.limiter.hit(&key).await {
        RateLimitDecision::Allowed { limit, remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        RateLimitDecision::Limited { retry_after } => {
            warn!(key = %key, retry_after, "rate limit exceeded");
            ApiError::RateLimited { retry_after }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(clock: Arc<ManualClock>) -> FixedWindowLimiter {
        FixedWindowLimiter::new(10, Duration::from_secs(60), clock)
    }

    #[tokio::test]
    async fn eleventh_hit_in_window_is_limited() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());

        for i in 0..10 {
            clock.advance(Duration::from_secs(1));
            match limiter.hit("k").await {
                RateLimitDecision::Allowed { remaining, .. } => assert_eq!(remaining, 9 - i),
                other => panic!("hit {i} refused: {other:?}"),
            }
        }
        match limiter.hit("k").await {
            RateLimitDecision::Limited { retry_after } => {
                // first hit at t=1s, now t=10s, window ends at t=61s
                assert_eq!(retry_after, 51);
            }
            other => panic!("expected limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn window_resets_after_it_elapses() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        for _ in 0..10 {
            limiter.hit("k").await;
        }
        assert!(matches!(limiter.hit("k").await, RateLimitDecision::Limited { .. }));

        clock.advance(Duration::from_secs(60));
        assert_eq!(
            limiter.hit("k").await,
            RateLimitDecision::Allowed { limit: 10, remaining: 9 }
        );
    }

    #[tokio::test]
    async fn refused_hits_do_not_extend_the_window() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        for _ in 0..10 {
            limiter.hit("k").await;
        }
        for _ in 0..5 {
            clock.advance(Duration::from_secs(10));
            assert!(matches!(limiter.hit("k").await, RateLimitDecision::Limited { .. }));
        }
        clock.advance(Duration::from_secs(10));
        assert!(matches!(limiter.hit("k").await, RateLimitDecision::Allowed { .. }));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock);
        for _ in 0..10 {
            limiter.hit("a").await;
        }
        assert!(matches!(limiter.hit("a").await, RateLimitDecision::Limited { .. }));
        assert!(matches!(limiter.hit("b").await, RateLimitDecision::Allowed { .. }));
    }

    #[tokio::test]
    async fn concurrent_hits_never_exceed_the_limit() {
        let limiter = Arc::new(FixedWindowLimiter::new(
            10,
            Duration::from_secs(60),
            Arc::new(SystemClock),
        ));
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let l = limiter.clone();
            tasks.push(tokio::spawn(async move { l.hit("shared").await }));
        }
        let mut allowed = 0;
        for t in tasks {
            if matches!(t.await.unwrap(), RateLimitDecision::Allowed { .. }) {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 10);
    }

    #[tokio::test]
    async fn cleanup_evicts_expired_windows() {
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(clock.clone());
        limiter.hit("a").await;
        limiter.hit("b").await;
        assert_eq!(limiter.cleanup().await, 0);
        clock.advance(Duration::from_secs(61));
        assert_eq!(limiter.cleanup().await, 2);
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = Instant::now();
        assert_eq!(seconds_until(now, now + Duration::from_millis(1500)), 2);
        assert_eq!(seconds_until(now, now), 1);
    }

    #[test]
    fn client_addr_prefers_forwarded_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 172.16.0.1")
            .header("x-real-ip", "10.0.0.2")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_addr(&req), "10.0.0.1");

        let mut req = Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_addr(&req), "unknown");
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_addr(&req), "127.0.0.1");
    }

    #[tokio::test]
    async fn anonymous_requests_are_keyed_by_address() {
        let st = AppState::fake();
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer garbage"));
        let key = throttle_key(&st, headers, "10.0.0.1".into()).await;
        assert_eq!(key, "store-actions:ip:10.0.0.1");
    }
}
