use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, ResponseError};
use dashmap::DashMap;
use futures_util::future::{ready, LocalBoxFuture, Ready};

use crate::error::ApiError;

/// Sliding window in-memory rate limiter (process local).
#[derive(Clone)]
pub struct InMemoryRateLimiter {
    store: Arc<DashMap<String, VecDeque<Instant>>>,
    pub enabled: bool,
}

impl InMemoryRateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self { store: Arc::new(DashMap::new()), enabled }
    }

    /// Returns true if allowed, false if limited.
    pub fn check(&self, key: &str, limit: usize, window: Duration) -> bool {
        if !self.enabled { return true; }
        let now = Instant::now();
        let mut entry = self.store.entry(key.to_string()).or_default();
        while let Some(front) = entry.front() {
            if now.duration_since(*front) >= window { entry.pop_front(); } else { break; }
        }
        if entry.len() < limit {
            entry.push_back(now);
            true
        } else {
            false
        }
    }

    /// Drops keys whose whole history has aged out of `window`.
    pub fn sweep(&self, window: Duration) {
        let now = Instant::now();
        self.store.retain(|_, hits| hits.back().is_some_and(|last| now.duration_since(*last) < window));
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: usize,
    pub window: Duration,
    /// Key on `Forwarded`/`X-Forwarded-For` instead of the socket peer.
    /// Only safe when every request passes through a proxy that overwrites them.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: true, max_requests: 1000, window: Duration::from_secs(60), trust_proxy: false }
    }
}

fn client_ip(req: &ServiceRequest, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(ip) = req.connection_info().realip_remote_addr() {
            return ip.to_string();
        }
    }
    req.peer_addr().map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Middleware limiting each client IP per request path.
#[derive(Clone)]
pub struct RateLimit {
    limiter: InMemoryRateLimiter,
    cfg: RateLimitConfig,
}

impl RateLimit {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self { limiter: InMemoryRateLimiter::new(cfg.enabled), cfg }
    }

    pub fn limiter(&self) -> InMemoryRateLimiter {
        self.limiter.clone()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            cfg: self.cfg.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: InMemoryRateLimiter,
    cfg: RateLimitConfig,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = client_ip(&req, self.cfg.trust_proxy);
        let key = format!("{ip}:{}", req.path());
        if !self.limiter.check(&key, self.cfg.max_requests, self.cfg.window) {
            tracing::warn!(%ip, path = req.path(), "rate limit exceeded");
            let err = ApiError::TooManyRequests { retry_after: self.cfg.window.as_secs() };
            let res = req.into_response(err.error_response()).map_into_right_body();
            return Box::pin(async move { Ok(res) });
        }
        let svc = self.service.clone();
        Box::pin(async move {
            let res = svc.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sliding_window_basic() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(50);
        for _ in 0..3 { assert!(rl.check("k", 3, window)); }
        assert!(!rl.check("k", 3, window));
        // other keys are independent
        assert!(rl.check("other", 3, window));
    }

    #[test]
    fn window_expiry_readmits() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(20);
        assert!(rl.check("k", 1, window));
        assert!(!rl.check("k", 1, window));
        std::thread::sleep(Duration::from_millis(30));
        assert!(rl.check("k", 1, window));
    }

    #[test]
    fn disabled_always_allows() {
        let rl = InMemoryRateLimiter::new(false);
        for _ in 0..10 { assert!(rl.check("k", 1, Duration::from_secs(60))); }
    }

    #[test]
    fn sweep_drops_idle_keys() {
        let rl = InMemoryRateLimiter::new(true);
        let window = Duration::from_millis(10);
        rl.check("a", 5, window);
        std::thread::sleep(Duration::from_millis(20));
        rl.check("b", 5, window);
        rl.sweep(window);
        assert_eq!(rl.tracked_keys(), 1);
    }
}
