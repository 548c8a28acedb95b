use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, ResponseError};
use chrono::{DateTime, Duration, Utc};
use futures::future::{ready, LocalBoxFuture, Ready};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::RateLimitSettings;
use crate::error::{AppError, AuthError};

pub const X_RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::minutes(15),
            max_requests: 100,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            window_size: Duration::seconds(settings.window_secs),
            max_requests: settings.max_requests,
        }
    }
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, window_size: Duration) {
        let cutoff = Utc::now() - window_size;
        self.timestamps.retain(|ts| *ts > cutoff);
    }

    fn add_request(&mut self) {
        self.timestamps.push(Utc::now());
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
}

/// Sliding-window request counter keyed by client address.
pub struct RateLimiter {
    windows: Arc<RwLock<HashMap<String, RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub async fn check_rate_limit(&self, key: &str) -> RateLimitStatus {
        let mut windows = self.windows.write().await;

        let window = windows.entry(key.to_string()).or_insert_with(RequestWindow::new);
        window.cleanup_old_requests(self.config.window_size);

        let limit = self.config.max_requests;
        if window.request_count() < limit as usize {
            window.add_request();
            RateLimitStatus {
                allowed: true,
                limit,
                remaining: limit.saturating_sub(window.request_count() as u32),
            }
        } else {
            RateLimitStatus {
                allowed: false,
                limit,
                remaining: 0,
            }
        }
    }

    /// Drops windows with no requests left inside the window.
    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;

        windows.retain(|_, window| {
            window.cleanup_old_requests(self.config.window_size);
            !window.timestamps.is_empty()
        });
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}

/// Middleware applying a [`RateLimiter`] to every request by client IP.
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: Arc::clone(&self.limiter),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = Arc::clone(&self.limiter);

        Box::pin(async move {
            // Forwarded headers are client-controlled, so only the socket peer counts
            let client = req
                .peer_addr()
                .map(|addr| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_owned());

            let status = limiter.check_rate_limit(&client).await;
            if !status.allowed {
                warn!("Rate limit exceeded for {} on {}", client, req.path());
                let response = AppError::from(AuthError::RateLimited).error_response();
                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            headers.insert(HeaderName::from_static(X_RATE_LIMIT_LIMIT), HeaderValue::from(status.limit));
            headers.insert(
                HeaderName::from_static(X_RATE_LIMIT_REMAINING),
                HeaderValue::from(status.remaining),
            );
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use tokio::time::{sleep, Duration as TokioDuration};

    #[tokio::test]
    async fn test_rate_limiter() {
        let config = RateLimitConfig {
            window_size: Duration::seconds(1),
            max_requests: 100,
        };
        let limiter = RateLimiter::new(config);

        for _ in 0..100 {
            assert!(limiter.check_rate_limit("10.0.0.1").await.allowed);
        }

        let denied = limiter.check_rate_limit("10.0.0.1").await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);

        // Other clients have their own window
        assert!(limiter.check_rate_limit("10.0.0.2").await.allowed);

        sleep(TokioDuration::from_millis(1100)).await;

        assert!(limiter.check_rate_limit("10.0.0.1").await.allowed);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_windows() {
        let limiter = RateLimiter::new(RateLimitConfig {
            window_size: Duration::milliseconds(50),
            max_requests: 5,
        });
        limiter.check_rate_limit("10.0.0.1").await;
        assert_eq!(limiter.tracked_clients().await, 1);

        sleep(TokioDuration::from_millis(80)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[actix_web::test]
    async fn test_middleware_rejects_over_limit() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            window_size: Duration::minutes(1),
            max_requests: 2,
        }));
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(limiter))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(X_RATE_LIMIT_REMAINING).unwrap(), "1");

        test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], false);
    }

    #[actix_web::test]
    async fn test_middleware_ignores_forwarded_headers() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            window_size: Duration::minutes(1),
            max_requests: 2,
        }));
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(limiter))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let from = |peer: &str, forwarded: &str| {
            test::TestRequest::get()
                .uri("/")
                .peer_addr(peer.parse().unwrap())
                .insert_header(("X-Forwarded-For", forwarded.to_string()))
                .to_request()
        };

        for forwarded in ["203.0.113.1", "203.0.113.2"] {
            let resp = test::call_service(&app, from("10.1.1.1:4000", forwarded)).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
        let resp = test::call_service(&app, from("10.1.1.1:4001", "203.0.113.3")).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);

        let resp = test::call_service(&app, from("10.1.1.2:4000", "203.0.113.1")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
