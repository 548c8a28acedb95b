//! Bearer-token authentication for farmers and investors.
//!
//! Tokens are HS256 JWTs backed by a stored session so that logout revokes them.

pub mod extract;
pub mod handlers;
mod rate_limit;
mod service;

pub use extract::{AuthenticatedInvestor, AuthenticatedUser, BearerToken, Principal};
pub use rate_limit::{RateLimit, RateLimitConfig, RateLimitStatus, RateLimiter};
pub use service::{hash_token, AuthService, Claims, NewInvestor, MIN_PASSWORD_LEN};
