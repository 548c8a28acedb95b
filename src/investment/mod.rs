//! Farmer funding requests, investor accounts and expressions of interest.

pub mod handlers;
pub mod investor_auth;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    investor_auth::configure(cfg);
    handlers::configure(cfg);
}
