#![allow(dead_code, unused_macros)]

use std::sync::Arc;

use actix_web::web;
use cropcare_server::db::MemoryStore;
use cropcare_server::{AppState, Settings};

pub fn test_settings() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

pub fn test_state_with(settings: Settings) -> web::Data<AppState> {
    let state = AppState::with_store(settings, Arc::new(MemoryStore::new())).expect("Failed to build app state");
    web::Data::new(state)
}

pub fn test_state() -> web::Data<AppState> {
    test_state_with(test_settings())
}

/// Builds the full `/api` application over the given state.
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .app_data(cropcare_server::json_config(1024 * 1024))
                .app_data(cropcare_server::query_config())
                .configure(cropcare_server::configure)
                .default_service(actix_web::web::to(cropcare_server::route_not_found)),
        )
        .await
    };
}

/// Registers a farmer and yields their bearer token.
macro_rules! farmer_token {
    ($app:expr, $phone:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(serde_json::json!({ "phone": $phone, "password": "secret123" }))
            .to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&$app, req).await;
        body["token"].as_str().expect("token in register response").to_string()
    }};
}

/// Registers an investor and yields their bearer token.
macro_rules! investor_token {
    ($app:expr, $email:expr, $phone:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/investor-auth/register")
            .set_json(serde_json::json!({
                "name": "Test Investor",
                "email": $email,
                "phone": $phone,
                "password": "secret123"
            }))
            .to_request();
        let body: serde_json::Value = actix_web::test::call_and_read_body_json(&$app, req).await;
        body["data"]["token"].as_str().expect("token in register response").to_string()
    }};
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}
