#[macro_use]
mod common;

use actix_web::test;
use serde_json::{json, Value};

use common::bearer;

#[actix_web::test]
async fn test_register_and_login() {
    let state = common::test_state();
    let app = test_app!(state);

    let register_response = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "phone": " 9876543210 ", "password": "password123" }))
        .send_request(&app)
        .await;
    assert_eq!(register_response.status(), 201);
    let register_body: Value = test::read_body_json(register_response).await;
    assert_eq!(register_body["success"], true);
    assert!(register_body.get("token").is_some());
    assert_eq!(register_body["user"]["phone"], "9876543210");
    assert!(register_body["user"].get("passwordHash").is_none());

    let login_response = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "phone": "9876543210", "password": "password123" }))
        .send_request(&app)
        .await;
    assert_eq!(login_response.status(), 200);
    let login_body: Value = test::read_body_json(login_response).await;
    assert!(login_body.get("token").is_some());
}

#[actix_web::test]
async fn test_invalid_login() {
    let state = common::test_state();
    let app = test_app!(state);
    farmer_token!(app, "9000000000");

    for (phone, password) in [("9000000000", "wrongpass"), ("9111111111", "secret123")] {
        let response = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "phone": phone, "password": password }))
            .send_request(&app)
            .await;
        assert_eq!(response.status(), 401);
        let body: Value = test::read_body_json(response).await;
        assert_eq!(body["message"], "Invalid credentials");
    }
}

#[actix_web::test]
async fn test_invalid_registration() {
    let state = common::test_state();
    let app = test_app!(state);

    let response = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "phone": "9000000000", "password": "123" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);

    let response = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "password": "secret123" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);

    farmer_token!(app, "9000000000");
    let response = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "phone": "9000000000", "password": "secret123" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "User already exists with this phone number");
}

#[actix_web::test]
async fn test_profile_requires_token() {
    let state = common::test_state();
    let app = test_app!(state);

    let response = test::TestRequest::get().uri("/api/auth/profile").send_request(&app).await;
    assert_eq!(response.status(), 401);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Access denied. No token provided.");

    let response = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer("not-a-jwt"))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Invalid token.");
}

#[actix_web::test]
async fn test_profile_update() {
    let state = common::test_state();
    let app = test_app!(state);
    let token = farmer_token!(app, "9222222222");

    let response = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({
            "name": "Lakshmi",
            "email": "Lakshmi@Example.com",
            "selectedCrops": ["rice", "tomato"],
            "primaryCrop": "rice",
            "farmDetails": { "location": "Thanjavur", "size": "small" }
        }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["user"]["name"], "Lakshmi");
    assert_eq!(body["user"]["email"], "lakshmi@example.com");
    assert_eq!(body["user"]["primaryCrop"], "rice");
    assert_eq!(body["user"]["profileComplete"], true);

    // empty values leave fields alone
    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({ "name": "" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["user"]["name"], "Lakshmi");

    let response = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({ "selectedCrops": ["durian"] }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_logout_revokes_token() {
    let state = common::test_state();
    let app = test_app!(state);
    let token = farmer_token!(app, "9333333333");

    let response = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 200);

    let response = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);
}

#[actix_web::test]
async fn test_farmer_and_investor_tokens_are_not_interchangeable() {
    let state = common::test_state();
    let app = test_app!(state);
    let farmer = farmer_token!(app, "9444444444");
    let investor = investor_token!(app, "inv@example.com", "9555555555");

    let response = test::TestRequest::get()
        .uri("/api/auth/profile")
        .insert_header(bearer(&investor))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);

    let response = test::TestRequest::get()
        .uri("/api/investor-auth/profile")
        .insert_header(bearer(&farmer))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);
}

#[actix_web::test]
async fn test_investor_auth_flow() {
    let state = common::test_state();
    let app = test_app!(state);

    let response = test::TestRequest::post()
        .uri("/api/investor-auth/register")
        .set_json(json!({
            "name": "Farhan",
            "email": "Farhan@Example.com",
            "phone": "9666666666",
            "password": "secret123",
            "investmentCapacity": 500000,
            "preferredCrops": ["wheat"]
        }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["data"]["investor"]["email"], "farhan@example.com");
    assert_eq!(body["data"]["investor"]["role"], "investor");

    let response = test::TestRequest::post()
        .uri("/api/investor-auth/register")
        .set_json(json!({
            "name": "Someone",
            "email": "other@example.com",
            "phone": "9666666666",
            "password": "secret123"
        }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
    let dup: Value = test::read_body_json(response).await;
    assert_eq!(dup["message"], "Investor already exists with this email or phone");

    let req = test::TestRequest::post()
        .uri("/api/investor-auth/login")
        .set_json(json!({ "email": "farhan@example.com", "password": "secret123" }))
        .to_request();
    let login: Value = test::call_and_read_body_json(&app, req).await;
    let token = login["data"]["token"].as_str().unwrap().to_string();

    let req = test::TestRequest::put()
        .uri("/api/investor-auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({ "preferredLocations": ["Indore"], "password": "ignored" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["data"]["preferredLocations"], json!(["Indore"]));
    assert_eq!(updated["data"]["investmentCapacity"], 500000.0);

    let req = test::TestRequest::post()
        .uri("/api/investor-auth/login")
        .set_json(json!({ "email": "farhan@example.com", "password": "ignored" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}
