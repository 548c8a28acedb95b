#[macro_use]
mod common;

use actix_web::test;
use serde_json::{json, Value};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[actix_web::test]
async fn test_weather_mock_without_api_key() {
    let state = common::test_state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/weather/forecast/Nagpur").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["current"]["city"], "Nagpur");
    assert_eq!(body["data"]["current"]["windSpeed"], 12.0);
    assert_eq!(body["data"]["forecast"].as_array().unwrap().len(), 8);

    let req = test::TestRequest::get().uri("/api/weather/forecast/coords/21.1/79.0").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["current"]["city"], "Your Location");

    let response = test::TestRequest::get()
        .uri("/api/weather/forecast/coords/north/79.0")
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_weather_upstream_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut settings = common::test_settings();
    settings.weather.base_url = server.uri();
    settings.weather.api_key = Some("real-key".into());
    let state = common::test_state_with(settings);
    let app = test_app!(state);

    let response = test::TestRequest::get().uri("/api/weather/forecast/Pune").send_request(&app).await;
    assert_eq!(response.status(), 500);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Failed to fetch weather data");
}

#[actix_web::test]
async fn test_mandi_prices() {
    let state = common::test_state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/mandi/prices?crop=tomato").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["source"], "mock_data");
    assert_eq!(body["data"]["records"][0]["market"], "Mumbai APMC");
    assert_eq!(body["data"]["totalRecords"], 1);

    let req = test::TestRequest::get().uri("/api/mandi/prices?limit=3").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["records"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"]["totalRecords"], 5);

    let response = test::TestRequest::get().uri("/api/mandi/test-govt-api").send_request(&app).await;
    assert_eq!(response.status(), 500);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Government API test failed");
}

#[actix_web::test]
async fn test_mandi_government_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("api-key", "gov-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "records": [
                { "commodity": "Onion", "state": "Maharashtra", "modal_price": "1900" },
                { "commodity": "Garlic", "state": "Madhya Pradesh", "modal_price": "9000" }
            ]
        })))
        .mount(&server)
        .await;

    let mut settings = common::test_settings();
    settings.mandi.api_url = server.uri();
    settings.mandi.api_key = Some("gov-key".into());
    let state = common::test_state_with(settings);
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/mandi/prices?crop=onion").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["source"], "government_api");
    assert_eq!(body["data"]["totalRecords"], 1);

    // nothing matches, so every upstream record is returned
    let req = test::TestRequest::get().uri("/api/mandi/prices?crop=saffron").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["totalRecords"], 2);

    let req = test::TestRequest::get().uri("/api/mandi/test-govt-api").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["message"], "Government API is working");
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_crop_rates() {
    let state = common::test_state();
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/crop-rates/rates/Mumbai").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["city"], "Mumbai");
    assert_eq!(body["data"]["currency"], "INR");
    assert_eq!(body["data"]["rates"].as_object().unwrap().len(), 6);
    let tomato = body["data"]["rates"]["tomato"]["price"].as_i64().unwrap();
    assert!((43..=47).contains(&tomato));

    let req = test::TestRequest::get().uri("/api/crop-rates/rates/delhi/Wheat,onion,kiwi").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let rates = body["data"]["rates"].as_object().unwrap();
    assert_eq!(rates.len(), 2);
    assert_eq!(rates["wheat"]["unit"], "quintal");
}
