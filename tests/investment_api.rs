#[macro_use]
mod common;

use actix_web::test;
use serde_json::{json, Value};

use common::bearer;

fn request_body(crop: &str, location: &str, equity: f64) -> Value {
    json!({
        "farmerName": "Ravi",
        "cropType": crop,
        "location": location,
        "landSize": 3,
        "investmentNeeded": 150000,
        "equityOffered": equity,
        "taxRate": 5,
        "contactMobile": "9123456780"
    })
}

#[actix_web::test]
async fn test_opportunities_are_filtered_and_public() {
    let state = common::test_state();
    let app = test_app!(state);
    let farmer = farmer_token!(app, "9200000001");

    for (crop, location, equity) in [("Sugarcane", "Kolhapur", 20.0), ("Rice", "Nellore", 35.0), ("Sugar beet", "Pune", 50.0)] {
        let response = test::TestRequest::post()
            .uri("/api/investment/farmer/request")
            .insert_header(bearer(&farmer))
            .set_json(request_body(crop, location, equity))
            .send_request(&app)
            .await;
        assert_eq!(response.status(), 201);
    }

    let req = test::TestRequest::get().uri("/api/investment/opportunities").to_request();
    let all: Value = test::call_and_read_body_json(&app, req).await;
    let all = all["data"].as_array().unwrap().clone();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0]["cropType"], "Sugar beet");
    assert_eq!(all[0]["farmer"]["phone"], "9200000001");

    let req = test::TestRequest::get()
        .uri("/api/investment/opportunities?cropType=SUGAR&maxEquity=20")
        .to_request();
    let filtered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(filtered["data"].as_array().unwrap().len(), 1);
    assert_eq!(filtered["data"][0]["location"], "Kolhapur");

    let req = test::TestRequest::get()
        .uri("/api/investment/opportunities?minEquity=35&location=nell")
        .to_request();
    let filtered: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(filtered["data"].as_array().unwrap().len(), 1);

    let response = test::TestRequest::get()
        .uri("/api/investment/opportunities?minEquity=lots")
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_farmer_request_validation() {
    let state = common::test_state();
    let app = test_app!(state);
    let farmer = farmer_token!(app, "9200000002");

    let response = test::TestRequest::post()
        .uri("/api/investment/farmer/request")
        .set_json(request_body("Rice", "Nellore", 10.0))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);

    let response = test::TestRequest::post()
        .uri("/api/investment/farmer/request")
        .insert_header(bearer(&farmer))
        .set_json(request_body("Rice", "Nellore", 140.0))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
}

#[actix_web::test]
async fn test_interest_lifecycle() {
    let state = common::test_state();
    let app = test_app!(state);
    let farmer = farmer_token!(app, "9200000003");
    let stranger = farmer_token!(app, "9200000004");
    let investor = investor_token!(app, "angel@example.com", "9300000001");

    let req = test::TestRequest::post()
        .uri("/api/investment/farmer/request")
        .insert_header(bearer(&farmer))
        .set_json(request_body("Cotton", "Akola", 25.0))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let request_id = created["data"]["id"].as_str().unwrap().to_string();

    let response = test::TestRequest::post()
        .uri("/api/investment/investor/interest")
        .insert_header(bearer(&investor))
        .set_json(json!({ "farmerRequestId": uuid::Uuid::new_v4() }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 404);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Farmer request not found");

    let response = test::TestRequest::post()
        .uri("/api/investment/investor/interest")
        .insert_header(bearer(&investor))
        .set_json(json!({ "farmerRequestId": request_id }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 201);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["data"]["message"], "I am interested in investing in your farming project.");
    assert_eq!(body["data"]["status"], "pending");
    let interest_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = test::TestRequest::post()
        .uri("/api/investment/investor/interest")
        .insert_header(bearer(&investor))
        .set_json(json!({ "farmerRequestId": request_id }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);
    let body: Value = test::read_body_json(response).await;
    assert_eq!(body["message"], "Interest already expressed for this opportunity");

    // farmers may express interest as investors too
    let response = test::TestRequest::post()
        .uri("/api/investment/investor/interest")
        .insert_header(bearer(&stranger))
        .set_json(json!({ "farmerRequestId": request_id, "message": "Happy to help" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 201);

    let req = test::TestRequest::get()
        .uri("/api/investment/farmer/my-requests")
        .insert_header(bearer(&farmer))
        .to_request();
    let mine: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(mine["data"][0]["interestCount"], 2);

    let req = test::TestRequest::get()
        .uri("/api/investment/farmer/interests")
        .insert_header(bearer(&farmer))
        .to_request();
    let interests: Value = test::call_and_read_body_json(&app, req).await;
    let interests = interests["data"].as_array().unwrap().clone();
    assert_eq!(interests.len(), 2);
    let from_investor = interests.iter().find(|i| i["id"] == interest_id.as_str()).unwrap();
    assert_eq!(from_investor["investor"]["email"], "angel@example.com");
    assert_eq!(from_investor["farmerRequest"]["cropType"], "Cotton");
    let from_farmer = interests.iter().find(|i| i["id"] != interest_id.as_str()).unwrap();
    assert_eq!(from_farmer["investor"]["phone"], "9200000004");

    // only the owning farmer can change the status
    let response = test::TestRequest::put()
        .uri("/api/investment/farmer/interest-status")
        .insert_header(bearer(&stranger))
        .set_json(json!({ "interestId": interest_id, "status": "accepted" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 404);

    let response = test::TestRequest::put()
        .uri("/api/investment/farmer/interest-status")
        .insert_header(bearer(&farmer))
        .set_json(json!({ "interestId": interest_id, "status": "maybe" }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 400);

    let req = test::TestRequest::put()
        .uri("/api/investment/farmer/interest-status")
        .insert_header(bearer(&farmer))
        .set_json(json!({ "interestId": interest_id, "status": "accepted" }))
        .to_request();
    let updated: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(updated["data"]["status"], "accepted");
}

#[actix_web::test]
async fn test_interest_requires_authentication() {
    let state = common::test_state();
    let app = test_app!(state);

    let response = test::TestRequest::post()
        .uri("/api/investment/investor/interest")
        .set_json(json!({ "farmerRequestId": uuid::Uuid::new_v4() }))
        .send_request(&app)
        .await;
    assert_eq!(response.status(), 401);
}
