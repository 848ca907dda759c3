//! API integration tests
//!
//! Need a running server with a migrated database:
//! `cargo test --test api_tests -- --ignored`

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use visitgate_server::models::{OperatorClaims, OperatorType};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn operator_token(operator_type: OperatorType) -> String {
    let secret = std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| "change-this-secret-in-production".to_string());
    let now = Utc::now();
    OperatorClaims {
        sub: "integration".to_string(),
        user_id: 1,
        email: Some("desk@example.com".to_string()),
        operator_type,
        exp: (now + Duration::hours(1)).timestamp(),
        iat: now.timestamp(),
    }
    .create_token(&secret)
    .expect("Failed to sign token")
}

/// Register a visit valid around today, returning its id
async fn register_visit(client: &Client, phone: &str) -> i64 {
    let token = operator_token(OperatorType::Registration);
    let today = Utc::now().date_naive();

    let response = client
        .post(format!("{}/visits", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "first_name": "Test",
            "last_name": "Visitor",
            "phone": phone,
            "company": "Test Company",
            "id_proof_type": "Passport",
            "id_proof_number": "TEST123",
            "host_name": "Test Host",
            "purpose": "Integration testing",
            "visit_date": (today - Duration::days(1)).format("%Y-%m-%d").to_string(),
            "valid_upto": (today + Duration::days(3)).format("%Y-%m-%d").to_string(),
            "end_time": "17:30:00"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let visit: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(visit["approval"], "PENDING");
    visit["id"].as_i64().expect("No visit id")
}

/// Register and approve a visit, then issue its card, returning (visit id, QR payload)
async fn visit_with_card(client: &Client, phone: &str) -> (i64, String) {
    let visit_id = register_visit(client, phone).await;

    let response = client
        .post(format!("{}/visits/{}/approve", BASE_URL, visit_id))
        .bearer_auth(operator_token(OperatorType::Hr))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .post(format!("{}/visits/{}/card", BASE_URL, visit_id))
        .bearer_auth(operator_token(OperatorType::Registration))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let card: Value = response.json().await.expect("Failed to parse response");

    (visit_id, card["qr_payload"].as_str().expect("No QR payload").to_string())
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_check_in_then_out() {
    let client = Client::new();
    let phone = format!("{}", Utc::now().timestamp_micros());
    let (visit_id, qr_payload) = visit_with_card(&client, &phone).await;

    let response = client
        .post(format!("{}/checkin", BASE_URL))
        .json(&json!({ "qr_data": qr_payload }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["visit_id"], visit_id);

    // Duplicate scan
    let response = client
        .post(format!("{}/checkin", BASE_URL))
        .json(&json!({ "qr_data": qr_payload }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AlreadyCheckedIn");

    let response = client
        .post(format!("{}/checkout", BASE_URL))
        .json(&json!({ "qr_data": qr_payload }))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_unknown_card() {
    let client = Client::new();

    let response = client
        .post(format!("{}/checkin", BASE_URL))
        .json(&json!({ "qr_data": "VC-00000000|Nobody|2024-01-01" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);
}

#[tokio::test]
#[ignore]
async fn test_manual_checkout_requires_hr() {
    let client = Client::new();
    let phone = format!("{}", Utc::now().timestamp_micros());
    let (visit_id, qr_payload) = visit_with_card(&client, &phone).await;

    client
        .post(format!("{}/checkin", BASE_URL))
        .json(&json!({ "qr_data": qr_payload }))
        .send()
        .await
        .expect("Failed to send request");

    let response = client
        .post(format!("{}/visits/{}/manual-checkout", BASE_URL, visit_id))
        .bearer_auth(operator_token(OperatorType::Registration))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    let hr = operator_token(OperatorType::Hr);
    let response = client
        .get(format!("{}/visits/checked-in", BASE_URL))
        .bearer_auth(&hr)
        .send()
        .await
        .expect("Failed to send request");
    let inside: Value = response.json().await.expect("Failed to parse response");
    assert!(inside
        .as_array()
        .expect("Expected a list")
        .iter()
        .any(|v| v["id"] == visit_id));

    let response = client
        .post(format!("{}/visits/{}/manual-checkout", BASE_URL, visit_id))
        .bearer_auth(&hr)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}

#[tokio::test]
#[ignore]
async fn test_visits_require_token() {
    let client = Client::new();

    let response = client
        .get(format!("{}/visits/1", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_card_needs_approval() {
    let client = Client::new();
    let phone = format!("{}", Utc::now().timestamp_micros());
    let visit_id = register_visit(&client, &phone).await;
    let desk = operator_token(OperatorType::Registration);

    let response = client
        .post(format!("{}/visits/{}/card", BASE_URL, visit_id))
        .bearer_auth(&desk)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    let response = client
        .delete(format!("{}/visits/{}", BASE_URL, visit_id))
        .bearer_auth(&desk)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_print_card_checks_in() {
    let client = Client::new();
    let phone = format!("{}", Utc::now().timestamp_micros());
    let (visit_id, _) = visit_with_card(&client, &phone).await;
    let desk = operator_token(OperatorType::Registration);

    let response = client
        .post(format!("{}/visits/{}/card/printed", BASE_URL, visit_id))
        .bearer_auth(&desk)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let printed: Value = response.json().await.expect("Failed to parse response");
    assert!(printed["checked_in_day"].is_number());

    // Printed cards stay
    let response = client
        .delete(format!("{}/visits/{}", BASE_URL, visit_id))
        .bearer_auth(&desk)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
}
