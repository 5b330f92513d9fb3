//! Settings, cloned voices, and connected accounts over the HTTP API.

mod common;

use axum::http::{Method, StatusCode};
use common::{request, test_app};
use serde_json::json;

#[tokio::test]
async fn settings_start_empty_and_update_partially() {
    let (app, _dir) = test_app();

    let (status, settings) = request(&app, Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(settings["premiumTtsKey"].is_null());
    assert!(settings["backendUrl"].is_null());
    assert_eq!(settings["telephonyConnected"], false);

    let (status, updated) = request(
        &app,
        Method::PUT,
        "/api/settings",
        Some(json!({ "premiumTtsKey": "xi-123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["premiumTtsKey"], "xi-123");
    assert!(updated["backendUrl"].is_null(), "absent fields untouched");

    // An empty string clears the setting.
    let (_, cleared) = request(
        &app,
        Method::PUT,
        "/api/settings",
        Some(json!({ "premiumTtsKey": "" })),
    )
    .await;
    assert!(cleared["premiumTtsKey"].is_null());
}

#[tokio::test]
async fn telephony_credentials_round_trip_without_echo() {
    let (app, _dir) = test_app();

    let (status, body) = request(
        &app,
        Method::PUT,
        "/api/settings/telephony",
        Some(json!({ "accountSid": "AC123", "authToken": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);

    let (_, settings) = request(&app, Method::GET, "/api/settings", None).await;
    assert_eq!(settings["telephonyConnected"], true);
    // The token itself never appears in the snapshot.
    assert!(settings.to_string().find("secret").is_none());

    let (status, body) =
        request(&app, Method::DELETE, "/api/settings/telephony", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], false);

    let (_, settings) = request(&app, Method::GET, "/api/settings", None).await;
    assert_eq!(settings["telephonyConnected"], false);
}

#[tokio::test]
async fn telephony_credentials_require_both_fields() {
    let (app, _dir) = test_app();
    let (status, _) = request(
        &app,
        Method::PUT,
        "/api/settings/telephony",
        Some(json!({ "accountSid": "AC123", "authToken": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cloned_voice_registration_round_trip() {
    let (app, _dir) = test_app();

    let (status, voice) = request(
        &app,
        Method::POST,
        "/api/voices",
        Some(json!({
            "id": "clone-1",
            "name": "My Voice",
            "gender": "female",
            "lang": "en-US"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(voice["category"], "cloned");

    let (_, voices) = request(&app, Method::GET, "/api/voices", None).await;
    let voices = voices.as_array().expect("voice list");
    assert_eq!(voices.len(), 1);
    assert_eq!(voices[0]["id"], "clone-1");
}

#[tokio::test]
async fn connected_account_lifecycle() {
    let (app, _dir) = test_app();

    let (status, account) = request(
        &app,
        Method::POST,
        "/api/accounts",
        Some(json!({
            "locationId": "loc-1",
            "locationName": "Main Office",
            "apiKey": "ghl-key"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = account["id"].as_str().expect("account id").to_string();
    assert!(account["connectedAt"].is_string());

    // Recording a test outcome updates the same record.
    let (_, updated) = request(
        &app,
        Method::POST,
        "/api/accounts",
        Some(json!({
            "id": id,
            "locationId": "loc-1",
            "locationName": "Main Office",
            "apiKey": "ghl-key",
            "lastTestStatus": "success",
            "lastTestMessage": "Contact lookup ok"
        })),
    )
    .await;
    assert_eq!(updated["lastTestStatus"], "success");

    let (_, accounts) = request(&app, Method::GET, "/api/accounts", None).await;
    assert_eq!(accounts.as_array().expect("accounts").len(), 1);

    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/api/accounts/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, accounts) = request(&app, Method::GET, "/api/accounts", None).await;
    assert!(accounts.as_array().expect("accounts").is_empty());
}

#[tokio::test]
async fn account_requires_location_and_key() {
    let (app, _dir) = test_app();
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/accounts",
        Some(json!({
            "locationId": "",
            "locationName": "Nameless",
            "apiKey": ""
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
