//! Router-level tests driving the REST surface with `oneshot`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use medivault::api;
use medivault::chat::{ChatError, CompletionProvider};
use medivault::identity::{IdentityProvider, MemoryIdentity};
use medivault::service::HealthRecordService;

struct CannedProvider {
    reply: String,
}

#[async_trait]
impl CompletionProvider for CannedProvider {
    async fn complete(&self, _message: &str) -> Result<String, ChatError> {
        Ok(self.reply.clone())
    }
    fn name(&self) -> &str {
        "canned"
    }
}

struct FailingProvider;

#[async_trait]
impl CompletionProvider for FailingProvider {
    async fn complete(&self, _message: &str) -> Result<String, ChatError> {
        Err(ChatError::ProviderUnavailable("canned".to_string()))
    }
    fn name(&self) -> &str {
        "failing"
    }
}

async fn app_with_chat(provider: Arc<dyn CompletionProvider>) -> Router {
    let service = Arc::new(
        HealthRecordService::in_memory("http://files.local")
            .await
            .unwrap(),
    );
    let identity: Arc<dyn IdentityProvider> = Arc::new(MemoryIdentity::new());
    api::routes()
        .layer(axum::Extension(service))
        .layer(axum::Extension(identity))
        .layer(axum::Extension(provider))
}

async fn app() -> Router {
    app_with_chat(Arc::new(CannedProvider {
        reply: "Stay hydrated.".to_string(),
    }))
    .await
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn send_file(app: &Router, uri: &str, file_name: &str, data: &[u8]) -> (StatusCode, Value) {
    let boundary = "medivault-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn send_get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn signup_then_login() {
    let app = app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/signup",
        json!({"email": "a@example.com", "password": "secret"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"]["id"].is_string());

    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/login",
        json!({"email": "a@example.com", "password": "secret"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["session"]["access_token"].is_string());
    assert_eq!(body["user"]["email"], "a@example.com");
}

#[tokio::test]
async fn login_with_bad_password_is_401() {
    let app = app().await;
    send_json(
        &app,
        "POST",
        "/auth/signup",
        json!({"email": "a@example.com", "password": "secret"}),
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/auth/login",
        json!({"email": "a@example.com", "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn chat_relays_completion() {
    let app = app().await;
    let (status, body) = send_json(
        &app,
        "POST",
        "/chat",
        json!({"message": "any hydration tips?"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Stay hydrated.");
}

#[tokio::test]
async fn chat_failure_is_generic_500() {
    let app = app_with_chat(Arc::new(FailingProvider)).await;
    let (status, body) = send_json(&app, "POST", "/chat", json!({"message": "hi"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "AI response failed");
}

#[tokio::test]
async fn profile_save_validation_and_round_trip() {
    let app = app().await;

    // Missing profile is a valid empty state, not an error.
    let (status, body) = send_get(&app, "/profile/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["profile"].is_null());

    // Empty field is rejected.
    let (status, _) = send_json(
        &app,
        "PUT",
        "/profile/u1",
        json!({
            "name": "A", "age": "", "blood_group": "O+",
            "date_of_birth": "1990-01-01", "height": "170", "weight": "70"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Complete profile round-trips.
    let (status, _) = send_json(
        &app,
        "PUT",
        "/profile/u1",
        json!({
            "name": "A", "age": "30", "blood_group": "O+",
            "date_of_birth": "1990-01-01", "height": "170", "weight": "70"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_get(&app, "/profile/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["name"], "A");
}

#[tokio::test]
async fn hospital_lifecycle_over_rest() {
    let app = app().await;

    let (status, body) = send_json(
        &app,
        "POST",
        "/hospitals/u1",
        json!({"name": "CityHospital"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let hospital_id = body["hospital"]["id"].as_str().unwrap().to_string();

    // Duplicate name conflicts.
    let (status, _) = send_json(
        &app,
        "POST",
        "/hospitals/u1",
        json!({"name": "CityHospital"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send_get(&app, "/hospitals/u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hospitals"].as_array().unwrap().len(), 1);

    // Note upsert through the API.
    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/hospitals/u1/{}/note", hospital_id),
        json!({"note": "follow-up in 2 weeks"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["note"], "follow-up in 2 weeks");

    // Detail view seeds all four categories.
    let (status, body) = send_get(&app, &format!("/hospitals/u1/{}", hospital_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files_by_category"].as_object().unwrap().len(), 4);

    // Unknown category on the upload route is a 400.
    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/hospitals/u1/{}/files/xRay", hospital_id),
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Delete removes it from the listing.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/hospitals/u1/{}", hospital_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = send_get(&app, "/hospitals/u1").await;
    assert!(body["hospitals"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn file_upload_over_multipart() {
    let app = app().await;

    let (_, body) = send_json(
        &app,
        "POST",
        "/hospitals/u1",
        json!({"name": "CityHospital"}),
    )
    .await;
    let hospital_id = body["hospital"]["id"].as_str().unwrap().to_string();

    let (status, body) = send_file(
        &app,
        &format!("/hospitals/u1/{}/files/prescription", hospital_id),
        "rx.pdf",
        b"%PDF-1.4",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file"]["name"], "rx.pdf");
    assert!(body["file"]["url"].as_str().unwrap().ends_with("/rx.pdf"));

    // The upload shows up in the detail view's category listing.
    let (_, body) = send_get(&app, &format!("/hospitals/u1/{}", hospital_id)).await;
    assert_eq!(body["files_by_category"]["prescription"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn avatar_upload_over_multipart() {
    let app = app().await;

    let (status, body) = send_file(&app, "/profile/u1/avatar", "me.png", b"png-bytes").await;
    assert_eq!(status, StatusCode::OK);
    let url = body["url"].as_str().unwrap();
    assert!(url.contains("/profile-images/u1/avatar.png?t="));
}

#[tokio::test]
async fn multipart_without_a_file_field_is_400() {
    let app = app().await;

    let (_, body) = send_json(
        &app,
        "POST",
        "/hospitals/u1",
        json!({"name": "CityHospital"}),
    )
    .await;
    let hospital_id = body["hospital"]["id"].as_str().unwrap().to_string();

    // A form field with no filename is not a file.
    let boundary = "medivault-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nnot a file\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/hospitals/u1/{}/files/prescription", hospital_id))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["error"], "No file provided");
}

#[tokio::test]
async fn detail_for_unknown_hospital_is_404() {
    let app = app().await;
    let (status, _) = send_get(
        &app,
        "/hospitals/u1/00000000-0000-0000-0000-000000000000",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
