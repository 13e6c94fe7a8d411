//! REST API - service operations, login relay, and chat relay.
//!
//! One route per service operation. Every store failure surfaces as a
//! terminal error response for that action; the client retries by
//! repeating the action.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Multipart, Path},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::chat::CompletionProvider;
use crate::identity::{AuthError, IdentityProvider};
use crate::model::{FileCategory, ProfileFields};
use crate::service::{HealthRecordService, ServiceError};

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

pub fn routes() -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/chat", post(chat))
        .route("/profile/:user_id", get(get_profile).put(save_profile))
        .route("/profile/:user_id/avatar", post(upload_avatar))
        .route("/hospitals/:user_id", get(list_hospitals).post(add_hospital))
        .route(
            "/hospitals/:user_id/:hospital_id",
            get(hospital_detail).delete(delete_hospital),
        )
        .route("/hospitals/:user_id/:hospital_id/note", axum::routing::put(save_note))
        .route(
            "/hospitals/:user_id/:hospital_id/files/:category",
            post(upload_file),
        )
}

fn error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "error": message })))
}

fn service_error(e: ServiceError) -> ApiError {
    let status = match &e {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Conflict(_) => StatusCode::CONFLICT,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Store(_) | ServiceError::Blob(_) => {
            tracing::error!(error = %e, "store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error(status, &e.to_string())
}

// ----------------------------------------------------------------------
// Auth relay
// ----------------------------------------------------------------------

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(
    Extension(identity): Extension<Arc<dyn IdentityProvider>>,
    Json(credentials): Json<Credentials>,
) -> ApiResult {
    match identity
        .sign_in(&credentials.email, &credentials.password)
        .await
    {
        Ok((user, session)) => Ok(Json(json!({ "user": user, "session": session }))),
        Err(AuthError::InvalidCredentials) => {
            Err(error(StatusCode::UNAUTHORIZED, "Invalid email or password"))
        }
        Err(e) => {
            tracing::error!(error = %e, "login relay failed");
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"))
        }
    }
}

async fn signup(
    Extension(identity): Extension<Arc<dyn IdentityProvider>>,
    Json(credentials): Json<Credentials>,
) -> ApiResult {
    match identity
        .sign_up(&credentials.email, &credentials.password)
        .await
    {
        Ok(user) => Ok(Json(json!({ "user": user }))),
        Err(AuthError::EmailTaken) => Err(error(
            StatusCode::CONFLICT,
            "An account already exists for this email",
        )),
        Err(AuthError::InvalidCredentials) => Err(error(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
        )),
        Err(e) => {
            tracing::error!(error = %e, "signup relay failed");
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"))
        }
    }
}

// ----------------------------------------------------------------------
// Chat relay
// ----------------------------------------------------------------------

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat(
    Extension(provider): Extension<Arc<dyn CompletionProvider>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult {
    match provider.complete(&req.message).await {
        Ok(reply) => Ok(Json(json!({ "reply": reply }))),
        Err(e) => {
            tracing::error!(provider = provider.name(), error = %e, "completion failed");
            Err(error(StatusCode::INTERNAL_SERVER_ERROR, "AI response failed"))
        }
    }
}

// ----------------------------------------------------------------------
// Profile
// ----------------------------------------------------------------------

async fn get_profile(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path(user_id): Path<String>,
) -> ApiResult {
    let profile = service
        .load_profile(&user_id)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "profile": profile })))
}

async fn save_profile(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path(user_id): Path<String>,
    Json(fields): Json<ProfileFields>,
) -> ApiResult {
    let profile = service
        .save_profile(&user_id, fields)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "profile": profile })))
}

async fn upload_avatar(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path(user_id): Path<String>,
    multipart: Multipart,
) -> ApiResult {
    let (file_name, data) = first_file(multipart).await?;
    let extension = file_name.rsplit('.').next().unwrap_or_default();
    let url = service
        .upload_avatar(&user_id, data, extension)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "url": url })))
}

// ----------------------------------------------------------------------
// Hospitals, notes, files
// ----------------------------------------------------------------------

#[derive(Deserialize)]
struct AddHospitalRequest {
    name: String,
}

async fn list_hospitals(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path(user_id): Path<String>,
) -> ApiResult {
    let hospitals = service
        .list_hospitals(&user_id)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "hospitals": hospitals })))
}

async fn add_hospital(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path(user_id): Path<String>,
    Json(req): Json<AddHospitalRequest>,
) -> ApiResult {
    let hospital = service
        .add_hospital(&user_id, &req.name)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "hospital": hospital })))
}

async fn delete_hospital(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path((user_id, hospital_id)): Path<(String, Uuid)>,
) -> ApiResult {
    service
        .delete_hospital(&user_id, hospital_id)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "deleted": hospital_id })))
}

async fn hospital_detail(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path((user_id, hospital_id)): Path<(String, Uuid)>,
) -> ApiResult {
    let detail = service
        .load_hospital_detail(&user_id, hospital_id)
        .await
        .map_err(service_error)?;
    Ok(Json(serde_json::to_value(detail).map_err(|e| {
        error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
    })?))
}

#[derive(Deserialize)]
struct SaveNoteRequest {
    note: String,
}

async fn save_note(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path((user_id, hospital_id)): Path<(String, Uuid)>,
    Json(req): Json<SaveNoteRequest>,
) -> ApiResult {
    let detail = service
        .save_note(&user_id, hospital_id, &req.note)
        .await
        .map_err(service_error)?;
    Ok(Json(serde_json::to_value(detail).map_err(|e| {
        error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
    })?))
}

async fn upload_file(
    Extension(service): Extension<Arc<HealthRecordService>>,
    Path((user_id, hospital_id, category)): Path<(String, Uuid, String)>,
    multipart: Multipart,
) -> ApiResult {
    let category: FileCategory = category
        .parse()
        .map_err(|e: String| error(StatusCode::BAD_REQUEST, &e))?;
    let (file_name, data) = first_file(multipart).await?;
    let entry = service
        .upload_file(&user_id, hospital_id, category, data, &file_name)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "file": entry })))
}

/// Pull the first file field out of a multipart body.
async fn first_file(mut multipart: Multipart) -> Result<(String, bytes::Bytes), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| error(StatusCode::BAD_REQUEST, &e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| error(StatusCode::BAD_REQUEST, &e.to_string()))?;
        return Ok((file_name, data));
    }
    Err(error(StatusCode::BAD_REQUEST, "No file provided"))
}
