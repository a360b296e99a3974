//! HTTP surface.
//!
//! A thin JSON API over the store: accounts, login, whole-collection
//! fetch/replace for per-user and shared client maps, and a couple of
//! admin maintenance routes. Handlers never mutate individual entities —
//! clients arrive from the UI already mutated and are persisted by full
//! replacement.

use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::UserSummary;
use crate::types::ClientMap;

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub clients: ClientMap,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    pub password: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/create", post(create_account))
        .route("/api/login", post(login))
        .route("/api/users", get(list_users))
        .route(
            "/api/users/:username",
            post(set_password).delete(delete_user),
        )
        .route("/api/data/:username", get(get_data).post(put_data))
        .route("/api/shared", get(get_shared).post(put_shared))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<Value>, ApiError> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Username required".to_string()))?;

    state.store.create_user(username, req.password.as_deref())?;
    tracing::info!(user = username, "account created");
    Ok(Json(json!({ "success": true })))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let clients = state
        .store
        .authenticate(&req.username, req.password.as_deref())?;
    Ok(Json(LoginResponse { clients }))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    Ok(Json(state.store.list_users()?))
}

async fn get_data(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ClientMap>, ApiError> {
    Ok(Json(state.store.get_user_state(&username)?))
}

/// Full replacement of the user's client map. No merge, no diff.
async fn put_data(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(clients): Json<ClientMap>,
) -> Result<Json<Value>, ApiError> {
    state.store.put_user_state(&username, &clients)?;
    Ok(Json(json!({ "success": true })))
}

async fn get_shared(State(state): State<AppState>) -> Result<Json<ClientMap>, ApiError> {
    Ok(Json(state.store.get_shared_state()?))
}

async fn put_shared(
    State(state): State<AppState>,
    Json(clients): Json<ClientMap>,
) -> Result<Json<Value>, ApiError> {
    state.store.put_shared_state(&clients)?;
    Ok(Json(json!({ "success": true })))
}

async fn set_password(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    state.store.set_password(&username, req.password.as_deref())?;
    tracing::info!(user = %username, "password updated");
    Ok(Json(json!({ "success": true })))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.store.delete_user(&username)?;
    tracing::warn!(user = %username, "account deleted");
    Ok(Json(json!({ "success": true })))
}
