use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateUserRequest, CreatedResponse, UpdateUserRequest, UserResponse},
    services,
};
use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    services::create(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { error: false })))
}

#[instrument(skip(state, caller))]
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    debug!(caller_id = %caller.sub, user_id = %id, "get user");
    let user = services::get_by_id(&state, id).await?;
    Ok(Json(UserResponse { error: false, user }))
}

#[instrument(skip(state, caller, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    debug!(caller_id = %caller.sub, user_id = %id, "update user");
    services::update(&state, id, payload).await?;
    Ok(Json(json!({ "error": false })))
}

#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    debug!(caller_id = %caller.sub, user_id = %id, "delete user");
    services::delete(&state, id).await?;
    Ok(Json(json!({ "error": false })))
}
