use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{
        ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, LoginResponse,
        RecoverPasswordRequest, RecoverPasswordResponse, VerifyTokenResponse,
    },
    services,
};
use crate::{error::AppError, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route(
            "/auth/verify-token-recovery-password/:token",
            get(verify_token_recover_password),
        )
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/recover-password", post(recover_password))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = services::validate_user(&state, &payload.login, &payload.password).await?;
    let token = services::login(&state, &user, true).await?;
    Ok(Json(LoginResponse {
        error: false,
        token,
    }))
}

#[instrument(skip(state, token))]
pub async fn verify_token_recover_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VerifyTokenResponse>, AppError> {
    let token_is_valid = services::verify_token_recover_password(&state, &token).await?;
    Ok(Json(VerifyTokenResponse {
        error: false,
        token_is_valid,
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AppError> {
    let outcome = services::forgot_password(&state, &payload.email).await?;
    Ok(Json(ForgotPasswordResponse {
        error: false,
        outcome,
    }))
}

#[instrument(skip(state, payload))]
pub async fn recover_password(
    State(state): State<AppState>,
    Json(payload): Json<RecoverPasswordRequest>,
) -> Result<Json<RecoverPasswordResponse>, AppError> {
    let success = services::recover_password(&state, &payload.password, &payload.token).await?;
    Ok(Json(RecoverPasswordResponse {
        error: false,
        success,
    }))
}
