use serde::{Deserialize, Serialize};

use super::services::ForgotPasswordOutcome;

/// Request body for login. `login` is an email or a username.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoverPasswordRequest {
    pub password: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub error: bool,
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyTokenResponse {
    pub error: bool,
    pub token_is_valid: bool,
}

#[derive(Debug, Serialize)]
pub struct ForgotPasswordResponse {
    pub error: bool,
    #[serde(rename = "type")]
    pub outcome: ForgotPasswordOutcome,
}

#[derive(Debug, Serialize)]
pub struct RecoverPasswordResponse {
    pub error: bool,
    pub success: bool,
}
