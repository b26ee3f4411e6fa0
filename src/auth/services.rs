use axum::extract::FromRef;
use serde::{ser::SerializeMap, Serialize, Serializer};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use super::{jwt::SessionKeys, reset};
use crate::{
    error::{AppError, AppResult},
    notify::{Notification, Template},
    state::AppState,
    users::{dto::PublicUser, services::normalize_email},
};

const BAD_CREDENTIALS: &str = "bad credentials";
const EMAIL_NOT_VERIFIED: &str = "email not verified";

/// Result of a forgot-password request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgotPasswordOutcome {
    NotFound,
    NotVerifiedAt,
    Success,
}

impl Serialize for ForgotPasswordOutcome {
    // {"notFound": true} / {"notVerifiedAt": true} / {"success": true}
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let key = match self {
            ForgotPasswordOutcome::NotFound => "notFound",
            ForgotPasswordOutcome::NotVerifiedAt => "notVerifiedAt",
            ForgotPasswordOutcome::Success => "success",
        };
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(key, &true)?;
        map.end()
    }
}

/// Checks `login` (email or username) and `password` against active users.
///
/// Unknown login, unverified account and wrong password all fail with `NotFound`.
#[instrument(skip(st, password))]
pub async fn validate_user(st: &AppState, login: &str, password: &str) -> AppResult<PublicUser> {
    let Some(user) = st.store.find_active_by_login(login.trim()).await? else {
        warn!("login unknown user");
        return Err(AppError::NotFound(BAD_CREDENTIALS.into()));
    };

    if user.verified_at.is_none() {
        warn!(user_id = %user.id, "login before email verification");
        return Err(AppError::NotFound(EMAIL_NOT_VERIFIED.into()));
    }

    if !st.codec.matches(password, &user.password) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::NotFound(BAD_CREDENTIALS.into()));
    }

    Ok(user.into())
}

/// Issues a session token, stamping `last_login` first when asked to.
#[instrument(skip(st, user), fields(user_id = %user.id))]
pub async fn login(st: &AppState, user: &PublicUser, update_last_login: bool) -> AppResult<String> {
    if update_last_login {
        st.store
            .touch_last_login(&user.email, OffsetDateTime::now_utc())
            .await?;
    }

    let token = SessionKeys::from_ref(st)
        .issue(user)
        .map_err(AppError::internal)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

#[instrument(skip(st))]
pub async fn forgot_password(st: &AppState, email: &str) -> AppResult<ForgotPasswordOutcome> {
    let email = normalize_email(email);
    reset::supersede(st.store.as_ref(), &email).await?;

    let Some(user) = st.store.find_active_by_email(&email).await? else {
        return Ok(ForgotPasswordOutcome::NotFound);
    };
    if user.verified_at.is_none() {
        return Ok(ForgotPasswordOutcome::NotVerifiedAt);
    }

    let request = reset::issue(&user.email, OffsetDateTime::now_utc());
    let notification = Notification::new(&user.email, Template::RecoverPassword)
        .var("name", user.name.as_str())
        .var("email", user.email.as_str())
        .var(
            "linkVerification",
            st.config.recover_password_link(&request.token),
        );

    if st.notifier.send(notification).await {
        reset::persist(st.store.as_ref(), &request).await?;
        info!(user_id = %user.id, "password reset requested");
    } else {
        warn!(user_id = %user.id, "reset email not sent; request discarded");
    }

    Ok(ForgotPasswordOutcome::Success)
}

#[instrument(skip(st, token))]
pub async fn verify_token_recover_password(st: &AppState, token: &str) -> AppResult<bool> {
    Ok(reset::verify(st.store.as_ref(), token).await?)
}

/// Sets a new password for the owner of `token`. The token's age is not checked here.
#[instrument(skip(st, password, token))]
pub async fn recover_password(st: &AppState, password: &str, token: &str) -> AppResult<bool> {
    let Some(email) = reset::consume(st.store.as_ref(), token).await? else {
        warn!("recover with unknown token");
        return Err(AppError::NotFound("invalid token".into()));
    };

    let encoded = st.codec.encode(password)?;
    let updated = st.store.update_password_by_email(&email, &encoded).await?;
    reset::retire(st.store.as_ref(), &email).await?;
    let Some(user) = updated else {
        warn!("recover for a user that no longer exists");
        return Err(AppError::NotFound("invalid token".into()));
    };
    info!(user_id = %user.id, "password recovered");

    let notification = Notification::new(&user.email, Template::RecoverPasswordSuccess)
        .var("name", user.name.as_str())
        .var("linkToLoginPage", st.config.login_link());
    if !st.notifier.send(notification).await {
        warn!(user_id = %user.id, "password-changed email not sent");
    }

    Ok(true)
}
