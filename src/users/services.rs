use std::future::Future;

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    document,
    dto::{CreateUserRequest, PublicUser, UpdateUserRequest},
    repo_types::{NewUser, User, UserPatch},
    unique::{ensure_unique, Identity},
};
use crate::{
    error::{AppError, AppResult},
    notify::{Notification, Template},
    state::AppState,
};

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn checked_email(raw: &str) -> AppResult<String> {
    let email = normalize_email(raw);
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::BadRequest("invalid email".into()));
    }
    Ok(email)
}

/// Normalized document, `None` when absent or blank.
fn checked_document(raw: Option<&str>) -> AppResult<Option<String>> {
    match raw.and_then(document::normalize) {
        None => Ok(None),
        Some(doc) if document::is_valid(&doc) => Ok(Some(doc)),
        Some(_) => {
            warn!("invalid document");
            Err(AppError::BadRequest("invalid CPF or CNPJ".into()))
        }
    }
}

fn not_found() -> AppError {
    AppError::NotFound("user not found".into())
}

/// Attempts per serializable transaction. A re-run reads the rows the winning
/// transaction committed, so a lost uniqueness race ends as `Conflict`.
const TX_ATTEMPTS: u32 = 5;

async fn retry_serializable<T, F, Fut>(mut run: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match run().await {
            Err(e) if e.is_serialization_failure() && attempt < TX_ATTEMPTS => {
                warn!(attempt, "serialization failure; retrying transaction");
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[instrument(skip(st, req), fields(email = %req.email))]
pub async fn create(st: &AppState, req: CreateUserRequest) -> AppResult<User> {
    let email = checked_email(&req.email)?;
    let document = checked_document(req.document.as_deref())?;

    let new_user = NewUser {
        name: req.name,
        email,
        username: req.username.filter(|u| !u.trim().is_empty()),
        document,
        phone_number: req.phone_number,
        password: st.codec.encode(&req.password)?,
        active: req.active.unwrap_or(true),
    };

    let user = retry_serializable(|| insert_unique(st, &new_user)).await?;
    info!(user_id = %user.id, "user created");

    send_welcome_email(st, &user).await;
    Ok(user)
}

async fn insert_unique(st: &AppState, new_user: &NewUser) -> AppResult<User> {
    let mut tx = st.store.begin().await?;
    ensure_unique(
        tx.as_mut(),
        None,
        Identity {
            email: Some(&new_user.email),
            document: new_user.document.as_deref(),
        },
    )
    .await?;
    let user = tx.insert_user(new_user).await?;
    tx.commit().await?;
    Ok(user)
}

/// Dispatches the confirmation email and, if it went out, records the verification code.
async fn send_welcome_email(st: &AppState, user: &User) {
    let code = Uuid::new_v4().to_string();
    let notification = Notification::new(&user.email, Template::ConfirmEmail)
        .var("name", user.name.as_str())
        .var("email", user.email.as_str())
        .var("linkVerification", st.config.confirm_email_link(&code));

    if !st.notifier.send(notification).await {
        warn!(user_id = %user.id, "welcome email not sent; no verification recorded");
        return;
    }
    if let Err(e) = st.store.insert_email_verification(&user.email, &code).await {
        warn!(error = %e, user_id = %user.id, "failed to record email verification");
    }
}

#[instrument(skip(st, req))]
pub async fn update(st: &AppState, id: Uuid, req: UpdateUserRequest) -> AppResult<()> {
    let document = checked_document(req.document.as_deref())?;
    let email = req.email.as_deref().map(checked_email).transpose()?;
    let password = match req.password.filter(|p| !p.is_empty()) {
        Some(p) => Some(st.codec.encode(&p)?),
        None => None,
    };
    let patch = UserPatch {
        name: req.name,
        email,
        username: req.username,
        document,
        phone_number: req.phone_number,
        password,
        active: req.active,
    };

    retry_serializable(|| apply_patch(st, id, &patch)).await?;
    info!(user_id = %id, "user updated");
    Ok(())
}

async fn apply_patch(st: &AppState, id: Uuid, patch: &UserPatch) -> AppResult<()> {
    let mut tx = st.store.begin().await?;
    let current = tx.find_active_by_id(id).await?.ok_or_else(not_found)?;

    ensure_unique(
        tx.as_mut(),
        Some(Identity {
            email: Some(&current.email),
            document: current.document.as_deref(),
        }),
        Identity {
            email: patch.email.as_deref(),
            document: patch.document.as_deref(),
        },
    )
    .await?;

    tx.update_user(id, patch).await?;
    tx.commit().await?;
    Ok(())
}

#[instrument(skip(st))]
pub async fn delete(st: &AppState, id: Uuid) -> AppResult<()> {
    retry_serializable(move || async move {
        let mut tx = st.store.begin().await?;
        tx.find_active_by_id(id).await?.ok_or_else(not_found)?;
        tx.soft_delete_user(id, OffsetDateTime::now_utc()).await?;
        tx.commit().await?;
        Ok(())
    })
    .await?;
    info!(user_id = %id, "user soft-deleted");
    Ok(())
}

#[instrument(skip(st))]
pub async fn get_by_id(st: &AppState, id: Uuid) -> AppResult<PublicUser> {
    let user = st.store.find_active_by_id(id).await?.ok_or_else(not_found)?;
    Ok(user.into())
}
