//! Password-reset grants: one live request per email, expiry checked lazily.

use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::repo_types::ResetPasswordRequest;
use crate::store::{RecordStore, StoreResult};

/// Nominal lifetime stamped on a new request.
pub const RESET_VALIDITY: Duration = Duration::days(1);

/// `verify` still accepts a request this long past its stamped expiry.
// Combined with RESET_VALIDITY a token lives three days; recover_password does not check
// expiry at all. Both windows are kept as they are until the intended one is settled.
pub const VERIFY_GRACE: Duration = Duration::days(2);

/// Deletes the outstanding request for `email`, if any. Last request wins.
pub async fn supersede(store: &dyn RecordStore, email: &str) -> StoreResult<()> {
    if store.find_reset_request_by_email(email).await?.is_some() {
        store.delete_reset_request_by_email(email).await?;
        debug!(email = %email, "previous reset request superseded");
    }
    Ok(())
}

/// Mints a fresh grant for `email`. Nothing is stored until [`persist`].
pub fn issue(email: &str, now: OffsetDateTime) -> ResetPasswordRequest {
    ResetPasswordRequest {
        email: email.to_string(),
        token: Uuid::new_v4().to_string(),
        expire_in: now + RESET_VALIDITY,
    }
}

pub async fn persist(store: &dyn RecordStore, request: &ResetPasswordRequest) -> StoreResult<()> {
    store.insert_reset_request(request).await
}

pub fn is_expired(request: &ResetPasswordRequest, now: OffsetDateTime) -> bool {
    request.expire_in < now - VERIFY_GRACE
}

pub async fn verify(store: &dyn RecordStore, token: &str) -> StoreResult<bool> {
    let Some(request) = store.find_reset_request_by_token(token).await? else {
        return Ok(false);
    };
    Ok(!is_expired(&request, OffsetDateTime::now_utc()))
}

/// Resolves `token` to the email it was issued for. No expiry check here.
pub async fn consume(store: &dyn RecordStore, token: &str) -> StoreResult<Option<String>> {
    Ok(store
        .find_reset_request_by_token(token)
        .await?
        .map(|r| r.email))
}

/// Drops the grant once the password has been changed, so the token cannot be replayed.
pub async fn retire(store: &dyn RecordStore, email: &str) -> StoreResult<()> {
    store.delete_reset_request_by_email(email).await?;
    Ok(())
}
