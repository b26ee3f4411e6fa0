//! Record store contract.
//!
//! Workflows talk to persistence only through these traits. Every user lookup here is
//! over *active* users (no `deleted_at`); adapters keep that filter in one place.

use std::fmt;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::ResetPasswordRequest;
use crate::users::repo_types::{NewUser, User, UserPatch};

#[cfg(test)]
pub mod memory;
pub mod postgres;

/// Identity fields that must be unique among active users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Email,
    Document,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniqueField::Email => f.write_str("email"),
            UniqueField::Document => f.write_str("document"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated on {0}")]
    UniqueViolation(UniqueField),
    /// The transaction lost a serialization race and may be re-run from the start.
    #[error("transaction could not be serialized")]
    SerializationFailure,
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Opens a serializable transaction. Dropping the handle without `commit` rolls back.
    /// `insert_user`, `update_user` and `commit` may fail with
    /// [`StoreError::SerializationFailure`] when a concurrent transaction wins.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Active user whose email or username equals `login`.
    async fn find_active_by_login(&self, login: &str) -> StoreResult<Option<User>>;
    async fn find_active_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_active_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn touch_last_login(&self, email: &str, at: OffsetDateTime) -> StoreResult<()>;
    /// Returns the updated user, or `None` when no active user owns `email`.
    async fn update_password_by_email(
        &self,
        email: &str,
        encoded_password: &str,
    ) -> StoreResult<Option<User>>;

    async fn find_reset_request_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ResetPasswordRequest>>;
    async fn find_reset_request_by_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<ResetPasswordRequest>>;
    async fn insert_reset_request(&self, request: &ResetPasswordRequest) -> StoreResult<()>;
    /// Returns whether a row was removed.
    async fn delete_reset_request_by_email(&self, email: &str) -> StoreResult<bool>;

    async fn insert_email_verification(&self, email: &str, code: &str) -> StoreResult<()>;
}

/// Transaction-scoped handle for the user-mutating paths.
#[async_trait]
pub trait StoreTx: Send {
    async fn find_active_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_active_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn find_active_by_document(&mut self, document: &str) -> StoreResult<Option<User>>;

    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User>;
    /// Applies only the `Some` fields of `patch`.
    async fn update_user(&mut self, id: Uuid, patch: &UserPatch) -> StoreResult<()>;
    async fn soft_delete_user(&mut self, id: Uuid, at: OffsetDateTime) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
