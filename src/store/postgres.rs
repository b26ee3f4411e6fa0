use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult, StoreTx, UniqueField};
use crate::auth::repo_types::ResetPasswordRequest;
use crate::users::repo_types::{NewUser, User, UserPatch};

const USER_COLUMNS: &str = "id, name, email, username, document, phone_number, password, \
     active, verified_at, last_login, created_at, updated_at, deleted_at";

/// The one place the soft-delete predicate lives. Every user read goes through here.
fn active_users(filter: &str) -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE deleted_at IS NULL AND ({filter})")
}

/// Active user whose email (case-insensitive) or username equals `$1`. An email match
/// wins when one user's username equals another user's email.
fn login_query() -> String {
    format!(
        "{} ORDER BY (email = lower($1)) DESC LIMIT 1",
        active_users("email = lower($1) OR username = $1")
    )
}

/// Maps SQLSTATE and constraint name to the store errors workflows act on.
fn classify(code: &str, constraint: Option<&str>) -> Option<StoreError> {
    match (code, constraint) {
        ("23505", Some("users_email_active_key")) => {
            Some(StoreError::UniqueViolation(UniqueField::Email))
        }
        ("23505", Some("users_document_active_key")) => {
            Some(StoreError::UniqueViolation(UniqueField::Document))
        }
        ("40001", _) => Some(StoreError::SerializationFailure),
        _ => None,
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        let mapped = db
            .code()
            .and_then(|code| classify(&code, db.constraint()));
        if let Some(mapped) = mapped {
            return mapped;
        }
    }
    StoreError::Backend(e.to_string())
}

/// PostgreSQL implementation of [`RecordStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_active_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let sql = login_query();
        sqlx::query_as::<_, User>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn find_active_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = active_users("id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn find_active_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = active_users("email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn touch_last_login(&self, email: &str, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET last_login = $2
             WHERE email = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(email)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update_password_by_email(
        &self,
        email: &str,
        encoded_password: &str,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            r#"
            UPDATE users
               SET password = $2, updated_at = now()
             WHERE email = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(encoded_password)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn find_reset_request_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ResetPasswordRequest>> {
        sqlx::query_as::<_, ResetPasswordRequest>(
            r#"
            SELECT email, token, expire_in
              FROM reset_password_requests
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn find_reset_request_by_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<ResetPasswordRequest>> {
        sqlx::query_as::<_, ResetPasswordRequest>(
            r#"
            SELECT email, token, expire_in
              FROM reset_password_requests
             WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn insert_reset_request(&self, request: &ResetPasswordRequest) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reset_password_requests (email, token, expire_in)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&request.email)
        .bind(&request.token)
        .bind(request.expire_in)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn delete_reset_request_by_email(&self, email: &str) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM reset_password_requests WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_email_verification(&self, email: &str, code: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO email_verifications (email, code) VALUES ($1, $2)")
            .bind(email)
            .bind(code)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_active_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = active_users("id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)
    }

    async fn find_active_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let sql = active_users("email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)
    }

    async fn find_active_by_document(&mut self, document: &str) -> StoreResult<Option<User>> {
        let sql = active_users("document = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(document)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_err)
    }

    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, username, document, phone_number, password, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.document)
            .bind(&user.phone_number)
            .bind(&user.password)
            .bind(user.active)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(map_err)?;
        debug!(user_id = %row.id, "user row inserted");
        Ok(row)
    }

    async fn update_user(&mut self, id: Uuid, patch: &UserPatch) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET name         = COALESCE($2, name),
                   email        = COALESCE($3, email),
                   username     = COALESCE($4, username),
                   document     = COALESCE($5, document),
                   phone_number = COALESCE($6, phone_number),
                   password     = COALESCE($7, password),
                   active       = COALESCE($8, active),
                   updated_at   = now()
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.email)
        .bind(&patch.username)
        .bind(&patch.document)
        .bind(&patch.phone_number)
        .bind(&patch.password)
        .bind(patch.active)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn soft_delete_user(&mut self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET deleted_at = $2, updated_at = $2
             WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(map_err)
    }
}
