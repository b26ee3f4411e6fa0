use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub document: Option<String>,        // CPF/CNPJ, digits only
    pub phone_number: String,
    pub password: String,                // codec output, never serialized
    pub active: bool,
    pub verified_at: Option<OffsetDateTime>,
    pub last_login: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

/// Row to insert; the password is already encoded.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub document: Option<String>,
    pub phone_number: String,
    pub password: String,
    pub active: bool,
}

/// Sparse update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub document: Option<String>,
    pub phone_number: Option<String>,
    pub password: Option<String>,
    pub active: Option<bool>,
}
