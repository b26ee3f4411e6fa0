use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::User;

/// Request body for user creation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub phone_number: String,
    pub document: Option<String>,
    pub password: String,
    pub active: Option<bool>,
}

/// Request body for user update. Absent or null fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub document: Option<String>,
    pub password: Option<String>,
    pub active: Option<bool>,
}

/// A user without its password. This is what leaves the service, in JSON or in a
/// session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub document: Option<String>,
    pub phone_number: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub verified_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            username: u.username,
            document: u.document,
            phone_number: u.phone_number,
            active: u.active,
            verified_at: u.verified_at,
            last_login: u.last_login,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub error: bool,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub error: bool,
    pub user: PublicUser,
}
