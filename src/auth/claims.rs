use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::users::dto::PublicUser;

/// Session token payload: the caller's public attributes plus registered claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,          // user ID
    #[serde(flatten)]
    pub user: PublicUser,   // never carries the password
    pub iat: usize,         // issued at (unix timestamp)
    pub exp: usize,         // expires at (unix timestamp)
    pub iss: String,        // issuer
    pub aud: String,        // audience
}
