use sqlx::FromRow;
use time::OffsetDateTime;

/// Outstanding password-reset grant. At most one per email.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub expire_in: OffsetDateTime,
}
