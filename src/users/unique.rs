use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::store::{StoreTx, UniqueField};

/// The two identity fields that must be unique among active users.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity<'a> {
    pub email: Option<&'a str>,
    pub document: Option<&'a str>,
}

fn present(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.trim().is_empty())
}

/// Fails with `Conflict` when a candidate field that differs from the current identity
/// is already held by an active user. Document is checked before email.
pub async fn ensure_unique(
    tx: &mut dyn StoreTx,
    existing: Option<Identity<'_>>,
    candidate: Identity<'_>,
) -> AppResult<()> {
    let current = existing.unwrap_or_default();

    if let Some(document) = present(candidate.document) {
        if current.document != Some(document)
            && tx.find_active_by_document(document).await?.is_some()
        {
            warn!(field = "document", "uniqueness conflict");
            return Err(AppError::Conflict(UniqueField::Document));
        }
    }

    if let Some(email) = present(candidate.email) {
        if current.email != Some(email) && tx.find_active_by_email(email).await?.is_some() {
            warn!(field = "email", "uniqueness conflict");
            return Err(AppError::Conflict(UniqueField::Email));
        }
    }

    Ok(())
}
