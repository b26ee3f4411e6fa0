//! In-process [`RecordStore`] used by the workflow tests.
//!
//! A transaction holds the store mutex for its whole lifetime and works on a copy of the
//! state, so transactions are fully serialized and a dropped handle discards its writes.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{RecordStore, StoreError, StoreResult, StoreTx, UniqueField};
use crate::auth::repo_types::ResetPasswordRequest;
use crate::users::repo_types::{NewUser, User, UserPatch};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    resets: Vec<ResetPasswordRequest>,
    verifications: Vec<(String, String)>,
}

impl MemoryState {
    fn active(&self) -> impl Iterator<Item = &User> {
        self.users.iter().filter(|u| u.deleted_at.is_none())
    }

    fn active_mut(&mut self) -> impl Iterator<Item = &mut User> {
        self.users.iter_mut().filter(|u| u.deleted_at.is_none())
    }

    fn insert_user(&mut self, new: &NewUser) -> StoreResult<User> {
        if self.active().any(|u| u.email == new.email) {
            return Err(StoreError::UniqueViolation(UniqueField::Email));
        }
        if let Some(doc) = &new.document {
            if self.active().any(|u| u.document.as_deref() == Some(doc.as_str())) {
                return Err(StoreError::UniqueViolation(UniqueField::Document));
            }
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name.clone(),
            email: new.email.clone(),
            username: new.username.clone(),
            document: new.document.clone(),
            phone_number: new.phone_number.clone(),
            password: new.password.clone(),
            active: new.active,
            verified_at: None,
            last_login: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    fn update_user(&mut self, id: Uuid, patch: &UserPatch) -> StoreResult<()> {
        if let Some(email) = &patch.email {
            if self.active().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::UniqueViolation(UniqueField::Email));
            }
        }
        if let Some(doc) = &patch.document {
            if self
                .active()
                .any(|u| u.id != id && u.document.as_ref() == Some(doc))
            {
                return Err(StoreError::UniqueViolation(UniqueField::Document));
            }
        }
        if let Some(user) = self.active_mut().find(|u| u.id == id) {
            let p = patch.clone();
            if let Some(v) = p.name {
                user.name = v;
            }
            if let Some(v) = p.email {
                user.email = v;
            }
            if let Some(v) = p.username {
                user.username = Some(v);
            }
            if let Some(v) = p.document {
                user.document = Some(v);
            }
            if let Some(v) = p.phone_number {
                user.phone_number = v;
            }
            if let Some(v) = p.password {
                user.password = v;
            }
            if let Some(v) = p.active {
                user.active = v;
            }
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
    failing_commits: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stands in for the out-of-band email verification flow.
    pub async fn mark_verified(&self, email: &str) {
        let mut state = self.inner.lock().await;
        let found = state.active_mut().find(|u| u.email == email);
        if let Some(user) = found {
            user.verified_at = Some(OffsetDateTime::now_utc());
        }
    }

    /// The next `n` commits fail with a serialization failure and discard their writes,
    /// as a losing Postgres transaction would.
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Raw row by id, soft-deleted or not.
    pub async fn raw_user(&self, id: Uuid) -> Option<User> {
        let state = self.inner.lock().await;
        state.users.iter().find(|u| u.id == id).cloned()
    }

    pub async fn verification_codes(&self, email: &str) -> Vec<String> {
        let state = self.inner.lock().await;
        state
            .verifications
            .iter()
            .filter(|(e, _)| e == email)
            .map(|(_, c)| c.clone())
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.inner.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            failing_commits: self.failing_commits.clone(),
        }))
    }

    async fn find_active_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let state = self.inner.lock().await;
        let email = login.to_lowercase();
        let found = state
            .active()
            .find(|u| u.email == email)
            .or_else(|| state.active().find(|u| u.username.as_deref() == Some(login)))
            .cloned();
        Ok(found)
    }

    async fn find_active_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let state = self.inner.lock().await;
        let found = state.active().find(|u| u.id == id).cloned();
        Ok(found)
    }

    async fn find_active_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.inner.lock().await;
        let found = state.active().find(|u| u.email == email).cloned();
        Ok(found)
    }

    async fn touch_last_login(&self, email: &str, at: OffsetDateTime) -> StoreResult<()> {
        let mut state = self.inner.lock().await;
        let found = state.active_mut().find(|u| u.email == email);
        if let Some(user) = found {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn update_password_by_email(
        &self,
        email: &str,
        encoded_password: &str,
    ) -> StoreResult<Option<User>> {
        let mut state = self.inner.lock().await;
        let updated = state.active_mut().find(|u| u.email == email).map(|user| {
            user.password = encoded_password.to_string();
            user.updated_at = OffsetDateTime::now_utc();
            user.clone()
        });
        Ok(updated)
    }

    async fn find_reset_request_by_email(
        &self,
        email: &str,
    ) -> StoreResult<Option<ResetPasswordRequest>> {
        let state = self.inner.lock().await;
        let found = state.resets.iter().find(|r| r.email == email).cloned();
        Ok(found)
    }

    async fn find_reset_request_by_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<ResetPasswordRequest>> {
        let state = self.inner.lock().await;
        let found = state.resets.iter().find(|r| r.token == token).cloned();
        Ok(found)
    }

    async fn insert_reset_request(&self, request: &ResetPasswordRequest) -> StoreResult<()> {
        let mut state = self.inner.lock().await;
        if state.resets.iter().any(|r| r.email == request.email) {
            return Err(StoreError::Backend(format!(
                "reset request for {} already exists",
                request.email
            )));
        }
        state.resets.push(request.clone());
        Ok(())
    }

    async fn delete_reset_request_by_email(&self, email: &str) -> StoreResult<bool> {
        let mut state = self.inner.lock().await;
        let before = state.resets.len();
        state.resets.retain(|r| r.email != email);
        Ok(state.resets.len() != before)
    }

    async fn insert_email_verification(&self, email: &str, code: &str) -> StoreResult<()> {
        let mut state = self.inner.lock().await;
        state
            .verifications
            .push((email.to_string(), code.to_string()));
        Ok(())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failing_commits: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_active_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.working.active().find(|u| u.id == id).cloned())
    }

    async fn find_active_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.working.active().find(|u| u.email == email).cloned())
    }

    async fn find_active_by_document(&mut self, document: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .active()
            .find(|u| u.document.as_deref() == Some(document))
            .cloned())
    }

    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User> {
        self.working.insert_user(user)
    }

    async fn update_user(&mut self, id: Uuid, patch: &UserPatch) -> StoreResult<()> {
        self.working.update_user(id, patch)
    }

    async fn soft_delete_user(&mut self, id: Uuid, at: OffsetDateTime) -> StoreResult<()> {
        if let Some(user) = self.working.active_mut().find(|u| u.id == id) {
            user.deleted_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTx {
            mut guard,
            working,
            failing_commits,
        } = *self;
        let injected = failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::SerializationFailure);
        }
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod memory_tests {
    use super::*;

    fn new_user(email: &str, document: Option<&str>) -> NewUser {
        NewUser {
            name: "Ana".into(),
            email: email.into(),
            username: None,
            document: document.map(str::to_string),
            phone_number: "+5511999990000".into(),
            password: "encoded".into(),
            active: true,
        }
    }

    #[tokio::test]
    async fn dropped_tx_rolls_back() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_user(&new_user("a@x.com", None)).await.unwrap();
        }
        assert!(store.find_active_by_email("a@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_tx_is_visible() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(&new_user("a@x.com", None)).await.unwrap();
        tx.commit().await.unwrap();
        let found = store.find_active_by_id(user.id).await.unwrap();
        assert_eq!(found.map(|u| u.email), Some("a@x.com".to_string()));
    }

    #[tokio::test]
    async fn insert_backstop_rejects_active_duplicates_only() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let first = tx
            .insert_user(&new_user("a@x.com", Some("52998224725")))
            .await
            .unwrap();
        let err = tx
            .insert_user(&new_user("b@x.com", Some("52998224725")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::UniqueViolation(UniqueField::Document)
        ));

        tx.soft_delete_user(first.id, OffsetDateTime::now_utc())
            .await
            .unwrap();
        tx.insert_user(&new_user("a@x.com", Some("52998224725")))
            .await
            .expect("deleted rows release their identity");
    }

    #[tokio::test]
    async fn injected_commit_failure_discards_writes() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&new_user("a@x.com", None)).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::SerializationFailure));
        assert!(store.find_active_by_email("a@x.com").await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&new_user("a@x.com", None)).await.unwrap();
        tx.commit().await.expect("only one failure was injected");
    }

    #[tokio::test]
    async fn login_lookup_prefers_email_and_ignores_its_case() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let owner = tx.insert_user(&new_user("ana@x.com", None)).await.unwrap();
        let mut squatter = new_user("other@x.com", None);
        squatter.username = Some("ana@x.com".into());
        tx.insert_user(&squatter).await.unwrap();
        tx.commit().await.unwrap();

        let found = store.find_active_by_login("Ana@X.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(owner.id));
        let found = store.find_active_by_login("ana@x.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(owner.id));
    }
}
