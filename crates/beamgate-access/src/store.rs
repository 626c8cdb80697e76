//! Storage behind the access service.
//!
//! [`AccessStore`] is the persistence seam: principals, sessions, and API
//! keys live behind it. [`MemoryStore`] is the in-process implementation
//! used by the single-node deployment and by tests.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::apikey::ApiKeyRecord;

/// Failures from the access store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("store conflict: {reason}")]
    Conflict { reason: String },
    /// The backing store could not be reached or failed mid-operation.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StoreError {
    /// A [`StoreError::Conflict`] with the given reason.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// A [`StoreError::Unavailable`] with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// A stable principal identity, one record per provider/username pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalRecord {
    pub id: Uuid,
    pub provider: String,
    pub username: String,
    pub created_at: Timestamp,
}

/// A revocable login session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub revoked: bool,
}

impl SessionRecord {
    /// Whether the session has passed its expiration instant.
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }

    /// Whether the session can still mint access tokens.
    #[inline]
    #[must_use]
    pub fn is_usable(&self, now: Timestamp) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

/// Persistence seam for principals, sessions, and API keys.
#[async_trait]
pub trait AccessStore: Send + Sync + 'static {
    /// Finds or creates the principal for a provider identity.
    async fn upsert_principal(
        &self,
        provider: &str,
        username: &str,
        now: Timestamp,
    ) -> Result<PrincipalRecord, StoreError>;

    /// Looks up a principal by id.
    async fn principal(&self, id: Uuid) -> Result<Option<PrincipalRecord>, StoreError>;

    /// All known principals, oldest first.
    async fn principals(&self) -> Result<Vec<PrincipalRecord>, StoreError>;

    /// Records a new session. Fails on a duplicate id.
    async fn insert_session(&self, session: SessionRecord) -> Result<(), StoreError>;

    /// Looks up a session by id.
    async fn session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Marks a session revoked. Returns `false` for an unknown id.
    async fn revoke_session(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Sessions belonging to a principal, oldest first.
    async fn sessions_of(&self, principal_id: Uuid) -> Result<Vec<SessionRecord>, StoreError>;

    /// Stores a new API key. Fails on a duplicate index.
    async fn insert_api_key(&self, record: ApiKeyRecord) -> Result<(), StoreError>;

    /// Looks up an API key by its cleartext index.
    async fn api_key(&self, index: &str) -> Result<Option<ApiKeyRecord>, StoreError>;

    /// Keys belonging to a principal, oldest first.
    async fn api_keys_of(&self, principal_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError>;

    /// Deletes an API key by index. Returns `false` for an unknown index.
    async fn remove_api_key(&self, index: &str) -> Result<bool, StoreError>;
}

/// In-process [`AccessStore`] for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    principals: HashMap<Uuid, PrincipalRecord>,
    identities: HashMap<(String, String), Uuid>,
    sessions: HashMap<Uuid, SessionRecord>,
    api_keys: HashMap<String, ApiKeyRecord>,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty store behind an [`Arc`], ready to hand to the service.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl AccessStore for MemoryStore {
    async fn upsert_principal(
        &self,
        provider: &str,
        username: &str,
        now: Timestamp,
    ) -> Result<PrincipalRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let identity = (provider.to_owned(), username.to_owned());

        if let Some(&id) = inner.identities.get(&identity) {
            if let Some(record) = inner.principals.get(&id) {
                return Ok(record.clone());
            }
        }

        let record = PrincipalRecord {
            id: Uuid::new_v4(),
            provider: provider.to_owned(),
            username: username.to_owned(),
            created_at: now,
        };
        inner.identities.insert(identity, record.id);
        inner.principals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn principal(&self, id: Uuid) -> Result<Option<PrincipalRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.principals.get(&id).cloned())
    }

    async fn principals(&self) -> Result<Vec<PrincipalRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut records: Vec<_> = inner.principals.values().cloned().collect();
        records.sort_by_key(|record| (record.created_at, record.id));
        Ok(records)
    }

    async fn insert_session(&self, session: SessionRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.entry(session.id) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "session '{}' already exists",
                session.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(session);
                Ok(())
            }
        }
    }

    async fn session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.sessions.get(&id).cloned())
    }

    async fn revoke_session(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.sessions.get_mut(&id) {
            Some(session) => {
                session.revoked = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn sessions_of(&self, principal_id: Uuid) -> Result<Vec<SessionRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<_> = inner
            .sessions
            .values()
            .filter(|session| session.principal_id == principal_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|session| (session.created_at, session.id));
        Ok(sessions)
    }

    async fn insert_api_key(&self, record: ApiKeyRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.api_keys.entry(record.index.clone()) {
            Entry::Occupied(_) => Err(StoreError::conflict(format!(
                "api key index '{}' already exists",
                record.index
            ))),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    async fn api_key(&self, index: &str) -> Result<Option<ApiKeyRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.api_keys.get(index).cloned())
    }

    async fn api_keys_of(&self, principal_id: Uuid) -> Result<Vec<ApiKeyRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut keys: Vec<_> = inner
            .api_keys
            .values()
            .filter(|record| record.principal_id == principal_id)
            .cloned()
            .collect();
        keys.sort_by_key(|record| (record.created_at, record.index.clone()));
        Ok(keys)
    }

    async fn remove_api_key(&self, index: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.api_keys.remove(index).is_some())
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use crate::apikey::ApiKeyScopes;

    use super::*;

    fn session(principal_id: Uuid, created_at: Timestamp) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            principal_id,
            created_at,
            expires_at: created_at.checked_add(SignedDuration::from_hours(1)).unwrap(),
            revoked: false,
        }
    }

    #[tokio::test]
    async fn upsert_returns_the_same_principal_per_identity() {
        let store = MemoryStore::new();
        let now = Timestamp::now();

        let first = store.upsert_principal("toy", "bob", now).await.unwrap();
        let again = store.upsert_principal("toy", "bob", now).await.unwrap();
        let other = store.upsert_principal("toy", "carol", now).await.unwrap();

        assert_eq!(first, again);
        assert_ne!(first.id, other.id);
        assert_eq!(store.principals().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sessions_revoke_and_expire() {
        let store = MemoryStore::new();
        let now = Timestamp::now();
        let principal = store.upsert_principal("toy", "bob", now).await.unwrap();

        let record = session(principal.id, now);
        store.insert_session(record.clone()).await.unwrap();

        let stored = store.session(record.id).await.unwrap().unwrap();
        assert!(stored.is_usable(now));
        assert!(stored.is_expired(stored.expires_at));

        assert!(store.revoke_session(record.id).await.unwrap());
        let revoked = store.session(record.id).await.unwrap().unwrap();
        assert!(revoked.revoked);
        assert!(!revoked.is_usable(now));

        assert!(!store.revoke_session(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn session_listing_is_oldest_first() {
        let store = MemoryStore::new();
        let now = Timestamp::now();
        let principal = store.upsert_principal("toy", "bob", now).await.unwrap();

        let later = session(
            principal.id,
            now.checked_add(SignedDuration::from_secs(2)).unwrap(),
        );
        let earlier = session(principal.id, now);
        store.insert_session(later.clone()).await.unwrap();
        store.insert_session(earlier.clone()).await.unwrap();

        let listed = store.sessions_of(principal.id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, earlier.id);
        assert_eq!(listed[1].id, later.id);
    }

    #[tokio::test]
    async fn duplicate_api_key_index_is_a_conflict() {
        let store = MemoryStore::new();
        let now = Timestamp::now();
        let principal = store.upsert_principal("toy", "bob", now).await.unwrap();

        let (record, _) = ApiKeyRecord::issue(
            principal.id,
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            None,
        );
        store.insert_api_key(record.clone()).await.unwrap();

        let error = store.insert_api_key(record.clone()).await.unwrap_err();
        assert!(matches!(error, StoreError::Conflict { .. }));

        let found = store.api_key(&record.index).await.unwrap().unwrap();
        assert_eq!(found.index, record.index);
    }

    #[tokio::test]
    async fn api_keys_list_and_remove() {
        let store = MemoryStore::new();
        let now = Timestamp::now();
        let principal = store.upsert_principal("toy", "bob", now).await.unwrap();

        let (record, _) = ApiKeyRecord::issue(
            principal.id,
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            None,
        );
        store.insert_api_key(record.clone()).await.unwrap();
        assert_eq!(store.api_keys_of(principal.id).await.unwrap().len(), 1);

        assert!(store.remove_api_key(&record.index).await.unwrap());
        assert!(!store.remove_api_key(&record.index).await.unwrap());
        assert!(store.api_keys_of(principal.id).await.unwrap().is_empty());
    }
}
