//! The access service: authentication, tokens, sessions, and API keys.
//!
//! [`AccessService`] ties the provider registry, the token signer, the
//! policy table, and the store together behind one cloneable handle. All
//! clones share the same state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use jiff::Timestamp;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use beamgate_core::{
    ANONYMOUS_PROVIDER, AccessPolicy, BuiltinRole, PUBLIC_USERNAME, Principal,
    SINGLE_USER_USERNAME, ScopeSet, scopes,
};

use crate::TRACING_TARGET_SERVICE;
use crate::apikey::{self, ApiKeyRecord, ApiKeyScopes, ApiKeySecret};
use crate::error::AuthError;
use crate::store::{AccessStore, PrincipalRecord, SessionRecord, StoreError};
use crate::token::{self, AccessClaims, RefreshClaims, TokenSigner};
use crate::verify::{Credential, ProviderRegistry};

/// Tunables of the access service.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// Lifetime of issued access tokens.
    pub access_token_max_age: Duration,
    /// Lifetime of issued refresh tokens.
    pub refresh_token_max_age: Duration,
    /// Lifetime of login sessions.
    pub session_max_age: Duration,
    /// Secret that authenticates as the single-user principal.
    pub single_user_api_key: Option<String>,
    /// Whether credential-less requests resolve to the public principal.
    pub allow_anonymous_access: bool,
}

impl AccessConfig {
    /// Default access-token lifetime: 15 minutes.
    pub const DEFAULT_ACCESS_TOKEN_MAX_AGE: Duration = Duration::from_secs(15 * 60);
    /// Default refresh-token lifetime: 7 days.
    pub const DEFAULT_REFRESH_TOKEN_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    /// Default session lifetime: 365 days.
    pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Configuration with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the access-token lifetime.
    #[must_use]
    pub fn with_access_token_max_age(mut self, max_age: Duration) -> Self {
        self.access_token_max_age = max_age;
        self
    }

    /// Overrides the refresh-token lifetime.
    #[must_use]
    pub fn with_refresh_token_max_age(mut self, max_age: Duration) -> Self {
        self.refresh_token_max_age = max_age;
        self
    }

    /// Overrides the session lifetime.
    #[must_use]
    pub fn with_session_max_age(mut self, max_age: Duration) -> Self {
        self.session_max_age = max_age;
        self
    }

    /// Enables single-user mode with the given master key.
    #[must_use]
    pub fn with_single_user_api_key(mut self, key: impl Into<String>) -> Self {
        self.single_user_api_key = Some(key.into());
        self
    }

    /// Lets credential-less requests through as the public principal.
    #[must_use]
    pub fn with_anonymous_access(mut self, allow: bool) -> Self {
        self.allow_anonymous_access = allow;
        self
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            access_token_max_age: Self::DEFAULT_ACCESS_TOKEN_MAX_AGE,
            refresh_token_max_age: Self::DEFAULT_REFRESH_TOKEN_MAX_AGE,
            session_max_age: Self::DEFAULT_SESSION_MAX_AGE,
            single_user_api_key: None,
            allow_anonymous_access: false,
        }
    }
}

/// Access and refresh tokens issued at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// The session backing the refresh token.
    pub session_id: Uuid,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
}

/// A renewed access token.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
}

/// A freshly issued API key.
#[derive(Debug)]
pub struct IssuedApiKey {
    /// The secret, handed to the caller exactly once.
    pub secret: ApiKeySecret,
    /// The record as stored.
    pub record: ApiKeyRecord,
}

/// Parameters for issuing an API key.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyRequest {
    /// Key lifetime; `None` means the key never expires.
    pub expires_in: Option<Duration>,
    /// Fixed scope snapshot; `None` means the key inherits its owner's.
    pub scopes: Option<ScopeSet>,
    /// Free-form label.
    pub note: Option<String>,
}

/// One principal with everything the store knows about it.
#[derive(Debug, Clone)]
pub struct PrincipalOverview {
    pub record: PrincipalRecord,
    /// Current roles per policy.
    pub roles: Vec<String>,
    /// Current effective scopes per policy.
    pub scopes: ScopeSet,
    pub sessions: Vec<SessionRecord>,
    pub api_keys: Vec<ApiKeyRecord>,
}

/// Authentication, token, session, and API-key operations.
#[derive(Clone)]
pub struct AccessService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    providers: ProviderRegistry,
    signer: TokenSigner,
    store: Arc<dyn AccessStore>,
    policy: AccessPolicy,
    config: AccessConfig,
}

impl AccessService {
    /// Attempts at a free API-key index before giving up.
    const MINT_ATTEMPTS: usize = 3;

    pub fn new(
        providers: ProviderRegistry,
        signer: TokenSigner,
        store: Arc<dyn AccessStore>,
        policy: AccessPolicy,
        config: AccessConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                providers,
                signer,
                store,
                policy,
                config,
            }),
        }
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &AccessConfig {
        &self.inner.config
    }

    /// Whether credential-less requests may proceed as the public principal.
    #[must_use]
    pub fn allows_anonymous(&self) -> bool {
        self.inner.config.allow_anonymous_access
    }

    /// Names of the configured identity providers, in sorted order.
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.inner.providers.names()
    }

    /// Verifies a credential against the named provider and resolves the
    /// authenticated principal with current roles and scopes.
    pub async fn authenticate(
        &self,
        provider_name: &str,
        credential: &Credential,
    ) -> Result<Principal, AuthError> {
        let verifier = self.inner.providers.get(provider_name)?;
        let identity = verifier.verify(credential).await?;

        let now = Timestamp::now();
        let record = self
            .inner
            .store
            .upsert_principal(provider_name, &identity.username, now)
            .await?;

        let mut principal = self.resolve_principal(&record);
        if principal.display_name.is_none() {
            principal.display_name = identity.display_name;
        }
        if principal.email.is_none() {
            principal.email = identity.email;
        }

        tracing::info!(
            target: TRACING_TARGET_SERVICE,
            provider = provider_name,
            username = %principal.username,
            principal_id = %principal.id,
            "principal authenticated",
        );
        Ok(principal)
    }

    /// Opens a session and signs an access/refresh token pair for it.
    pub async fn issue_tokens(&self, principal: &Principal) -> Result<TokenPair, AuthError> {
        let config = &self.inner.config;
        let now = Timestamp::now();

        let session = SessionRecord {
            id: Uuid::new_v4(),
            principal_id: principal.id,
            created_at: now,
            expires_at: token::deadline_after(now, config.session_max_age),
            revoked: false,
        };
        self.inner.store.insert_session(session.clone()).await?;

        let access_token =
            self.inner
                .signer
                .sign_access(principal, now, config.access_token_max_age)?;
        let refresh_token = self.inner.signer.sign_refresh(
            session.id,
            principal.id,
            now,
            config.refresh_token_max_age,
        )?;

        tracing::debug!(
            target: TRACING_TARGET_SERVICE,
            principal_id = %principal.id,
            session_id = %session.id,
            "session opened",
        );

        Ok(TokenPair {
            access_token,
            refresh_token,
            session_id: session.id,
            expires_in: config.access_token_max_age.as_secs(),
        })
    }

    /// Exchanges a refresh token for a fresh access token.
    ///
    /// The backing session must be neither revoked nor expired. Roles and
    /// scopes are re-resolved from current policy, so the renewed token
    /// reflects policy changes made since login. The refresh token itself
    /// is not reissued.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessGrant, AuthError> {
        let claims: RefreshClaims = self.inner.signer.decode(refresh_token)?;
        if claims.token_type != token::TOKEN_TYPE_REFRESH {
            return Err(AuthError::InvalidCredential);
        }

        let now = Timestamp::now();
        let session = self
            .inner
            .store
            .session(claims.session_id)
            .await?
            .ok_or_else(|| AuthError::session_revoked(claims.session_id))?;

        if session.revoked {
            tracing::debug!(
                target: TRACING_TARGET_SERVICE,
                session_id = %session.id,
                "refresh rejected for revoked session",
            );
            return Err(AuthError::session_revoked(session.id));
        }
        if session.is_expired(now) {
            return Err(AuthError::TokenExpired);
        }

        let record = self
            .inner
            .store
            .principal(session.principal_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;
        let principal = self.resolve_principal(&record);

        let access_token = self.inner.signer.sign_access(
            &principal,
            now,
            self.inner.config.access_token_max_age,
        )?;
        Ok(AccessGrant {
            access_token,
            expires_in: self.inner.config.access_token_max_age.as_secs(),
        })
    }

    /// Resolves a bearer credential to a principal.
    ///
    /// Tried in order: the configured single-user key, an API key when the
    /// token has that shape, an access token otherwise.
    pub async fn validate_bearer(&self, token: &str) -> Result<Principal, AuthError> {
        if let Some(single_user_key) = &self.inner.config.single_user_api_key {
            if bool::from(single_user_key.as_bytes().ct_eq(token.as_bytes())) {
                return self.single_user_principal().await;
            }
        }
        if apikey::looks_like_key(token) {
            return self.validate_api_key(token).await;
        }
        self.validate_access_token(token).await
    }

    /// The principal behind the configured single-user key.
    pub async fn single_user_principal(&self) -> Result<Principal, AuthError> {
        self.mode_principal(SINGLE_USER_USERNAME).await
    }

    /// The principal for credential-less requests, when anonymous access
    /// is enabled.
    pub async fn anonymous_principal(&self) -> Result<Principal, AuthError> {
        if !self.inner.config.allow_anonymous_access {
            return Err(AuthError::InvalidCredential);
        }
        self.mode_principal(PUBLIC_USERNAME).await
    }

    /// Issues an API key for the calling principal.
    ///
    /// Requested scopes must already be held. Without a request the key
    /// inherits the owner's scopes, except that a caller authorized by a
    /// fixed-scope key gets a snapshot of that key's scopes instead, so
    /// reissuing can never escalate.
    pub async fn issue_api_key(
        &self,
        principal: &Principal,
        request: ApiKeyRequest,
    ) -> Result<IssuedApiKey, AuthError> {
        let scopes = match request.scopes {
            Some(requested) => {
                for scope in &requested {
                    if !principal.scopes.contains(scope) {
                        return Err(AuthError::scope_not_permitted(scope.as_str()));
                    }
                }
                ApiKeyScopes::Fixed(requested)
            }
            None if principal.scopes_pinned => ApiKeyScopes::Fixed(principal.scopes.clone()),
            None => ApiKeyScopes::Inherited,
        };

        self.mint_api_key(
            principal.id,
            &principal.provider,
            &principal.username,
            scopes,
            request.expires_in,
            request.note,
        )
        .await
    }

    /// Issues a fixed-scope key for another principal.
    ///
    /// Requires `admin:apikeys`. Cross-principal keys never inherit; the
    /// requested scopes must be a subset of what the target holds now.
    pub async fn issue_api_key_for(
        &self,
        requester: &Principal,
        target: &Principal,
        requested: ScopeSet,
        expires_in: Option<Duration>,
        note: Option<String>,
    ) -> Result<IssuedApiKey, AuthError> {
        if !requester.has_scope(scopes::ADMIN_APIKEYS) {
            return Err(AuthError::scope_not_permitted(scopes::ADMIN_APIKEYS));
        }
        for scope in &requested {
            if !target.scopes.contains(scope) {
                return Err(AuthError::scope_not_permitted(scope.as_str()));
            }
        }

        self.mint_api_key(
            target.id,
            &target.provider,
            &target.username,
            ApiKeyScopes::Fixed(requested),
            expires_in,
            note,
        )
        .await
    }

    /// Looks up an API key visible to the requester.
    ///
    /// A key owned by someone else is reported absent rather than
    /// forbidden, so probing a prefix cannot confirm that it exists.
    pub async fn api_key_info(
        &self,
        requester: &Principal,
        index: &str,
    ) -> Result<Option<ApiKeyRecord>, AuthError> {
        let Some(record) = self.inner.store.api_key(index).await? else {
            return Ok(None);
        };
        if record.principal_id != requester.id && !requester.has_scope(scopes::ADMIN_APIKEYS) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Deletes an API key owned by the requester, or any key under
    /// `admin:apikeys`. Returns `false` when no such key is visible.
    pub async fn revoke_api_key(
        &self,
        requester: &Principal,
        index: &str,
    ) -> Result<bool, AuthError> {
        let Some(record) = self.api_key_info(requester, index).await? else {
            return Ok(false);
        };

        let removed = self.inner.store.remove_api_key(&record.index).await?;
        if removed {
            tracing::info!(
                target: TRACING_TARGET_SERVICE,
                index = %record.index,
                principal_id = %record.principal_id,
                "api key revoked",
            );
        }
        Ok(removed)
    }

    /// Revokes a session owned by the requester, or any session under
    /// `admin:read:principals`. Returns `false` when no such session is
    /// visible.
    pub async fn revoke_session(
        &self,
        requester: &Principal,
        session_id: Uuid,
    ) -> Result<bool, AuthError> {
        let Some(session) = self.inner.store.session(session_id).await? else {
            return Ok(false);
        };
        if session.principal_id != requester.id
            && !requester.has_scope(scopes::ADMIN_READ_PRINCIPALS)
        {
            return Ok(false);
        }

        let revoked = self.inner.store.revoke_session(session_id).await?;
        if revoked {
            tracing::info!(
                target: TRACING_TARGET_SERVICE,
                session_id = %session_id,
                principal_id = %session.principal_id,
                "session revoked",
            );
        }
        Ok(revoked)
    }

    /// Resolves a stored principal by id with current roles and scopes.
    pub async fn principal_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
        let record = self.inner.store.principal(id).await?;
        Ok(record.map(|record| self.resolve_principal(&record)))
    }

    /// Everything the store knows about one principal.
    pub async fn principal_overview(
        &self,
        id: Uuid,
    ) -> Result<Option<PrincipalOverview>, AuthError> {
        let Some(record) = self.inner.store.principal(id).await? else {
            return Ok(None);
        };
        Ok(Some(self.overview_of(record).await?))
    }

    /// Summaries of every known principal, oldest first.
    pub async fn principal_overviews(&self) -> Result<Vec<PrincipalOverview>, AuthError> {
        let records = self.inner.store.principals().await?;
        let mut overviews = Vec::with_capacity(records.len());
        for record in records {
            overviews.push(self.overview_of(record).await?);
        }
        Ok(overviews)
    }

    async fn overview_of(&self, record: PrincipalRecord) -> Result<PrincipalOverview, AuthError> {
        let principal = self.resolve_principal(&record);
        let sessions = self.inner.store.sessions_of(record.id).await?;
        let api_keys = self.inner.store.api_keys_of(record.id).await?;
        Ok(PrincipalOverview {
            record,
            roles: principal.roles,
            scopes: principal.scopes,
            sessions,
            api_keys,
        })
    }

    async fn validate_access_token(&self, access_token: &str) -> Result<Principal, AuthError> {
        let claims: AccessClaims = self.inner.signer.decode(access_token)?;
        if claims.token_type != token::TOKEN_TYPE_ACCESS {
            return Err(AuthError::InvalidCredential);
        }
        if claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        let record = self
            .inner
            .store
            .principal(claims.principal_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        // Scopes travel in the token, frozen at issuance.
        let mut principal = self.resolve_principal(&record);
        principal.scopes = claims.scope_set();
        Ok(principal)
    }

    async fn validate_api_key(&self, secret: &str) -> Result<Principal, AuthError> {
        let Some(index) = secret.get(..apikey::INDEX_LEN) else {
            return Err(AuthError::InvalidCredential);
        };
        let record = self
            .inner
            .store
            .api_key(index)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        if !record.matches(secret) {
            return Err(AuthError::InvalidCredential);
        }
        if record.is_expired(Timestamp::now()) {
            return Err(AuthError::TokenExpired);
        }

        let principal_record = self
            .inner
            .store
            .principal(record.principal_id)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let mut principal = self.resolve_principal(&principal_record);
        if let ApiKeyScopes::Fixed(fixed) = &record.scopes {
            // A fixed key never grows beyond its snapshot.
            principal.scopes = fixed.clone();
            principal.scopes_pinned = true;
        }
        Ok(principal)
    }

    async fn mode_principal(&self, username: &str) -> Result<Principal, AuthError> {
        let record = self
            .inner
            .store
            .upsert_principal(ANONYMOUS_PROVIDER, username, Timestamp::now())
            .await?;
        Ok(self.resolve_principal(&record))
    }

    async fn mint_api_key(
        &self,
        principal_id: Uuid,
        provider: &str,
        username: &str,
        scopes: ApiKeyScopes,
        expires_in: Option<Duration>,
        note: Option<String>,
    ) -> Result<IssuedApiKey, AuthError> {
        let now = Timestamp::now();
        let expires_at = expires_in.map(|max_age| token::deadline_after(now, max_age));

        // Retries with a fresh secret when the index collides.
        for _ in 0..Self::MINT_ATTEMPTS {
            let (record, secret) = ApiKeyRecord::issue(
                principal_id,
                provider,
                username,
                scopes.clone(),
                note.clone(),
                now,
                expires_at,
            );
            match self.inner.store.insert_api_key(record.clone()).await {
                Ok(()) => {
                    tracing::info!(
                        target: TRACING_TARGET_SERVICE,
                        principal_id = %principal_id,
                        index = %record.index,
                        inherited = record.scopes.is_inherited(),
                        "api key issued",
                    );
                    return Ok(IssuedApiKey { secret, record });
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(error) => return Err(error.into()),
            }
        }
        Err(AuthError::store("could not find a free api key index"))
    }

    /// Builds a [`Principal`] with current roles and effective scopes.
    fn resolve_principal(&self, record: &PrincipalRecord) -> Principal {
        let policy = &self.inner.policy;

        let (roles, scopes) = if record.provider == ANONYMOUS_PROVIDER {
            let role = match record.username.as_str() {
                SINGLE_USER_USERNAME => BuiltinRole::UnauthenticatedSingleUser,
                _ => BuiltinRole::UnauthenticatedPublic,
            };
            let roles = vec![role.to_string()];
            let scopes = policy.resolve(&roles);
            (roles, scopes)
        } else {
            let roles = policy.roles_of(&record.username);
            let scopes = policy.effective_scopes(&record.username, &roles);
            (roles, scopes)
        };

        let entry = policy.user(&record.username);
        Principal {
            id: record.id,
            provider: record.provider.clone(),
            username: record.username.clone(),
            roles,
            scopes,
            scopes_pinned: false,
            display_name: entry.and_then(|entry| entry.displayed_name.clone()),
            email: entry.and_then(|entry| entry.mail.clone()),
        }
    }
}

impl fmt::Debug for AccessService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessService")
            .field("providers", &self.inner.providers.len())
            .field("signer", &self.inner.signer)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use beamgate_core::{PolicyDocument, UserEntry, scope_set};

    use crate::store::MemoryStore;
    use crate::verify::ProviderConfig;

    use super::*;

    const SIGNING_SECRET: &str = "test_signing_secret";

    fn policy_with(carol_roles: &[&str]) -> AccessPolicy {
        let mut users = BTreeMap::new();
        users.insert(
            "bob".to_owned(),
            UserEntry {
                roles: vec!["admin".to_owned(), "expert".to_owned()],
                displayed_name: Some("Bob Burns".to_owned()),
                ..UserEntry::default()
            },
        );
        users.insert(
            "carol".to_owned(),
            UserEntry {
                roles: carol_roles.iter().map(|role| (*role).to_owned()).collect(),
                ..UserEntry::default()
            },
        );
        users.insert(
            "dave".to_owned(),
            UserEntry {
                roles: vec!["user".to_owned()],
                ..UserEntry::default()
            },
        );
        AccessPolicy::from_document(PolicyDocument {
            roles: BTreeMap::new(),
            users,
        })
        .unwrap()
    }

    fn registry() -> ProviderRegistry {
        let configs = vec![ProviderConfig::Dictionary {
            name: "toy".to_owned(),
            users: BTreeMap::from([
                ("bob".to_owned(), "bob_password".to_owned()),
                ("carol".to_owned(), "carol_password".to_owned()),
                ("dave".to_owned(), "dave_password".to_owned()),
            ]),
        }];
        ProviderRegistry::build(configs, BTreeMap::new()).unwrap()
    }

    fn build_service(
        store: Arc<dyn AccessStore>,
        policy: AccessPolicy,
        secrets: &[&str],
        config: AccessConfig,
    ) -> AccessService {
        AccessService::new(
            registry(),
            TokenSigner::new(secrets).unwrap(),
            store,
            policy,
            config,
        )
    }

    fn service() -> AccessService {
        build_service(
            MemoryStore::shared(),
            policy_with(&["observer"]),
            &[SIGNING_SECRET],
            AccessConfig::default(),
        )
    }

    async fn login(service: &AccessService, username: &str, password: &str) -> Principal {
        let credential = Credential {
            username: username.to_owned(),
            password: password.to_owned(),
        };
        service.authenticate("toy", &credential).await.unwrap()
    }

    #[tokio::test]
    async fn login_issues_working_tokens() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        assert_eq!(carol.roles, vec!["observer".to_owned()]);
        assert!(carol.has_scope(scopes::READ_QUEUE));
        assert!(!carol.has_scope(scopes::WRITE_EXECUTE));

        let pair = service.issue_tokens(&carol).await.unwrap();
        assert_eq!(pair.expires_in, 900);

        let resolved = service.validate_bearer(&pair.access_token).await.unwrap();
        assert_eq!(resolved.id, carol.id);
        assert_eq!(resolved.scopes, carol.scopes);
        assert!(!resolved.scopes_pinned);
    }

    #[tokio::test]
    async fn bad_credentials_and_unknown_providers_are_rejected() {
        let service = service();
        let credential = Credential {
            username: "carol".to_owned(),
            password: "wrong".to_owned(),
        };
        assert!(matches!(
            service.authenticate("toy", &credential).await,
            Err(AuthError::InvalidCredential)
        ));
        assert!(matches!(
            service.authenticate("ldap", &credential).await,
            Err(AuthError::ProviderNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn refresh_renews_access_without_reissuing_refresh() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let pair = service.issue_tokens(&carol).await.unwrap();

        let grant = service.refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(grant.expires_in, 900);

        let resolved = service.validate_bearer(&grant.access_token).await.unwrap();
        assert_eq!(resolved.id, carol.id);
    }

    #[tokio::test]
    async fn refresh_rejects_an_access_token() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let pair = service.issue_tokens(&carol).await.unwrap();

        assert!(matches!(
            service.refresh(&pair.access_token).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn revoked_session_stops_refresh_but_not_live_tokens() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let pair = service.issue_tokens(&carol).await.unwrap();

        assert!(service.revoke_session(&carol, pair.session_id).await.unwrap());
        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AuthError::SessionRevoked { session_id }) if session_id == pair.session_id
        ));

        // Already-issued access tokens ride out their own expiry.
        assert!(service.validate_bearer(&pair.access_token).await.is_ok());
    }

    #[tokio::test]
    async fn expired_session_stops_refresh() {
        let service = build_service(
            MemoryStore::shared(),
            policy_with(&["observer"]),
            &[SIGNING_SECRET],
            AccessConfig::default().with_session_max_age(Duration::ZERO),
        );
        let carol = login(&service, "carol", "carol_password").await;
        let pair = service.issue_tokens(&carol).await.unwrap();

        assert!(matches!(
            service.refresh(&pair.refresh_token).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn session_revocation_respects_ownership() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let dave = login(&service, "dave", "dave_password").await;
        let bob = login(&service, "bob", "bob_password").await;
        let pair = service.issue_tokens(&carol).await.unwrap();

        // Dave holds no admin scope and does not own the session.
        assert!(!service.revoke_session(&dave, pair.session_id).await.unwrap());
        // Bob holds admin:read:principals.
        assert!(service.revoke_session(&bob, pair.session_id).await.unwrap());
        // Unknown session ids are indistinguishable from foreign ones.
        assert!(!service.revoke_session(&bob, Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn access_token_scopes_are_frozen_at_issuance() {
        let store: Arc<dyn AccessStore> = MemoryStore::shared();
        let before = build_service(
            store.clone(),
            policy_with(&["observer"]),
            &[SIGNING_SECRET],
            AccessConfig::default(),
        );
        let after = build_service(
            store,
            policy_with(&["expert"]),
            &[SIGNING_SECRET],
            AccessConfig::default(),
        );

        let carol = login(&before, "carol", "carol_password").await;
        let pair = before.issue_tokens(&carol).await.unwrap();

        // The old token still carries observer scopes under the new policy.
        let via_token = after.validate_bearer(&pair.access_token).await.unwrap();
        assert!(!via_token.has_scope(scopes::WRITE_EXECUTE));

        // A refresh re-resolves from the new policy.
        let grant = after.refresh(&pair.refresh_token).await.unwrap();
        let renewed = after.validate_bearer(&grant.access_token).await.unwrap();
        assert!(renewed.has_scope(scopes::WRITE_EXECUTE));
    }

    #[tokio::test]
    async fn inherited_key_tracks_policy_while_fixed_key_does_not() {
        let store: Arc<dyn AccessStore> = MemoryStore::shared();
        let before = build_service(
            store.clone(),
            policy_with(&["observer"]),
            &[SIGNING_SECRET],
            AccessConfig::default(),
        );
        let after = build_service(
            store,
            policy_with(&["expert"]),
            &[SIGNING_SECRET],
            AccessConfig::default(),
        );

        let carol = login(&before, "carol", "carol_password").await;
        let inherited = before
            .issue_api_key(&carol, ApiKeyRequest::default())
            .await
            .unwrap();
        let fixed = before
            .issue_api_key(
                &carol,
                ApiKeyRequest {
                    scopes: Some(scope_set([scopes::READ_STATUS])),
                    ..ApiKeyRequest::default()
                },
            )
            .await
            .unwrap();

        let via_inherited = after
            .validate_bearer(inherited.secret.reveal())
            .await
            .unwrap();
        assert!(via_inherited.has_scope(scopes::WRITE_EXECUTE));
        assert!(!via_inherited.scopes_pinned);

        let via_fixed = after.validate_bearer(fixed.secret.reveal()).await.unwrap();
        assert_eq!(via_fixed.scopes, scope_set([scopes::READ_STATUS]));
        assert!(via_fixed.scopes_pinned);
    }

    #[tokio::test]
    async fn requested_key_scopes_must_already_be_held() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;

        let result = service
            .issue_api_key(
                &carol,
                ApiKeyRequest {
                    scopes: Some(scope_set([scopes::ADMIN_APIKEYS])),
                    ..ApiKeyRequest::default()
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(AuthError::ScopeNotPermitted { ref scope }) if scope == scopes::ADMIN_APIKEYS
        ));
    }

    #[tokio::test]
    async fn fixed_key_reissue_snapshots_instead_of_inheriting() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;

        let fixed = service
            .issue_api_key(
                &carol,
                ApiKeyRequest {
                    scopes: Some(scope_set([scopes::READ_STATUS])),
                    ..ApiKeyRequest::default()
                },
            )
            .await
            .unwrap();
        let pinned = service
            .validate_bearer(fixed.secret.reveal())
            .await
            .unwrap();

        // An inherited request from a fixed key freezes the key's scopes.
        let reissued = service
            .issue_api_key(&pinned, ApiKeyRequest::default())
            .await
            .unwrap();
        assert_eq!(
            reissued.record.scopes,
            ApiKeyScopes::Fixed(scope_set([scopes::READ_STATUS]))
        );

        // And scopes beyond the snapshot stay out of reach.
        let escalation = service
            .issue_api_key(
                &pinned,
                ApiKeyRequest {
                    scopes: Some(scope_set([scopes::READ_QUEUE])),
                    ..ApiKeyRequest::default()
                },
            )
            .await;
        assert!(matches!(
            escalation,
            Err(AuthError::ScopeNotPermitted { .. })
        ));
    }

    #[tokio::test]
    async fn bad_and_expired_api_keys_are_rejected() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;

        let issued = service
            .issue_api_key(&carol, ApiKeyRequest::default())
            .await
            .unwrap();
        let mut tampered = issued.secret.reveal().to_owned();
        let replacement = if tampered.ends_with('0') { "1" } else { "0" };
        tampered.replace_range(tampered.len() - 1.., replacement);
        assert!(matches!(
            service.validate_bearer(&tampered).await,
            Err(AuthError::InvalidCredential)
        ));

        let short_lived = service
            .issue_api_key(
                &carol,
                ApiKeyRequest {
                    expires_in: Some(Duration::ZERO),
                    ..ApiKeyRequest::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            service.validate_bearer(short_lived.secret.reveal()).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn key_revocation_respects_ownership() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let dave = login(&service, "dave", "dave_password").await;
        let bob = login(&service, "bob", "bob_password").await;

        let issued = service
            .issue_api_key(&carol, ApiKeyRequest::default())
            .await
            .unwrap();
        let index = issued.record.index.clone();

        // Foreign keys look absent to non-admins.
        assert!(service.api_key_info(&dave, &index).await.unwrap().is_none());
        assert!(!service.revoke_api_key(&dave, &index).await.unwrap());

        // Admins see and revoke everything.
        assert!(service.api_key_info(&bob, &index).await.unwrap().is_some());
        assert!(service.revoke_api_key(&bob, &index).await.unwrap());
        assert!(matches!(
            service.validate_bearer(issued.secret.reveal()).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn cross_principal_issue_requires_admin_and_subset() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let bob = login(&service, "bob", "bob_password").await;

        // Carol holds no admin:apikeys.
        assert!(matches!(
            service
                .issue_api_key_for(&carol, &bob, scope_set([scopes::READ_STATUS]), None, None)
                .await,
            Err(AuthError::ScopeNotPermitted { .. })
        ));

        // Bob cannot grant carol a scope she does not hold.
        assert!(matches!(
            service
                .issue_api_key_for(&bob, &carol, scope_set([scopes::WRITE_EXECUTE]), None, None)
                .await,
            Err(AuthError::ScopeNotPermitted { .. })
        ));

        let issued = service
            .issue_api_key_for(
                &bob,
                &carol,
                scope_set([scopes::READ_STATUS]),
                None,
                Some("handout".to_owned()),
            )
            .await
            .unwrap();
        let acting = service
            .validate_bearer(issued.secret.reveal())
            .await
            .unwrap();
        assert_eq!(acting.id, carol.id);
        assert_eq!(acting.scopes, scope_set([scopes::READ_STATUS]));
    }

    #[tokio::test]
    async fn single_user_key_short_circuits_other_credentials() {
        let master_key = "a".repeat(72);
        let service = build_service(
            MemoryStore::shared(),
            policy_with(&["observer"]),
            &[SIGNING_SECRET],
            AccessConfig::default().with_single_user_api_key(master_key.clone()),
        );

        let principal = service.validate_bearer(&master_key).await.unwrap();
        assert_eq!(principal.username, SINGLE_USER_USERNAME);
        assert_eq!(principal.provider, ANONYMOUS_PROVIDER);
        assert!(principal.has_scope(scopes::WRITE_TESTING));

        // A near miss falls through to the ordinary key path and fails.
        let near_miss = format!("{}b", &master_key[..71]);
        assert!(matches!(
            service.validate_bearer(&near_miss).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn anonymous_mode_gates_the_public_principal() {
        let closed = service();
        assert!(matches!(
            closed.anonymous_principal().await,
            Err(AuthError::InvalidCredential)
        ));

        let open = build_service(
            MemoryStore::shared(),
            policy_with(&["observer"]),
            &[SIGNING_SECRET],
            AccessConfig::default().with_anonymous_access(true),
        );
        let principal = open.anonymous_principal().await.unwrap();
        assert_eq!(principal.username, PUBLIC_USERNAME);
        assert_eq!(principal.scopes, scope_set([scopes::READ_STATUS]));
    }

    #[tokio::test]
    async fn rotated_signing_keys_keep_old_tokens_alive() {
        let store: Arc<dyn AccessStore> = MemoryStore::shared();
        let old = build_service(
            store.clone(),
            policy_with(&["observer"]),
            &["old_secret"],
            AccessConfig::default(),
        );
        let carol = login(&old, "carol", "carol_password").await;
        let pair = old.issue_tokens(&carol).await.unwrap();

        let rotated = build_service(
            store.clone(),
            policy_with(&["observer"]),
            &["new_secret", "old_secret"],
            AccessConfig::default(),
        );
        assert!(rotated.validate_bearer(&pair.access_token).await.is_ok());
        assert!(rotated.refresh(&pair.refresh_token).await.is_ok());

        let retired = build_service(
            store,
            policy_with(&["observer"]),
            &["new_secret"],
            AccessConfig::default(),
        );
        assert!(matches!(
            retired.validate_bearer(&pair.access_token).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn principal_overviews_cover_sessions_and_keys() {
        let service = service();
        let carol = login(&service, "carol", "carol_password").await;
        let pair = service.issue_tokens(&carol).await.unwrap();
        let issued = service
            .issue_api_key(&carol, ApiKeyRequest::default())
            .await
            .unwrap();

        let overview = service
            .principal_overview(carol.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(overview.record.username, "carol");
        assert_eq!(overview.roles, vec!["observer".to_owned()]);
        assert_eq!(overview.sessions.len(), 1);
        assert_eq!(overview.sessions[0].id, pair.session_id);
        assert_eq!(overview.api_keys.len(), 1);
        assert_eq!(overview.api_keys[0].index, issued.record.index);

        let all = service.principal_overviews().await.unwrap();
        assert_eq!(all.len(), 1);

        assert!(service
            .principal_overview(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
