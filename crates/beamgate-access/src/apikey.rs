//! API keys with a cleartext lookup index and a salted digest at rest.
//!
//! A key secret is [`SECRET_LEN`] random bytes rendered as hex. The first
//! [`INDEX_LEN`] characters form the lookup index, stored in the clear so
//! a presented key can be found without scanning. The full secret never
//! touches storage; verification recomputes a salted SHA-256 digest and
//! compares it in constant time.

use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use beamgate_core::ScopeSet;

/// Length of the random key material in bytes.
pub const SECRET_LEN: usize = 36;
/// Length of the rendered secret in hex characters.
pub const SECRET_HEX_LEN: usize = SECRET_LEN * 2;
/// Length of the cleartext lookup index in hex characters.
pub const INDEX_LEN: usize = 8;
/// Length of the per-key digest salt in bytes.
pub const SALT_LEN: usize = 16;

/// Whether a bearer token has the shape of an API key secret.
///
/// Access tokens contain dots and are shorter, so the two shapes never
/// collide and no storage lookup is needed to route a credential.
#[must_use]
pub fn looks_like_key(token: &str) -> bool {
    token.len() == SECRET_HEX_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A freshly generated key secret, handed to the caller exactly once.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeySecret(String);

impl ApiKeySecret {
    /// Generates new random key material.
    #[must_use]
    pub fn generate() -> Self {
        use rand::RngCore;

        let mut bytes = [0u8; SECRET_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The cleartext lookup index, the first [`INDEX_LEN`] characters.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.0[..INDEX_LEN]
    }

    /// The full secret in hex.
    #[must_use]
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKeySecret").field(&"[REDACTED]").finish()
    }
}

/// Scope behavior of an API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyScopes {
    /// The key resolves its owner's effective scopes on every use.
    Inherited,
    /// The key carries this exact scope set for its whole lifetime.
    Fixed(ScopeSet),
}

impl ApiKeyScopes {
    /// Whether the key re-resolves scopes from policy on every use.
    #[must_use]
    pub fn is_inherited(&self) -> bool {
        matches!(self, Self::Inherited)
    }
}

/// Wire shape: the string `"inherited"` or a plain scope list.
#[derive(Deserialize)]
#[serde(untagged)]
enum ApiKeyScopesRepr {
    Keyword(String),
    Fixed(ScopeSet),
}

impl Serialize for ApiKeyScopes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            Self::Inherited => serializer.serialize_str("inherited"),
            Self::Fixed(scopes) => scopes.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ApiKeyScopes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match ApiKeyScopesRepr::deserialize(deserializer)? {
            ApiKeyScopesRepr::Keyword(word) if word == "inherited" => Ok(Self::Inherited),
            ApiKeyScopesRepr::Keyword(word) => Err(serde::de::Error::custom(format!(
                "unknown scope mode '{word}', expected \"inherited\" or a scope list"
            ))),
            ApiKeyScopesRepr::Fixed(scopes) => Ok(Self::Fixed(scopes)),
        }
    }
}

/// An API key at rest. The secret itself is never stored.
#[derive(Debug, Clone)]
pub struct ApiKeyRecord {
    /// Cleartext lookup index.
    pub index: String,
    /// Per-key digest salt.
    pub salt: [u8; SALT_LEN],
    /// Salted SHA-256 digest of the full secret.
    pub digest: [u8; 32],
    /// Owning principal.
    pub principal_id: Uuid,
    /// Identity provider of the owner at issue time.
    pub provider: String,
    /// Username of the owner at issue time.
    pub username: String,
    /// Scope behavior.
    pub scopes: ApiKeyScopes,
    /// Free-form label set by the owner.
    pub note: Option<String>,
    /// Issue instant.
    pub created_at: Timestamp,
    /// Expiration instant, if any.
    pub expires_at: Option<Timestamp>,
}

impl ApiKeyRecord {
    /// Mints a new key for the given principal.
    ///
    /// Returns the record to store and the secret to hand out once.
    pub fn issue(
        principal_id: Uuid,
        provider: impl Into<String>,
        username: impl Into<String>,
        scopes: ApiKeyScopes,
        note: Option<String>,
        now: Timestamp,
        expires_at: Option<Timestamp>,
    ) -> (Self, ApiKeySecret) {
        use rand::RngCore;

        let secret = ApiKeySecret::generate();
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let digest = digest_of(&salt, secret.reveal());

        let record = Self {
            index: secret.index().to_owned(),
            salt,
            digest,
            principal_id,
            provider: provider.into(),
            username: username.into(),
            scopes,
            note,
            created_at: now,
            expires_at,
        };
        (record, secret)
    }

    /// Constant-time check of a presented secret against this record.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let digest = digest_of(&self.salt, presented);
        digest.ct_eq(&self.digest).into()
    }

    /// Whether the key has passed its expiration instant.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Salted digest of the rendered secret.
fn digest_of(salt: &[u8; SALT_LEN], secret_hex: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret_hex.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use beamgate_core::{scope_set, scopes};

    use super::*;

    #[test]
    fn generated_secret_has_expected_shape() {
        let secret = ApiKeySecret::generate();
        assert_eq!(secret.reveal().len(), SECRET_HEX_LEN);
        assert_eq!(secret.index(), &secret.reveal()[..INDEX_LEN]);
        assert!(looks_like_key(secret.reveal()));
        assert_eq!(format!("{secret:?}"), "ApiKeySecret(\"[REDACTED]\")");
    }

    #[test]
    fn issued_key_matches_only_its_own_secret() {
        let now = Timestamp::now();
        let (record, secret) = ApiKeyRecord::issue(
            Uuid::new_v4(),
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            None,
        );

        assert_eq!(record.index, secret.index());
        assert!(record.matches(secret.reveal()));
        assert!(!record.matches(ApiKeySecret::generate().reveal()));

        let mut tampered = secret.reveal().to_owned();
        let replacement = if tampered.ends_with('0') { "1" } else { "0" };
        tampered.replace_range(tampered.len() - 1.., replacement);
        assert!(!record.matches(&tampered));
    }

    #[test]
    fn issue_produces_distinct_secrets_and_salts() {
        let now = Timestamp::now();
        let (first, first_secret) = ApiKeyRecord::issue(
            Uuid::new_v4(),
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            None,
        );
        let (second, second_secret) = ApiKeyRecord::issue(
            Uuid::new_v4(),
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            None,
        );

        assert_ne!(first_secret.reveal(), second_secret.reveal());
        assert_ne!(first.salt, second.salt);
    }

    #[test]
    fn expiry_is_inclusive_at_the_deadline() {
        let now = Timestamp::now();
        let (record, _) = ApiKeyRecord::issue(
            Uuid::new_v4(),
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            Some(now),
        );
        assert!(record.is_expired(now));

        let (open_ended, _) = ApiKeyRecord::issue(
            Uuid::new_v4(),
            "toy",
            "bob",
            ApiKeyScopes::Inherited,
            None,
            now,
            None,
        );
        assert!(!open_ended.is_expired(now));
    }

    #[test]
    fn scope_mode_serde_round_trips() {
        let inherited = serde_json::to_value(ApiKeyScopes::Inherited).unwrap();
        assert_eq!(inherited, serde_json::json!("inherited"));

        let fixed = ApiKeyScopes::Fixed(scope_set([scopes::READ_STATUS]));
        let value = serde_json::to_value(&fixed).unwrap();
        assert_eq!(value, serde_json::json!(["read:status"]));

        let back: ApiKeyScopes = serde_json::from_value(value).unwrap();
        assert_eq!(back, fixed);
        let back: ApiKeyScopes = serde_json::from_value(inherited).unwrap();
        assert!(back.is_inherited());

        let bad = serde_json::from_value::<ApiKeyScopes>(serde_json::json!("frozen"));
        assert!(bad.is_err());
    }

    #[test]
    fn token_shapes_are_distinguished() {
        assert!(!looks_like_key("short"));
        assert!(!looks_like_key(&"g".repeat(SECRET_HEX_LEN)));
        assert!(!looks_like_key(
            "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiJ4In0.signature"
        ));
        assert!(looks_like_key(&"a".repeat(SECRET_HEX_LEN)));
    }
}
