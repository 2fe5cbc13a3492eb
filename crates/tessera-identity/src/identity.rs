//! The authenticated identity aggregate.
//!
//! An [`Identity`] is built once per request by whatever authenticated it, or
//! rebuilt by the codec when an identity arrives from another node. It never
//! changes afterwards; "updating" one (e.g. to run as another user) produces a
//! new value.
//!
//! Construction goes through [`IdentityBuilder::build`], which enforces the
//! invariants the rest of the crate relies on:
//!
//! - authenticated by the API key realm ⇒ that realm has its reserved name,
//!   and API key details are present
//! - effectively an API key, or `kind == ApiKey` ⇒ API key details are present
//! - effectively a service account ⇒ the realm has its reserved name, and
//!   token details are present
//! - authenticated with a service account ⇒ no run-as

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::metadata::{self, ApiKeyInfo, AuthMetadata, MetadataValue, ServiceTokenInfo};
use crate::realm::{API_KEY_REALM_NAME, RealmOrigin, SERVICE_ACCOUNT_REALM_NAME};
use crate::user::User;
use crate::version::Version;

/// How the request carrying an identity was authenticated.
///
/// Declaration order is the wire ordinal and must never change.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum IdentityKind {
    /// Ordinary realm login.
    #[default]
    Realm,
    ApiKey,
    /// Bearer token minted from an earlier authentication.
    Token,
    Anonymous,
    /// An internal user acting for the system.
    Internal,
}

impl IdentityKind {
    /// All kinds, in ordinal order.
    pub const ALL: [IdentityKind; 5] = [
        IdentityKind::Realm,
        IdentityKind::ApiKey,
        IdentityKind::Token,
        IdentityKind::Anonymous,
        IdentityKind::Internal,
    ];

    /// Wire ordinal.
    pub fn ordinal(&self) -> u32 {
        *self as u32
    }

    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        Self::ALL.get(ordinal as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityKind::Realm => "REALM",
            IdentityKind::ApiKey => "API_KEY",
            IdentityKind::Token => "TOKEN",
            IdentityKind::Anonymous => "ANONYMOUS",
            IdentityKind::Internal => "INTERNAL",
        }
    }

    /// Lower-case name used in structured responses.
    pub fn as_lowercase(&self) -> &'static str {
        match self {
            IdentityKind::Realm => "realm",
            IdentityKind::ApiKey => "api_key",
            IdentityKind::Token => "token",
            IdentityKind::Anonymous => "anonymous",
            IdentityKind::Internal => "internal",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction-time invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("api key realm has unexpected name '{0}'")]
    ApiKeyRealmName(String),

    #[error("api key authentication requires an api key id")]
    MissingApiKeyId,

    #[error("service account realm has unexpected name '{0}'")]
    ServiceAccountRealmName(String),

    #[error("service account authentication requires a token name and source")]
    MissingServiceToken,

    #[error("service account cannot run as '{0}'")]
    ServiceAccountRunAs(String),

    #[error("metadata key '{0}' is reserved")]
    ReservedMetadataKey(String),
}

/// An authenticated identity, as propagated between nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub(crate) user: User,
    pub(crate) authenticated_by: RealmOrigin,
    pub(crate) looked_up_by: Option<RealmOrigin>,
    pub(crate) version: Version,
    pub(crate) kind: IdentityKind,
    pub(crate) metadata: AuthMetadata,
}

impl Identity {
    /// Start building an identity with the two required fields.
    pub fn builder(user: User, authenticated_by: RealmOrigin) -> IdentityBuilder {
        IdentityBuilder::new(user, authenticated_by)
    }

    /// The effective user: the run-as user when present.
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn authenticated_by(&self) -> &RealmOrigin {
        &self.authenticated_by
    }

    pub fn looked_up_by(&self) -> Option<&RealmOrigin> {
        self.looked_up_by.as_ref()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    pub fn metadata(&self) -> &AuthMetadata {
        &self.metadata
    }

    /// A new identity acting as `user`, looked up in `lookup_realm`.
    ///
    /// Everything else (authenticating realm, kind, metadata, version) carries
    /// over unchanged.
    pub fn run_as(&self, user: User, lookup_realm: RealmOrigin) -> Result<Identity, IdentityError> {
        Identity {
            user,
            looked_up_by: Some(lookup_realm),
            ..self.clone()
        }
        .validated()
    }

    pub(crate) fn validated(self) -> Result<Self, IdentityError> {
        let effective = self.looked_up_by.as_ref().unwrap_or(&self.authenticated_by);

        if self.authenticated_by.is_api_key() && self.authenticated_by.name() != API_KEY_REALM_NAME
        {
            return Err(IdentityError::ApiKeyRealmName(self.authenticated_by.name().into()));
        }
        let needs_api_key = self.authenticated_by.is_api_key()
            || effective.is_api_key()
            || self.kind == IdentityKind::ApiKey;
        if needs_api_key && self.metadata.api_key.is_none() {
            return Err(IdentityError::MissingApiKeyId);
        }

        if let (true, Some(lookup)) =
            (self.authenticated_by.is_service_account(), &self.looked_up_by)
        {
            return Err(IdentityError::ServiceAccountRunAs(lookup.to_string()));
        }
        if effective.is_service_account() {
            if effective.name() != SERVICE_ACCOUNT_REALM_NAME {
                return Err(IdentityError::ServiceAccountRealmName(effective.name().into()));
            }
            if self.metadata.service_token.is_none() {
                return Err(IdentityError::MissingServiceToken);
            }
        }

        Ok(self)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Authentication[{},type={},by={}", self.user, self.kind, self.authenticated_by)?;
        if let Some(lookup) = &self.looked_up_by {
            write!(f, ",lookup={lookup}")?;
        }
        f.write_str("]")
    }
}

/// Builder for [`Identity`]. `build()` enforces the identity invariants.
///
/// ```
/// use tessera_identity::{Identity, IdentityKind, RealmOrigin, User, ApiKeyInfo};
///
/// let identity = Identity::builder(User::new("svc", ["monitor"]), RealmOrigin::api_key("n1"))
///     .kind(IdentityKind::ApiKey)
///     .api_key(ApiKeyInfo::new("K1").with_name("ci"))
///     .build()
///     .unwrap();
/// assert!(identity.is_api_key());
/// ```
#[derive(Debug)]
pub struct IdentityBuilder {
    identity: Identity,
}

impl IdentityBuilder {
    pub fn new(user: User, authenticated_by: RealmOrigin) -> Self {
        Self {
            identity: Identity {
                user,
                authenticated_by,
                looked_up_by: None,
                version: Version::CURRENT,
                kind: IdentityKind::Realm,
                metadata: AuthMetadata::default(),
            },
        }
    }

    pub fn looked_up_by(mut self, realm: RealmOrigin) -> Self {
        self.identity.looked_up_by = Some(realm);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.identity.version = version;
        self
    }

    pub fn kind(mut self, kind: IdentityKind) -> Self {
        self.identity.kind = kind;
        self
    }

    pub fn api_key(mut self, api_key: ApiKeyInfo) -> Self {
        self.identity.metadata.api_key = Some(api_key);
        self
    }

    pub fn service_token(mut self, token: ServiceTokenInfo) -> Self {
        self.identity.metadata.service_token = Some(token);
        self
    }

    /// Add an untyped metadata entry. Keys with a typed home are rejected at
    /// `build()`.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.identity.metadata.extra.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<Identity, IdentityError> {
        if let Some(key) = reserved_key(&self.identity.metadata.extra) {
            return Err(IdentityError::ReservedMetadataKey(key.to_string()));
        }
        self.identity.validated()
    }
}

fn reserved_key(extra: &BTreeMap<String, MetadataValue>) -> Option<&str> {
    extra.keys().map(String::as_str).find(|k| metadata::is_reserved_key(k))
}

// ============================================================================
// Tests
// ============================================================================
