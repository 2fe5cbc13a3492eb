//! Effective subject resolution.
//!
//! Authorization decisions are made against the *effective* subject: the
//! run-as user and its lookup realm when present, otherwise the authenticated
//! user and realm. The one exception is [`Identity::is_authenticated_as_api_key`],
//! which asks how the request itself was authenticated. A token minted from an
//! API key is authenticated as an API key even though the key, not the token,
//! is what owns resources.

use crate::identity::Identity;
use crate::metadata::AuthMetadata;
use crate::realm::RealmOrigin;
use crate::user::User;

/// What sort of owner an effective subject is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubjectKind {
    User,
    ApiKey,
    ServiceAccount,
}

impl SubjectKind {
    /// Classify by realm kind.
    pub fn of_realm(realm: &RealmOrigin) -> Self {
        if realm.is_api_key() {
            SubjectKind::ApiKey
        } else if realm.is_service_account() {
            SubjectKind::ServiceAccount
        } else {
            SubjectKind::User
        }
    }
}

/// The principal and realm authorization decisions are made against.
#[derive(Clone, Copy, Debug)]
pub struct Subject<'a> {
    user: &'a User,
    realm: &'a RealmOrigin,
    kind: SubjectKind,
    metadata: &'a AuthMetadata,
}

impl<'a> Subject<'a> {
    pub fn user(&self) -> &'a User {
        self.user
    }

    pub fn realm(&self) -> &'a RealmOrigin {
        self.realm
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    /// The API key id, when this subject is an API key.
    pub fn api_key_id(&self) -> Option<&'a str> {
        match self.kind {
            SubjectKind::ApiKey => self.metadata.api_key().map(|key| key.id.as_str()),
            SubjectKind::User | SubjectKind::ServiceAccount => None,
        }
    }
}

impl Identity {
    /// The realm of the effective user: the lookup realm when running as
    /// another user, otherwise the authenticating realm.
    pub fn effective_realm(&self) -> &RealmOrigin {
        self.looked_up_by.as_ref().unwrap_or(&self.authenticated_by)
    }

    pub fn effective_subject(&self) -> Subject<'_> {
        let realm = self.effective_realm();
        Subject {
            user: &self.user,
            realm,
            kind: SubjectKind::of_realm(realm),
            metadata: &self.metadata,
        }
    }

    /// Whether the request itself was authenticated with an API key, including
    /// tokens created from one.
    pub fn is_authenticated_as_api_key(&self) -> bool {
        self.authenticated_by.is_api_key()
    }

    /// Whether the effective subject is an API key.
    pub fn is_api_key(&self) -> bool {
        self.effective_realm().is_api_key()
    }

    pub fn is_authenticated_with_service_account(&self) -> bool {
        self.authenticated_by.is_service_account()
    }

    /// Whether the effective subject is a service account. Service accounts
    /// cannot run as anyone, so this implies no lookup realm.
    pub fn is_service_account(&self) -> bool {
        self.effective_realm().is_service_account()
    }
}

// ============================================================================
// Tests
// ============================================================================
