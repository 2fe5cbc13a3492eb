//! Resource ownership equivalence.
//!
//! Decides whether the subject of one identity may access resources (saved
//! objects, API keys, stored queries) owned by the subject of another:
//!
//! 1. Two API keys are equivalent only when they are the same key (same id).
//! 2. An API key and anything that isn't an API key are never equivalent. This
//!    holds even when the key belongs to the user on the other side.
//! 3. Otherwise the usernames must match, and so must the realms:
//!    - singleton realm kinds (file, native) match on kind alone, since
//!      operators can rename them but never run two of them
//!    - every other realm matches on kind and name
//!
//! Tokens minted from a user session resolve to that user's realm and name,
//! so they fall under rule 3 without special handling. Node names never
//! matter.
//!
//! This is a best-effort check. It can't see changes made outside the
//! identities themselves, such as a realm being reconfigured.

use tracing::{debug, error};

use crate::identity::Identity;
use crate::subject::{Subject, SubjectKind};

impl Identity {
    /// Whether this identity may access resources owned by `other`.
    pub fn can_access_resources_of(&self, other: &Identity) -> bool {
        let mine = self.effective_subject();
        let theirs = other.effective_subject();

        let allowed = match (mine.kind(), theirs.kind()) {
            (SubjectKind::ApiKey, SubjectKind::ApiKey) => same_api_key(&mine, &theirs),
            (SubjectKind::ApiKey, SubjectKind::User | SubjectKind::ServiceAccount)
            | (SubjectKind::User | SubjectKind::ServiceAccount, SubjectKind::ApiKey) => false,
            (
                SubjectKind::User | SubjectKind::ServiceAccount,
                SubjectKind::User | SubjectKind::ServiceAccount,
            ) => same_owner(&mine, &theirs),
        };

        debug!(
            mine = %mine.user().username,
            mine_realm = %mine.realm(),
            theirs = %theirs.user().username,
            theirs_realm = %theirs.realm(),
            allowed,
            "resource ownership check"
        );
        allowed
    }
}

fn same_api_key(mine: &Subject<'_>, theirs: &Subject<'_>) -> bool {
    let (Some(my_id), Some(their_id)) = (mine.api_key_id(), theirs.api_key_id()) else {
        // Identity construction guarantees an id for API key subjects.
        return false;
    };
    let same_id = my_id == their_id;
    let consistent = !same_id || mine.user().username == theirs.user().username;
    if !consistent {
        error!(
            api_key_id = my_id,
            mine = %mine.user().username,
            theirs = %theirs.user().username,
            "api key id attributed to two different usernames"
        );
    }
    debug_assert!(consistent, "api key id {my_id} attributed to two different usernames");
    same_id
}

fn same_owner(mine: &Subject<'_>, theirs: &Subject<'_>) -> bool {
    if mine.user().username != theirs.user().username {
        return false;
    }
    let (my_realm, their_realm) = (mine.realm(), theirs.realm());
    if my_realm.is_singleton_kind() {
        my_realm.kind() == their_realm.kind()
    } else {
        my_realm.kind() == their_realm.kind() && my_realm.name() == their_realm.name()
    }
}

// ============================================================================
// Tests
// ============================================================================
