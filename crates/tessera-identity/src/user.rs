//! Users — the principals an identity can represent.
//!
//! A `User` is any entity that can own resources: a human, a service account,
//! or the owner of an API key. A handful of [`InternalUser`]s act on behalf of
//! the system itself; they travel on the wire by name only.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::metadata::MetadataValue;

/// A principal as established by a realm.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique name within its realm: "alice", "elastic/fleet-server".
    pub username: String,
    /// Role names, in the order the realm assigned them.
    pub roles: Vec<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// Arbitrary realm-supplied metadata.
    pub metadata: BTreeMap<String, MetadataValue>,
    pub enabled: bool,
}

impl User {
    /// Create an enabled user with the given roles and nothing else.
    pub fn new<R, S>(username: impl Into<String>, roles: R) -> Self
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            username: username.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            full_name: None,
            email: None,
            metadata: BTreeMap::new(),
            enabled: true,
        }
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// The internal user this value is, if it is exactly one.
    pub fn as_internal(&self) -> Option<InternalUser> {
        InternalUser::from_username(&self.username).filter(|internal| internal.user() == *self)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.full_name {
            Some(full_name) => write!(f, "{} ({})", self.username, full_name),
            None => write!(f, "{}", self.username),
        }
    }
}

/// Well-known system principals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter)]
pub enum InternalUser {
    System,
    XPack,
    XPackSecurity,
    AsyncSearch,
    SecurityProfile,
}

impl InternalUser {
    pub fn username(&self) -> &'static str {
        match self {
            InternalUser::System => "_system",
            InternalUser::XPack => "_xpack",
            InternalUser::XPackSecurity => "_xpack_security",
            InternalUser::AsyncSearch => "_async_search",
            InternalUser::SecurityProfile => "_security_profile",
        }
    }

    pub fn from_username(username: &str) -> Option<Self> {
        Self::iter().find(|internal| internal.username() == username)
    }

    /// The canonical user value for this internal principal.
    pub fn user(&self) -> User {
        User::new(self.username(), std::iter::empty::<String>())
    }
}

impl fmt::Display for InternalUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.username())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_construction() {
        let u = User::new("alice", ["admin", "reader"])
            .with_full_name("Alice Liddell")
            .with_email("alice@example.com")
            .with_metadata("department", "ops");
        assert_eq!(u.username, "alice");
        assert_eq!(u.roles, vec!["admin", "reader"]);
        assert_eq!(u.full_name.as_deref(), Some("Alice Liddell"));
        assert_eq!(u.email.as_deref(), Some("alice@example.com"));
        assert_eq!(u.metadata["department"], MetadataValue::from("ops"));
        assert!(u.enabled);
        assert!(!u.clone().disabled().enabled);
    }

    #[test]
    fn test_user_display() {
        assert_eq!(User::new("alice", ["r"]).to_string(), "alice");
        assert_eq!(
            User::new("alice", ["r"]).with_full_name("Alice Liddell").to_string(),
            "alice (Alice Liddell)"
        );
    }

    #[test]
    fn test_internal_user_lookup() {
        for internal in InternalUser::iter() {
            assert_eq!(InternalUser::from_username(internal.username()), Some(internal));
            assert_eq!(internal.user().as_internal(), Some(internal));
        }
        assert_eq!(InternalUser::from_username("alice"), None);
    }

    #[test]
    fn test_impostor_is_not_internal() {
        // Same name as an internal user but carrying roles.
        let impostor = User::new("_system", ["superuser"]);
        assert_eq!(impostor.as_internal(), None);
    }

    #[test]
    fn test_user_postcard_roundtrip() {
        let u = User::new("alice", ["admin"]).with_metadata("level", 3i64);
        let bytes = postcard::to_stdvec(&u).unwrap();
        let parsed: User = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(u, parsed);
    }
}
