//! Realm origins — where a principal was established.
//!
//! A `RealmOrigin` names the realm that vouched for a principal (by configured
//! name and realm kind) and the node that performed the lookup. It is a plain
//! value: equality and hashing cover all three fields.
//!
//! The well-known realm names and kinds below are shared by the resolver,
//! the access checker, and the identity invariants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the built-in API key realm. There is exactly one.
pub const API_KEY_REALM_NAME: &str = "_es_api_key";
/// Kind of the built-in API key realm.
pub const API_KEY_REALM_KIND: &str = "_es_api_key";

/// Name of the built-in service account realm. There is exactly one.
pub const SERVICE_ACCOUNT_REALM_NAME: &str = "_service_account";
/// Kind of the built-in service account realm.
pub const SERVICE_ACCOUNT_REALM_KIND: &str = "_service_account";

/// File-backed user directory.
pub const FILE_REALM_KIND: &str = "file";
/// Built-in internal user directory.
pub const NATIVE_REALM_KIND: &str = "native";

/// Realm kinds that can be configured at most once per deployment.
///
/// Operators may rename these realms, so the kind alone identifies them.
pub const SINGLETON_REALM_KINDS: [&str; 2] = [FILE_REALM_KIND, NATIVE_REALM_KIND];

/// Where a principal was authenticated or looked up.
///
/// Field order is also the wire order: name, kind, node name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RealmOrigin {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    node_name: String,
}

impl RealmOrigin {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            node_name: node_name.into(),
        }
    }

    /// The singleton API key realm as seen from `node_name`.
    pub fn api_key(node_name: impl Into<String>) -> Self {
        Self::new(API_KEY_REALM_NAME, API_KEY_REALM_KIND, node_name)
    }

    /// The singleton service account realm as seen from `node_name`.
    pub fn service_account(node_name: impl Into<String>) -> Self {
        Self::new(SERVICE_ACCOUNT_REALM_NAME, SERVICE_ACCOUNT_REALM_KIND, node_name)
    }

    /// Configured realm name (operators may rename it).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Realm kind, e.g. `"ldap"`, `"file"`, `"_es_api_key"`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Node that performed the authentication or lookup.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    pub fn is_api_key(&self) -> bool {
        self.kind == API_KEY_REALM_KIND
    }

    pub fn is_service_account(&self) -> bool {
        self.kind == SERVICE_ACCOUNT_REALM_KIND
    }

    /// Whether at most one realm of this kind can exist in a deployment.
    pub fn is_singleton_kind(&self) -> bool {
        SINGLETON_REALM_KINDS.contains(&self.kind.as_str())
    }
}

impl fmt::Display for RealmOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Realm[{}.{}] on Node[{}]}}", self.kind, self.name, self.node_name)
    }
}

// ============================================================================
// Tests
// ============================================================================
