//! Structured projection of an identity for status and introspection APIs.
//!
//! Field names are an external contract:
//!
//! ```json
//! {
//!   "username": "alice",
//!   "roles": ["admin"],
//!   "full_name": null,
//!   "email": null,
//!   "token": {"name": "t1", "type": "_service_account_index"},
//!   "metadata": {},
//!   "enabled": true,
//!   "authentication_realm": {"name": "ldap1", "type": "ldap"},
//!   "lookup_realm": {"name": "ldap1", "type": "ldap"},
//!   "authentication_type": "realm",
//!   "api_key": {"id": "K1", "name": "ci"}
//! }
//! ```
//!
//! `token` appears only for service accounts and `api_key` only for API keys.
//! Identity construction guarantees the metadata both need, so neither is
//! ever partially rendered.

use serde::Serialize;

use crate::identity::Identity;
use crate::metadata;
use crate::realm::{RealmOrigin, SERVICE_ACCOUNT_REALM_KIND};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityDocument<'a> {
    pub username: &'a str,
    pub roles: &'a [String],
    pub full_name: Option<&'a str>,
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenDocument<'a>>,
    pub metadata: serde_json::Value,
    pub enabled: bool,
    pub authentication_realm: RealmDocument<'a>,
    pub lookup_realm: RealmDocument<'a>,
    pub authentication_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKeyDocument<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealmDocument<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
}

impl<'a> From<&'a RealmOrigin> for RealmDocument<'a> {
    fn from(realm: &'a RealmOrigin) -> Self {
        Self {
            name: realm.name(),
            kind: realm.kind(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDocument<'a> {
    pub name: &'a str,
    /// `"<service account realm kind>_<token source>"`.
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiKeyDocument<'a> {
    pub id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
}

impl Identity {
    /// Render as a structured document. Pure; borrows from `self`.
    pub fn to_document(&self) -> IdentityDocument<'_> {
        let token = self
            .metadata
            .service_token()
            .filter(|_| self.is_service_account())
            .map(|token| TokenDocument {
                name: &token.name,
                kind: format!("{SERVICE_ACCOUNT_REALM_KIND}_{}", token.source),
            });
        let api_key = self
            .metadata
            .api_key()
            .filter(|_| self.is_api_key())
            .map(|key| ApiKeyDocument {
                id: &key.id,
                name: key.name.as_deref(),
            });

        IdentityDocument {
            username: &self.user.username,
            roles: &self.user.roles,
            full_name: self.user.full_name.as_deref(),
            email: self.user.email.as_deref(),
            token,
            metadata: metadata::map_to_json(&self.user.metadata),
            enabled: self.user.enabled,
            authentication_realm: (&self.authenticated_by).into(),
            lookup_realm: self.effective_realm().into(),
            authentication_type: self.kind.as_lowercase(),
            api_key,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
