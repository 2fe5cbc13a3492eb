//! Authenticated identity for Tessera.
//!
//! An [`Identity`] is the already-established answer to "who is making this
//! request": the user, the realm that authenticated it, the realm that looked
//! up a run-as user (if any), how the request was authenticated, and the
//! metadata that goes with it. This crate represents that value, moves it
//! between nodes, and compares two of them for resource ownership. It does
//! not authenticate anyone.
//!
//! # Relationships
//!
//! ```text
//! Identity
//!     └── user: User (effective user, run-as user when present)
//!     └── authenticated_by: RealmOrigin
//!     └── looked_up_by: Option<RealmOrigin> (run-as)
//!     └── kind: IdentityKind (REALM, API_KEY, TOKEN, ANONYMOUS, INTERNAL)
//!     └── metadata: AuthMetadata (api key, service token, extra)
//!
//! effective realm = looked_up_by ?? authenticated_by
//!     └── decides SubjectKind (User, ApiKey, ServiceAccount)
//!     └── drives can_access_resources_of
//! ```
//!
//! # Key Types
//!
//! |----------------------|-------------------------------------------------|
//! | Type                 | Purpose                                         |
//! |----------------------|-------------------------------------------------|
//! | [`Identity`]         | Immutable authenticated identity                |
//! | [`IdentityBuilder`]  | Construction with invariant checks              |
//! | [`RealmOrigin`]      | Realm name + kind + node                        |
//! | [`User`]             | The principal                                   |
//! | [`Subject`]          | Effective user + realm for authorization        |
//! | [`Version`]          | Protocol version governing the wire layout      |
//! | [`IdentityDocument`] | Structured projection for responses             |
//! | [`RequestContext`]   | Write-once per-request carrier                  |
//! |----------------------|-------------------------------------------------|

pub mod access;
pub mod codec;
pub mod context;
pub mod document;
pub mod identity;
pub mod metadata;
pub mod realm;
pub mod subject;
pub mod user;
pub mod version;

// Re-export primary types at crate root for convenience.
pub use codec::CodecError;
pub use context::{AUTHENTICATION_HEADER, ContextError, RequestContext};
pub use document::{ApiKeyDocument, IdentityDocument, RealmDocument, TokenDocument};
pub use identity::{Identity, IdentityBuilder, IdentityError, IdentityKind};
pub use metadata::{ApiKeyInfo, AuthMetadata, MetadataValue, ServiceTokenInfo};
pub use realm::RealmOrigin;
pub use subject::{Subject, SubjectKind};
pub use user::{InternalUser, User};
pub use version::{VERSION_API_KEY_ROLES_AS_BYTES, Version, VersionParseError};
