//! Versioned binary codec and text token.
//!
//! Binary layout (postcard varint encoding, no framing beyond what each field
//! needs):
//!
//! ```text
//! principal        tag 0 + user fields | tag 1 + internal user name
//! authenticated_by name, kind, node_name   (length-prefixed strings)
//! looked_up_by     0 | 1 + name, kind, node_name
//! kind             varint ordinal into IdentityKind::ALL
//! metadata         varint count + (string key, tagged MetadataValue)*
//! ```
//!
//! The layout of individual metadata entries depends on the identity's
//! protocol version (see [`VERSION_API_KEY_ROLES_AS_BYTES`]), never on the
//! call site. The binary form does not carry the version; callers pass the
//! version it was written under. The text token does carry it: a varint
//! version id followed by the binary form, base64-encoded.
//!
//! [`VERSION_API_KEY_ROLES_AS_BYTES`]: crate::version::VERSION_API_KEY_ROLES_AS_BYTES

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::identity::{Identity, IdentityKind};
use crate::metadata::{AuthMetadata, MAX_METADATA_DEPTH, MetadataValue};
use crate::realm::RealmOrigin;
use crate::user::{InternalUser, User};
use crate::version::{VERSION_API_KEY_ROLES_AS_BYTES, Version};

/// Errors encoding or decoding an identity.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is malformed or describes an invalid identity. The request
    /// carrying it must be rejected.
    #[error("corrupt identity payload: {0}")]
    CorruptPayload(String),

    #[error("unsupported identity version {version} (supported: {minimum} to {current})")]
    UnsupportedVersion {
        version: Version,
        minimum: Version,
        current: Version,
    },

    #[error("identity token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to encode identity: {0}")]
    Encode(String),
}

impl CodecError {
    fn corrupt(reason: impl std::fmt::Display) -> Self {
        CodecError::CorruptPayload(reason.to_string())
    }
}

/// Principal encoding: internal users travel by name only.
#[derive(Serialize, Deserialize)]
enum WirePrincipal<U> {
    Ordinary(U),
    Internal(String),
}

#[derive(Serialize, Deserialize)]
struct WireIdentity<U, R> {
    principal: WirePrincipal<U>,
    authenticated_by: R,
    looked_up_by: Option<R>,
    kind: IdentityKind,
    metadata: BTreeMap<String, MetadataValue>,
}

impl Identity {
    /// Encode to the binary form, laid out for `self.version()`.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let principal = match self.user.as_internal() {
            Some(internal) => WirePrincipal::Internal(internal.username().to_string()),
            None => WirePrincipal::Ordinary(&self.user),
        };
        let metadata = self
            .metadata
            .to_wire(self.version)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        // Whatever we write must decode under the same depth limit.
        if let Some(key) = metadata
            .iter()
            .chain(&self.user.metadata)
            .find_map(|(key, value)| (value.depth() > MAX_METADATA_DEPTH).then_some(key))
        {
            return Err(CodecError::Encode(format!(
                "metadata '{key}' nested deeper than {MAX_METADATA_DEPTH} levels"
            )));
        }
        trace!(
            version = %self.version,
            roles_as_bytes = self.version >= VERSION_API_KEY_ROLES_AS_BYTES,
            "encoding identity"
        );

        let wire = WireIdentity {
            principal,
            authenticated_by: &self.authenticated_by,
            looked_up_by: self.looked_up_by.as_ref(),
            kind: self.kind,
            metadata,
        };
        postcard::to_stdvec(&wire).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode the binary form written under `version`.
    ///
    /// The whole slice must be consumed. Kind ordinals unknown to this build
    /// are rejected rather than mapped to a guess.
    pub fn decode(bytes: &[u8], version: Version) -> Result<Identity, CodecError> {
        decode_inner(bytes, version)
            .inspect_err(|e| warn!(error = %e, %version, "rejecting identity payload"))
    }

    /// Encode as a base64 token: version id, then the binary form.
    pub fn encode_token(&self) -> Result<String, CodecError> {
        let mut out = postcard::to_stdvec(&self.version.id())
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        out.extend(self.encode()?);
        Ok(STANDARD.encode(out))
    }

    /// Inverse of [`encode_token`](Self::encode_token).
    pub fn decode_token(token: &str) -> Result<Identity, CodecError> {
        let bytes = STANDARD.decode(token.trim())?;
        let (id, rest): (u32, &[u8]) =
            postcard::take_from_bytes(&bytes).map_err(CodecError::corrupt)?;
        let version = Version::from_id(id)
            .ok_or_else(|| CodecError::corrupt(format!("invalid version id {id}")))?;
        Identity::decode(rest, version)
    }
}

fn decode_inner(bytes: &[u8], version: Version) -> Result<Identity, CodecError> {
    if !version.is_compatible() {
        return Err(CodecError::UnsupportedVersion {
            version,
            minimum: Version::MINIMUM_COMPATIBLE,
            current: Version::CURRENT,
        });
    }

    let (wire, rest): (WireIdentity<User, RealmOrigin>, &[u8]) =
        postcard::take_from_bytes(bytes).map_err(CodecError::corrupt)?;
    if !rest.is_empty() {
        return Err(CodecError::corrupt(format!("{} trailing bytes", rest.len())));
    }

    let user = match wire.principal {
        WirePrincipal::Ordinary(user) => user,
        WirePrincipal::Internal(name) => InternalUser::from_username(&name)
            .ok_or_else(|| CodecError::corrupt(format!("unknown internal user '{name}'")))?
            .user(),
    };
    let metadata = AuthMetadata::from_wire(wire.metadata).map_err(CodecError::corrupt)?;

    Identity {
        user,
        authenticated_by: wire.authenticated_by,
        looked_up_by: wire.looked_up_by,
        version,
        kind: wire.kind,
        metadata,
    }
    .validated()
    .map_err(CodecError::corrupt)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ApiKeyInfo;

    fn tiny() -> Identity {
        Identity::builder(User::new("a", Vec::<String>::new()), RealmOrigin::new("r", "k", "n"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_binary_layout() {
        let bytes = tiny().encode().unwrap();
        #[rustfmt::skip]
        let expected = vec![
            0x00,                   // ordinary principal
            0x01, b'a',             // username
            0x00,                   // roles: empty
            0x00, 0x00,             // full_name, email: none
            0x00,                   // user metadata: empty
            0x01,                   // enabled
            0x01, b'r',             // realm name
            0x01, b'k',             // realm kind
            0x01, b'n',             // node name
            0x00,                   // no lookup realm
            0x00,                   // kind: REALM
            0x00,                   // metadata: empty
        ];
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_internal_user_encoded_by_name() {
        let id = Identity::builder(InternalUser::XPack.user(), RealmOrigin::new("__attach", "__attach", "n1"))
            .kind(IdentityKind::Internal)
            .build()
            .unwrap();
        let bytes = id.encode().unwrap();
        assert_eq!(&bytes[..8], &[0x01, 0x06, b'_', b'x', b'p', b'a', b'c', b'k']);
        assert_eq!(Identity::decode(&bytes, Version::CURRENT).unwrap(), id);
    }

    #[test]
    fn test_unknown_internal_user_rejected() {
        let mut bytes = tiny().encode().unwrap();
        // Flip the principal tag: "a" now reads as an internal user name.
        bytes[0] = 0x01;
        bytes.drain(3..8);
        assert!(matches!(
            Identity::decode(&bytes, Version::CURRENT),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_unknown_kind_ordinal_rejected() {
        let mut bytes = tiny().encode().unwrap();
        let kind_at = bytes.len() - 2;
        assert_eq!(bytes[kind_at], 0x00);
        bytes[kind_at] = IdentityKind::ALL.len() as u8;
        let err = Identity::decode(&bytes, Version::CURRENT).unwrap_err();
        assert!(matches!(err, CodecError::CorruptPayload(_)), "{err}");
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = tiny().encode().unwrap();
        bytes.push(0x00);
        assert!(matches!(
            Identity::decode(&bytes, Version::CURRENT),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let bytes = tiny().encode().unwrap();
        assert!(matches!(
            Identity::decode(&bytes[..bytes.len() - 3], Version::CURRENT),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_unsupported_versions() {
        let bytes = tiny().encode().unwrap();
        for version in [Version::new(6, 8, 0), Version::new(9, 0, 0)] {
            assert!(matches!(
                Identity::decode(&bytes, version),
                Err(CodecError::UnsupportedVersion { .. })
            ));
        }
    }

    #[test]
    fn test_decoded_invariants_checked() {
        // An API key identity whose metadata lost its key id.
        let id = Identity::builder(User::new("svc", ["r"]), RealmOrigin::api_key("n1"))
            .kind(IdentityKind::ApiKey)
            .api_key(ApiKeyInfo::new("K1"))
            .build()
            .unwrap();
        let stripped = Identity {
            metadata: AuthMetadata::default(),
            ..id
        };
        let bytes = stripped.encode().unwrap();
        assert!(matches!(
            Identity::decode(&bytes, Version::CURRENT),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    fn nested(levels: usize) -> MetadataValue {
        (0..levels).fold(MetadataValue::Null, |inner, _| MetadataValue::List(vec![inner]))
    }

    #[test]
    fn test_deeply_nested_metadata_rejected() {
        let mut bytes = tiny().encode().unwrap();
        // Replace the empty identity metadata with {"x": [[[...null...]]]}.
        assert_eq!(bytes.pop(), Some(0x00));
        bytes.extend([0x01, 0x01, b'x']);
        for _ in 0..5_000 {
            bytes.extend([0x06, 0x01]);
        }
        bytes.push(0x00);
        assert!(matches!(
            Identity::decode(&bytes, Version::CURRENT),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_deeply_nested_user_metadata_rejected() {
        let mut bytes = tiny().encode().unwrap();
        // User metadata count sits after the principal tag, username, roles,
        // full_name and email.
        assert_eq!(bytes[6], 0x00);
        let mut payload = vec![0x01, 0x01, b'x'];
        for _ in 0..5_000 {
            payload.extend([0x07, 0x01, 0x01, b'y']);
        }
        payload.push(0x00);
        bytes.splice(6..7, payload);
        assert!(matches!(
            Identity::decode(&bytes, Version::CURRENT),
            Err(CodecError::CorruptPayload(_))
        ));
    }

    #[test]
    fn test_metadata_depth_limit_holds_both_ways() {
        let deepest = Identity::builder(
            User::new("a", Vec::<String>::new()).with_metadata("x", nested(MAX_METADATA_DEPTH)),
            RealmOrigin::new("r", "k", "n"),
        )
        .build()
        .unwrap();
        let bytes = deepest.encode().unwrap();
        assert_eq!(Identity::decode(&bytes, Version::CURRENT).unwrap(), deepest);

        let too_deep = Identity::builder(User::new("a", Vec::<String>::new()), RealmOrigin::new("r", "k", "n"))
            .metadata("x", nested(MAX_METADATA_DEPTH + 1))
            .build()
            .unwrap();
        assert!(matches!(too_deep.encode(), Err(CodecError::Encode(_))));
    }

    #[test]
    fn test_token_carries_version() {
        let id = Identity {
            version: Version::new(7, 17, 0),
            ..tiny()
        };
        let token = id.encode_token().unwrap();
        let decoded = Identity::decode_token(&token).unwrap();
        assert_eq!(decoded.version(), Version::new(7, 17, 0));
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_token_rejects_bad_base64() {
        assert!(matches!(
            Identity::decode_token("not base64!"),
            Err(CodecError::Base64(_))
        ));
    }

    #[test]
    fn test_token_rejects_bogus_version_id() {
        let mut raw = postcard::to_stdvec(&1234u32).unwrap();
        raw.extend(tiny().encode().unwrap());
        let token = STANDARD.encode(raw);
        assert!(matches!(
            Identity::decode_token(&token),
            Err(CodecError::CorruptPayload(_))
        ));
    }
}
