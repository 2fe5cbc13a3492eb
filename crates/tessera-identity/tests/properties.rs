//! End-to-end properties of identities: codec round trips across versions,
//! effective realm resolution, and the resource ownership scenarios.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use tessera_identity::{
    ApiKeyInfo, Identity, IdentityKind, InternalUser, MetadataValue, RealmOrigin,
    ServiceTokenInfo, User, VERSION_API_KEY_ROLES_AS_BYTES, Version,
};

fn ldap(name: &str, node: &str) -> RealmOrigin {
    RealmOrigin::new(name, "ldap", node)
}

fn api_key(username: &str, key_id: &str, node: &str) -> Identity {
    Identity::builder(User::new(username, ["r"]), RealmOrigin::api_key(node))
        .kind(IdentityKind::ApiKey)
        .api_key(ApiKeyInfo::new(key_id))
        .build()
        .unwrap()
}

/// A spread of well-formed identities covering every kind and optional field.
fn fixtures(version: Version) -> Vec<Identity> {
    let mut nested = BTreeMap::new();
    nested.insert("team".to_string(), MetadataValue::from("sre"));
    let rich_user = User::new("alice", ["admin", "reader"])
        .with_full_name("Alice Liddell")
        .with_email("alice@example.com")
        .with_metadata("level", 3i64)
        .with_metadata("quota", u64::MAX)
        .with_metadata("ratio", MetadataValue::Double(0.5))
        .with_metadata("blob", MetadataValue::Bytes(vec![0, 1, 255]))
        .with_metadata("tags", MetadataValue::List(vec!["a".into(), MetadataValue::Null]))
        .with_metadata("org", MetadataValue::Map(nested));

    let roles = json!({"reader": {"indices": [{"names": ["logs-*"], "privileges": ["read"]}]}});
    let limited = json!({"owner": {"cluster": ["all"], "max_docs": u64::MAX, "min": i64::MIN}});

    vec![
        Identity::builder(rich_user, ldap("ldap1", "n1"))
            .version(version)
            .metadata("session", "s-42")
            .build()
            .unwrap(),
        Identity::builder(User::new("admin", ["superuser"]), ldap("ldap1", "n1"))
            .version(version)
            .looked_up_by(RealmOrigin::new("native1", "native", "n2"))
            .build()
            .unwrap(),
        Identity::builder(User::new("svc", ["r"]), RealmOrigin::api_key("n1"))
            .version(version)
            .kind(IdentityKind::ApiKey)
            .api_key(
                ApiKeyInfo::new("K1")
                    .with_name("ci")
                    .with_role_descriptors(roles)
                    .with_limited_by_role_descriptors(limited),
            )
            .build()
            .unwrap(),
        Identity::builder(User::new("svc", ["r"]), RealmOrigin::api_key("n2"))
            .version(version)
            .kind(IdentityKind::Token)
            .api_key(ApiKeyInfo::new("K1"))
            .build()
            .unwrap(),
        Identity::builder(
            User::new("elastic/fleet-server", Vec::<String>::new()),
            RealmOrigin::service_account("n1"),
        )
        .version(version)
        .kind(IdentityKind::Token)
        .service_token(ServiceTokenInfo::new("token1", "file"))
        .build()
        .unwrap(),
        Identity::builder(
            User::new("_anonymous", ["anonymous_role"]),
            RealmOrigin::new("__anonymous", "__anonymous", "n1"),
        )
        .version(version)
        .kind(IdentityKind::Anonymous)
        .build()
        .unwrap(),
        Identity::builder(
            InternalUser::System.user(),
            RealmOrigin::new("__attach", "__attach", "n1"),
        )
        .version(version)
        .kind(IdentityKind::Internal)
        .build()
        .unwrap(),
    ]
}

fn versions() -> [Version; 4] {
    [
        Version::MINIMUM_COMPATIBLE,
        Version::new(7, 8, 1),
        VERSION_API_KEY_ROLES_AS_BYTES,
        Version::CURRENT,
    ]
}

// ── Round trips ─────────────────────────────────────────────────────────────

#[test]
fn binary_round_trip_across_versions() {
    for version in versions() {
        for identity in fixtures(version) {
            let bytes = identity.encode().unwrap();
            let decoded = Identity::decode(&bytes, version).unwrap();
            assert_eq!(decoded, identity, "version {version}: {identity}");
        }
    }
}

#[test]
fn token_round_trip_across_versions() {
    for version in versions() {
        for identity in fixtures(version) {
            let token = identity.encode_token().unwrap();
            assert_eq!(Identity::decode_token(&token).unwrap(), identity);
        }
    }
}

#[test]
fn role_descriptor_layout_differs_across_threshold() {
    let at = |version| {
        fixtures(version)
            .into_iter()
            .find(|id| id.kind() == IdentityKind::ApiKey)
            .unwrap()
            .encode()
            .unwrap()
    };
    assert_ne!(at(Version::new(7, 8, 1)), at(VERSION_API_KEY_ROLES_AS_BYTES));
}

// ── Effective realm ─────────────────────────────────────────────────────────

#[test]
fn effective_realm_is_lookup_realm_when_present() {
    for identity in fixtures(Version::CURRENT) {
        match identity.looked_up_by() {
            Some(lookup) => assert_eq!(identity.effective_realm(), lookup),
            None => assert_eq!(identity.effective_realm(), identity.authenticated_by()),
        }
    }
}

// ── Ownership scenarios ─────────────────────────────────────────────────────

#[test]
fn same_api_key_id_and_name_is_equivalent_both_ways() {
    let a = api_key("svc", "K1", "n1");
    let b = api_key("svc", "K1", "n2");
    assert!(a.can_access_resources_of(&b));
    assert!(b.can_access_resources_of(&a));
}

#[test]
fn api_key_and_realm_user_with_same_name_are_not_equivalent() {
    let key = api_key("alice", "K1", "n1");
    let user = Identity::builder(User::new("alice", ["r"]), ldap("ldap1", "n1"))
        .build()
        .unwrap();
    assert!(!key.can_access_resources_of(&user));
    assert!(!user.can_access_resources_of(&key));
}

#[test]
fn renamed_file_realm_is_still_the_same_realm() {
    let a = Identity::builder(User::new("alice", ["r"]), RealmOrigin::new("file1", "file", "n1"))
        .build()
        .unwrap();
    let b = Identity::builder(User::new("alice", ["r"]), RealmOrigin::new("files", "file", "n1"))
        .build()
        .unwrap();
    assert!(a.can_access_resources_of(&b));
}

#[test]
fn differently_named_general_realms_are_different() {
    let mine = Identity::builder(User::new("alice", ["r"]), ldap("ldap1", "n1"))
        .build()
        .unwrap();
    let theirs = Identity::builder(User::new("alice", ["r"]), ldap("ldap2", "n2"))
        .build()
        .unwrap();
    assert!(!mine.can_access_resources_of(&theirs));
}

#[test]
fn ownership_survives_propagation() {
    let mine = api_key("svc", "K1", "n1");
    let theirs = Identity::decode_token(&api_key("svc", "K1", "n2").encode_token().unwrap()).unwrap();
    assert!(mine.can_access_resources_of(&theirs));
}

// ── Concurrency ─────────────────────────────────────────────────────────────

#[test]
fn identities_are_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Identity>();
    assert_send_sync::<tessera_identity::RequestContext>();

    let shared: Arc<Vec<Identity>> = Arc::new(fixtures(Version::CURRENT));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || {
                shared
                    .iter()
                    .map(|id| {
                        let token = id.encode_token().unwrap();
                        Identity::decode_token(&token).unwrap().can_access_resources_of(id)
                    })
                    .collect::<Vec<bool>>()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().into_iter().all(|same| same));
    }
}
