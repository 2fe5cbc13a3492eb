//! Identity and user metadata.
//!
//! On the wire, metadata is an ordered map of string keys to dynamically
//! typed [`MetadataValue`]s. In memory, the keys that carry meaning for
//! authorization get typed homes in [`AuthMetadata`]: API key details and
//! service account token details. Everything else rides along in `extra`.
//!
//! Conversion between the two happens only at the codec boundary
//! ([`AuthMetadata::to_wire`] / [`AuthMetadata::from_wire`]).

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::version::{VERSION_API_KEY_ROLES_AS_BYTES, Version};

/// Wire key for the API key id.
pub const API_KEY_ID_KEY: &str = "_security_api_key_id";
/// Wire key for the (optional) API key name.
pub const API_KEY_NAME_KEY: &str = "_security_api_key_name";
/// Wire key for the role descriptors assigned to an API key.
pub const API_KEY_ROLE_DESCRIPTORS_KEY: &str = "_security_api_key_role_descriptors";
/// Wire key for the role descriptors limiting an API key (its owner's roles).
pub const API_KEY_LIMITED_ROLE_DESCRIPTORS_KEY: &str =
    "_security_api_key_limited_by_role_descriptors";
/// Wire key for the service account token name.
pub const TOKEN_NAME_KEY: &str = "_token_name";
/// Wire key for the service account token source (e.g. `"file"`, `"index"`).
pub const TOKEN_SOURCE_KEY: &str = "_token_source";

const RESERVED_KEYS: [&str; 6] = [
    API_KEY_ID_KEY,
    API_KEY_NAME_KEY,
    API_KEY_ROLE_DESCRIPTORS_KEY,
    API_KEY_LIMITED_ROLE_DESCRIPTORS_KEY,
    TOKEN_NAME_KEY,
    TOKEN_SOURCE_KEY,
];

/// Whether `key` is owned by a typed field of [`AuthMetadata`].
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// ── Dynamic values ──────────────────────────────────────────────────────────

/// Deepest list/map nesting accepted in a metadata value. A top-level scalar
/// has depth 0.
pub const MAX_METADATA_DEPTH: usize = 64;

/// A dynamically typed metadata value.
///
/// The serde form is the tagged wire form used by the codec. Use
/// [`MetadataValue::to_json`] for the plain JSON view.
///
/// Variant order is the wire tag and must never change; new variants go last.
/// Deserializing rejects values nested deeper than [`MAX_METADATA_DEPTH`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Long(i64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<MetadataValue>),
    Map(BTreeMap<String, MetadataValue>),
    /// Integers above `i64::MAX`.
    ULong(u64),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetadataValue::Null)
    }

    /// List/map nesting below this value. Scalars and empty containers are 0.
    pub fn depth(&self) -> usize {
        match self {
            MetadataValue::List(items) => {
                items.iter().map(|item| item.depth() + 1).max().unwrap_or(0)
            }
            MetadataValue::Map(map) => map.values().map(|value| value.depth() + 1).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Plain JSON rendering. Bytes become an array of numbers.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            MetadataValue::Null => Value::Null,
            MetadataValue::Bool(b) => Value::Bool(*b),
            MetadataValue::Long(n) => Value::from(*n),
            MetadataValue::ULong(n) => Value::from(*n),
            MetadataValue::Double(n) => Value::from(*n),
            MetadataValue::String(s) => Value::String(s.clone()),
            MetadataValue::Bytes(b) => Value::from(b.clone()),
            MetadataValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            MetadataValue::Map(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Inverse of [`to_json`](Self::to_json) for JSON-native values.
    ///
    /// Integers that fit `i64` become `Long`, larger ones `ULong`, and every
    /// other number `Double`.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => MetadataValue::Null,
            Value::Bool(b) => MetadataValue::Bool(*b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => MetadataValue::Long(i),
                (None, Some(u)) => MetadataValue::ULong(u),
                (None, None) => MetadataValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MetadataValue::String(s.clone()),
            Value::Array(items) => MetadataValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => MetadataValue::Map(
                map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect(),
            ),
        }
    }
}

// ── Bounded-depth deserialization ───────────────────────────────────────────

const VARIANTS: &[&str] = &[
    "Null", "Bool", "Long", "Double", "String", "Bytes", "List", "Map", "ULong",
];

#[derive(Deserialize)]
#[serde(variant_identifier)]
enum Tag {
    Null,
    Bool,
    Long,
    Double,
    String,
    Bytes,
    List,
    Map,
    ULong,
}

impl<'de> Deserialize<'de> for MetadataValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueSeed { depth: 0 }.deserialize(deserializer)
    }
}

/// Deserializes one value sitting `depth` containers below the top.
#[derive(Clone, Copy)]
struct ValueSeed {
    depth: usize,
}

impl ValueSeed {
    fn child(self) -> Result<Self, String> {
        let depth = self.depth + 1;
        if depth > MAX_METADATA_DEPTH {
            return Err(format!("metadata nested deeper than {MAX_METADATA_DEPTH} levels"));
        }
        Ok(Self { depth })
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = MetadataValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_enum("MetadataValue", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for ValueSeed {
    type Value = MetadataValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a metadata value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Self::Value, A::Error> {
        let (tag, variant) = data.variant::<Tag>()?;
        match tag {
            Tag::Null => variant.unit_variant().map(|()| MetadataValue::Null),
            Tag::Bool => variant.newtype_variant().map(MetadataValue::Bool),
            Tag::Long => variant.newtype_variant().map(MetadataValue::Long),
            Tag::Double => variant.newtype_variant().map(MetadataValue::Double),
            Tag::String => variant.newtype_variant().map(MetadataValue::String),
            Tag::Bytes => variant.newtype_variant().map(MetadataValue::Bytes),
            Tag::ULong => variant.newtype_variant().map(MetadataValue::ULong),
            Tag::List => {
                let child = self.child().map_err(<A::Error as de::Error>::custom)?;
                variant.newtype_variant_seed(ListSeed(child)).map(MetadataValue::List)
            }
            Tag::Map => {
                let child = self.child().map_err(<A::Error as de::Error>::custom)?;
                variant.newtype_variant_seed(MapSeed(child)).map(MetadataValue::Map)
            }
        }
    }
}

/// The elements of a list, each deserialized with the inner seed.
struct ListSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<MetadataValue>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<MetadataValue>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of metadata values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        // Length hints come from the peer; don't preallocate from them.
        let mut items = Vec::new();
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

/// The entries of a map, values deserialized with the inner seed.
struct MapSeed(ValueSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, MetadataValue>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, MetadataValue>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of metadata values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value_seed(self.0)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Long(n)
    }
}

impl From<u64> for MetadataValue {
    fn from(n: u64) -> Self {
        match i64::try_from(n) {
            Ok(n) => MetadataValue::Long(n),
            Err(_) => MetadataValue::ULong(n),
        }
    }
}

/// Render a metadata map as a JSON object.
pub fn map_to_json(map: &BTreeMap<String, MetadataValue>) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

// ── Typed identity metadata ─────────────────────────────────────────────────

/// API key details carried by an identity whose effective subject is a key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKeyInfo {
    pub id: String,
    pub name: Option<String>,
    /// Roles assigned to the key at creation, as a JSON document.
    pub role_descriptors: Option<serde_json::Value>,
    /// The owner's roles at key creation, which bound the key's privileges.
    pub limited_by_role_descriptors: Option<serde_json::Value>,
}

impl ApiKeyInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role_descriptors: None,
            limited_by_role_descriptors: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role_descriptors(mut self, roles: serde_json::Value) -> Self {
        self.role_descriptors = Some(roles);
        self
    }

    pub fn with_limited_by_role_descriptors(mut self, roles: serde_json::Value) -> Self {
        self.limited_by_role_descriptors = Some(roles);
        self
    }
}

/// Service account token details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceTokenInfo {
    pub name: String,
    /// Where the token is stored, e.g. `"file"` or `"index"`.
    pub source: String,
}

impl ServiceTokenInfo {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Authentication metadata with typed fields for the keys that matter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AuthMetadata {
    pub(crate) api_key: Option<ApiKeyInfo>,
    pub(crate) service_token: Option<ServiceTokenInfo>,
    pub(crate) extra: BTreeMap<String, MetadataValue>,
}

impl AuthMetadata {
    pub fn api_key(&self) -> Option<&ApiKeyInfo> {
        self.api_key.as_ref()
    }

    pub fn service_token(&self) -> Option<&ServiceTokenInfo> {
        self.service_token.as_ref()
    }

    /// Entries without a typed home.
    pub fn extra(&self) -> &BTreeMap<String, MetadataValue> {
        &self.extra
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.service_token.is_none() && self.extra.is_empty()
    }

    /// Flatten into the wire map, laid out for `version`.
    pub fn to_wire(
        &self,
        version: Version,
    ) -> Result<BTreeMap<String, MetadataValue>, serde_json::Error> {
        let mut map = self.extra.clone();

        if let Some(key) = &self.api_key {
            map.insert(API_KEY_ID_KEY.into(), key.id.clone().into());
            if let Some(name) = &key.name {
                map.insert(API_KEY_NAME_KEY.into(), name.clone().into());
            }
            let as_bytes = version >= VERSION_API_KEY_ROLES_AS_BYTES;
            for (wire_key, roles) in [
                (API_KEY_ROLE_DESCRIPTORS_KEY, &key.role_descriptors),
                (API_KEY_LIMITED_ROLE_DESCRIPTORS_KEY, &key.limited_by_role_descriptors),
            ] {
                let Some(roles) = roles else { continue };
                let value = if as_bytes {
                    MetadataValue::Bytes(serde_json::to_vec(roles)?)
                } else {
                    MetadataValue::from_json(roles)
                };
                map.insert(wire_key.into(), value);
            }
        }

        if let Some(token) = &self.service_token {
            map.insert(TOKEN_NAME_KEY.into(), token.name.clone().into());
            map.insert(TOKEN_SOURCE_KEY.into(), token.source.clone().into());
        }

        Ok(map)
    }

    /// Lift typed fields out of a decoded wire map.
    ///
    /// Role descriptors are accepted in either layout regardless of version.
    /// Reserved keys that can't form a complete typed field stay in `extra`;
    /// identity validation decides whether that is acceptable.
    pub fn from_wire(mut map: BTreeMap<String, MetadataValue>) -> Result<Self, String> {
        let api_key = match map.remove(API_KEY_ID_KEY) {
            None => None,
            Some(MetadataValue::Null) => None,
            Some(MetadataValue::String(id)) => {
                let name = match map.remove(API_KEY_NAME_KEY) {
                    None | Some(MetadataValue::Null) => None,
                    Some(MetadataValue::String(name)) => Some(name),
                    Some(other) => return Err(format!("api key name is not a string: {other:?}")),
                };
                let role_descriptors = map
                    .remove(API_KEY_ROLE_DESCRIPTORS_KEY)
                    .map(role_descriptors_from_wire)
                    .transpose()?;
                let limited_by_role_descriptors = map
                    .remove(API_KEY_LIMITED_ROLE_DESCRIPTORS_KEY)
                    .map(role_descriptors_from_wire)
                    .transpose()?;
                Some(ApiKeyInfo {
                    id,
                    name,
                    role_descriptors,
                    limited_by_role_descriptors,
                })
            }
            Some(other) => return Err(format!("api key id is not a string: {other:?}")),
        };

        let service_token = match (map.get(TOKEN_NAME_KEY), map.get(TOKEN_SOURCE_KEY)) {
            (Some(MetadataValue::String(name)), Some(MetadataValue::String(source))) => {
                let token = ServiceTokenInfo::new(name.clone(), source.clone());
                map.remove(TOKEN_NAME_KEY);
                map.remove(TOKEN_SOURCE_KEY);
                Some(token)
            }
            _ => None,
        };

        Ok(Self {
            api_key,
            service_token,
            extra: map,
        })
    }
}

fn role_descriptors_from_wire(value: MetadataValue) -> Result<serde_json::Value, String> {
    match value {
        MetadataValue::Bytes(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| format!("api key role descriptors are not valid JSON: {e}")),
        other => Ok(other.to_json()),
    }
}

// ============================================================================
// Tests
// ============================================================================
