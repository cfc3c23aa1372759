// Wire types for the InControl2 REST API
//
// Every response is an object with a `data` member holding either an array
// or a single object. Vendor payloads carry far more fields than we model;
// the ones we do not name are kept in `extra` so callers can still surface
// them as attributes.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// The `{ "data": ... }` envelope wrapped around every REST response.
#[derive(Debug, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
}

// ── Identifiers ─────────────────────────────────────────────────────

/// A vendor resource identifier.
///
/// Organizations use opaque strings while groups and devices use integers;
/// both are normalized to their textual form so path building and identity
/// keys never care which one they got.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<i64> for ResourceId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Self(s),
            Raw::Integer(n) => Self(n.to_string()),
            Raw::Float(f) => Self(f.to_string()),
        })
    }
}

// ── Lenient numeric fields ──────────────────────────────────────────

/// Accept a number, a numeric string, or null.
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Accept an integer, a numeric string, or null.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        Some(Value::Bool(b)) => Some(i64::from(b)),
        _ => None,
    })
}

// ── Organizations & groups ──────────────────────────────────────────

/// An item of `GET o`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgRecord {
    pub id: ResourceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// An item of `GET o/{org}/g`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecord {
    pub id: ResourceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An item of `GET o/{org}/g/{group}/d`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub id: ResourceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ── Device facets ───────────────────────────────────────────────────

/// `GET .../d/{device}` -- device metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub fw_ver: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sn: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An item of `GET .../d/{device}/loc` (most recent fix first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub la: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub lo: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub at: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub sp: Option<f64>,
    #[serde(default)]
    pub ts: Option<Value>,
}

/// An item of `GET .../d/{device}/info/interfaces`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WanInterface {
    pub id: ResourceId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub signal: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub signal_bar: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "is_enable", alias = "is_enabled", default, deserialize_with = "lenient_i64")]
    pub enable_flag: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WanInterface {
    /// The vendor reports link state as free text ("Connected", "Connected (4G)", ...).
    pub fn is_connected(&self) -> bool {
        self.status.as_deref().is_some_and(|s| s.contains("Connected"))
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_flag == Some(1)
    }
}
