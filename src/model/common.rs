use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type Id = String;

/// A synthesized request body. Keys are field names, values are plain JSON.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// CRUD operation a payload or test case targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::List,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::List => "list",
        }
    }

    /// Name of the schema describing this operation's payload, e.g. `pet_create`
    pub fn schema_name(&self, resource: &str) -> String {
        format!("{}_{}", resource, self.as_str())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigurationError::UnknownOperation(s.to_string()))
    }
}

/// Build a payload from a `json!` object literal. Anything that is not an
/// object yields an empty payload.
pub fn payload_from(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Recursively merge `overlay` into `base`: nested objects merge key-wise,
/// every other value replaces what was there.
pub fn deep_merge(base: &mut Payload, overlay: &Payload) {
    for (key, value) in overlay {
        match (base.get_mut(key), value) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

/// A field counts as present when it exists and is not null
pub fn has_value(payload: &Payload, field: &str) -> bool {
    payload.get(field).map_or(false, |v| !v.is_null())
}

/// Generate a stable plan-entry ID from the version and parameter set.
///
/// The same (version, params) pair always yields the same ID, so test reports
/// can be diffed across runs.
pub fn generate_case_id(version: &str, params: &BTreeMap<String, serde_json::Value>) -> Id {
    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    for (key, value) in params {
        hasher.update(b"\x1f");
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.to_string().as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("case-{}", &digest[..12])
}
