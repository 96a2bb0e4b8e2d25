use crate::error::ConfigurationError;
use crate::model::{FeatureSet, Payload, VersionProfile, VersionProfileSet};
use itertools::Itertools;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

const BASE_URL: &str = "base_url";
const FEATURES: &str = "features";
const ENDPOINTS: &str = "endpoints";
const SCHEMA_FIELDS: &str = "schema_fields";
const REQUIRED_FIELDS: &str = "required_fields";
const OPTIONAL_FIELDS: &str = "optional_fields";
const DEFAULT_VALUES: &str = "default_values";
const NESTED_FIELDS: &str = "nested_fields";

/// On-disk syntax of a configuration document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// `.json` files are JSON, everything else is read as YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Parse raw text into a JSON value without interpreting it
pub fn parse_document(text: &str, format: DocumentFormat, origin: &str) -> Result<Value, ConfigurationError> {
    if text.trim().is_empty() {
        return Err(ConfigurationError::EmptyDocument {
            origin: origin.to_string(),
        });
    }

    let parsed = match format {
        DocumentFormat::Json => serde_json::from_str::<Value>(text).map_err(|e| e.to_string()),
        DocumentFormat::Yaml => serde_yaml::from_str::<Value>(text).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| ConfigurationError::Parse {
        origin: origin.to_string(),
        message,
    })
}

/// Validate a parsed document and build the typed profile set.
///
/// Fails on the first structural problem; nothing is returned for a document
/// that is only partly valid.
pub fn profiles_from_document(document: &Value, origin: &str) -> Result<VersionProfileSet, ConfigurationError> {
    let root = match document {
        Value::Null => {
            return Err(ConfigurationError::EmptyDocument {
                origin: origin.to_string(),
            })
        }
        Value::Object(map) if map.is_empty() => {
            return Err(ConfigurationError::EmptyDocument {
                origin: origin.to_string(),
            })
        }
        Value::Object(map) => map,
        _ => {
            return Err(ConfigurationError::NotAMapping {
                origin: origin.to_string(),
            })
        }
    };

    let versions = match root.get("versions") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        Some(Value::Object(_)) | Some(Value::Null) | None => {
            return Err(ConfigurationError::MissingVersions {
                origin: origin.to_string(),
            })
        }
        Some(_) => {
            return Err(ConfigurationError::invalid_section(
                "(document)",
                "versions",
                "a mapping of version ids to profiles",
            ))
        }
    };

    let global_settings = match root.get("global_settings") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ConfigurationError::InvalidGlobalSettings),
    };

    let mut profiles = BTreeMap::new();
    for (version_id, raw) in versions {
        let profile = profile_from_value(version_id, raw)?;
        profiles.insert(version_id.clone(), profile);
    }

    Ok(VersionProfileSet {
        versions: profiles,
        global_settings,
    })
}

fn profile_from_value(version: &str, raw: &Value) -> Result<VersionProfile, ConfigurationError> {
    let profile = raw
        .as_object()
        .ok_or_else(|| ConfigurationError::invalid_section(version, "(profile)", "a mapping"))?;

    let base_url = match profile.get(BASE_URL) {
        None | Some(Value::Null) => return Err(ConfigurationError::missing_section(version, BASE_URL)),
        Some(Value::String(url)) => url.clone(),
        Some(_) => return Err(ConfigurationError::invalid_section(version, BASE_URL, "a string")),
    };

    let features = mandatory_mapping(profile, version, FEATURES)?
        .iter()
        .map(|(name, flag)| {
            flag.as_bool()
                .map(|on| (name.clone(), on))
                .ok_or_else(|| ConfigurationError::invalid_entry(version, FEATURES, name, "a boolean"))
        })
        .collect::<Result<FeatureSet, _>>()?;

    let endpoints = mandatory_mapping(profile, version, ENDPOINTS)?
        .iter()
        .map(|(resource, template)| {
            template
                .as_str()
                .map(|t| (resource.clone(), t.to_string()))
                .ok_or_else(|| ConfigurationError::invalid_entry(version, ENDPOINTS, resource, "a string"))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let schema_fields = field_lists(mandatory_mapping(profile, version, SCHEMA_FIELDS)?, version, SCHEMA_FIELDS)?;

    let required_fields = match optional_mapping(profile, version, REQUIRED_FIELDS)? {
        Some(map) => field_lists(map, version, REQUIRED_FIELDS)?,
        None => BTreeMap::new(),
    };
    let optional_fields = match optional_mapping(profile, version, OPTIONAL_FIELDS)? {
        Some(map) => field_lists(map, version, OPTIONAL_FIELDS)?,
        None => BTreeMap::new(),
    };

    let mut default_values: BTreeMap<String, Payload> = BTreeMap::new();
    if let Some(map) = optional_mapping(profile, version, DEFAULT_VALUES)? {
        for (schema, defaults) in map {
            let defaults = defaults
                .as_object()
                .ok_or_else(|| ConfigurationError::invalid_entry(version, DEFAULT_VALUES, schema, "a mapping"))?;
            default_values.insert(schema.clone(), defaults.clone());
        }
    }

    let mut nested_fields = BTreeMap::new();
    if let Some(map) = optional_mapping(profile, version, NESTED_FIELDS)? {
        for (schema, objects) in map {
            let objects = objects
                .as_object()
                .ok_or_else(|| ConfigurationError::invalid_entry(version, NESTED_FIELDS, schema, "a mapping"))?;
            nested_fields.insert(schema.clone(), field_lists(objects, version, NESTED_FIELDS)?);
        }
    }

    Ok(VersionProfile {
        version_id: version.to_string(),
        base_url,
        features,
        endpoints,
        schema_fields,
        required_fields,
        optional_fields,
        default_values,
        nested_fields,
    })
}

fn mandatory_mapping<'a>(
    profile: &'a Map<String, Value>,
    version: &str,
    section: &str,
) -> Result<&'a Map<String, Value>, ConfigurationError> {
    match profile.get(section) {
        None | Some(Value::Null) => Err(ConfigurationError::missing_section(version, section)),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(ConfigurationError::invalid_section(version, section, "a mapping")),
    }
}

fn optional_mapping<'a>(
    profile: &'a Map<String, Value>,
    version: &str,
    section: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigurationError> {
    match profile.get(section) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ConfigurationError::invalid_section(version, section, "a mapping")),
    }
}

/// Name -> list of field names; duplicates are dropped, first occurrence wins
fn field_lists(
    map: &Map<String, Value>,
    version: &str,
    section: &str,
) -> Result<BTreeMap<String, Vec<String>>, ConfigurationError> {
    let mut lists = BTreeMap::new();
    for (name, raw) in map {
        let items = raw
            .as_array()
            .ok_or_else(|| ConfigurationError::invalid_entry(version, section, name, "a list of field names"))?;
        let fields = items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ConfigurationError::invalid_entry(version, section, name, "a list of field names"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        lists.insert(name.clone(), fields.into_iter().unique().collect());
    }
    Ok(lists)
}
