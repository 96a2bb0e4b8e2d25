use crate::model::Payload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature flags of one API version. Unknown flags read as disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeMap<String, bool>);

impl FeatureSet {
    pub fn new(flags: BTreeMap<String, bool>) -> Self {
        Self(flags)
    }

    /// Whether the feature is declared and switched on
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.0.get(feature).copied().unwrap_or(false)
    }

    /// Names of every declared flag, enabled or not
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, bool)> for FeatureSet {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Complete configuration for one API version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionProfile {
    pub version_id: String,
    pub base_url: String,
    pub features: FeatureSet,
    /// Resource name -> URL template with `{placeholder}` segments
    pub endpoints: BTreeMap<String, String>,
    /// Schema name -> ordered field names
    pub schema_fields: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub required_fields: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub optional_fields: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_values: BTreeMap<String, Payload>,
    /// Schema name -> object field -> subfields that object must carry
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nested_fields: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl VersionProfile {
    /// Required fields for a schema, empty when the schema declares none
    pub fn required_for(&self, schema: &str) -> &[String] {
        self.required_fields
            .get(schema)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn optional_for(&self, schema: &str) -> &[String] {
        self.optional_fields
            .get(schema)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every field a payload for `schema` may carry in this version.
    ///
    /// Required fields come first, then optional ones. When neither list is
    /// declared the plain schema field list is used instead.
    pub fn field_list(&self, schema: &str) -> Vec<String> {
        let mut fields: Vec<String> = Vec::new();
        for field in self.required_for(schema).iter().chain(self.optional_for(schema)) {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        if fields.is_empty() {
            if let Some(schema_fields) = self.schema_fields.get(schema) {
                fields = schema_fields.clone();
            }
        }
        fields
    }
}

/// All version profiles from one configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionProfileSet {
    pub versions: BTreeMap<String, VersionProfile>,
    /// Consumed verbatim, never interpreted by the engine
    #[serde(default)]
    pub global_settings: serde_json::Map<String, serde_json::Value>,
}

impl VersionProfileSet {
    pub fn get(&self, version: &str) -> Option<&VersionProfile> {
        self.versions.get(version)
    }

    pub fn version_ids(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }

    /// Union of every feature name declared by any version, sorted
    pub fn all_features(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .versions
            .values()
            .flat_map(|profile| profile.features.names().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> VersionProfile {
        let mut required_fields = BTreeMap::new();
        required_fields.insert(
            "pet_create".to_string(),
            vec!["name".to_string(), "species".to_string()],
        );
        let mut optional_fields = BTreeMap::new();
        optional_fields.insert(
            "pet_create".to_string(),
            vec!["species".to_string(), "temperament".to_string()],
        );
        let mut schema_fields = BTreeMap::new();
        schema_fields.insert(
            "user_create".to_string(),
            vec!["username".to_string(), "email".to_string()],
        );

        VersionProfile {
            version_id: "v2".to_string(),
            base_url: "http://localhost:8000/api/v2".to_string(),
            features: [("health_records".to_string(), true)].into_iter().collect(),
            endpoints: BTreeMap::new(),
            schema_fields,
            required_fields,
            optional_fields,
            default_values: BTreeMap::new(),
            nested_fields: BTreeMap::new(),
        }
    }

    #[test]
    fn test_feature_set_defaults_to_disabled() {
        let profile = profile();
        assert!(profile.features.is_enabled("health_records"));
        assert!(!profile.features.is_enabled("statistics"));
    }

    #[test]
    fn test_field_list_merges_required_and_optional() {
        let profile = profile();
        assert_eq!(
            profile.field_list("pet_create"),
            vec!["name", "species", "temperament"]
        );
    }

    #[test]
    fn test_field_list_falls_back_to_schema_fields() {
        let profile = profile();
        assert_eq!(profile.field_list("user_create"), vec!["username", "email"]);
        assert!(profile.field_list("vet_create").is_empty());
    }
}
