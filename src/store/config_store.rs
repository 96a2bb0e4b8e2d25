use crate::error::ConfigurationError;
use crate::model::{Payload, VersionProfile, VersionProfileSet};
use crate::store::document::profiles_from_document;
use crate::store::traits::{FileSource, ProfileSource};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Validated, reloadable view of the version configuration document.
///
/// Readers always work off one `Arc` snapshot, so a concurrent `reload` is
/// seen either entirely or not at all.
pub struct ConfigStore {
    source: Arc<dyn ProfileSource>,
    profiles: RwLock<Arc<VersionProfileSet>>,
    generation: AtomicU64,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("origin", &self.source.origin())
            .field("generation", &self.generation())
            .finish()
    }
}

impl ConfigStore {
    /// Load and validate a JSON or YAML document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        Self::from_source(Arc::new(FileSource::new(path.as_ref())))
    }

    pub fn from_source(source: Arc<dyn ProfileSource>) -> Result<Self, ConfigurationError> {
        let profiles = Self::read_profiles(source.as_ref())?;
        info!(
            "Loaded {} API version profile(s) from {}",
            profiles.versions.len(),
            source.origin()
        );
        Ok(Self {
            source,
            profiles: RwLock::new(Arc::new(profiles)),
            generation: AtomicU64::new(0),
        })
    }

    fn read_profiles(source: &dyn ProfileSource) -> Result<VersionProfileSet, ConfigurationError> {
        let document = source.fetch()?;
        profiles_from_document(&document, &source.origin())
    }

    /// Re-read and re-validate the source, swapping in the new profiles only
    /// when the whole document is valid.
    ///
    /// Returns `Ok(false)` when the source cannot change.
    pub fn reload(&self) -> Result<bool, ConfigurationError> {
        if !self.source.supports_reload() {
            debug!("Source {} does not support reload; keeping current profiles", self.source.origin());
            return Ok(false);
        }

        let profiles = match Self::read_profiles(self.source.as_ref()) {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("Reload of {} failed, keeping previous configuration: {}", self.source.origin(), e);
                return Err(e);
            }
        };

        let count = profiles.versions.len();
        *self.profiles.write() = Arc::new(profiles);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            "Reloaded {} API version profile(s) from {} (generation {})",
            count,
            self.source.origin(),
            generation
        );
        Ok(true)
    }

    /// Consistent view of every profile at this instant
    pub fn snapshot(&self) -> Arc<VersionProfileSet> {
        self.profiles.read().clone()
    }

    /// Number of successful reloads since construction
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn origin(&self) -> String {
        self.source.origin()
    }

    pub fn list_versions(&self) -> Vec<String> {
        self.snapshot().version_ids()
    }

    pub fn has_version(&self, version: &str) -> bool {
        self.snapshot().versions.contains_key(version)
    }

    pub fn get_profile(&self, version: &str) -> Result<VersionProfile, ConfigurationError> {
        self.snapshot()
            .get(version)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownVersion(version.to_string()))
    }

    /// `false` for unknown versions and unknown features; never an error
    pub fn get_feature_availability(&self, version: &str, feature: &str) -> bool {
        self.snapshot()
            .get(version)
            .map_or(false, |profile| profile.features.is_enabled(feature))
    }

    /// Substitute `{placeholder}` segments of a resource's endpoint template.
    ///
    /// Every placeholder must be bound; extra params are ignored.
    pub fn resolve_endpoint(
        &self,
        version: &str,
        resource: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ConfigurationError> {
        let snapshot = self.snapshot();
        Self::endpoint_in(Self::profile_in(&snapshot, version)?, version, resource, params)
    }

    /// Absolute URL: the version's base URL joined with the resolved endpoint.
    ///
    /// Base URL and endpoint come from the same snapshot.
    pub fn resolve_url(
        &self,
        version: &str,
        resource: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ConfigurationError> {
        let snapshot = self.snapshot();
        let profile = Self::profile_in(&snapshot, version)?;
        let path = Self::endpoint_in(profile, version, resource, params)?;
        Ok(format!(
            "{}/{}",
            profile.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ))
    }

    fn endpoint_in(
        profile: &VersionProfile,
        version: &str,
        resource: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, ConfigurationError> {
        let template = profile
            .endpoints
            .get(resource)
            .ok_or_else(|| ConfigurationError::UnknownResource {
                version: version.to_string(),
                resource: resource.to_string(),
            })?;
        substitute_placeholders(template, params).map_err(|problem| match problem {
            PlaceholderProblem::Unbound(placeholder) => ConfigurationError::UnboundPlaceholder {
                version: version.to_string(),
                resource: resource.to_string(),
                placeholder,
            },
            PlaceholderProblem::Malformed => ConfigurationError::MalformedEndpoint {
                version: version.to_string(),
                resource: resource.to_string(),
                template: template.clone(),
            },
        })
    }

    pub fn get_schema_fields(&self, version: &str, schema: &str) -> Result<Vec<String>, ConfigurationError> {
        let snapshot = self.snapshot();
        let profile = Self::profile_in(&snapshot, version)?;
        profile
            .schema_fields
            .get(schema)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownSchema {
                version: version.to_string(),
                schema: schema.to_string(),
            })
    }

    /// Empty when the schema declares no required fields
    pub fn get_required_fields(&self, version: &str, schema: &str) -> Result<Vec<String>, ConfigurationError> {
        let snapshot = self.snapshot();
        Ok(Self::profile_in(&snapshot, version)?.required_for(schema).to_vec())
    }

    /// Empty when the schema declares no optional fields
    pub fn get_optional_fields(&self, version: &str, schema: &str) -> Result<Vec<String>, ConfigurationError> {
        let snapshot = self.snapshot();
        Ok(Self::profile_in(&snapshot, version)?.optional_for(schema).to_vec())
    }

    /// Empty when the schema has no configured defaults
    pub fn get_default_values(&self, version: &str, schema: &str) -> Result<Payload, ConfigurationError> {
        let snapshot = self.snapshot();
        Ok(Self::profile_in(&snapshot, version)?
            .default_values
            .get(schema)
            .cloned()
            .unwrap_or_default())
    }

    pub fn get_nested_fields(
        &self,
        version: &str,
        schema: &str,
    ) -> Result<BTreeMap<String, Vec<String>>, ConfigurationError> {
        let snapshot = self.snapshot();
        Ok(Self::profile_in(&snapshot, version)?
            .nested_fields
            .get(schema)
            .cloned()
            .unwrap_or_default())
    }

    /// Required fields followed by optional ones, or the schema field list
    pub fn get_field_list(&self, version: &str, schema: &str) -> Result<Vec<String>, ConfigurationError> {
        let snapshot = self.snapshot();
        Ok(Self::profile_in(&snapshot, version)?.field_list(schema))
    }

    pub fn get_global_settings(&self) -> serde_json::Map<String, serde_json::Value> {
        self.snapshot().global_settings.clone()
    }

    fn profile_in<'a>(set: &'a VersionProfileSet, version: &str) -> Result<&'a VersionProfile, ConfigurationError> {
        set.get(version)
            .ok_or_else(|| ConfigurationError::UnknownVersion(version.to_string()))
    }
}

#[derive(Debug, PartialEq)]
enum PlaceholderProblem {
    Unbound(String),
    Malformed,
}

fn substitute_placeholders(template: &str, params: &BTreeMap<String, String>) -> Result<String, PlaceholderProblem> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        resolved.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let close = after_open.find('}').ok_or(PlaceholderProblem::Malformed)?;
        let name = &after_open[..close];
        if name.is_empty() || name.contains('{') {
            return Err(PlaceholderProblem::Malformed);
        }
        let value = params
            .get(name)
            .ok_or_else(|| PlaceholderProblem::Unbound(name.to_string()))?;
        resolved.push_str(value);
        rest = &after_open[close + 1..];
    }

    if rest.contains('}') {
        return Err(PlaceholderProblem::Malformed);
    }
    resolved.push_str(rest);
    Ok(resolved)
}
