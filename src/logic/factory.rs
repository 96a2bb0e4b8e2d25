use crate::error::TestDataGenerationError;
use crate::logic::synthesize::DataSynthesizer;
use crate::logic::validate_payload::validate_data_against_schema;
use crate::model::{Operation, Payload};
use log::{debug, warn};
use std::sync::Arc;

const IDENTITY_FIELDS: &[&str] = &["id", "uuid", "created_at", "updated_at"];

/// High-level payload construction for tests: template first, direct
/// generation when the template path fails.
#[derive(Debug, Clone)]
pub struct TestDataFactory {
    synthesizer: Arc<DataSynthesizer>,
}

impl TestDataFactory {
    pub fn new(synthesizer: Arc<DataSynthesizer>) -> Self {
        Self { synthesizer }
    }

    pub fn synthesizer(&self) -> &Arc<DataSynthesizer> {
        &self.synthesizer
    }

    /// Generate a payload, falling back to template-free generation when the
    /// templated path fails for any reason
    pub fn create(
        &self,
        resource: &str,
        operation: Operation,
        version: &str,
        overrides: &Payload,
    ) -> Result<Payload, TestDataGenerationError> {
        let template_err = match self.synthesizer.generate(resource, operation, version, overrides) {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        warn!(
            "Template generation of {}/{} for {} failed ({}); falling back to direct generation",
            resource, operation, version, template_err
        );

        self.synthesizer
            .generate_direct(resource, operation, version, overrides)
            .map_err(|fallback_err| TestDataGenerationError::FallbackFailed {
                resource: resource.to_string(),
                operation: operation.to_string(),
                version: version.to_string(),
                template_reason: template_err.to_string(),
                fallback_reason: fallback_err.to_string(),
            })
    }

    /// Generate only when `version` supports `feature`
    pub fn create_for_feature(
        &self,
        resource: &str,
        operation: Operation,
        version: &str,
        feature: &str,
        overrides: &Payload,
    ) -> Result<Payload, TestDataGenerationError> {
        if !self.synthesizer.store().get_feature_availability(version, feature) {
            return Err(TestDataGenerationError::FeatureUnsupported {
                resource: resource.to_string(),
                version: version.to_string(),
                feature: feature.to_string(),
            });
        }
        self.create(resource, operation, version, overrides)
    }

    pub fn user(&self, version: &str, overrides: &Payload) -> Result<Payload, TestDataGenerationError> {
        self.create("user", Operation::Create, version, overrides)
    }

    pub fn pet(&self, version: &str, overrides: &Payload) -> Result<Payload, TestDataGenerationError> {
        self.create("pet", Operation::Create, version, overrides)
    }

    pub fn appointment(&self, version: &str, overrides: &Payload) -> Result<Payload, TestDataGenerationError> {
        self.create("appointment", Operation::Create, version, overrides)
    }

    pub fn health_record(&self, version: &str, overrides: &Payload) -> Result<Payload, TestDataGenerationError> {
        self.create_for_feature("health_record", Operation::Create, version, "health_records", overrides)
    }

    /// `count` create payloads for a batch request
    pub fn batch(&self, resource: &str, version: &str, count: usize) -> Result<Vec<Payload>, TestDataGenerationError> {
        (0..count)
            .map(|_| self.create_for_feature(resource, Operation::Create, version, "batch_operations", &Payload::new()))
            .collect()
    }

    /// An update body: a fresh create payload narrowed to the version's
    /// optional update fields, plus `overrides`. Identity fields are never
    /// included, not even from `overrides`.
    pub fn build_update_payload(
        &self,
        resource: &str,
        version: &str,
        overrides: &Payload,
    ) -> Result<Payload, TestDataGenerationError> {
        let source = self.create(resource, Operation::Create, version, &Payload::new())?;

        let store = self.synthesizer.store();
        let update_schema = Operation::Update.schema_name(resource);
        let mut allowed = store.get_optional_fields(version, &update_schema).unwrap_or_default();
        if allowed.is_empty() {
            allowed = store
                .get_optional_fields(version, &Operation::Create.schema_name(resource))
                .unwrap_or_default();
        }

        let resource_id = format!("{}_id", resource);
        let is_identity = |field: &str| IDENTITY_FIELDS.contains(&field) || field == resource_id;

        let mut payload: Payload = source
            .into_iter()
            .filter(|(field, _)| allowed.contains(field) && !is_identity(field.as_str()))
            .collect();
        for (field, value) in overrides {
            if is_identity(field.as_str()) {
                debug!("Dropping identity field '{}' from {} update payload", field, resource);
                continue;
            }
            payload.insert(field.clone(), value.clone());
        }

        Ok(payload)
    }

    pub fn validate_data_against_schema(
        &self,
        payload: &Payload,
        version: &str,
        resource: &str,
        operation: Operation,
    ) -> Vec<String> {
        validate_data_against_schema(self.synthesizer.store(), payload, version, resource, operation)
    }

    pub fn set_relationship_id(&self, version: &str, resource: &str, field: &str, id: serde_json::Value) {
        self.synthesizer.set_relationship_id(version, resource, field, id);
    }

    pub fn clear_relationship_cache(&self) {
        self.synthesizer.clear_relationship_cache();
    }
}
