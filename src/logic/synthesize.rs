use crate::config::{EngineSettings, IdStrategy};
use crate::error::{ConfigurationError, TemplateError};
use crate::logic::generators::{GenerationContext, GeneratorRules};
use crate::model::{deep_merge, has_value, DataTemplate, FieldGenerator, Operation, Payload, VersionProfile};
use crate::store::{ConfigStore, RelationshipCache};
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;

/// Templates keyed by (resource, operation). Each pair is registered once.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<(String, Operation), Arc<DataTemplate>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, template: DataTemplate) -> Result<(), TemplateError> {
        let key = (template.resource.clone(), template.operation);
        let mut templates = self.templates.write();
        if templates.contains_key(&key) {
            return Err(TemplateError::DuplicateTemplate {
                resource: template.resource,
                operation: template.operation.to_string(),
            });
        }
        debug!("Registered template {}/{}", template.resource, template.operation);
        templates.insert(key, Arc::new(template));
        Ok(())
    }

    pub fn get(&self, resource: &str, operation: Operation) -> Option<Arc<DataTemplate>> {
        self.templates
            .read()
            .get(&(resource.to_string(), operation))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    /// Registered (resource, operation) pairs, sorted
    pub fn keys(&self) -> Vec<(String, Operation)> {
        let mut keys: Vec<_> = self.templates.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Builds per-version payloads from templates, configuration defaults and
/// field generators.
pub struct DataSynthesizer {
    store: Arc<ConfigStore>,
    templates: Arc<TemplateRegistry>,
    cache: Arc<RelationshipCache>,
    rules: GeneratorRules,
    rng: Mutex<StdRng>,
    id_strategy: IdStrategy,
}

impl std::fmt::Debug for DataSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSynthesizer")
            .field("templates", &self.templates.len())
            .field("cached_relationships", &self.cache.len())
            .field("id_strategy", &self.id_strategy)
            .finish()
    }
}

impl DataSynthesizer {
    pub fn new(
        store: Arc<ConfigStore>,
        templates: Arc<TemplateRegistry>,
        cache: Arc<RelationshipCache>,
        rules: GeneratorRules,
        settings: &EngineSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            templates,
            cache,
            rules,
            rng: Mutex::new(rng),
            id_strategy: settings.id_strategy,
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    pub fn rules(&self) -> &GeneratorRules {
        &self.rules
    }

    /// Generate a templated payload for `resource`/`operation` in `version`.
    ///
    /// Caller `overrides` replace generated values field by field. Fails when
    /// no template is registered, a template rule rejects the payload, or a
    /// required field is still missing at the end.
    pub fn generate(
        &self,
        resource: &str,
        operation: Operation,
        version: &str,
        overrides: &Payload,
    ) -> Result<Payload, TemplateError> {
        let template = self
            .templates
            .get(resource, operation)
            .ok_or_else(|| TemplateError::NotRegistered {
                resource: resource.to_string(),
                operation: operation.to_string(),
            })?;
        let profile = self.store.get_profile(version)?;
        let schema = operation.schema_name(resource);
        let field_list = profile.field_list(&schema);
        let declared = |field: &str| field_list.is_empty() || field_list.iter().any(|f| f == field);

        let mut payload = template.base_data.clone();
        if let Some(fragment) = template.version_overrides.get(version) {
            deep_merge(&mut payload, fragment);
        }
        fill_defaults(&mut payload, &profile, &schema);

        {
            let mut rng = self.rng.lock();
            let mut ctx = GenerationContext::new(version, &mut rng, &self.cache, self.id_strategy);

            for (field, target) in &template.relationships {
                if has_value(&payload, field) || !declared(field.as_str()) {
                    continue;
                }
                let id = FieldGenerator::relationship(target.as_str()).generate(field, &mut ctx);
                payload.insert(field.clone(), id);
            }

            self.fill_from_rules(&mut payload, &field_list, &mut ctx);

            for (field, generator) in &template.field_generators {
                if declared(field.as_str()) || payload.contains_key(field) {
                    let value = generator.generate(field, &mut ctx);
                    payload.insert(field.clone(), value);
                }
            }
        }

        apply_overrides(&mut payload, overrides);

        if let Some(rule) = template.validation_rules.iter().find(|rule| !rule.check(&payload)) {
            return Err(TemplateError::RuleRejected {
                resource: resource.to_string(),
                operation: operation.to_string(),
                version: version.to_string(),
                rule: rule.name.clone(),
            });
        }

        let missing: Vec<String> = profile
            .required_for(&schema)
            .iter()
            .filter(|field| !has_value(&payload, field))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(TemplateError::MissingRequiredFields {
                resource: resource.to_string(),
                operation: operation.to_string(),
                version: version.to_string(),
                fields: missing,
            });
        }

        trace!("Generated {} for {}: {:?}", schema, version, payload);
        Ok(payload)
    }

    /// Template-free generation from the version's field list alone.
    ///
    /// Fields no rule resolves stay absent. Fails only when the version is
    /// unknown or the schema declares no fields.
    pub fn generate_direct(
        &self,
        resource: &str,
        operation: Operation,
        version: &str,
        overrides: &Payload,
    ) -> Result<Payload, ConfigurationError> {
        let profile = self.store.get_profile(version)?;
        let schema = operation.schema_name(resource);
        let field_list = profile.field_list(&schema);
        if field_list.is_empty() {
            return Err(ConfigurationError::UnknownSchema {
                version: version.to_string(),
                schema,
            });
        }

        let mut payload = Payload::new();
        fill_defaults(&mut payload, &profile, &schema);
        {
            let mut rng = self.rng.lock();
            let mut ctx = GenerationContext::new(version, &mut rng, &self.cache, self.id_strategy);
            self.fill_from_rules(&mut payload, &field_list, &mut ctx);
        }
        apply_overrides(&mut payload, overrides);

        Ok(payload)
    }

    fn fill_from_rules(&self, payload: &mut Payload, field_list: &[String], ctx: &mut GenerationContext<'_>) {
        for field in field_list {
            if has_value(payload, field) {
                continue;
            }
            match self.rules.resolve(field) {
                Some(generator) => {
                    let value = generator.generate(field, ctx);
                    payload.insert(field.clone(), value);
                }
                None => debug!("No generator resolves field '{}' in {}; leaving it absent", field, ctx.version),
            }
        }
    }

    /// Bind a relationship key explicitly, e.g. to the id of a user created
    /// through the API
    pub fn set_relationship_id(&self, version: &str, resource: &str, field: &str, id: serde_json::Value) {
        self.cache
            .set(&RelationshipCache::key(version, resource, field), id);
    }

    pub fn clear_relationship_cache(&self) {
        self.cache.clear();
    }

    pub fn relationship_cache(&self) -> &Arc<RelationshipCache> {
        &self.cache
    }
}

fn fill_defaults(payload: &mut Payload, profile: &VersionProfile, schema: &str) {
    if let Some(defaults) = profile.default_values.get(schema) {
        for (field, value) in defaults {
            if !has_value(payload, field) {
                payload.insert(field.clone(), value.clone());
            }
        }
    }
}

fn apply_overrides(payload: &mut Payload, overrides: &Payload) {
    for (field, value) in overrides {
        payload.insert(field.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::{load_default_templates, relationship_hints, sample_document};
    use crate::store::MemorySource;
    use serde_json::json;

    fn synthesizer() -> DataSynthesizer {
        let store = ConfigStore::from_source(Arc::new(MemorySource::new("clinic", sample_document()))).unwrap();
        let templates = Arc::new(TemplateRegistry::new());
        load_default_templates(&templates).unwrap();
        DataSynthesizer::new(
            Arc::new(store),
            templates,
            Arc::new(RelationshipCache::new()),
            GeneratorRules::standard().with_relationship_hints(relationship_hints()),
            &EngineSettings::default().with_seed(42),
        )
    }

    #[test]
    fn test_pet_create_respects_version_fields() {
        let synth = synthesizer();

        let v1 = synth.generate("pet", Operation::Create, "v1", &Payload::new()).unwrap();
        for field in ["name", "species", "owner_id"] {
            assert!(has_value(&v1, field), "v1 missing {}", field);
        }
        assert!(!v1.contains_key("temperament"));
        assert!(!v1.contains_key("behavioral_notes"));

        let v2 = synth.generate("pet", Operation::Create, "v2", &Payload::new()).unwrap();
        let temperament = v2["temperament"].as_str().unwrap();
        assert!(["friendly", "calm", "anxious", "playful", "shy"].contains(&temperament));
        assert!(v2.contains_key("behavioral_notes"));
    }

    #[test]
    fn test_relationship_ids_reused_within_cache_scope() {
        let synth = synthesizer();
        let first = synth.generate("pet", Operation::Create, "v2", &Payload::new()).unwrap();
        let second = synth.generate("pet", Operation::Create, "v2", &Payload::new()).unwrap();
        assert_eq!(first["owner_id"], second["owner_id"]);

        synth.set_relationship_id("v2", "user", "owner_id", json!(7));
        let third = synth.generate("pet", Operation::Create, "v2", &Payload::new()).unwrap();
        assert_eq!(third["owner_id"], json!(7));

        synth.clear_relationship_cache();
        assert!(synth.relationship_cache().is_empty());
    }

    #[test]
    fn test_defaults_and_overrides() {
        let synth = synthesizer();
        let payload = synth.generate("pet", Operation::Create, "v1", &Payload::new()).unwrap();
        assert_eq!(payload["species"], json!("dog"));

        let mut overrides = Payload::new();
        overrides.insert("species".to_string(), json!("cat"));
        overrides.insert("name".to_string(), json!("Whiskers"));
        let payload = synth.generate("pet", Operation::Create, "v1", &overrides).unwrap();
        assert_eq!(payload["species"], json!("cat"));
        assert_eq!(payload["name"], json!("Whiskers"));
    }

    #[test]
    fn test_missing_template_and_unknown_version() {
        let synth = synthesizer();
        assert!(matches!(
            synth.generate("invoice", Operation::Create, "v1", &Payload::new()),
            Err(TemplateError::NotRegistered { .. })
        ));
        assert!(matches!(
            synth.generate("pet", Operation::Create, "v9", &Payload::new()),
            Err(TemplateError::Configuration(ConfigurationError::UnknownVersion(_)))
        ));
    }

    #[test]
    fn test_null_override_fails_required_check() {
        let synth = synthesizer();
        let mut overrides = Payload::new();
        overrides.insert("name".to_string(), serde_json::Value::Null);
        match synth.generate("pet", Operation::Create, "v1", &overrides) {
            Err(TemplateError::MissingRequiredFields { fields, .. }) => assert_eq!(fields, vec!["name".to_string()]),
            other => panic!("expected missing required fields, got {:?}", other),
        }
    }

    #[test]
    fn test_rule_rejection() {
        let synth = synthesizer();
        let mut overrides = Payload::new();
        overrides.insert("weight".to_string(), json!(-3.0));
        assert!(matches!(
            synth.generate("pet", Operation::Create, "v1", &overrides),
            Err(TemplateError::RuleRejected { ref rule, .. }) if rule == "weight_is_positive"
        ));
    }

    #[test]
    fn test_direct_generation() {
        let synth = synthesizer();
        let payload = synth
            .generate_direct("health_record", Operation::Create, "v2", &Payload::new())
            .unwrap();
        assert!(has_value(&payload, "pet_id"));
        assert!(has_value(&payload, "record_type"));
        assert!(has_value(&payload, "date"));

        assert!(matches!(
            synth.generate_direct("health_record", Operation::Create, "v1", &Payload::new()),
            Err(ConfigurationError::UnknownSchema { .. })
        ));
    }

    #[test]
    fn test_same_seed_same_payload() {
        let a = synthesizer()
            .generate("user", Operation::Create, "v2", &Payload::new())
            .unwrap();
        let b = synthesizer()
            .generate("user", Operation::Create, "v2", &Payload::new())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_registry_keys_sorted() {
        let synth = synthesizer();
        let keys = synth.templates().keys();
        assert_eq!(keys.first().unwrap().0, "appointment");
        assert!(keys.contains(&("user".to_string(), Operation::Update)));
    }
}
