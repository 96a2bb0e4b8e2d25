use crate::model::{payload_from, FieldGenerator, Operation, Payload};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type RuleFn = dyn Fn(&Payload) -> bool + Send + Sync;

/// Named predicate run over a finished payload
#[derive(Clone)]
pub struct ValidationRule {
    pub name: String,
    check: Arc<RuleFn>,
}

impl ValidationRule {
    pub fn new(name: impl Into<String>, check: impl Fn(&Payload) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn check(&self, payload: &Payload) -> bool {
        (self.check)(payload)
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Reusable description of how to synthesize one (resource, operation) payload
#[derive(Debug, Clone)]
pub struct DataTemplate {
    pub resource: String,
    pub operation: Operation,
    /// Starting payload, deep-copied on every generation
    pub base_data: Payload,
    /// Field -> related resource type whose identifier fills it
    pub relationships: BTreeMap<String, String>,
    /// Version -> fragment merged over `base_data`
    pub version_overrides: BTreeMap<String, Payload>,
    pub field_generators: BTreeMap<String, FieldGenerator>,
    pub validation_rules: Vec<ValidationRule>,
}

impl DataTemplate {
    pub fn new(resource: impl Into<String>, operation: Operation) -> Self {
        Self {
            resource: resource.into(),
            operation,
            base_data: Payload::new(),
            relationships: BTreeMap::new(),
            version_overrides: BTreeMap::new(),
            field_generators: BTreeMap::new(),
            validation_rules: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: serde_json::Value) -> Self {
        self.base_data = payload_from(base);
        self
    }

    pub fn with_relationship(mut self, field: impl Into<String>, resource: impl Into<String>) -> Self {
        self.relationships.insert(field.into(), resource.into());
        self
    }

    pub fn with_version_override(mut self, version: impl Into<String>, fragment: serde_json::Value) -> Self {
        self.version_overrides
            .insert(version.into(), payload_from(fragment));
        self
    }

    pub fn with_generator(mut self, field: impl Into<String>, generator: FieldGenerator) -> Self {
        self.field_generators.insert(field.into(), generator);
        self
    }

    pub fn with_rule(
        mut self,
        name: impl Into<String>,
        check: impl Fn(&Payload) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.validation_rules.push(ValidationRule::new(name, check));
        self
    }

    pub fn schema_name(&self) -> String {
        self.operation.schema_name(&self.resource)
    }
}
