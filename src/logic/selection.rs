use crate::error::{ConfigurationError, TestDataGenerationError};
use crate::logic::capability::CapabilityResolver;
use crate::logic::factory::TestDataFactory;
use crate::model::{
    generate_case_id, DependencyGraph, FeatureRequirements, Operation, ParamAxis, Payload, PlanEntry, PlannedCase, RuntimeCheck,
    SkipDirective,
};
use crate::store::ConfigStore;
use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Decides, before any request is made, which versions a capability-dependent
/// test runs against.
#[derive(Debug, Clone)]
pub struct Selector {
    resolver: Arc<CapabilityResolver>,
}

impl Selector {
    pub fn new(resolver: Arc<CapabilityResolver>) -> Self {
        Self { resolver }
    }

    fn store(&self) -> &Arc<ConfigStore> {
        self.resolver.store()
    }

    /// Versions satisfying every required feature, plus every dependency of
    /// those features when a graph is given
    pub fn qualifying_versions(&self, required: &[String], dependencies: Option<&DependencyGraph>) -> Vec<String> {
        self.store()
            .list_versions()
            .into_iter()
            .filter(|version| {
                if !self.resolver.missing_features(version, required).is_empty() {
                    return false;
                }
                match dependencies {
                    Some(graph) => required
                        .iter()
                        .all(|feature| self.resolver.validate_dependencies(version, feature, graph).valid),
                    None => true,
                }
            })
            .collect()
    }

    pub fn build_plan(
        &self,
        required: &[String],
        optional: &[String],
        dependencies: Option<&DependencyGraph>,
    ) -> Vec<PlanEntry> {
        self.build_plan_with_axes(
            &FeatureRequirements {
                required: required.to_vec(),
                optional: optional.to_vec(),
                dependencies: dependencies.cloned(),
            },
            &[],
        )
    }

    /// Cartesian product of qualifying versions with `axes`, in declaration
    /// order. When no version qualifies the plan is a single skip entry.
    pub fn build_plan_with_axes(&self, requirements: &FeatureRequirements, axes: &[ParamAxis]) -> Vec<PlanEntry> {
        let versions = self.qualifying_versions(&requirements.required, requirements.dependencies.as_ref());

        if versions.is_empty() {
            let reason = format!(
                "No API version supports required features [{}] (known versions: {})",
                requirements.required.join(", "),
                self.store().list_versions().join(", ")
            );
            info!("{}", reason);
            return vec![skip_entry(requirements, reason)];
        }

        // an axis without values would empty the product and hide every version
        if let Some(axis) = axes.iter().find(|axis| axis.values.is_empty()) {
            let reason = format!(
                "Parameter axis '{}' has no values; nothing to run for versions [{}]",
                axis.name,
                versions.join(", ")
            );
            warn!("{}", reason);
            return vec![skip_entry(requirements, reason)];
        }

        let combinations: Vec<BTreeMap<String, serde_json::Value>> = if axes.is_empty() {
            vec![BTreeMap::new()]
        } else {
            axes.iter()
                .map(|axis| axis.values.iter().map(move |value| (axis.name.clone(), value.clone())))
                .multi_cartesian_product()
                .map(|pairs| pairs.into_iter().collect())
                .collect()
        };

        let plan: Vec<PlanEntry> = versions
            .iter()
            .cartesian_product(combinations.iter())
            .map(|(version, params)| {
                let mut case = PlannedCase::new(version.as_str(), params.clone());
                case.warnings = self
                    .resolver
                    .should_skip(version, &requirements.required, &requirements.optional)
                    .warnings;
                PlanEntry::Run(case)
            })
            .collect();

        debug!(
            "Built plan with {} case(s) across versions [{}]",
            plan.len(),
            versions.join(", ")
        );
        plan
    }

    /// Re-verify a planned case right before it executes.
    ///
    /// Reads the store directly so a reload between planning and execution is
    /// observed; an unknown version is a skip too.
    pub fn recheck(&self, case: &PlannedCase, requirements: &FeatureRequirements) -> RuntimeCheck {
        let snapshot = self.store().snapshot();
        let Some(profile) = snapshot.get(&case.version) else {
            let reason = format!("Version {} is no longer configured", case.version);
            warn!("{}", reason);
            return RuntimeCheck::Skip { reason };
        };

        let missing: Vec<&String> = requirements
            .required
            .iter()
            .filter(|feature| !profile.features.is_enabled(feature))
            .collect();
        if missing.is_empty() {
            RuntimeCheck::Proceed
        } else {
            let reason = format!(
                "Required features no longer available in {}: {}",
                case.version,
                missing.iter().join(", ")
            );
            warn!("{}", reason);
            RuntimeCheck::Skip { reason }
        }
    }
}

fn skip_entry(requirements: &FeatureRequirements, reason: String) -> PlanEntry {
    let id = generate_case_id("none", &requirement_params(requirements)).replacen("case-", "skip-", 1);
    PlanEntry::Skip(SkipDirective { id, reason })
}

fn requirement_params(requirements: &FeatureRequirements) -> BTreeMap<String, serde_json::Value> {
    let mut params = BTreeMap::new();
    params.insert("required".to_string(), serde_json::json!(requirements.required));
    params.insert("optional".to_string(), serde_json::json!(requirements.optional));
    params
}

/// Everything a planned case needs at execution time
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub case: PlannedCase,
    pub base_url: String,
    store: Arc<ConfigStore>,
    factory: TestDataFactory,
}

impl ExecutionContext {
    pub fn new(case: PlannedCase, store: Arc<ConfigStore>, factory: TestDataFactory) -> Result<Self, ConfigurationError> {
        let base_url = store.get_profile(&case.version)?.base_url;
        Ok(Self {
            case,
            base_url,
            store,
            factory,
        })
    }

    pub fn version(&self) -> &str {
        &self.case.version
    }

    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.case.param(name)
    }

    /// The `operation` axis value, when the plan has one
    pub fn operation(&self) -> Option<Operation> {
        self.param("operation")
            .and_then(|value| value.as_str())
            .and_then(|name| name.parse().ok())
    }

    pub fn endpoint(&self, resource: &str, params: &BTreeMap<String, String>) -> Result<String, ConfigurationError> {
        self.store.resolve_endpoint(&self.case.version, resource, params)
    }

    pub fn url(&self, resource: &str, params: &BTreeMap<String, String>) -> Result<String, ConfigurationError> {
        self.store.resolve_url(&self.case.version, resource, params)
    }

    pub fn payload(
        &self,
        resource: &str,
        operation: Operation,
        overrides: &Payload,
    ) -> Result<Payload, TestDataGenerationError> {
        self.factory.create(resource, operation, &self.case.version, overrides)
    }

    pub fn factory(&self) -> &TestDataFactory {
        &self.factory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::logic::{DataSynthesizer, GeneratorRules, TemplateRegistry};
    use crate::seed::{load_default_templates, relationship_hints, sample_document};
    use crate::store::{MemorySource, RelationshipCache};
    use serde_json::json;

    struct Fixture {
        source: Arc<MemorySource>,
        store: Arc<ConfigStore>,
        selector: Selector,
    }

    fn fixture() -> Fixture {
        let source = Arc::new(MemorySource::new("clinic", sample_document()));
        let store = Arc::new(ConfigStore::from_source(source.clone()).unwrap());
        let selector = Selector::new(Arc::new(CapabilityResolver::new(store.clone())));
        Fixture {
            source,
            store,
            selector,
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_requirements_runs_everywhere() {
        let f = fixture();
        let plan = f.selector.build_plan(&[], &[], None);
        let versions: Vec<_> = plan.iter().filter_map(|e| e.as_case()).map(|c| c.version.clone()).collect();
        assert_eq!(versions, strings(&["v1", "v2"]));
    }

    #[test]
    fn test_unsupported_feature_yields_single_skip() {
        let f = fixture();
        let plan = f.selector.build_plan(&strings(&["teleportation"]), &[], None);
        assert_eq!(plan.len(), 1);
        assert!(plan[0].is_skip());
        assert!(plan[0].id().starts_with("skip-"));
        match &plan[0] {
            PlanEntry::Skip(skip) => assert!(skip.reason.contains("teleportation")),
            PlanEntry::Run(_) => unreachable!(),
        }
    }

    #[test]
    fn test_dependency_graph_filters_versions() {
        let f = fixture();
        let mut document = sample_document();
        document["versions"]["v2"]["features"]["enhanced_filtering"] = json!(false);
        f.source.set_document(document);
        f.store.reload().unwrap();

        let mut graph = DependencyGraph::new();
        graph.insert("statistics".to_string(), strings(&["enhanced_filtering"]));

        let without = f.selector.build_plan(&strings(&["statistics"]), &[], None);
        assert_eq!(without.len(), 1);
        assert!(!without[0].is_skip());

        let with = f.selector.build_plan(&strings(&["statistics"]), &[], Some(&graph));
        assert!(with[0].is_skip());
    }

    #[test]
    fn test_axes_product_and_warnings() {
        let f = fixture();
        let requirements = FeatureRequirements::new().prefer("health_records");
        let axes = vec![
            ParamAxis::new("operation", ["create", "update"]),
            ParamAxis::new("resource", ["pet"]),
        ];
        let plan = f.selector.build_plan_with_axes(&requirements, &axes);
        assert_eq!(plan.len(), 4);

        let first = plan[0].as_case().unwrap();
        assert_eq!(first.version, "v1");
        assert_eq!(first.param("operation"), Some(&json!("create")));
        assert_eq!(first.warnings.len(), 1);
        assert!(plan[2].as_case().unwrap().warnings.is_empty());

        // ids are stable and distinct
        let again = f.selector.build_plan_with_axes(&requirements, &axes);
        assert_eq!(plan, again);
        let ids: Vec<_> = plan.iter().map(|e| e.id().to_string()).unique().collect();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_empty_axis_yields_skip() {
        let f = fixture();
        let requirements = FeatureRequirements::new().require("health_records");
        let axes = vec![
            ParamAxis::new("resource", ["pet"]),
            ParamAxis::new("operation", Vec::<String>::new()),
        ];
        let plan = f.selector.build_plan_with_axes(&requirements, &axes);
        assert_eq!(plan.len(), 1);
        match &plan[0] {
            PlanEntry::Skip(skip) => {
                assert!(skip.reason.contains("'operation'"));
                assert!(skip.reason.contains("v2"));
                assert!(skip.id.starts_with("skip-"));
            }
            PlanEntry::Run(_) => panic!("expected skip"),
        }
    }

    #[test]
    fn test_recheck_observes_reload() {
        let f = fixture();
        let requirements = FeatureRequirements::new().require("health_records");
        let plan = f.selector.build_plan_with_axes(&requirements, &[]);
        let case = plan[0].as_case().unwrap().clone();
        assert_eq!(f.selector.recheck(&case, &requirements), RuntimeCheck::Proceed);

        let mut document = sample_document();
        document["versions"]["v2"]["features"]["health_records"] = json!(false);
        f.source.set_document(document);
        f.store.reload().unwrap();
        assert!(matches!(f.selector.recheck(&case, &requirements), RuntimeCheck::Skip { .. }));

        let mut document = sample_document();
        document["versions"].as_object_mut().unwrap().remove("v2");
        f.source.set_document(document);
        f.store.reload().unwrap();
        match f.selector.recheck(&case, &requirements) {
            RuntimeCheck::Skip { reason } => assert!(reason.contains("no longer configured")),
            RuntimeCheck::Proceed => panic!("expected skip"),
        }
    }

    #[test]
    fn test_execution_context() {
        let f = fixture();
        let templates = Arc::new(TemplateRegistry::new());
        load_default_templates(&templates).unwrap();
        let synth = DataSynthesizer::new(
            f.store.clone(),
            templates,
            Arc::new(RelationshipCache::new()),
            GeneratorRules::standard().with_relationship_hints(relationship_hints()),
            &EngineSettings::default().with_seed(1),
        );
        let factory = TestDataFactory::new(Arc::new(synth));

        let axes = vec![ParamAxis::new("operation", ["create"])];
        let plan = f
            .selector
            .build_plan_with_axes(&FeatureRequirements::new().require("health_records"), &axes);
        let ctx = ExecutionContext::new(plan[0].as_case().unwrap().clone(), f.store.clone(), factory).unwrap();

        assert_eq!(ctx.version(), "v2");
        assert_eq!(ctx.base_url, "http://localhost:8000/api/v2");
        assert_eq!(ctx.operation(), Some(Operation::Create));

        let mut params = BTreeMap::new();
        params.insert("pet_id".to_string(), "3".to_string());
        assert_eq!(ctx.endpoint("health_records", &params).unwrap(), "/pets/3/health-records");

        let record = ctx.payload("health_record", Operation::Create, &Payload::new()).unwrap();
        assert!(record.contains_key("record_type"));
    }
}
