use crate::model::DependencyGraph;
use crate::store::ConfigStore;
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// Outcome of checking a feature and its (transitive) dependencies in one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyReport {
    pub feature: String,
    pub feature_available: bool,
    pub valid: bool,
    pub missing_dependencies: Vec<String>,
    pub available_dependencies: Vec<String>,
    /// Cycles found while walking the graph; these never invalidate the report
    pub warnings: Vec<String>,
}

/// Skip verdict for one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipDecision {
    pub skip: bool,
    pub reason: Option<String>,
    /// Optional features the version lacks
    pub warnings: Vec<String>,
}

/// Features gained and lost moving from one version to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub from: String,
    pub to: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub common: Vec<String>,
}

/// Answers feature availability questions, memoized per `version:feature`.
///
/// Each memo entry carries the store generation it was read under; entries
/// from an older generation are ignored and recomputed.
#[derive(Debug)]
pub struct CapabilityResolver {
    store: Arc<ConfigStore>,
    memo: RwLock<HashMap<String, (u64, bool)>>,
}

impl CapabilityResolver {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            memo: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn is_available(&self, version: &str, feature: &str) -> bool {
        let key = format!("{}:{}", version, feature);
        // read before the lookup: a reload swaps profiles before bumping the counter
        let generation = self.store.generation();
        if let Some((stamp, available)) = self.memo.read().get(&key) {
            if *stamp == generation {
                return *available;
            }
        }
        let available = self.store.get_feature_availability(version, feature);
        let mut memo = self.memo.write();
        match memo.get(&key) {
            Some((stamp, _)) if *stamp > generation => {}
            _ => {
                memo.insert(key, (generation, available));
            }
        }
        available
    }

    /// Required features `version` does not provide, in input order
    pub fn missing_features(&self, version: &str, required: &[String]) -> Vec<String> {
        required
            .iter()
            .filter(|feature| !self.is_available(version, feature))
            .cloned()
            .collect()
    }

    /// Walk `feature`'s dependencies depth-first. Cycles, including a feature
    /// listed as its own dependency, are reported as warnings.
    pub fn validate_dependencies(&self, version: &str, feature: &str, graph: &DependencyGraph) -> DependencyReport {
        let mut visited = BTreeSet::new();
        let mut path = vec![feature.to_string()];
        let mut warnings = Vec::new();
        let mut missing = Vec::new();
        let mut available = Vec::new();

        visited.insert(feature.to_string());
        self.walk_dependencies(
            version,
            feature,
            graph,
            &mut visited,
            &mut path,
            &mut warnings,
            &mut missing,
            &mut available,
        );

        for warning in &warnings {
            debug!("{}", warning);
        }

        DependencyReport {
            feature: feature.to_string(),
            feature_available: self.is_available(version, feature),
            valid: missing.is_empty(),
            missing_dependencies: missing,
            available_dependencies: available,
            warnings,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_dependencies(
        &self,
        version: &str,
        feature: &str,
        graph: &DependencyGraph,
        visited: &mut BTreeSet<String>,
        path: &mut Vec<String>,
        warnings: &mut Vec<String>,
        missing: &mut Vec<String>,
        available: &mut Vec<String>,
    ) {
        let Some(dependencies) = graph.get(feature) else {
            return;
        };

        for dependency in dependencies {
            if path.contains(dependency) {
                warnings.push(format!(
                    "Circular dependency: {} -> {}",
                    path.join(" -> "),
                    dependency
                ));
                continue;
            }
            if !visited.insert(dependency.clone()) {
                continue;
            }

            if self.is_available(version, dependency) {
                available.push(dependency.clone());
            } else {
                missing.push(dependency.clone());
            }

            path.push(dependency.clone());
            self.walk_dependencies(version, dependency, graph, visited, path, warnings, missing, available);
            path.pop();
        }
    }

    /// Skip iff a required feature is unavailable. Missing optional features
    /// only produce warnings.
    pub fn should_skip(&self, version: &str, required: &[String], optional: &[String]) -> SkipDecision {
        let missing = self.missing_features(version, required);
        let warnings: Vec<String> = optional
            .iter()
            .filter(|feature| !self.is_available(version, feature))
            .map(|feature| format!("Optional feature '{}' not available in {}", feature, version))
            .collect();

        if missing.is_empty() {
            SkipDecision {
                skip: false,
                reason: None,
                warnings,
            }
        } else {
            SkipDecision {
                skip: true,
                reason: Some(format!(
                    "Required features not available in {}: {}",
                    version,
                    missing.join(", ")
                )),
                warnings,
            }
        }
    }

    /// version -> feature -> available, across every feature any version declares
    pub fn feature_matrix(&self) -> BTreeMap<String, BTreeMap<String, bool>> {
        let snapshot = self.store.snapshot();
        let features = snapshot.all_features();
        snapshot
            .version_ids()
            .into_iter()
            .map(|version| {
                let row = features
                    .iter()
                    .map(|feature| (feature.clone(), self.is_available(&version, feature)))
                    .collect();
                (version, row)
            })
            .collect()
    }

    pub fn versions_with_feature(&self, feature: &str) -> Vec<String> {
        self.store
            .list_versions()
            .into_iter()
            .filter(|version| self.is_available(version, feature))
            .collect()
    }

    pub fn compare_versions(&self, from: &str, to: &str) -> VersionComparison {
        let enabled = |version: &str| -> BTreeSet<String> {
            self.store
                .snapshot()
                .get(version)
                .map(|profile| profile.features.enabled().map(str::to_string).collect())
                .unwrap_or_default()
        };
        let before = enabled(from);
        let after = enabled(to);

        VersionComparison {
            from: from.to_string(),
            to: to.to_string(),
            added: after.difference(&before).cloned().collect(),
            removed: before.difference(&after).cloned().collect(),
            common: before.intersection(&after).cloned().collect(),
        }
    }

    /// Drop every memoized answer. Call after the configuration reloads.
    pub fn clear_cache(&self) {
        let mut memo = self.memo.write();
        let count = memo.len();
        memo.clear();
        info!("Cleared {} memoized capability answers", count);
    }

    pub fn memo_len(&self) -> usize {
        self.memo.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::sample_document;
    use crate::store::MemorySource;
    use serde_json::json;

    fn resolver() -> (Arc<MemorySource>, CapabilityResolver) {
        let source = Arc::new(MemorySource::new("clinic", sample_document()));
        let store = ConfigStore::from_source(source.clone()).unwrap();
        (source, CapabilityResolver::new(Arc::new(store)))
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_availability_is_memoized_until_cleared() {
        let (source, resolver) = resolver();
        assert!(!resolver.is_available("v1", "health_records"));
        assert!(!resolver.is_available("v1", "nonexistent"));
        assert!(!resolver.is_available("v9", "health_records"));
        assert_eq!(resolver.memo_len(), 3);

        let mut document = sample_document();
        document["versions"]["v1"]["features"]["health_records"] = json!(true);
        source.set_document(document);
        resolver.store().reload().unwrap();

        // entries from the previous generation are not served
        assert!(resolver.is_available("v1", "health_records"));
        assert_eq!(resolver.memo_len(), 3);

        resolver.clear_cache();
        assert_eq!(resolver.memo_len(), 0);
        assert!(resolver.is_available("v1", "health_records"));
    }

    #[test]
    fn test_answer_written_after_clear_is_not_served() {
        let (source, resolver) = resolver();
        let mut document = sample_document();
        document["versions"]["v1"]["features"]["statistics"] = json!(true);
        source.set_document(document);
        resolver.store().reload().unwrap();
        resolver.clear_cache();

        // a lookup that started before the reload finishes after the clear
        resolver.memo.write().insert("v1:statistics".to_string(), (0, false));
        assert!(resolver.is_available("v1", "statistics"));
        assert_eq!(resolver.memo.read()["v1:statistics"], (1, true));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lookups_during_reload_settle_on_new_answer() {
        let (source, resolver) = resolver();
        let resolver = Arc::new(resolver);

        let mut readers = Vec::new();
        for _ in 0..3 {
            let resolver = resolver.clone();
            readers.push(tokio::task::spawn_blocking(move || {
                for _ in 0..500 {
                    resolver.is_available("v1", "statistics");
                }
            }));
        }

        let reloader = {
            let resolver = resolver.clone();
            tokio::task::spawn_blocking(move || {
                for round in 0..50 {
                    let mut document = sample_document();
                    document["versions"]["v1"]["features"]["statistics"] = json!(round % 2 == 0);
                    source.set_document(document);
                    resolver.store().reload().unwrap();
                    resolver.clear_cache();
                }
            })
        };

        reloader.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        // last round (49) disables the feature
        assert!(!resolver.is_available("v1", "statistics"));
        assert!(!resolver.store().get_feature_availability("v1", "statistics"));
        println!("✓ memo never outlives a reload");
    }

    #[test]
    fn test_missing_features_and_skip() {
        let (_, resolver) = resolver();
        let required = strings(&["health_records", "statistics"]);
        assert_eq!(resolver.missing_features("v1", &required), required);
        assert!(resolver.missing_features("v2", &required).is_empty());

        let decision = resolver.should_skip("v1", &required, &[]);
        assert!(decision.skip);
        assert!(decision.reason.unwrap().contains("health_records, statistics"));

        let decision = resolver.should_skip("v1", &[], &strings(&["statistics"]));
        assert!(!decision.skip);
        assert_eq!(decision.warnings.len(), 1);
    }

    #[test]
    fn test_dependency_validation() {
        let (_, resolver) = resolver();
        let mut graph = DependencyGraph::new();
        graph.insert("statistics".to_string(), strings(&["enhanced_filtering"]));

        let report = resolver.validate_dependencies("v1", "statistics", &graph);
        assert!(!report.valid);
        assert!(!report.feature_available);
        assert_eq!(report.missing_dependencies, strings(&["enhanced_filtering"]));

        let report = resolver.validate_dependencies("v2", "statistics", &graph);
        assert!(report.valid);
        assert_eq!(report.available_dependencies, strings(&["enhanced_filtering"]));
    }

    #[test]
    fn test_transitive_dependencies_and_cycles() {
        let (_, resolver) = resolver();
        let mut graph = DependencyGraph::new();
        graph.insert("statistics".to_string(), strings(&["statistics", "enhanced_filtering"]));
        graph.insert("enhanced_filtering".to_string(), strings(&["batch_operations", "statistics"]));

        let report = resolver.validate_dependencies("v2", "statistics", &graph);
        assert!(report.valid);
        assert_eq!(report.available_dependencies, strings(&["enhanced_filtering", "batch_operations"]));
        assert_eq!(report.warnings.len(), 2);

        let report = resolver.validate_dependencies("v1", "statistics", &graph);
        assert_eq!(report.missing_dependencies, strings(&["enhanced_filtering", "batch_operations"]));
    }

    #[test]
    fn test_matrix_and_comparison() {
        let (_, resolver) = resolver();
        let matrix = resolver.feature_matrix();
        assert_eq!(matrix["v1"]["statistics"], false);
        assert_eq!(matrix["v2"]["statistics"], true);

        assert_eq!(resolver.versions_with_feature("health_records"), strings(&["v2"]));

        let comparison = resolver.compare_versions("v1", "v2");
        assert!(comparison.added.contains(&"health_records".to_string()));
        assert!(comparison.removed.is_empty());
    }
}
