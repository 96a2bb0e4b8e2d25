use crate::config::EngineSettings;
use crate::error::ConfigurationError;
use crate::logic::{CapabilityResolver, DataSynthesizer, GeneratorRules, Selector, TemplateRegistry, TestDataFactory};
use crate::seed;
use crate::store::{ConfigStore, ProfileSource, RelationshipCache};
use anyhow::Context;
use log::info;
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL_ENGINE: OnceCell<Engine> = OnceCell::new();

/// Every component of the engine, wired once and shared by reference
#[derive(Debug, Clone)]
pub struct Engine {
    settings: EngineSettings,
    store: Arc<ConfigStore>,
    templates: Arc<TemplateRegistry>,
    cache: Arc<RelationshipCache>,
    synthesizer: Arc<DataSynthesizer>,
    factory: TestDataFactory,
    resolver: Arc<CapabilityResolver>,
    selector: Selector,
}

impl Engine {
    /// Build an engine over an already loaded store
    pub fn new(store: ConfigStore, settings: EngineSettings) -> anyhow::Result<Self> {
        let store = Arc::new(store);
        let templates = Arc::new(TemplateRegistry::new());
        if settings.register_default_templates {
            seed::load_default_templates(&templates)?;
        }

        let cache = Arc::new(RelationshipCache::new());
        let rules = GeneratorRules::standard().with_relationship_hints(seed::relationship_hints());
        let synthesizer = Arc::new(DataSynthesizer::new(
            store.clone(),
            templates.clone(),
            cache.clone(),
            rules,
            &settings,
        ));
        let factory = TestDataFactory::new(synthesizer.clone());
        let resolver = Arc::new(CapabilityResolver::new(store.clone()));
        let selector = Selector::new(resolver.clone());

        info!(
            "Engine ready: {} version(s), {} template(s)",
            store.list_versions().len(),
            templates.len()
        );

        Ok(Self {
            settings,
            store,
            templates,
            cache,
            synthesizer,
            factory,
            resolver,
            selector,
        })
    }

    /// Load the document named by `settings.config_path`
    pub fn from_settings(settings: EngineSettings) -> anyhow::Result<Self> {
        let store = ConfigStore::load(&settings.config_path)
            .with_context(|| format!("Failed to load API version configuration from {}", settings.config_path))?;
        Self::new(store, settings)
    }

    pub fn from_source(source: Arc<dyn ProfileSource>, settings: EngineSettings) -> anyhow::Result<Self> {
        Self::new(ConfigStore::from_source(source)?, settings)
    }

    /// Reload the configuration; on success the capability memo is dropped
    /// so answers reflect the new document
    pub fn reload(&self) -> Result<bool, ConfigurationError> {
        let changed = self.store.reload()?;
        if changed {
            self.resolver.clear_cache();
        }
        Ok(changed)
    }

    /// Clear the relationship cache and capability memo together
    pub fn reset(&self) {
        self.cache.clear();
        self.resolver.clear_cache();
        info!("Engine state reset");
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    pub fn relationship_cache(&self) -> &Arc<RelationshipCache> {
        &self.cache
    }

    pub fn synthesizer(&self) -> &Arc<DataSynthesizer> {
        &self.synthesizer
    }

    pub fn factory(&self) -> &TestDataFactory {
        &self.factory
    }

    pub fn resolver(&self) -> &Arc<CapabilityResolver> {
        &self.resolver
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

/// The process-wide engine, built from `EngineSettings::load()` on first use.
///
/// Concurrent first callers block until one of them finishes construction;
/// a failed construction is returned to its caller and retried next time.
pub fn global() -> anyhow::Result<&'static Engine> {
    GLOBAL_ENGINE.get_or_try_init(|| Engine::from_settings(EngineSettings::load()?))
}

/// Like `global`, but builds the engine from `settings` when none exists yet.
/// An engine that is already installed wins and `settings` is ignored.
pub fn init(settings: EngineSettings) -> anyhow::Result<&'static Engine> {
    GLOBAL_ENGINE.get_or_try_init(|| Engine::from_settings(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Operation, Payload};
    use crate::seed::sample_document;
    use crate::store::MemorySource;
    use serde_json::json;

    fn engine(source: Arc<MemorySource>) -> Engine {
        Engine::from_source(source, EngineSettings::default().with_seed(9)).unwrap()
    }

    #[test]
    fn test_engine_wires_components() {
        let engine = engine(Arc::new(MemorySource::new("clinic", sample_document())));
        assert_eq!(engine.store().list_versions(), vec!["v1".to_string(), "v2".to_string()]);
        assert!(engine.templates().get("pet", Operation::Create).is_some());
        assert!(engine.resolver().is_available("v2", "health_records"));
        assert_eq!(engine.selector().build_plan(&[], &[], None).len(), 2);
    }

    #[test]
    fn test_reset_clears_cache_and_memo() {
        let engine = engine(Arc::new(MemorySource::new("clinic", sample_document())));
        engine
            .factory()
            .pet("v2", &Payload::new())
            .unwrap();
        engine.resolver().is_available("v1", "statistics");
        assert!(!engine.relationship_cache().is_empty());
        assert!(engine.resolver().memo_len() > 0);

        engine.reset();
        assert!(engine.relationship_cache().is_empty());
        assert_eq!(engine.resolver().memo_len(), 0);
    }

    #[test]
    fn test_reload_invalidates_memo() {
        let source = Arc::new(MemorySource::new("clinic", sample_document()));
        let engine = engine(source.clone());
        assert!(!engine.resolver().is_available("v1", "statistics"));

        let mut document = sample_document();
        document["versions"]["v1"]["features"]["statistics"] = json!(true);
        source.set_document(document);

        assert!(engine.reload().unwrap());
        assert!(engine.resolver().is_available("v1", "statistics"));
        assert_eq!(engine.store().generation(), 1);
    }

    #[test]
    fn test_default_templates_can_be_disabled() {
        let mut settings = EngineSettings::default();
        settings.register_default_templates = false;
        let engine = Engine::from_source(Arc::new(MemorySource::new("clinic", sample_document())), settings).unwrap();
        assert!(engine.templates().is_empty());
        // factory still produces payloads through direct generation
        assert!(engine.factory().pet("v1", &Payload::new()).is_ok());
    }

    #[test]
    fn test_from_settings_missing_file() {
        let settings = EngineSettings::default().with_config_path("does/not/exist.yaml");
        let err = Engine::from_settings(settings).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.yaml"));
    }
}
