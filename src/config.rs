use serde::{Deserialize, Serialize};

/// How relationship identifiers are minted when nothing is cached yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdStrategy {
    /// Positive integers, matching auto-increment primary keys
    Numeric,
    /// UUID strings
    Uuid,
}

impl Default for IdStrategy {
    fn default() -> Self {
        IdStrategy::Numeric
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Path of the version configuration document (JSON or YAML)
    pub config_path: String,
    /// Seed for field generators; `None` draws from OS entropy
    pub seed: Option<u64>,
    pub id_strategy: IdStrategy,
    /// Register the built-in pet clinic templates on engine construction
    pub register_default_templates: bool,
    pub log_level: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            config_path: "config/api_versions.yaml".to_string(),
            seed: None,
            id_strategy: IdStrategy::Numeric,
            register_default_templates: true,
            log_level: "info".to_string(),
        }
    }
}

impl EngineSettings {
    /// Load settings from defaults, an optional `apiver` file and `APIVER_*`
    /// environment variables, in that order of precedence
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&EngineSettings::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("apiver").required(false));

        // Add environment variables with prefix "APIVER_"
        config = config.add_source(
            config::Environment::with_prefix("APIVER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = config.build()?;
        let settings: EngineSettings = config.try_deserialize()?;

        Ok(settings)
    }

    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }
}
