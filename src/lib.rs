pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod registry;
pub mod seed;
pub mod store;

pub use config::{EngineSettings, IdStrategy};
pub use error::{ConfigurationError, TemplateError, TestDataGenerationError};

// Export logic types
pub use logic::{
    validate_data_against_schema, CapabilityResolver, DataSynthesizer, DependencyReport, ExecutionContext,
    FieldPattern, GeneratorRules, Selector, SkipDecision, TemplateRegistry, TestDataFactory, VersionComparison,
};

// Export all model types
pub use model::*;

pub use registry::Engine;

// Export store types
pub use store::{ConfigStore, FileSource, MemorySource, ProfileSource, RelationshipCache};
