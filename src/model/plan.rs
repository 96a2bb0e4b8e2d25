use crate::model::{generate_case_id, Id};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Feature -> features it depends on
pub type DependencyGraph = BTreeMap<String, Vec<String>>;

/// Features a test needs (required) or can use when present (optional)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRequirements {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<DependencyGraph>,
}

impl FeatureRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, feature: impl Into<String>) -> Self {
        self.required.push(feature.into());
        self
    }

    pub fn prefer(mut self, feature: impl Into<String>) -> Self {
        self.optional.push(feature.into());
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyGraph) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

/// A secondary plan dimension, e.g. `operation = [create, update]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamAxis {
    pub name: String,
    pub values: Vec<serde_json::Value>,
}

impl ParamAxis {
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// One concrete (version, parameters) combination to execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedCase {
    pub id: Id,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, serde_json::Value>,
    /// Optional features this version lacks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PlannedCase {
    pub fn new(version: impl Into<String>, params: BTreeMap<String, serde_json::Value>) -> Self {
        let version = version.into();
        Self {
            id: generate_case_id(&version, &params),
            version,
            params,
            warnings: Vec::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&serde_json::Value> {
        self.params.get(name)
    }
}

/// A visible, non-failing skip with its reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipDirective {
    pub id: Id,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlanEntry {
    Run(PlannedCase),
    Skip(SkipDirective),
}

impl PlanEntry {
    pub fn id(&self) -> &str {
        match self {
            PlanEntry::Run(case) => &case.id,
            PlanEntry::Skip(skip) => &skip.id,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, PlanEntry::Skip(_))
    }

    pub fn as_case(&self) -> Option<&PlannedCase> {
        match self {
            PlanEntry::Run(case) => Some(case),
            PlanEntry::Skip(_) => None,
        }
    }
}

/// Result of re-checking a planned case right before it runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuntimeCheck {
    Proceed,
    Skip { reason: String },
}
