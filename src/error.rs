use std::path::PathBuf;

/// Errors raised while loading or querying the version configuration.
///
/// Every variant names the offending key so a failing test points straight at
/// the broken part of the document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("io error reading configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration {origin} could not be parsed: {message}")]
    Parse { origin: String, message: String },

    #[error("configuration {origin} is empty")]
    EmptyDocument { origin: String },

    #[error("configuration {origin} must be a mapping at the top level")]
    NotAMapping { origin: String },

    #[error("configuration {origin} has no 'versions' section or it is empty")]
    MissingVersions { origin: String },

    #[error("version '{version}' is missing required section '{section}'")]
    MissingSection { version: String, section: String },

    #[error("version '{version}' section '{section}' must be {expected}")]
    InvalidSection {
        version: String,
        section: String,
        expected: String,
    },

    #[error("version '{version}' section '{section}' entry '{key}' must be {expected}")]
    InvalidEntry {
        version: String,
        section: String,
        key: String,
        expected: String,
    },

    #[error("'global_settings' must be a mapping")]
    InvalidGlobalSettings,

    #[error("unknown version '{0}'")]
    UnknownVersion(String),

    #[error("version '{version}' has no endpoint for resource '{resource}'")]
    UnknownResource { version: String, resource: String },

    #[error("version '{version}' has no schema '{schema}'")]
    UnknownSchema { version: String, schema: String },

    #[error("endpoint '{resource}' in version '{version}' needs a value for placeholder '{placeholder}'")]
    UnboundPlaceholder {
        version: String,
        resource: String,
        placeholder: String,
    },

    #[error("endpoint '{resource}' in version '{version}' is malformed: {template}")]
    MalformedEndpoint {
        version: String,
        resource: String,
        template: String,
    },

    #[error("unknown operation '{0}'")]
    UnknownOperation(String),
}

impl ConfigurationError {
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn missing_section(version: &str, section: &str) -> Self {
        Self::MissingSection {
            version: version.to_string(),
            section: section.to_string(),
        }
    }

    pub fn invalid_section(version: &str, section: &str, expected: &str) -> Self {
        Self::InvalidSection {
            version: version.to_string(),
            section: section.to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn invalid_entry(version: &str, section: &str, key: &str, expected: &str) -> Self {
        Self::InvalidEntry {
            version: version.to_string(),
            section: section.to_string(),
            key: key.to_string(),
            expected: expected.to_string(),
        }
    }
}

/// Errors raised by templated payload generation. These are recoverable: the
/// factory falls back to direct generation when it sees one.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("no template registered for {resource}/{operation}")]
    NotRegistered { resource: String, operation: String },

    #[error("template for {resource}/{operation} is already registered")]
    DuplicateTemplate { resource: String, operation: String },

    #[error("{resource}/{operation} payload for {version} is missing required fields: {}", .fields.join(", "))]
    MissingRequiredFields {
        resource: String,
        operation: String,
        version: String,
        fields: Vec<String>,
    },

    #[error("{resource}/{operation} payload for {version} rejected by rule '{rule}'")]
    RuleRejected {
        resource: String,
        operation: String,
        version: String,
        rule: String,
    },

    #[error("configuration error during generation: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Terminal data generation failures.
#[derive(Debug, thiserror::Error)]
pub enum TestDataGenerationError {
    #[error("version '{version}' does not support feature '{feature}' needed to generate '{resource}'")]
    FeatureUnsupported {
        resource: String,
        version: String,
        feature: String,
    },

    #[error("could not generate {resource}/{operation} for {version}: template failed ({template_reason}); fallback failed ({fallback_reason})")]
    FallbackFailed {
        resource: String,
        operation: String,
        version: String,
        template_reason: String,
        fallback_reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_names_key() {
        let err = ConfigurationError::missing_section("v2", "endpoints");
        assert_eq!(
            err.to_string(),
            "version 'v2' is missing required section 'endpoints'"
        );

        let err = ConfigurationError::UnboundPlaceholder {
            version: "v1".to_string(),
            resource: "pet".to_string(),
            placeholder: "pet_id".to_string(),
        };
        assert!(err.to_string().contains("'pet_id'"));
    }

    #[test]
    fn test_missing_required_fields_lists_all() {
        let err = TemplateError::MissingRequiredFields {
            resource: "pet".to_string(),
            operation: "create".to_string(),
            version: "v1".to_string(),
            fields: vec!["name".to_string(), "species".to_string()],
        };
        assert!(err.to_string().ends_with("name, species"));
    }

    #[test]
    fn test_configuration_converts_into_template_error() {
        let err: TemplateError = ConfigurationError::UnknownVersion("v9".to_string()).into();
        assert!(matches!(
            err,
            TemplateError::Configuration(ConfigurationError::UnknownVersion(_))
        ));
    }

    #[test]
    fn test_fallback_failure_keeps_both_reasons() {
        let err = TestDataGenerationError::FallbackFailed {
            resource: "pet".to_string(),
            operation: "create".to_string(),
            version: "v3".to_string(),
            template_reason: "no template".to_string(),
            fallback_reason: "unknown version".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("no template"));
        assert!(message.contains("unknown version"));
    }
}
