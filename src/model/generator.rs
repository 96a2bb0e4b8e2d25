use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named value producer used to fill payload fields.
///
/// This is pure data; evaluation lives in `logic::generators`. Only
/// `Relationship` is stateful: it goes through the relationship cache so the
/// same key yields the same identifier for the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldGenerator {
    /// Always the same value
    Fixed { value: serde_json::Value },
    /// `<prefix> <random alphanumeric suffix>`
    Text { prefix: String },
    /// `<prefix>_<lowercase alphanumeric suffix>`, safe for usernames and codes
    Slug { prefix: String },
    /// Human first + last name
    PersonName,
    /// Pet name from a fixed list
    PetName,
    Email,
    Phone,
    Integer { min: i64, max: i64 },
    Decimal { min: f64, max: f64, precision: u32 },
    /// `YYYY-MM-DD`, offset in days from today within the inclusive window
    Date { min_offset_days: i64, max_offset_days: i64 },
    /// RFC 3339 timestamp, offset in days from now within the inclusive window
    DateTime { min_offset_days: i64, max_offset_days: i64 },
    /// `HH:MM` during business hours
    TimeOfDay,
    Boolean,
    Choice { options: Vec<serde_json::Value> },
    Uuid,
    /// Identifier of another synthesized resource
    Relationship { resource: String },
    /// Nested object built from sub-generators
    Composite { fields: BTreeMap<String, FieldGenerator> },
}

impl FieldGenerator {
    pub fn fixed(value: serde_json::Value) -> Self {
        FieldGenerator::Fixed { value }
    }

    pub fn text(prefix: impl Into<String>) -> Self {
        FieldGenerator::Text {
            prefix: prefix.into(),
        }
    }

    pub fn slug(prefix: impl Into<String>) -> Self {
        FieldGenerator::Slug {
            prefix: prefix.into(),
        }
    }

    pub fn integer(min: i64, max: i64) -> Self {
        FieldGenerator::Integer { min, max }
    }

    pub fn decimal(min: f64, max: f64, precision: u32) -> Self {
        FieldGenerator::Decimal {
            min,
            max,
            precision,
        }
    }

    pub fn date_within(min_offset_days: i64, max_offset_days: i64) -> Self {
        FieldGenerator::Date {
            min_offset_days,
            max_offset_days,
        }
    }

    pub fn datetime_within(min_offset_days: i64, max_offset_days: i64) -> Self {
        FieldGenerator::DateTime {
            min_offset_days,
            max_offset_days,
        }
    }

    pub fn choice<I, V>(options: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<serde_json::Value>,
    {
        FieldGenerator::Choice {
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn relationship(resource: impl Into<String>) -> Self {
        FieldGenerator::Relationship {
            resource: resource.into(),
        }
    }

    pub fn composite<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldGenerator)>,
        K: Into<String>,
    {
        FieldGenerator::Composite {
            fields: fields.into_iter().map(|(k, g)| (k.into(), g)).collect(),
        }
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            FieldGenerator::Fixed { .. } => "fixed",
            FieldGenerator::Text { .. } => "text",
            FieldGenerator::Slug { .. } => "slug",
            FieldGenerator::PersonName => "person_name",
            FieldGenerator::PetName => "pet_name",
            FieldGenerator::Email => "email",
            FieldGenerator::Phone => "phone",
            FieldGenerator::Integer { .. } => "integer",
            FieldGenerator::Decimal { .. } => "decimal",
            FieldGenerator::Date { .. } => "date",
            FieldGenerator::DateTime { .. } => "date_time",
            FieldGenerator::TimeOfDay => "time_of_day",
            FieldGenerator::Boolean => "boolean",
            FieldGenerator::Choice { .. } => "choice",
            FieldGenerator::Uuid => "uuid",
            FieldGenerator::Relationship { .. } => "relationship",
            FieldGenerator::Composite { .. } => "composite",
        }
    }
}
