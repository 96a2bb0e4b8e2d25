use crate::model::{has_value, Operation, Payload};
use crate::store::ConfigStore;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern compiles")
});

const POSITIVE_FIELDS: &[&str] = &["weight", "cost", "price", "amount"];

// Flags and counters borrow words like "email" or "date" without holding one
fn is_flag_or_counter(lowered: &str) -> bool {
    lowered.ends_with("_verified")
        || lowered.starts_with("is_")
        || lowered.starts_with("has_")
        || lowered.ends_with("count")
}

fn is_positive_field(lowered: &str) -> bool {
    lowered.ends_with("fee") || POSITIVE_FIELDS.iter().any(|name| lowered.contains(name))
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn is_valid_date(text: &str) -> bool {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(text).is_ok()
}

/// Check a payload against the version's schema and return every violation
/// found. An empty list means the payload is valid.
///
/// Unknown versions and schemas are reported as violations, never raised.
pub fn validate_data_against_schema(
    store: &ConfigStore,
    payload: &Payload,
    version: &str,
    resource: &str,
    operation: Operation,
) -> Vec<String> {
    let schema = operation.schema_name(resource);
    let profile = match store.get_profile(version) {
        Ok(profile) => profile,
        Err(e) => return vec![e.to_string()],
    };

    let mut violations = Vec::new();

    for field in profile.required_for(&schema) {
        if !has_value(payload, field) {
            violations.push(format!("Missing required field: {}", field));
        }
    }

    for (field, value) in payload {
        if value.is_null() {
            continue;
        }
        let lowered = field.to_ascii_lowercase();
        if is_flag_or_counter(&lowered) {
            continue;
        }

        if lowered.contains("email") {
            let valid = value.as_str().map_or(false, |email| EMAIL_RE.is_match(email));
            if !valid {
                violations.push(format!("Invalid email format in '{}': {}", field, value));
            }
        }

        if is_positive_field(&lowered) {
            match parse_number(value) {
                Some(n) if n > 0.0 => {}
                Some(_) => violations.push(format!("Field '{}' must be positive, got {}", field, value)),
                None => violations.push(format!("Field '{}' must be a number, got {}", field, value)),
            }
        }

        if lowered.contains("date") {
            let valid = value.as_str().map_or(false, is_valid_date);
            if !valid {
                violations.push(format!("Invalid date format in '{}': {}", field, value));
            }
        }
    }

    if let Some(nested) = profile.nested_fields.get(&schema) {
        for (field, subfields) in nested {
            let Some(value) = payload.get(field) else {
                continue;
            };
            match value.as_object() {
                Some(object) => {
                    for subfield in subfields {
                        if !has_value(object, subfield) {
                            violations.push(format!("Missing nested field: {}.{}", field, subfield));
                        }
                    }
                }
                None if value.is_null() => {}
                None => violations.push(format!("Field '{}' must be an object", field)),
            }
        }
    }

    violations
}
