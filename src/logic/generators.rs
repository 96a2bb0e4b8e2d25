use crate::config::IdStrategy;
use crate::model::FieldGenerator;
use crate::store::RelationshipCache;
use chrono::{Duration, SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const FIRST_NAMES: &[&str] = &[
    "Alice", "Bruno", "Chloe", "Daniel", "Elena", "Farid", "Grace", "Hiro", "Ines", "Jonas",
];
const LAST_NAMES: &[&str] = &[
    "Anderson", "Becker", "Costa", "Dubois", "Evans", "Fischer", "Garcia", "Hansen", "Ito", "Jensen",
];
const PET_NAMES: &[&str] = &[
    "Buddy", "Luna", "Max", "Bella", "Charlie", "Milo", "Daisy", "Rocky", "Nala", "Oscar",
];
const CITIES: &[&str] = &["Springfield", "Riverton", "Lakeside", "Fairview", "Greenville"];

/// Mutable state a generator may touch while producing a value
pub struct GenerationContext<'a> {
    pub version: &'a str,
    pub rng: &'a mut StdRng,
    pub cache: &'a RelationshipCache,
    pub id_strategy: IdStrategy,
}

impl<'a> GenerationContext<'a> {
    pub fn new(version: &'a str, rng: &'a mut StdRng, cache: &'a RelationshipCache, id_strategy: IdStrategy) -> Self {
        Self {
            version,
            rng,
            cache,
            id_strategy,
        }
    }

    /// Mint a fresh identifier without touching the cache
    pub fn new_identifier(&mut self) -> Value {
        new_identifier(self.rng, self.id_strategy)
    }
}

fn new_identifier(rng: &mut StdRng, id_strategy: IdStrategy) -> Value {
    match id_strategy {
        IdStrategy::Numeric => json!(rng.gen_range(1..=99_999u32)),
        IdStrategy::Uuid => json!(random_uuid(rng)),
    }
}

fn random_uuid(rng: &mut StdRng) -> String {
    let bytes: [u8; 16] = rng.gen();
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

fn random_suffix(rng: &mut StdRng, len: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn pick<'s>(rng: &mut StdRng, options: &'s [&'s str]) -> &'s str {
    options.choose(rng).copied().unwrap_or_default()
}

fn window(min: i64, max: i64) -> (i64, i64) {
    if min <= max {
        (min, max)
    } else {
        (max, min)
    }
}

impl FieldGenerator {
    /// Produce a value for `field`.
    ///
    /// Relationship generators bind `{version}:{resource}:{field}` in the
    /// cache on first use and return the bound identifier afterwards.
    pub fn generate(&self, field: &str, ctx: &mut GenerationContext<'_>) -> Value {
        match self {
            FieldGenerator::Fixed { value } => value.clone(),
            FieldGenerator::Text { prefix } => {
                let suffix = random_suffix(ctx.rng, 6);
                json!(format!("{} {}", prefix, suffix))
            }
            FieldGenerator::Slug { prefix } => {
                let suffix = random_suffix(ctx.rng, 8).to_lowercase();
                json!(format!("{}_{}", prefix, suffix))
            }
            FieldGenerator::PersonName => {
                let first = pick(ctx.rng, FIRST_NAMES);
                let last = pick(ctx.rng, LAST_NAMES);
                json!(format!("{} {}", first, last))
            }
            FieldGenerator::PetName => json!(pick(ctx.rng, PET_NAMES)),
            FieldGenerator::Email => {
                let first = pick(ctx.rng, FIRST_NAMES).to_lowercase();
                let suffix = random_suffix(ctx.rng, 6).to_lowercase();
                json!(format!("{}.{}@example.com", first, suffix))
            }
            FieldGenerator::Phone => {
                let exchange = ctx.rng.gen_range(100..=999);
                let line = ctx.rng.gen_range(0..=9999);
                json!(format!("555-{:03}-{:04}", exchange, line))
            }
            FieldGenerator::Integer { min, max } => {
                let (lo, hi) = window(*min, *max);
                json!(ctx.rng.gen_range(lo..=hi))
            }
            FieldGenerator::Decimal { min, max, precision } => {
                let (lo, hi) = if min <= max { (*min, *max) } else { (*max, *min) };
                let raw = if lo == hi { lo } else { ctx.rng.gen_range(lo..=hi) };
                let scale = 10f64.powi(*precision as i32);
                json!((raw * scale).round() / scale)
            }
            FieldGenerator::Date {
                min_offset_days,
                max_offset_days,
            } => {
                let (lo, hi) = window(*min_offset_days, *max_offset_days);
                let offset = ctx.rng.gen_range(lo..=hi);
                let date = Utc::now().date_naive() + Duration::days(offset);
                json!(date.format("%Y-%m-%d").to_string())
            }
            FieldGenerator::DateTime {
                min_offset_days,
                max_offset_days,
            } => {
                let (lo, hi) = window(*min_offset_days, *max_offset_days);
                let offset = ctx.rng.gen_range(lo..=hi);
                let at = Utc::now() + Duration::days(offset);
                json!(at.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            FieldGenerator::TimeOfDay => {
                let hour = ctx.rng.gen_range(9..=16);
                let minute = [0, 15, 30, 45].choose(ctx.rng).copied().unwrap_or(0);
                json!(format!("{:02}:{:02}", hour, minute))
            }
            FieldGenerator::Boolean => json!(ctx.rng.gen_bool(0.5)),
            FieldGenerator::Choice { options } => options.choose(ctx.rng).cloned().unwrap_or(Value::Null),
            FieldGenerator::Uuid => json!(random_uuid(ctx.rng)),
            FieldGenerator::Relationship { resource } => {
                let key = RelationshipCache::key(ctx.version, resource, field);
                let rng = &mut *ctx.rng;
                let id_strategy = ctx.id_strategy;
                ctx.cache
                    .get_or_insert_with(&key, || new_identifier(rng, id_strategy))
            }
            FieldGenerator::Composite { fields } => {
                let mut object = serde_json::Map::new();
                for (name, generator) in fields {
                    object.insert(name.clone(), generator.generate(name, ctx));
                }
                Value::Object(object)
            }
        }
    }
}

/// How a field name is matched by a pattern rule. Matching is ASCII
/// case-insensitive.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPattern {
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl FieldPattern {
    pub fn matches(&self, field: &str) -> bool {
        let field = field.to_ascii_lowercase();
        match self {
            FieldPattern::Contains(needle) => field.contains(needle.as_str()),
            FieldPattern::StartsWith(prefix) => field.starts_with(prefix.as_str()),
            FieldPattern::EndsWith(suffix) => field.ends_with(suffix.as_str()),
        }
    }
}

/// What a matching pattern rule produces
#[derive(Debug, Clone, PartialEq)]
pub enum RuleTarget {
    Generator(FieldGenerator),
    /// A relationship whose target resource comes from the hint table, or the
    /// field name minus `_id`
    InferredRelationship,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    pub pattern: FieldPattern,
    pub target: RuleTarget,
}

/// Ordered field-name to generator resolution.
///
/// Exact names win over patterns; patterns are tried in insertion order and
/// the first match wins.
#[derive(Debug, Clone, Default)]
pub struct GeneratorRules {
    exact: BTreeMap<String, FieldGenerator>,
    patterns: Vec<PatternRule>,
    relationship_hints: BTreeMap<String, String>,
}

impl GeneratorRules {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for the pet clinic domain.
    ///
    /// Pattern order: flags (`_verified`, `is_`, `has_`), counters, money and
    /// weight, email, phone, `_id`, `_at`, birth, date, time, notes and
    /// description, name. Flags and numbers come first so names like
    /// `email_verified` or `lifetime_cost` keep their type.
    pub fn standard() -> Self {
        GeneratorRules::empty()
            .with_exact("name", FieldGenerator::PetName)
            .with_exact("full_name", FieldGenerator::PersonName)
            .with_exact("first_name", FieldGenerator::choice(FIRST_NAMES.iter().copied()))
            .with_exact("last_name", FieldGenerator::choice(LAST_NAMES.iter().copied()))
            .with_exact("username", FieldGenerator::slug("user"))
            .with_exact("password", FieldGenerator::fixed(json!("Test-Passw0rd!")))
            .with_exact("species", FieldGenerator::choice(["dog", "cat", "bird", "rabbit", "hamster"]))
            .with_exact(
                "breed",
                FieldGenerator::choice(["Labrador", "Beagle", "Siamese", "Persian", "Mixed"]),
            )
            .with_exact("gender", FieldGenerator::choice(["male", "female", "unknown"]))
            .with_exact(
                "temperament",
                FieldGenerator::choice(["friendly", "calm", "anxious", "aggressive", "playful", "shy"]),
            )
            .with_exact("color", FieldGenerator::choice(["black", "white", "brown", "golden", "grey"]))
            .with_exact("age", FieldGenerator::integer(1, 15))
            .with_exact("role", FieldGenerator::choice(["owner", "veterinarian", "staff"]))
            .with_exact(
                "status",
                FieldGenerator::choice(["scheduled", "confirmed", "completed"]),
            )
            .with_exact("microchip_id", FieldGenerator::slug("chip"))
            .with_exact("reason", FieldGenerator::text("Visit reason"))
            .with_exact("diagnosis", FieldGenerator::text("Diagnosis"))
            .with_exact("treatment", FieldGenerator::text("Treatment"))
            .with_exact(
                "record_type",
                FieldGenerator::choice(["checkup", "vaccination", "surgery", "dental"]),
            )
            .with_exact(
                "address",
                FieldGenerator::composite([
                    ("street", FieldGenerator::text("Main Street")),
                    ("city", FieldGenerator::choice(CITIES.iter().copied())),
                    ("postal_code", FieldGenerator::integer(10000, 99999)),
                ]),
            )
            .with_exact(
                "emergency_contact",
                FieldGenerator::composite([
                    ("name", FieldGenerator::PersonName),
                    ("phone", FieldGenerator::Phone),
                ]),
            )
            .with_pattern(FieldPattern::EndsWith("_verified".into()), FieldGenerator::Boolean)
            .with_pattern(FieldPattern::StartsWith("is_".into()), FieldGenerator::Boolean)
            .with_pattern(FieldPattern::StartsWith("has_".into()), FieldGenerator::Boolean)
            .with_pattern(FieldPattern::EndsWith("count".into()), FieldGenerator::integer(1, 10))
            .with_pattern(FieldPattern::Contains("quantity".into()), FieldGenerator::integer(1, 10))
            .with_pattern(FieldPattern::Contains("cost".into()), FieldGenerator::decimal(10.0, 500.0, 2))
            .with_pattern(FieldPattern::Contains("price".into()), FieldGenerator::decimal(10.0, 500.0, 2))
            .with_pattern(FieldPattern::EndsWith("fee".into()), FieldGenerator::decimal(10.0, 500.0, 2))
            .with_pattern(FieldPattern::Contains("amount".into()), FieldGenerator::decimal(10.0, 500.0, 2))
            .with_pattern(FieldPattern::Contains("weight".into()), FieldGenerator::decimal(0.5, 80.0, 1))
            .with_pattern(FieldPattern::Contains("email".into()), FieldGenerator::Email)
            .with_pattern(FieldPattern::Contains("phone".into()), FieldGenerator::Phone)
            .with_inferred_relationship(FieldPattern::EndsWith("_id".into()))
            .with_pattern(FieldPattern::EndsWith("_at".into()), FieldGenerator::datetime_within(-30, 30))
            .with_pattern(FieldPattern::Contains("birth".into()), FieldGenerator::date_within(-3650, -60))
            .with_pattern(FieldPattern::Contains("date".into()), FieldGenerator::date_within(-30, 30))
            .with_pattern(FieldPattern::Contains("time".into()), FieldGenerator::TimeOfDay)
            .with_pattern(FieldPattern::Contains("notes".into()), FieldGenerator::text("Generated notes"))
            .with_pattern(
                FieldPattern::Contains("description".into()),
                FieldGenerator::text("Generated description"),
            )
            .with_pattern(FieldPattern::Contains("name".into()), FieldGenerator::PersonName)
    }

    pub fn with_exact(mut self, field: impl Into<String>, generator: FieldGenerator) -> Self {
        self.exact.insert(field.into(), generator);
        self
    }

    pub fn with_pattern(mut self, pattern: FieldPattern, generator: FieldGenerator) -> Self {
        self.patterns.push(PatternRule {
            pattern,
            target: RuleTarget::Generator(generator),
        });
        self
    }

    pub fn with_inferred_relationship(mut self, pattern: FieldPattern) -> Self {
        self.patterns.push(PatternRule {
            pattern,
            target: RuleTarget::InferredRelationship,
        });
        self
    }

    pub fn with_relationship_hints(mut self, hints: BTreeMap<String, String>) -> Self {
        self.relationship_hints.extend(hints);
        self
    }

    /// Target resource for a `*_id` field: the hint if one exists, otherwise
    /// the field name without its `_id` suffix
    pub fn relationship_target(&self, field: &str) -> String {
        if let Some(target) = self.relationship_hints.get(field) {
            return target.clone();
        }
        field
            .strip_suffix("_id")
            .filter(|stem| !stem.is_empty())
            .unwrap_or(field)
            .to_string()
    }

    /// Resolve a generator: exact name first, then the first matching
    /// pattern. `None` leaves the field absent.
    pub fn resolve(&self, field: &str) -> Option<FieldGenerator> {
        if let Some(generator) = self.exact.get(field) {
            return Some(generator.clone());
        }
        self.patterns
            .iter()
            .find(|rule| rule.pattern.matches(field))
            .map(|rule| match &rule.target {
                RuleTarget::Generator(generator) => generator.clone(),
                RuleTarget::InferredRelationship => FieldGenerator::relationship(self.relationship_target(field)),
            })
    }

    pub fn patterns(&self) -> &[PatternRule] {
        &self.patterns
    }
}
