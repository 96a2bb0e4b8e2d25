use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use multiversion_testkit::config::{EngineSettings, IdStrategy};
use multiversion_testkit::model::{FeatureRequirements, Operation, ParamAxis, Payload};
use multiversion_testkit::registry;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(name = "apiver", about = "Inspect API version profiles, synthesize payloads and build test plans")]
struct Cli {
    /// Version configuration document (overrides APIVER_CONFIG_PATH)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Seed for reproducible payloads
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Generate UUID identifiers instead of integers
    #[arg(long, global = true)]
    uuid_ids: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and validate the configuration, then print a summary
    Check,
    /// List configured versions
    Versions,
    /// Print the version x feature availability matrix
    Matrix,
    /// Resolve a resource endpoint for a version
    Endpoint {
        version: String,
        resource: String,
        /// Placeholder binding, `name=value`
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
        /// Prefix the path with the version's base URL
        #[arg(long)]
        full: bool,
    },
    /// Synthesize a payload
    Generate {
        resource: String,
        operation: String,
        version: String,
        /// Field override, `name=value`; the value is parsed as JSON when possible
        #[arg(long = "set", value_parser = parse_key_value)]
        overrides: Vec<(String, String)>,
    },
    /// Build an execution plan for a feature requirement set
    Plan {
        #[arg(long = "require")]
        required: Vec<String>,
        #[arg(long = "optional")]
        optional: Vec<String>,
        /// Secondary axis, `name=a,b,c`
        #[arg(long = "axis", value_parser = parse_key_value)]
        axes: Vec<(String, String)>,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct CheckSummary {
    origin: String,
    versions: Vec<VersionSummary>,
}

#[derive(Serialize)]
struct VersionSummary {
    version: String,
    base_url: String,
    enabled_features: Vec<String>,
    endpoints: usize,
    schemas: usize,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut settings = EngineSettings::load()?;
    if let Some(config) = cli.config {
        settings = settings.with_config_path(config);
    }
    if let Some(seed) = cli.seed {
        settings = settings.with_seed(seed);
    }
    if cli.uuid_ids {
        settings = settings.with_id_strategy(IdStrategy::Uuid);
    }

    use env_logger::Builder;
    use log::LevelFilter;

    let level = settings.log_level.parse().unwrap_or(LevelFilter::Info);
    Builder::new()
        .filter_level(level)
        .filter_module("config", LevelFilter::Warn)
        .init();

    let engine = registry::init(settings)?;
    let store = engine.store();

    match cli.command {
        Command::Check => {
            let snapshot = store.snapshot();
            let versions = snapshot
                .versions
                .values()
                .map(|profile| VersionSummary {
                    version: profile.version_id.clone(),
                    base_url: profile.base_url.clone(),
                    enabled_features: profile.features.enabled().map(str::to_string).collect(),
                    endpoints: profile.endpoints.len(),
                    schemas: profile.schema_fields.len(),
                })
                .collect();
            print_json(&CheckSummary {
                origin: store.origin(),
                versions,
            })?;
        }
        Command::Versions => print_json(&store.list_versions())?,
        Command::Matrix => print_json(&engine.resolver().feature_matrix())?,
        Command::Endpoint {
            version,
            resource,
            params,
            full,
        } => {
            let params: BTreeMap<String, String> = params.into_iter().collect();
            let resolved = if full {
                store.resolve_url(&version, &resource, &params)?
            } else {
                store.resolve_endpoint(&version, &resource, &params)?
            };
            println!("{}", resolved);
        }
        Command::Generate {
            resource,
            operation,
            version,
            overrides,
        } => {
            let operation: Operation = operation.parse()?;
            let overrides: Payload = overrides
                .into_iter()
                .map(|(field, raw)| {
                    let value = serde_json::from_str::<serde_json::Value>(&raw).unwrap_or(serde_json::Value::String(raw));
                    (field, value)
                })
                .collect();
            let payload = engine
                .factory()
                .create(&resource, operation, &version, &overrides)
                .with_context(|| format!("Failed to generate {}/{} for {}", resource, operation, version))?;
            print_json(&payload)?;
        }
        Command::Plan {
            required,
            optional,
            axes,
        } => {
            let axes = axes
                .into_iter()
                .map(|(name, values)| {
                    let values: Vec<&str> = values.split(',').map(str::trim).filter(|v| !v.is_empty()).collect();
                    if values.is_empty() {
                        return Err(anyhow!("axis '{}' has no values", name));
                    }
                    Ok(ParamAxis::new(name, values))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            let requirements = FeatureRequirements {
                required,
                optional,
                dependencies: None,
            };
            print_json(&engine.selector().build_plan_with_axes(&requirements, &axes))?;
        }
    }

    Ok(())
}
