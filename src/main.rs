//! Release Plan CLI
//!
//! Entry point for the `release-plan` command-line tool.

use clap::{Args, Parser, Subcommand};
use release_plan::config::{default_host_config_path, EffectiveConfig, DEFAULT_REPO_CONFIG};
use release_plan::environment::{Environment, SystemEnvironment};
use release_plan::{logging, resolve, resolve_all, resolve_run, verify, ProjectConfig, RunPlan};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "release-plan")]
#[command(about = "Resolve build variants into signing, ABI and output-name plans", version)]
struct Cli {
    /// Log resolution steps to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// Path to repo config file (default: .release-plan/project.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Path to host config file (default: ~/.config/release-plan/config.toml)
    #[arg(long)]
    host_config: Option<PathBuf>,

    /// Replace the architecture allow-list (comma-separated)
    #[arg(long, value_delimiter = ',')]
    abi: Option<Vec<String>>,

    /// Replace the output name template
    #[arg(long)]
    output_name: Option<String>,

    /// Override the toolchain version name
    #[arg(long)]
    version_name: Option<String>,

    /// Override the toolchain version code
    #[arg(long)]
    version_code: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a single variant into a build plan
    Resolve {
        /// Variant name (e.g. "release")
        variant: String,

        #[command(flatten)]
        config: ConfigArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Resolve the variants of one run, rejecting output name collisions
    Plan {
        /// Variants to build (default: every declared variant)
        #[arg(long = "variant")]
        variants: Vec<String>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Output in JSON format
        #[arg(long)]
        json: bool,

        /// Write run_plan.json to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate every variant and inspect the keystores they sign with
    Verify {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the effective configuration with secrets redacted
    Config {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print a single value by dot-separated key (e.g. naming.template)
        #[arg(long)]
        get: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let env = SystemEnvironment;

    match cli.command {
        Commands::Resolve {
            variant,
            config,
            json,
        } => run_resolve(&env, &variant, &config, json),
        Commands::Plan {
            variants,
            config,
            json,
            out,
        } => run_plan(&env, &variants, &config, json, out),
        Commands::Verify { config } => run_verify(&env, &config),
        Commands::Config { config, get } => run_config(&env, &config, get.as_deref()),
    }
}

fn cli_overrides(args: &ConfigArgs) -> Option<serde_json::Value> {
    let mut overrides = serde_json::Map::new();

    if let Some(ref abis) = args.abi {
        overrides.insert("abi".to_string(), serde_json::json!({ "filters": abis }));
    }
    if let Some(ref template) = args.output_name {
        overrides.insert("naming".to_string(), serde_json::json!({ "template": template }));
    }

    let mut toolchain = serde_json::Map::new();
    if let Some(ref name) = args.version_name {
        toolchain.insert("version_name".to_string(), serde_json::json!(name));
    }
    if let Some(code) = args.version_code {
        toolchain.insert("version_code".to_string(), serde_json::json!(code));
    }
    if !toolchain.is_empty() {
        overrides.insert("toolchain".to_string(), serde_json::Value::Object(toolchain));
    }

    if overrides.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(overrides))
    }
}

/// Explicit paths are always passed on, so a missing one is an error;
/// default locations are only used when the file is there.
fn existing_default(path: PathBuf) -> Option<PathBuf> {
    if path.is_file() {
        Some(path)
    } else {
        tracing::debug!(path = %path.display(), "no config at default location");
        None
    }
}

fn load_effective(env: &dyn Environment, args: &ConfigArgs) -> EffectiveConfig {
    let repo = match args.config.clone() {
        Some(path) => Some(path),
        None => existing_default(PathBuf::from(DEFAULT_REPO_CONFIG)),
    };

    let host = match args.host_config.clone() {
        Some(path) => Some(path),
        None => match default_host_config_path(env) {
            Ok(path) => existing_default(path),
            Err(e) => {
                tracing::debug!(error = %e, "skipping host config");
                None
            }
        },
    };

    match EffectiveConfig::build(host.as_deref(), repo.as_deref(), cli_overrides(args)) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn load_project(env: &dyn Environment, effective: &EffectiveConfig) -> ProjectConfig {
    match effective.project(env) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn print_json(json: Result<String, serde_json::Error>) {
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_resolve(env: &dyn Environment, variant: &str, args: &ConfigArgs, json: bool) {
    let effective = load_effective(env, args);
    let project = load_project(env, &effective);

    let plan = match resolve(variant, &project) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if json {
        print_json(plan.to_json());
        return;
    }

    let identity = &plan.signing_identity;
    println!("Variant: {}", plan.variant_name);
    println!("  Signing alias: {}", identity.alias);
    println!("  Keystore: {}", identity.store_location.display());
    println!(
        "  Schemes: v1={} v2={}",
        identity.enable_legacy_signature_scheme, identity.enable_modern_signature_scheme
    );
    if identity.is_insecure_default() {
        println!("  Credential: insecure development default");
    }
    if plan.architecture_filter.is_unrestricted() {
        println!("  ABIs: (all available)");
    } else {
        let abis: Vec<&str> = plan.architecture_filter.iter().map(|a| a.as_str()).collect();
        println!("  ABIs: {}", abis.join(", "));
    }
    println!("  Output: {}", plan.final_output_file_name);
}

fn run_plan(
    env: &dyn Environment,
    variants: &[String],
    args: &ConfigArgs,
    json: bool,
    out: Option<PathBuf>,
) {
    let effective = load_effective(env, args);
    let project = load_project(env, &effective);

    let result = if variants.is_empty() {
        resolve_all(&project)
    } else {
        resolve_run(variants, &project)
    };

    let plans = match result {
        Ok(plans) => plans,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let run = RunPlan::new(plans, effective.sources.clone());

    if let Some(ref path) = out {
        if let Err(e) = run.write_to_file(path) {
            eprintln!("Error writing {}: {}", path.display(), e);
            process::exit(1);
        }
        tracing::info!(path = %path.display(), plans = run.plans.len(), "wrote run plan");
    }

    if json {
        print_json(run.to_json());
        return;
    }

    println!("Build plans ({} total):\n", run.plans.len());
    for plan in &run.plans {
        println!(
            "  {:<12} {:<20} {}",
            plan.variant_name, plan.signing_identity.alias, plan.final_output_file_name
        );
    }
}

fn run_verify(env: &dyn Environment, args: &ConfigArgs) {
    let effective = load_effective(env, args);
    let project = load_project(env, &effective);

    let report = verify(&project);

    for check in &report.variants {
        match &check.outcome {
            Ok(plan) => println!("  ok    {} -> {}", check.variant, plan.final_output_file_name),
            Err(e) => println!("  FAIL  {}: {}", check.variant, e),
        }
    }

    for collision in &report.collisions {
        println!("  FAIL  output name collision: {}", collision);
    }

    for check in &report.keystores {
        let alias = &check.identity.alias;
        match &check.outcome {
            Ok(info) => println!(
                "  ok    keystore '{}': {} ({:?}, {} bytes)",
                alias,
                info.path.display(),
                info.format,
                info.size_bytes
            ),
            Err(e) if check.is_failure() => println!("  FAIL  keystore '{}': {}", alias, e),
            Err(e) => println!("  warn  keystore '{}': {}", alias, e),
        }
    }

    let failures = report.failure_count();
    if failures > 0 {
        eprintln!("Verification failed: {} problem(s)", failures);
        process::exit(1);
    }
    println!("Configuration valid");
}

fn run_config(env: &dyn Environment, args: &ConfigArgs, key: Option<&str>) {
    let effective = load_effective(env, args);

    match key {
        Some(key) => match effective.get(key) {
            Some(serde_json::Value::String(s)) => println!("{}", s),
            Some(value) => println!("{}", value),
            None => {
                eprintln!("Key '{}' is not set", key);
                process::exit(1);
            }
        },
        None => print_json(effective.to_json()),
    }
}
