//! Release configuration resolver
//!
//! Turns a variant name plus a loaded [`ProjectConfig`] into an immutable
//! [`BuildPlan`]. Resolution reads configuration only: it never touches the
//! filesystem or network, holds no state between calls and never retries,
//! since every failure here is a configuration error that only an operator
//! can fix.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use release_plan_model::{ArchitectureFilter, BuildPlan};
use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigSource, ProjectConfig};
use crate::naming::{find_output_collisions, is_plain_file_name, NamingPolicy, OutputCollision};

/// Schema version for run_plan.json
pub const RUN_PLAN_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for run_plan.json
pub const RUN_PLAN_SCHEMA_ID: &str = "release-plan/run_plan@1";

/// Resolution errors. All are fatal for the variant (or run) concerned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown build variant '{name}' (declared: {})", .declared.join(", "))]
    UnknownVariant { name: String, declared: Vec<String> },

    #[error("variant '{variant}' references unknown signing identity '{alias}'")]
    UnknownSigningIdentity { variant: String, alias: String },

    #[error("production variant '{variant}' is bound to '{alias}', the insecure development credential")]
    InsecureDefaultCredential { variant: String, alias: String },

    #[error("variant '{variant}' renders output name '{name}', which is not a plain file name")]
    InvalidOutputName { variant: String, name: String },

    #[error("output name '{name}' is produced by more than one variant: {}", .variants.join(", "))]
    OutputNameCollision { name: String, variants: Vec<String> },
}

impl From<OutputCollision> for ResolveError {
    fn from(collision: OutputCollision) -> Self {
        Self::OutputNameCollision {
            name: collision.name,
            variants: collision.variants,
        }
    }
}

/// Resolve one variant using the configured naming templates
pub fn resolve(variant_name: &str, config: &ProjectConfig) -> Result<BuildPlan, ResolveError> {
    let variant = config
        .variant(variant_name)
        .ok_or_else(|| unknown_variant(variant_name, config))?;
    let template = variant.output_name.as_ref().unwrap_or(&config.output_name);
    resolve_with(variant_name, config, template)
}

/// Resolve one variant with an explicit naming policy, bypassing the
/// configured templates
pub fn resolve_with(
    variant_name: &str,
    config: &ProjectConfig,
    naming: &dyn NamingPolicy,
) -> Result<BuildPlan, ResolveError> {
    let variant = config
        .variant(variant_name)
        .ok_or_else(|| unknown_variant(variant_name, config))?;

    let identity = config.identity(&variant.signing_alias).ok_or_else(|| {
        ResolveError::UnknownSigningIdentity {
            variant: variant.name.clone(),
            alias: variant.signing_alias.clone(),
        }
    })?;

    if variant.production && identity.is_insecure_default() {
        return Err(ResolveError::InsecureDefaultCredential {
            variant: variant.name.clone(),
            alias: identity.alias.clone(),
        });
    }

    let declared = variant.abi_filters.as_deref().unwrap_or(&config.abi_filters);
    let architecture_filter: ArchitectureFilter = declared.iter().cloned().collect();
    for abi in architecture_filter.unknown() {
        tracing::warn!(variant = %variant.name, %abi, "ABI is not one the toolchain is known to produce");
    }

    let final_output_file_name =
        naming.output_name(&variant.name, None, &config.toolchain.version());
    if !is_plain_file_name(&final_output_file_name) {
        return Err(ResolveError::InvalidOutputName {
            variant: variant.name.clone(),
            name: final_output_file_name,
        });
    }

    tracing::debug!(
        variant = %variant.name,
        alias = %identity.alias,
        abis = architecture_filter.len(),
        output = %final_output_file_name,
        "resolved build plan"
    );

    Ok(BuildPlan {
        variant_name: variant.name.clone(),
        signing_identity: identity.clone(),
        architecture_filter,
        final_output_file_name,
        application_id: config.application_id.clone(),
        namespace: config.namespace.clone(),
        toolchain: config.toolchain.clone(),
    })
}

/// Resolve the variants built together in one run.
///
/// The first failing variant aborts the run. Once every plan resolves, the
/// run is rejected if two distinct variants would write the same artifact
/// name.
pub fn resolve_run<S: AsRef<str>>(
    variant_names: &[S],
    config: &ProjectConfig,
) -> Result<Vec<BuildPlan>, ResolveError> {
    let plans = variant_names
        .iter()
        .map(|name| resolve(name.as_ref(), config))
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(collision) = find_output_collisions(&plans).into_iter().next() {
        return Err(collision.into());
    }

    Ok(plans)
}

/// Resolve every declared variant, in name order
pub fn resolve_all(config: &ProjectConfig) -> Result<Vec<BuildPlan>, ResolveError> {
    let names: Vec<&str> = config.variant_names().collect();
    resolve_run(&names, config)
}

fn unknown_variant(name: &str, config: &ProjectConfig) -> ResolveError {
    ResolveError::UnknownVariant {
        name: name.to_string(),
        declared: config.variant_names().map(str::to_string).collect(),
    }
}

/// run_plan.json: the plans of one run plus the config provenance
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub schema_version: u32,

    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    pub sources: Vec<ConfigSource>,

    pub plans: Vec<BuildPlan>,
}

impl RunPlan {
    pub fn new(plans: Vec<BuildPlan>, sources: Vec<ConfigSource>) -> Self {
        Self {
            schema_version: RUN_PLAN_SCHEMA_VERSION,
            schema_id: RUN_PLAN_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            sources,
            plans,
        }
    }

    /// Serialize to JSON. Secrets are redacted.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self.to_json().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            )
        })?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildVariant, DEBUG_KEY_ALIAS};
    use crate::environment::FixedEnvironment;
    use crate::naming::OutputNameTemplate;
    use release_plan_model::{Abi, AppVersion, SigningIdentity};
    use std::sync::Arc;

    fn config() -> ProjectConfig {
        ProjectConfig::new()
            .with_identity(SigningIdentity::new(
                "releaseKey",
                "/keys/release.jks",
                "store-pass",
                "key-pass",
            ))
            .with_identity(SigningIdentity::new("debugKey", "/keys/debug.jks", "a", "b"))
            .with_variant(BuildVariant::new("release", "releaseKey").production())
            .with_variant(BuildVariant::new("debug", "debugKey"))
            .with_abi_filters(["armeabi-v7a", "arm64-v8a"])
            .with_output_name(OutputNameTemplate::parse("{variant}.apk").unwrap())
    }

    #[test]
    fn test_resolve_uses_declared_alias() {
        let config = config();
        for name in ["release", "debug"] {
            let plan = resolve(name, &config).unwrap();
            let expected = &config.variant(name).unwrap().signing_alias;
            assert_eq!(&plan.signing_identity.alias, expected);
        }
    }

    #[test]
    fn test_plans_share_identity() {
        let config = ProjectConfig::new()
            .with_identity(SigningIdentity::new("shared", "/keys/a.jks", "s", "k"))
            .with_variant(BuildVariant::new("a", "shared").with_output_name(
                OutputNameTemplate::parse("a.apk").unwrap(),
            ))
            .with_variant(BuildVariant::new("b", "shared").with_output_name(
                OutputNameTemplate::parse("b.apk").unwrap(),
            ));

        let plans = resolve_all(&config).unwrap();
        assert!(Arc::ptr_eq(
            &plans[0].signing_identity,
            &plans[1].signing_identity
        ));
        assert!(Arc::ptr_eq(
            &plans[0].signing_identity,
            config.identity("shared").unwrap()
        ));
    }

    #[test]
    fn test_unknown_variant_lists_declared() {
        let err = resolve("staging", &config()).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UnknownVariant {
                name: "staging".to_string(),
                declared: vec!["debug".to_string(), "release".to_string()],
            }
        );
        assert!(err.to_string().contains("debug, release"));
    }

    #[test]
    fn test_empty_variant_name_is_unknown() {
        assert!(matches!(
            resolve("", &config()),
            Err(ResolveError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_variant_abi_override() {
        let config = config().with_variant(
            BuildVariant::new("emulator", "debugKey").with_abi_filters(["x86_64", "x86"]),
        );
        let plan = resolve("emulator", &config).unwrap();
        let ids: Vec<&str> = plan.architecture_filter.iter().map(Abi::as_str).collect();
        assert_eq!(ids, vec!["x86_64", "x86"]);
    }

    #[test]
    fn test_variant_template_override() {
        let config = config().with_variant(
            BuildVariant::new("beta", "debugKey")
                .with_output_name(OutputNameTemplate::parse("beta-{version_code}.apk").unwrap()),
        );
        assert_eq!(
            resolve("beta", &config).unwrap().final_output_file_name,
            "beta-1.apk"
        );
    }

    #[test]
    fn test_resolve_with_custom_policy() {
        let policy = |variant: &str, _abi: Option<&Abi>, version: &AppVersion| {
            format!("{}-{}.aab", variant, version.name)
        };
        let plan = resolve_with("release", &config(), &policy).unwrap();
        assert_eq!(plan.final_output_file_name, "release-1.0.0.aab");
    }

    #[test]
    fn test_custom_policy_cannot_escape_output_dir() {
        for bad in ["../release.apk", "out/release.apk", "out\\release.apk", "..", ""] {
            let policy = move |_: &str, _: Option<&Abi>, _: &AppVersion| bad.to_string();
            assert_eq!(
                resolve_with("release", &config(), &policy).unwrap_err(),
                ResolveError::InvalidOutputName {
                    variant: "release".to_string(),
                    name: bad.to_string(),
                }
            );
        }
    }

    #[test]
    fn test_plan_carries_namespace() {
        let mut config = config();
        config.application_id = Some("com.example.news_app".to_string());
        config.namespace = Some("com.example.news".to_string());

        let plan = resolve("release", &config).unwrap();
        assert_eq!(plan.application_id.as_deref(), Some("com.example.news_app"));
        assert_eq!(plan.namespace.as_deref(), Some("com.example.news"));
    }

    #[test]
    fn test_release_without_production_key_rejects_insecure_default() {
        let env = FixedEnvironment::new("/home/dev");
        let config = ProjectConfig::from_toml_str(
            "[variants.release]\nsigning = \"androiddebugkey\"\n",
            &env,
        )
        .unwrap();

        assert!(matches!(
            resolve("release", &config),
            Err(ResolveError::InsecureDefaultCredential { .. })
        ));
        assert!(resolve("debug", &config).is_ok());
    }

    #[test]
    fn test_development_variant_may_use_insecure_default() {
        let env = FixedEnvironment::new("/home/dev");
        let config = ProjectConfig::from_toml_str(
            "[variants.qa]\nsigning = \"androiddebugkey\"\nproduction = false\n",
            &env,
        )
        .unwrap();

        assert!(resolve("qa", &config)
            .unwrap()
            .signing_identity
            .is_insecure_default());
    }

    #[test]
    fn test_insecure_default_rejected_for_production() {
        let env = FixedEnvironment::new("/home/dev");
        let config = ProjectConfig::from_toml_str(
            "[variants.release]\nsigning = \"androiddebugkey\"\nproduction = true\n",
            &env,
        )
        .unwrap();

        assert_eq!(
            resolve("release", &config).unwrap_err(),
            ResolveError::InsecureDefaultCredential {
                variant: "release".to_string(),
                alias: DEBUG_KEY_ALIAS.to_string(),
            }
        );
        assert!(resolve("debug", &config)
            .unwrap()
            .signing_identity
            .is_insecure_default());
    }

    #[test]
    fn test_resolve_run_same_variant_twice_is_not_collision() {
        let plans = resolve_run(&["release", "release"], &config()).unwrap();
        assert_eq!(plans.len(), 2);
    }

    #[test]
    fn test_resolve_run_aborts_on_first_error() {
        let err = resolve_run(&["release", "nope", "debug"], &config()).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownVariant { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_run_plan_document() {
        let plans = resolve_all(&config()).unwrap();
        let run = RunPlan::new(plans, Vec::new());
        let json: serde_json::Value = serde_json::from_str(&run.to_json().unwrap()).unwrap();

        assert_eq!(json["schema_id"], RUN_PLAN_SCHEMA_ID);
        assert_eq!(json["plans"].as_array().unwrap().len(), 2);
        assert_eq!(json["plans"][1]["final_output_file_name"], "release.apk");
        assert!(!run.to_json().unwrap().contains("store-pass"));
    }

    #[test]
    fn test_run_plan_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_plan.json");

        RunPlan::new(resolve_all(&config()).unwrap(), Vec::new())
            .write_to_file(&path)
            .unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"variant_name\": \"debug\""));
    }
}
