//! Typed project configuration
//!
//! Deserialized from the merged configuration value. Signing identities are
//! materialized here, once, at load time: home-relative store paths are
//! expanded through the [`Environment`] collaborator and the insecure
//! development credential is injected where no operator credential exists.
//! After loading the configuration is read-only.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use regex_lite::Regex;
use release_plan_model::{
    Abi, CredentialSource, Secret, SigningIdentity, ToolchainDefaults,
};
use serde::Deserialize;
use serde_json::Value;

use super::defaults::{
    BuiltinDefaults, DEBUG_KEYSTORE_PASSWORD, DEBUG_KEYSTORE_PATH, DEBUG_KEY_ALIAS,
    DEFAULT_VARIANT,
};
use super::effective::{toml_layer_to_value, ConfigError};
use super::merge::deep_merge;
use crate::environment::{expand_store_path, Environment};
use crate::naming::OutputNameTemplate;

fn variant_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("variant name pattern is valid"))
}

fn default_true() -> bool {
    true
}

fn default_signing_alias() -> String {
    DEBUG_KEY_ALIAS.to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AppSection {
    application_id: Option<String>,
    namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AbiSection {
    filters: Vec<Abi>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamingSection {
    template: OutputNameTemplate,
}

/// `[signing.<alias>]` entry as written by the operator
#[derive(Debug, Deserialize)]
struct SigningEntry {
    store_file: Option<String>,
    store_password: Option<Secret>,
    key_password: Option<Secret>,
    #[serde(default = "default_true")]
    v1_signing: bool,
    #[serde(default = "default_true")]
    v2_signing: bool,
}

/// `[variants.<name>]` entry
#[derive(Debug, Deserialize)]
struct VariantEntry {
    #[serde(default = "default_signing_alias")]
    signing: String,
    output_name: Option<OutputNameTemplate>,
    abi_filters: Option<Vec<Abi>>,
    /// Defaults to true for every variant except the builtin debug one
    production: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProjectConfig {
    app: AppSection,
    toolchain: ToolchainDefaults,
    abi: AbiSection,
    naming: NamingSection,
    signing: BTreeMap<String, SigningEntry>,
    variants: BTreeMap<String, VariantEntry>,
}

/// A named build configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVariant {
    pub name: String,

    /// Alias of the signing identity in the credential table
    pub signing_alias: String,

    /// Overrides the project naming template
    pub output_name: Option<OutputNameTemplate>,

    /// Overrides the project architecture allow-list
    pub abi_filters: Option<Vec<Abi>>,

    /// Production variants refuse the insecure development credential.
    /// Every variant except the builtin debug variant is production unless
    /// it opts out.
    pub production: bool,
}

/// Whether a variant counts as production when it does not say
pub fn production_by_default(name: &str) -> bool {
    name != DEFAULT_VARIANT
}

impl BuildVariant {
    pub fn new(name: impl Into<String>, signing_alias: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            production: production_by_default(&name),
            name,
            signing_alias: signing_alias.into(),
            output_name: None,
            abi_filters: None,
        }
    }

    pub fn with_output_name(mut self, template: OutputNameTemplate) -> Self {
        self.output_name = Some(template);
        self
    }

    pub fn with_abi_filters<I, A>(mut self, abis: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Abi>,
    {
        self.abi_filters = Some(abis.into_iter().map(Into::into).collect());
        self
    }

    pub fn production(mut self) -> Self {
        self.production = true;
        self
    }

    /// Opt out of the production credential check
    pub fn development(mut self) -> Self {
        self.production = false;
        self
    }
}

/// Project-level configuration: the credential table, the declared
/// variants, the architecture allow-list, the naming template and the
/// toolchain pass-through values.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    pub application_id: Option<String>,

    pub namespace: Option<String>,

    pub toolchain: ToolchainDefaults,

    /// Declared allow-list, as written (may contain repeats)
    pub abi_filters: Vec<Abi>,

    pub output_name: OutputNameTemplate,

    identities: BTreeMap<String, Arc<SigningIdentity>>,

    variants: BTreeMap<String, BuildVariant>,
}

impl ProjectConfig {
    /// Empty configuration with the builtin naming policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a repo config file on top of the builtin defaults
    pub fn load(path: &Path, env: &dyn Environment) -> Result<Self, ConfigError> {
        super::EffectiveConfig::build(None, Some(path), None)?.project(env)
    }

    /// Parse a repo config TOML document on top of the builtin defaults
    pub fn from_toml_str(s: &str, env: &dyn Environment) -> Result<Self, ConfigError> {
        let toml_value: toml::Value = toml::from_str(s).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        let merged = deep_merge(
            BuiltinDefaults::default().to_value(),
            toml_layer_to_value(toml_value)?,
        );
        Self::from_value(merged, env)
    }

    /// Build from an already merged configuration value
    pub fn from_value(value: Value, env: &dyn Environment) -> Result<Self, ConfigError> {
        let raw: RawProjectConfig = serde_json::from_value(value)?;
        validate(&raw)?;

        let mut identities = BTreeMap::new();
        for (alias, entry) in &raw.signing {
            let identity = materialize_identity(alias, entry, env)?;
            identities.insert(alias.clone(), Arc::new(identity));
        }

        let variants: BTreeMap<String, BuildVariant> = raw
            .variants
            .into_iter()
            .map(|(name, entry)| {
                let production = entry
                    .production
                    .unwrap_or_else(|| production_by_default(&name));
                if !production && production_by_default(&name) {
                    tracing::warn!(variant = %name, "variant opted out of production credential checks");
                }
                let variant = BuildVariant {
                    name: name.clone(),
                    signing_alias: entry.signing,
                    output_name: entry.output_name,
                    abi_filters: entry.abi_filters,
                    production,
                };
                (name, variant)
            })
            .collect();

        let needs_debug_key = variants
            .values()
            .any(|v| v.signing_alias == DEBUG_KEY_ALIAS);
        if needs_debug_key && !identities.contains_key(DEBUG_KEY_ALIAS) {
            let identity = insecure_default_identity(env)?;
            identities.insert(DEBUG_KEY_ALIAS.to_string(), Arc::new(identity));
        }

        Ok(Self {
            application_id: raw.app.application_id,
            namespace: raw.app.namespace,
            toolchain: raw.toolchain,
            abi_filters: raw.abi.filters,
            output_name: raw.naming.template,
            identities,
            variants,
        })
    }

    pub fn with_identity(mut self, identity: SigningIdentity) -> Self {
        self.identities
            .insert(identity.alias.clone(), Arc::new(identity));
        self
    }

    pub fn with_variant(mut self, variant: BuildVariant) -> Self {
        self.variants.insert(variant.name.clone(), variant);
        self
    }

    pub fn with_abi_filters<I, A>(mut self, abis: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Abi>,
    {
        self.abi_filters = abis.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_name(mut self, template: OutputNameTemplate) -> Self {
        self.output_name = template;
        self
    }

    pub fn with_toolchain(mut self, toolchain: ToolchainDefaults) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn variant(&self, name: &str) -> Option<&BuildVariant> {
        self.variants.get(name)
    }

    /// Declared variant names in name order
    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Look up a signing identity by alias
    pub fn identity(&self, alias: &str) -> Option<&Arc<SigningIdentity>> {
        self.identities.get(alias)
    }

    pub fn identities(&self) -> impl Iterator<Item = &Arc<SigningIdentity>> {
        self.identities.values()
    }
}

fn validate(raw: &RawProjectConfig) -> Result<(), ConfigError> {
    for name in raw.variants.keys() {
        if !variant_name_re().is_match(name) {
            return Err(ConfigError::Validation(format!(
                "invalid variant name '{}': must start with a letter and contain only letters, digits, '_' or '-'",
                name
            )));
        }
    }

    let version_name = &raw.toolchain.version_name;
    if version_name.trim().is_empty()
        || version_name.contains(['/', '\\'])
        || version_name.contains("..")
    {
        return Err(ConfigError::Validation(format!(
            "invalid version_name '{}': must be non-empty and contain no path separators or '..'",
            version_name
        )));
    }

    for (alias, entry) in &raw.signing {
        if alias.trim().is_empty() {
            return Err(ConfigError::Validation(
                "signing identity alias cannot be empty".to_string(),
            ));
        }

        let given = [
            entry.store_file.is_some(),
            entry.store_password.is_some(),
            entry.key_password.is_some(),
        ];
        if given.iter().any(|g| *g) && !given.iter().all(|g| *g) {
            return Err(ConfigError::Validation(format!(
                "signing identity '{}' must set all of store_file, store_password and key_password, or none of them",
                alias
            )));
        }

        // Only the debug key exists in the debug keystore.
        if !given.iter().any(|g| *g) && alias != DEBUG_KEY_ALIAS {
            return Err(ConfigError::Validation(format!(
                "signing identity '{}' has no credentials; only '{}' may fall back to the development debug keystore",
                alias, DEBUG_KEY_ALIAS
            )));
        }
    }

    Ok(())
}

fn materialize_identity(
    alias: &str,
    entry: &SigningEntry,
    env: &dyn Environment,
) -> Result<SigningIdentity, ConfigError> {
    let (Some(store_file), Some(store_password), Some(key_password)) =
        (&entry.store_file, &entry.store_password, &entry.key_password)
    else {
        let mut identity = insecure_default_identity(env)?;
        identity.enable_legacy_signature_scheme = entry.v1_signing;
        identity.enable_modern_signature_scheme = entry.v2_signing;
        return Ok(identity);
    };

    Ok(SigningIdentity {
        alias: alias.to_string(),
        store_location: expand_store_path(store_file, env)?,
        store_password: store_password.clone(),
        key_password: key_password.clone(),
        enable_legacy_signature_scheme: entry.v1_signing,
        enable_modern_signature_scheme: entry.v2_signing,
        source: CredentialSource::Configured,
    })
}

/// The debug key inside the development debug keystore
fn insecure_default_identity(env: &dyn Environment) -> Result<SigningIdentity, ConfigError> {
    tracing::warn!(
        alias = DEBUG_KEY_ALIAS,
        "no credential configured; using the insecure development debug keystore"
    );
    Ok(SigningIdentity {
        alias: DEBUG_KEY_ALIAS.to_string(),
        store_location: expand_store_path(DEBUG_KEYSTORE_PATH, env)?,
        store_password: Secret::new(DEBUG_KEYSTORE_PASSWORD),
        key_password: Secret::new(DEBUG_KEYSTORE_PASSWORD),
        enable_legacy_signature_scheme: true,
        enable_modern_signature_scheme: true,
        source: CredentialSource::InsecureDefault,
    })
}
