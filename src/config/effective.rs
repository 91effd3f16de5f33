//! Effective configuration with provenance
//!
//! Captures the merged configuration, where each layer came from and which
//! key paths were redacted. The redacted copy is what gets printed or
//! written; the unredacted merge is only ever handed to
//! [`ProjectConfig::from_value`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use super::project::ProjectConfig;
use crate::environment::{Environment, EnvironmentError};
use release_plan_model::REDACTED;

/// Schema version for effective_config.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "release-plan/effective_config@1";

/// Origin of a configuration layer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    Host,
    Repo,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Merged configuration with provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,

    pub schema_id: String,

    pub created_at: DateTime<Utc>,

    /// The merged configuration with secrets redacted
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,

    /// Redacted key paths
    pub redactions: Vec<String>,

    #[serde(skip)]
    merged: Value,
}

/// Key fragments that mark a value as secret
const SECRET_KEYS: &[&str] = &["password", "secret", "token", "credential"];

impl EffectiveConfig {
    /// Merge builtin defaults, the host and repo files and CLI overrides, in
    /// that order of increasing precedence.
    ///
    /// A file path that is given must exist; callers decide whether a
    /// default location is worth passing.
    pub fn build(
        host_config_path: Option<&Path>,
        repo_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        for (origin, path) in [
            (ConfigOrigin::Host, host_config_path),
            (ConfigOrigin::Repo, repo_config_path),
        ] {
            let Some(path) = path else { continue };
            let (value, digest) = load_toml_file(path)?;
            tracing::debug!(?origin, path = %path.display(), %digest, "loaded config layer");
            layers.push(value);
            sources.push(ConfigSource {
                origin,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let merged = merge_layers(layers);
        let mut config = merged.clone();
        let redactions = redact_secrets(&mut config);

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            config,
            sources,
            redactions,
            merged,
        })
    }

    /// Materialize the typed project configuration
    pub fn project(&self, env: &dyn Environment) -> Result<ProjectConfig, ConfigError> {
        ProjectConfig::from_value(self.merged.clone(), env)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get a (redacted) config value by dot-separated path
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.config, |current, part| current.get(part))
    }

    /// Get a (redacted) config value as string
    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }
}

/// Load a TOML file, returning it as JSON plus the digest of its bytes
fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {}", e),
    })?;

    let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    toml_layer_to_value(toml_value).map(|value| (value, digest))
}

/// Convert a parsed TOML layer into the merge representation.
///
/// Every setting in a layer is a string, integer, boolean, list or table.
/// Floats are kept when finite; dates have no setting to feed, so they
/// pass through as their TOML text and fail typed deserialization later if
/// used where a number or table is expected.
pub(crate) fn toml_layer_to_value(toml: toml::Value) -> Result<Value, ConfigError> {
    Ok(match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| ConfigError::Validation(format!("non-finite number {} in config", f)))?,
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(toml_layer_to_value)
                .collect::<Result<_, _>>()?,
        ),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| Ok((key, toml_layer_to_value(value)?)))
                .collect::<Result<_, ConfigError>>()?,
        ),
    })
}

fn is_secret_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SECRET_KEYS.iter().any(|fragment| key.contains(fragment))
}

/// Replace credential values (such as `signing.<alias>.store_password`)
/// with the redaction marker, returning the dotted key of each one.
/// Unset (null) credentials stay null so an absent password is still
/// visible as absent.
fn redact_secrets(value: &mut Value) -> Vec<String> {
    let mut redactions = Vec::new();
    let mut key_path = Vec::new();
    redact_table(value, &mut key_path, &mut redactions);
    redactions.sort();
    redactions
}

fn redact_table(value: &mut Value, key_path: &mut Vec<String>, redactions: &mut Vec<String>) {
    let Value::Object(table) = value else { return };

    for (key, entry) in table.iter_mut() {
        key_path.push(key.clone());
        match entry {
            Value::Object(_) => redact_table(entry, key_path, redactions),
            Value::Null | Value::Array(_) => {}
            scalar if is_secret_key(key) => {
                *scalar = Value::String(REDACTED.to_string());
                redactions.push(key_path.join("."));
            }
            _ => {}
        }
        key_path.pop();
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(contents.as_bytes()).unwrap();
        temp
    }

    #[test]
    fn test_build_with_defaults_only() {
        let config = EffectiveConfig::build(None, None, None).unwrap();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(config.get_str("naming.template"), Some("app.apk"));
        assert_eq!(config.get_str("variants.debug.signing"), Some("androiddebugkey"));
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].origin, ConfigOrigin::Builtin);
    }

    #[test]
    fn test_layer_precedence() {
        let host = toml_file("[naming]\ntemplate = \"host.apk\"\n[toolchain]\nversion_code = 5\n");
        let repo = toml_file("[naming]\ntemplate = \"repo.apk\"\n");
        let cli = serde_json::json!({"toolchain": {"version_code": 9}});

        let config = EffectiveConfig::build(Some(host.path()), Some(repo.path()), Some(cli)).unwrap();

        assert_eq!(config.get_str("naming.template"), Some("repo.apk"));
        assert_eq!(config.get("toolchain.version_code").and_then(Value::as_u64), Some(9));
        let origins: Vec<ConfigOrigin> = config.sources.iter().map(|s| s.origin).collect();
        assert_eq!(
            origins,
            vec![ConfigOrigin::Builtin, ConfigOrigin::Host, ConfigOrigin::Repo, ConfigOrigin::Cli]
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("project.toml");

        let err = EffectiveConfig::build(None, Some(&missing), None).unwrap_err();
        match err {
            ConfigError::Io { path, source } => {
                assert_eq!(path, missing);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected Io error, got {:?}", other),
        }

        let err = EffectiveConfig::build(Some(&missing), None, None).unwrap_err();
        assert!(err.to_string().contains("project.toml"));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        let repo = toml_file("[toolchain]\nratio = nan\n");

        let err = EffectiveConfig::build(None, Some(repo.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_source_digest_matches_bytes() {
        let contents = "[abi]\nfilters = [\"arm64-v8a\"]\n";
        let repo = toml_file(contents);

        let config = EffectiveConfig::build(None, Some(repo.path()), None).unwrap();
        let expected = hex::encode(Sha256::digest(contents.as_bytes()));
        assert_eq!(config.sources[1].digest.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_parse_error_names_file() {
        let repo = toml_file("[abi\nfilters = 1\n");

        let err = EffectiveConfig::build(None, Some(repo.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&repo.path().display().to_string()));
    }

    #[test]
    fn test_signing_passwords_redacted() {
        let repo = toml_file(
            "[signing.releaseKey]\n\
             store_file = \"/keys/release.jks\"\n\
             store_password = \"store-pass\"\n\
             key_password = \"key-pass\"\n",
        );

        let config = EffectiveConfig::build(None, Some(repo.path()), None).unwrap();

        assert_eq!(config.get_str("signing.releaseKey.store_password"), Some(REDACTED));
        assert_eq!(config.get_str("signing.releaseKey.key_password"), Some(REDACTED));
        assert_eq!(config.get_str("signing.releaseKey.store_file"), Some("/keys/release.jks"));
        assert_eq!(
            config.redactions,
            vec![
                "signing.releaseKey.key_password".to_string(),
                "signing.releaseKey.store_password".to_string(),
            ]
        );

        let json = config.to_json().unwrap();
        assert!(!json.contains("store-pass"));
        assert!(!json.contains("key-pass"));
    }
}
