//! Configuration
//!
//! Four layers merged in order of increasing precedence:
//! 1. Built-in defaults
//! 2. Host config (~/.config/release-plan/config.toml)
//! 3. Repo config (.release-plan/project.toml)
//! 4. CLI overrides

use std::path::PathBuf;

use crate::environment::{Environment, EnvironmentError};

mod defaults;
mod effective;
mod merge;
mod project;

pub use defaults::{
    BuiltinDefaults, DEBUG_KEYSTORE_PASSWORD, DEBUG_KEYSTORE_PATH, DEBUG_KEY_ALIAS,
    DEFAULT_VARIANT,
};
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
pub use project::{BuildVariant, ProjectConfig};

/// Repo config location, relative to the working directory
pub const DEFAULT_REPO_CONFIG: &str = ".release-plan/project.toml";

/// Host config location, relative to the home directory
pub const HOST_CONFIG_RELATIVE: &str = ".config/release-plan/config.toml";

/// Default host config path for the given environment
pub fn default_host_config_path(env: &dyn Environment) -> Result<PathBuf, EnvironmentError> {
    Ok(env.home_dir()?.join(HOST_CONFIG_RELATIVE))
}
