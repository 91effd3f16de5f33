//! Toolchain pass-through values
//!
//! These come from the surrounding build tool (SDK levels, version code and
//! name). The resolver carries them into the plan without interpreting
//! them, except that the version feeds the output naming policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum platform level policy
///
/// Written in configuration either as the keyword `"inherit"` (use whatever
/// the toolchain plugin defaults to) or as a fixed integer level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "MinSdkRepr", into = "MinSdkRepr")]
pub enum MinSdkPolicy {
    #[default]
    Inherit,
    Fixed(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MinSdkRepr {
    Level(u32),
    Keyword(String),
}

impl TryFrom<MinSdkRepr> for MinSdkPolicy {
    type Error = String;

    fn try_from(repr: MinSdkRepr) -> Result<Self, Self::Error> {
        match repr {
            MinSdkRepr::Level(level) => Ok(Self::Fixed(level)),
            MinSdkRepr::Keyword(k) if k == "inherit" => Ok(Self::Inherit),
            MinSdkRepr::Keyword(k) => Err(format!(
                "invalid min_sdk '{}': expected \"inherit\" or an integer level",
                k
            )),
        }
    }
}

impl From<MinSdkPolicy> for MinSdkRepr {
    fn from(policy: MinSdkPolicy) -> Self {
        match policy {
            MinSdkPolicy::Inherit => Self::Keyword("inherit".to_string()),
            MinSdkPolicy::Fixed(level) => Self::Level(level),
        }
    }
}

impl fmt::Display for MinSdkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inherit => f.write_str("inherit"),
            Self::Fixed(level) => write!(f, "{}", level),
        }
    }
}

/// Application version as supplied by the toolchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppVersion {
    pub code: u32,
    pub name: String,
}

impl Default for AppVersion {
    fn default() -> Self {
        Self {
            code: 1,
            name: "1.0.0".to_string(),
        }
    }
}

/// Toolchain-provided defaults carried into every plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_sdk: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_sdk: Option<u32>,

    pub min_sdk: MinSdkPolicy,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ndk_version: Option<String>,

    pub version_code: u32,

    pub version_name: String,

    pub multi_dex: bool,

    /// JVM bytecode target (e.g. "17")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jvm_target: Option<String>,
}

impl Default for ToolchainDefaults {
    fn default() -> Self {
        let version = AppVersion::default();
        Self {
            compile_sdk: None,
            target_sdk: None,
            min_sdk: MinSdkPolicy::Inherit,
            ndk_version: None,
            version_code: version.code,
            version_name: version.name,
            multi_dex: false,
            jvm_target: None,
        }
    }
}

impl ToolchainDefaults {
    pub fn version(&self) -> AppVersion {
        AppVersion {
            code: self.version_code,
            name: self.version_name.clone(),
        }
    }
}
