//! Built-in defaults (layer 1)
//!
//! Baseline values every project starts from, plus the development debug
//! keystore credential that is injected when an operator supplies none.

use serde::{Deserialize, Serialize};

use crate::naming::DEFAULT_OUTPUT_NAME;

/// Alias of the development debug key
pub const DEBUG_KEY_ALIAS: &str = "androiddebugkey";

/// Home-relative location of the development debug keystore
pub const DEBUG_KEYSTORE_PATH: &str = "~/.android/debug.keystore";

/// Store and key password of the development debug keystore. Well known
/// and insecure; only ever used for non-production variants.
pub const DEBUG_KEYSTORE_PASSWORD: &str = "android";

/// Variant declared by default, signed with the debug key
pub const DEFAULT_VARIANT: &str = "debug";

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Output name template (default: the constant "app.apk")
    pub output_name: String,

    /// Architecture allow-list (default: empty, i.e. no restriction)
    pub abi_filters: Vec<String>,

    /// Minimum SDK policy (default: "inherit")
    pub min_sdk: String,

    /// Version code (default: 1)
    pub version_code: u32,

    /// Version name (default: "1.0.0")
    pub version_name: String,

    /// Multidex (default: false)
    pub multi_dex: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            abi_filters: Vec::new(),
            min_sdk: "inherit".to_string(),
            version_code: 1,
            version_name: "1.0.0".to_string(),
            multi_dex: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "toolchain": {
                "min_sdk": self.min_sdk,
                "version_code": self.version_code,
                "version_name": self.version_name,
                "multi_dex": self.multi_dex
            },
            "abi": {
                "filters": self.abi_filters
            },
            "naming": {
                "template": self.output_name
            },
            "variants": {
                (DEFAULT_VARIANT): {
                    "signing": DEBUG_KEY_ALIAS
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.output_name, "app.apk");
        assert!(defaults.abi_filters.is_empty());
        assert_eq!(defaults.min_sdk, "inherit");
        assert_eq!(defaults.version_code, 1);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["naming"]["template"], "app.apk");
        assert_eq!(value["abi"]["filters"], serde_json::json!([]));
        assert_eq!(value["toolchain"]["min_sdk"], "inherit");
        assert_eq!(value["variants"]["debug"]["signing"], DEBUG_KEY_ALIAS);
    }

    #[test]
    fn test_no_credentials_in_builtin_layer() {
        let value = BuiltinDefaults::default().to_value();
        assert!(value.get("signing").is_none());
    }
}
