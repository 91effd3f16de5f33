//! Layer merge
//!
//! Builtin, host, repo and CLI layers are folded in that order. Tables
//! merge key by key, so a repo `[variants.release]` sits beside the builtin
//! `[variants.debug]` and a host `[signing.releaseKey]` survives a repo that
//! only declares variants. Lists and scalars are replaced: a repo ABI
//! allow-list narrows the host one instead of extending it.

use serde_json::Value;

/// Fold `layer` onto `base`.
///
/// An explicit `null` in the layer clears the base value.
pub fn deep_merge(base: Value, layer: Value) -> Value {
    let (mut table, entries) = match (base, layer) {
        (Value::Object(table), Value::Object(entries)) => (table, entries),
        (_, layer) => return layer,
    };

    for (key, value) in entries {
        match table.get_mut(&key) {
            Some(existing) => {
                let earlier = existing.take();
                *existing = deep_merge(earlier, value);
            }
            None => {
                table.insert(key, value);
            }
        }
    }
    Value::Object(table)
}

/// Merge layers in order; the last layer has the highest precedence
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let result = deep_merge(
            json!({"toolchain": {"version_code": 1}}),
            json!({"toolchain": {"version_code": 7}}),
        );
        assert_eq!(result["toolchain"]["version_code"], 7);
    }

    #[test]
    fn test_variant_tables_merge_by_key() {
        let base = json!({
            "variants": {
                "debug": {"signing": "androiddebugkey"}
            }
        });
        let overlay = json!({
            "variants": {
                "release": {"signing": "releaseKey", "production": true}
            }
        });
        let result = deep_merge(base, overlay);

        assert_eq!(result["variants"]["debug"]["signing"], "androiddebugkey");
        assert_eq!(result["variants"]["release"]["signing"], "releaseKey");
    }

    #[test]
    fn test_abi_list_is_replaced() {
        let base = json!({"abi": {"filters": ["armeabi-v7a", "arm64-v8a", "x86_64"]}});
        let overlay = json!({"abi": {"filters": ["arm64-v8a"]}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["abi"]["filters"], json!(["arm64-v8a"]));
    }

    #[test]
    fn test_null_override() {
        let result = deep_merge(
            json!({"app": {"application_id": "com.example.app"}}),
            json!({"app": {"application_id": null}}),
        );
        assert!(result["app"]["application_id"].is_null());
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"naming": {"template": "app.apk"}, "toolchain": {"version_code": 1}});
        let host = json!({"toolchain": {"version_code": 2}});
        let repo = json!({"naming": {"template": "News App.apk"}});
        let cli = json!({"toolchain": {"version_code": 3}});

        let result = merge_layers(vec![builtin, host, repo, cli]);

        assert_eq!(result["toolchain"]["version_code"], 3);
        assert_eq!(result["naming"]["template"], "News App.apk");
    }
}
