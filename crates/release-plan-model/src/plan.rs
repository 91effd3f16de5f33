//! Resolved build plan

use serde::Serialize;
use std::sync::Arc;

use crate::abi::ArchitectureFilter;
use crate::identity::SigningIdentity;
use crate::toolchain::ToolchainDefaults;

/// Schema version for build_plan.json
pub const PLAN_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for build_plan.json
pub const PLAN_SCHEMA_ID: &str = "release-plan/build_plan@1";

/// Everything the packaging step needs to produce one variant's artifact.
///
/// Created per resolution and never mutated afterwards. Equality compares
/// the signing identity by value, so two resolutions of the same
/// configuration compare equal even though they share the identity `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildPlan {
    pub variant_name: String,

    pub signing_identity: Arc<SigningIdentity>,

    pub architecture_filter: ArchitectureFilter,

    pub final_output_file_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,

    /// Code namespace, when it differs from the application id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    pub toolchain: ToolchainDefaults,
}

#[derive(Serialize)]
struct PlanDocument<'a> {
    schema_version: u32,
    schema_id: &'a str,
    #[serde(flatten)]
    plan: &'a BuildPlan,
}

impl BuildPlan {
    /// Serialize as a build_plan.json document. Secrets are redacted.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&PlanDocument {
            schema_version: PLAN_SCHEMA_VERSION,
            schema_id: PLAN_SCHEMA_ID,
            plan: self,
        })
    }
}
