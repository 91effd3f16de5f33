//! Configuration verification
//!
//! Resolves every declared variant independently, so one broken variant
//! never hides problems in the others, then checks the successful plans for
//! output name collisions and opens the keystore of every identity some
//! variant actually signs with.

use std::collections::BTreeMap;
use std::sync::Arc;

use release_plan_model::{BuildPlan, SigningIdentity};

use crate::config::ProjectConfig;
use crate::environment::{inspect_keystore, EnvironmentError, KeystoreInfo};
use crate::naming::{find_output_collisions, OutputCollision};
use crate::resolver::{resolve, ResolveError};

/// Resolution outcome for one variant
#[derive(Debug)]
pub struct VariantCheck {
    pub variant: String,
    pub outcome: Result<BuildPlan, ResolveError>,
}

/// Inspection outcome for one referenced keystore
#[derive(Debug)]
pub struct KeystoreCheck {
    pub identity: Arc<SigningIdentity>,

    /// Variants signing with this identity, in name order
    pub variants: Vec<String>,

    pub outcome: Result<KeystoreInfo, EnvironmentError>,
}

impl KeystoreCheck {
    /// A missing development debug keystore is created by the packaging
    /// toolchain on first use, so it is reported but not a failure.
    pub fn is_failure(&self) -> bool {
        self.outcome.is_err() && !self.identity.is_insecure_default()
    }
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub variants: Vec<VariantCheck>,
    pub collisions: Vec<OutputCollision>,
    pub keystores: Vec<KeystoreCheck>,
}

impl VerifyReport {
    pub fn failure_count(&self) -> usize {
        let variants = self.variants.iter().filter(|c| c.outcome.is_err()).count();
        let keystores = self.keystores.iter().filter(|c| c.is_failure()).count();
        variants + self.collisions.len() + keystores
    }

    pub fn is_ok(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Check the whole configuration without stopping at the first problem
pub fn verify(config: &ProjectConfig) -> VerifyReport {
    let variants: Vec<VariantCheck> = config
        .variant_names()
        .map(|name| VariantCheck {
            variant: name.to_string(),
            outcome: resolve(name, config),
        })
        .collect();

    let plans: Vec<BuildPlan> = variants
        .iter()
        .filter_map(|check| check.outcome.as_ref().ok().cloned())
        .collect();
    let collisions = find_output_collisions(&plans);

    let mut referenced: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for name in config.variant_names() {
        if let Some(variant) = config.variant(name) {
            referenced
                .entry(variant.signing_alias.as_str())
                .or_default()
                .push(name.to_string());
        }
    }

    let keystores = referenced
        .into_iter()
        .filter_map(|(alias, variants)| {
            let identity = config.identity(alias)?;
            Some(KeystoreCheck {
                identity: Arc::clone(identity),
                variants,
                outcome: inspect_keystore(&identity.store_location),
            })
        })
        .collect();

    let report = VerifyReport {
        variants,
        collisions,
        keystores,
    };
    tracing::debug!(failures = report.failure_count(), "verified configuration");
    report
}
