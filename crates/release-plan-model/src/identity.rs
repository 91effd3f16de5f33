//! Signing identities

use serde::Serialize;
use std::path::PathBuf;

use crate::secret::Secret;

/// Where a signing identity's credential values came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialSource {
    /// Supplied by the operator in configuration
    Configured,
    /// The development debug keystore credential, injected because the
    /// operator supplied nothing. Never valid for a production variant.
    InsecureDefault,
}

/// The credential set used to sign one packaged artifact.
///
/// Built once at configuration load and shared (behind `Arc`) by every
/// variant that references its alias. Password fields are [`Secret`]s and
/// never render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningIdentity {
    /// Key alias inside the store
    pub alias: String,

    /// Absolute path to the keystore file
    pub store_location: PathBuf,

    pub store_password: Secret,

    pub key_password: Secret,

    /// JAR signing (APK signature scheme v1)
    pub enable_legacy_signature_scheme: bool,

    /// APK signature scheme v2
    pub enable_modern_signature_scheme: bool,

    pub source: CredentialSource,
}

impl SigningIdentity {
    /// An operator-configured identity with both signature schemes enabled
    pub fn new(
        alias: impl Into<String>,
        store_location: impl Into<PathBuf>,
        store_password: impl Into<Secret>,
        key_password: impl Into<Secret>,
    ) -> Self {
        Self {
            alias: alias.into(),
            store_location: store_location.into(),
            store_password: store_password.into(),
            key_password: key_password.into(),
            enable_legacy_signature_scheme: true,
            enable_modern_signature_scheme: true,
            source: CredentialSource::Configured,
        }
    }

    pub fn is_insecure_default(&self) -> bool {
        self.source == CredentialSource::InsecureDefault
    }
}
