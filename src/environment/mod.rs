//! Environment collaborator
//!
//! Everything that touches the invoking user's environment lives here:
//! locating the home directory, expanding home-relative keystore paths and
//! probing a keystore file on disk. The home directory is read once at
//! startup and passed down; the resolver itself never calls into this
//! module.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Errors raised by the environment collaborator
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("home directory not set (checked HOME and USERPROFILE)")]
    HomeNotSet,

    #[error("keystore '{}' is unreadable: {source}", path.display())]
    StoreUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Source of the invoking user's home directory
pub trait Environment {
    fn home_dir(&self) -> Result<PathBuf, EnvironmentError>;
}

/// Reads the home directory from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn home_dir(&self) -> Result<PathBuf, EnvironmentError> {
        ["HOME", "USERPROFILE"]
            .iter()
            .filter_map(|var| std::env::var_os(var))
            .find(|value| !value.is_empty())
            .map(PathBuf::from)
            .ok_or(EnvironmentError::HomeNotSet)
    }
}

/// An injected home directory
#[derive(Debug, Clone)]
pub struct FixedEnvironment {
    home: PathBuf,
}

impl FixedEnvironment {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }
}

impl Environment for FixedEnvironment {
    fn home_dir(&self) -> Result<PathBuf, EnvironmentError> {
        Ok(self.home.clone())
    }
}

/// Expand a leading `~` against the environment's home directory.
///
/// Paths without a leading `~` are returned unchanged and never consult the
/// environment.
pub fn expand_store_path(raw: &str, env: &dyn Environment) -> Result<PathBuf, EnvironmentError> {
    if raw == "~" {
        return env.home_dir();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => Ok(env.home_dir()?.join(rest)),
        None => Ok(PathBuf::from(raw)),
    }
}

/// Keystore container format detected from its leading bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeystoreFormat {
    /// Java KeyStore (magic `FE ED FE ED`)
    Jks,
    /// PKCS#12 (DER SEQUENCE)
    Pkcs12,
    Unknown,
}

/// What opening a keystore file revealed
#[derive(Debug, Clone, Serialize)]
pub struct KeystoreInfo {
    pub path: PathBuf,
    pub format: KeystoreFormat,
    pub size_bytes: u64,
}

const JKS_MAGIC: [u8; 4] = [0xFE, 0xED, 0xFE, 0xED];
const DER_SEQUENCE_TAG: u8 = 0x30;

/// Open a keystore and classify it by its magic bytes.
///
/// The file handle lives only for the duration of this call and is closed
/// on every return path. Nothing here checks that the credential is
/// correct; that only becomes known at signing time.
pub fn inspect_keystore(path: &Path) -> Result<KeystoreInfo, EnvironmentError> {
    let unreadable = |source: io::Error| EnvironmentError::StoreUnreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let size_bytes = file.metadata().map_err(unreadable)?.len();

    let mut header = Vec::with_capacity(JKS_MAGIC.len());
    file.by_ref()
        .take(JKS_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .map_err(unreadable)?;

    let format = if header == JKS_MAGIC {
        KeystoreFormat::Jks
    } else if header.first() == Some(&DER_SEQUENCE_TAG) {
        KeystoreFormat::Pkcs12
    } else {
        KeystoreFormat::Unknown
    };

    tracing::debug!(path = %path.display(), ?format, size_bytes, "inspected keystore");

    Ok(KeystoreInfo {
        path: path.to_path_buf(),
        format,
        size_bytes,
    })
}
