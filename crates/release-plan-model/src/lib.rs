//! Release Plan Model
//!
//! Data types shared between the configuration resolver and the packaging
//! step that consumes its output: signing identities, architecture filters,
//! toolchain pass-through values and the resolved build plan itself.

pub mod abi;
pub mod identity;
pub mod plan;
pub mod secret;
pub mod toolchain;

pub use abi::{Abi, ArchitectureFilter, KNOWN_ABIS};
pub use identity::{CredentialSource, SigningIdentity};
pub use plan::{BuildPlan, PLAN_SCHEMA_ID, PLAN_SCHEMA_VERSION};
pub use secret::{Secret, REDACTED};
pub use toolchain::{AppVersion, MinSdkPolicy, ToolchainDefaults};
