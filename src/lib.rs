//! Release Plan - build variant configuration resolver
//!
//! Resolves each declared build variant of a packaged application into a
//! fully specified build plan: the signing identity to use, the ordered set
//! of target ABIs to package and the final artifact file name. The plan is
//! handed to the packaging step, which this crate does not perform.

pub mod config;
pub mod environment;
pub mod logging;
pub mod naming;
pub mod resolver;
pub mod verify;

pub use config::{BuildVariant, ConfigError, EffectiveConfig, ProjectConfig};
pub use environment::{Environment, EnvironmentError, FixedEnvironment, SystemEnvironment};
pub use naming::{find_output_collisions, NamingPolicy, OutputCollision, OutputNameTemplate};
pub use resolver::{resolve, resolve_all, resolve_run, resolve_with, ResolveError, RunPlan};
pub use verify::{verify, KeystoreCheck, VariantCheck, VerifyReport};

pub use release_plan_model as model;
pub use release_plan_model::{
    Abi, AppVersion, ArchitectureFilter, BuildPlan, CredentialSource, MinSdkPolicy, Secret,
    SigningIdentity, ToolchainDefaults,
};
