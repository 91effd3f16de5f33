//! Output artifact naming
//!
//! The naming policy is a pure function of `(variant, abi?, version)`. The
//! builtin default is a constant name shared by every variant, which makes
//! collisions between variants built in the same run possible;
//! [`find_output_collisions`] reports them without altering any name.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use release_plan_model::{Abi, AppVersion, BuildPlan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Builtin constant output name
pub const DEFAULT_OUTPUT_NAME: &str = "app.apk";

/// Rendered for `{abi}` when the artifact is not architecture specific
pub const UNIVERSAL_ABI: &str = "universal";

/// Placeholders understood by [`OutputNameTemplate`]
pub const PLACEHOLDERS: &[&str] = &["variant", "abi", "version_name", "version_code"];

/// Produces the final artifact file name for a variant
pub trait NamingPolicy {
    fn output_name(&self, variant: &str, abi: Option<&Abi>, version: &AppVersion) -> String;
}

impl<F> NamingPolicy for F
where
    F: Fn(&str, Option<&Abi>, &AppVersion) -> String,
{
    fn output_name(&self, variant: &str, abi: Option<&Abi>, version: &AppVersion) -> String {
        self(variant, abi, version)
    }
}

/// Whether `name` names a file directly inside the output directory
pub fn is_plain_file_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// Template errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("output name template is empty")]
    Empty,

    #[error("unknown placeholder '{{{0}}}' in output name template (known: variant, abi, version_name, version_code)")]
    UnknownPlaceholder(String),

    #[error("unbalanced brace in output name template '{0}'")]
    UnbalancedBrace(String),

    #[error("output name template '{0}' contains a path separator")]
    PathSeparator(String),
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]*)\}").expect("placeholder pattern is valid"))
}

/// A file name template such as `"{variant}-{version_name}.apk"`.
///
/// A template without placeholders is the constant policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OutputNameTemplate(String);

impl OutputNameTemplate {
    /// Parse and validate a template
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        if template.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        if template.contains('/') || template.contains('\\') {
            return Err(TemplateError::PathSeparator(template.to_string()));
        }

        for caps in placeholder_re().captures_iter(template) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                return Err(TemplateError::UnknownPlaceholder(name.to_string()));
            }
        }

        let stripped = placeholder_re().replace_all(template, "");
        if stripped.contains('{') || stripped.contains('}') {
            return Err(TemplateError::UnbalancedBrace(template.to_string()));
        }

        Ok(Self(template.to_string()))
    }

    /// The constant builtin policy
    pub fn constant_default() -> Self {
        Self(DEFAULT_OUTPUT_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the template renders the same name for every input
    pub fn is_constant(&self) -> bool {
        !placeholder_re().is_match(&self.0)
    }

    /// Substitute placeholders
    pub fn render(&self, variant: &str, abi: Option<&Abi>, version: &AppVersion) -> String {
        if self.is_constant() {
            return self.0.clone();
        }
        placeholder_re()
            .replace_all(&self.0, |caps: &regex_lite::Captures<'_>| match &caps[1] {
                "variant" => variant.to_string(),
                "abi" => abi.map_or(UNIVERSAL_ABI, Abi::as_str).to_string(),
                "version_name" => version.name.clone(),
                "version_code" => version.code.to_string(),
                other => format!("{{{}}}", other),
            })
            .into_owned()
    }
}

impl Default for OutputNameTemplate {
    fn default() -> Self {
        Self::constant_default()
    }
}

impl NamingPolicy for OutputNameTemplate {
    fn output_name(&self, variant: &str, abi: Option<&Abi>, version: &AppVersion) -> String {
        self.render(variant, abi, version)
    }
}

impl TryFrom<String> for OutputNameTemplate {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OutputNameTemplate> for String {
    fn from(template: OutputNameTemplate) -> Self {
        template.0
    }
}

impl fmt::Display for OutputNameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Distinct variants that produce the same artifact name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputCollision {
    pub name: String,
    pub variants: Vec<String>,
}

impl fmt::Display for OutputCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' produced by variants {}", self.name, self.variants.join(", "))
    }
}

/// Report every output name claimed by more than one distinct variant.
///
/// The same variant appearing twice is not a collision. Results are
/// ordered by name, variants by first appearance.
pub fn find_output_collisions(plans: &[BuildPlan]) -> Vec<OutputCollision> {
    let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for plan in plans {
        let variants = by_name.entry(plan.final_output_file_name.as_str()).or_default();
        if !variants.contains(&plan.variant_name.as_str()) {
            variants.push(plan.variant_name.as_str());
        }
    }

    by_name
        .into_iter()
        .filter(|(_, variants)| variants.len() > 1)
        .map(|(name, variants)| OutputCollision {
            name: name.to_string(),
            variants: variants.into_iter().map(str::to_string).collect(),
        })
        .collect()
}
