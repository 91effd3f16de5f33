//! Target architecture identifiers and the ordered filter built from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ABIs the Android packaging toolchain knows how to produce.
pub const KNOWN_ABIS: &[&str] = &["armeabi-v7a", "arm64-v8a", "x86", "x86_64"];

/// An architecture identifier (e.g. "arm64-v8a").
///
/// Identifiers are opaque: an ABI outside [`KNOWN_ABIS`] is still a valid
/// value here and only fails once the packaging step tries to build it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Abi(String);

impl Abi {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is one the toolchain is known to produce
    pub fn is_known(&self) -> bool {
        KNOWN_ABIS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Abi {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Abi {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Ordered, duplicate-free set of ABIs to package.
///
/// Insertion order is kept because packaging tools treat it as fallback
/// priority. An empty filter means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArchitectureFilter(Vec<Abi>);

impl ArchitectureFilter {
    /// The empty filter
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Build a filter from a declared allow-list. Later repeats of an ABI
    /// are dropped; the first occurrence keeps its position.
    pub fn from_declared<I, A>(declared: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Abi>,
    {
        declared.into_iter().collect()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, abi: &str) -> bool {
        self.0.iter().any(|a| a.as_str() == abi)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Abi> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Abi] {
        &self.0
    }

    /// ABIs in the filter that the toolchain is not known to produce
    pub fn unknown(&self) -> Vec<&Abi> {
        self.0.iter().filter(|a| !a.is_known()).collect()
    }
}

impl<A: Into<Abi>> FromIterator<A> for ArchitectureFilter {
    fn from_iter<I: IntoIterator<Item = A>>(iter: I) -> Self {
        let mut abis: Vec<Abi> = Vec::new();
        for abi in iter {
            let abi = abi.into();
            if !abis.contains(&abi) {
                abis.push(abi);
            }
        }
        Self(abis)
    }
}

impl<'a> IntoIterator for &'a ArchitectureFilter {
    type Item = &'a Abi;
    type IntoIter = std::slice::Iter<'a, Abi>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserves_declared_order() {
        let filter = ArchitectureFilter::from_declared(["arm64-v8a", "armeabi-v7a", "x86_64"]);
        let ids: Vec<&str> = filter.iter().map(Abi::as_str).collect();
        assert_eq!(ids, vec!["arm64-v8a", "armeabi-v7a", "x86_64"]);
    }

    #[test]
    fn test_drops_repeats_keeping_first_position() {
        let filter =
            ArchitectureFilter::from_declared(["armv7", "arm64", "armv7", "x86", "arm64"]);
        let ids: Vec<&str> = filter.iter().map(Abi::as_str).collect();
        assert_eq!(ids, vec!["armv7", "arm64", "x86"]);
    }

    #[test]
    fn test_empty_is_unrestricted() {
        let filter = ArchitectureFilter::from_declared(Vec::<String>::new());
        assert!(filter.is_unrestricted());
        assert_eq!(filter, ArchitectureFilter::unrestricted());
    }

    #[test]
    fn test_unknown_abis() {
        let filter = ArchitectureFilter::from_declared(["arm64-v8a", "riscv64"]);
        let unknown: Vec<&str> = filter.unknown().into_iter().map(Abi::as_str).collect();
        assert_eq!(unknown, vec!["riscv64"]);
        assert!(filter.contains("arm64-v8a"));
    }

    #[test]
    fn test_serializes_as_array() {
        let filter = ArchitectureFilter::from_declared(["armeabi-v7a", "arm64-v8a"]);
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json, serde_json::json!(["armeabi-v7a", "arm64-v8a"]));
    }
}
