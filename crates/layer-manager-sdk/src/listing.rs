//! Installed-package listing
//!
//! The installer reports what a package root contains as a two-column table:
//!
//! ```text
//! Package    Version
//! ---------- -------
//! certifi    2024.2.2
//! requests   2.31.0
//! ```
//!
//! The first four whitespace-separated tokens are the header; the rest are
//! consumed as `(name, version)` pairs.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::LayerError;

/// Number of header tokens preceding the package rows
const HEADER_TOKENS: usize = 4;

/// Package name to version mapping, in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageListing {
    entries: Vec<(String, String)>,
}

impl PackageListing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a package. A name seen before keeps its position and takes the new version.
    pub fn insert(&mut self, name: impl Into<String>, version: impl Into<String>) {
        let name = name.into();
        let version = version.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = version,
            None => self.entries.push((name, version)),
        }
    }

    /// Version of an installed package
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, version)| version.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

impl Serialize for PackageListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, version) in &self.entries {
            map.serialize_entry(name, version)?;
        }
        map.end()
    }
}

/// Parse the installer's listing output
pub fn parse_listing(raw: &str) -> Result<PackageListing, LayerError> {
    let tokens: Vec<&str> = raw.split_whitespace().skip(HEADER_TOKENS).collect();

    if tokens.len() % 2 != 0 {
        return Err(LayerError::Listing(format!(
            "expected name/version pairs, found a trailing token {:?}",
            tokens[tokens.len() - 1]
        )));
    }

    let mut listing = PackageListing::new();
    for pair in tokens.chunks_exact(2) {
        listing.insert(pair[0], pair[1]);
    }
    Ok(listing)
}
