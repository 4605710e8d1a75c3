//! Build configuration: prefix registry, root policy, artificial root.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::term_id::{TermId, TermIdError};

const OBO_PURL: &str = "http://purl.obolibrary.org/obo/";

/// Prefix → IRI base map used to expand and contract term ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixRegistry {
    entries: BTreeMap<String, String>,
}

impl Default for PrefixRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for prefix in [
            "HP", "GO", "UBERPHENO", "MP", "ZP", "UBERON", "CHEBI", "MONDO", "PATO", "RO", "BFO",
        ] {
            registry.insert(prefix, format!("{OBO_PURL}{prefix}_"));
        }
        registry.insert("owl", "http://www.w3.org/2002/07/owl#");
        registry
    }
}

impl PrefixRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register (or replace) a prefix.
    pub fn insert(&mut self, prefix: impl Into<String>, iri_base: impl Into<String>) {
        self.entries.insert(prefix.into(), iri_base.into());
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.entries.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, b)| (p.as_str(), b.as_str()))
    }

    /// Full IRI for `id`, if its prefix is registered.
    pub fn expand(&self, id: &TermId) -> Option<String> {
        self.get(id.prefix())
            .map(|base| format!("{base}{}", id.local_id()))
    }

    /// Contract an IRI using the longest matching base.
    pub fn contract(&self, iri: &str) -> Option<TermId> {
        self.entries
            .iter()
            .filter(|(_, base)| iri.starts_with(base.as_str()) && iri.len() > base.len())
            .max_by_key(|(_, base)| base.len())
            .map(|(prefix, base)| TermId::new(prefix.as_str(), &iri[base.len()..]))
    }
}

/// What to do when several terms have no is-a parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootPolicy {
    /// Hang every candidate below the configured artificial root.
    #[default]
    Synthesize,
    /// Fail the build.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologyConfig {
    pub prefixes: PrefixRegistry,
    pub root_policy: RootPolicy,
    pub artificial_root: TermId,
    pub artificial_root_name: String,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        Self {
            prefixes: PrefixRegistry::default(),
            root_policy: RootPolicy::default(),
            artificial_root: TermId::new("owl", "Thing"),
            artificial_root_name: "artificial root".to_string(),
        }
    }
}

impl OntologyConfig {
    /// Load from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parse a CURIE, or contract an `http(s)://` IRI through the registry.
    pub fn parse_term_id(&self, text: &str) -> Result<TermId, TermIdError> {
        let text = text.trim();
        if text.starts_with("http://") || text.starts_with("https://") {
            return self
                .prefixes
                .contract(text)
                .ok_or_else(|| TermIdError::UnknownIri(text.to_string()));
        }
        TermId::parse(text)
    }
}
