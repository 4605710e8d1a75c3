//! Compound term identifiers (`PREFIX:LOCAL`).

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermIdError {
    #[error("missing `:` separator in term id `{0}`")]
    MissingSeparator(String),
    #[error("empty prefix in term id `{0}`")]
    EmptyPrefix(String),
    #[error("empty local id in term id `{0}`")]
    EmptyLocalId(String),
    #[error("whitespace in term id `{0}`")]
    Whitespace(String),
    #[error("no registered prefix expands to IRI `{0}`")]
    UnknownIri(String),
}

/// `(prefix, local id)` pair, e.g. `HP:0001250`.
///
/// Ordering is by prefix, then local id. All-digit local ids sort before the
/// rest and compare numerically (`HP:9 < HP:10`); ties fall back to the text
/// so `HP:01` and `HP:1` stay distinct.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TermId {
    prefix: String,
    local: String,
}

impl TermId {
    pub fn new(prefix: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            local: local.into(),
        }
    }

    /// Parse a `PREFIX:LOCAL` CURIE. The split happens at the first `:`.
    pub fn parse(text: &str) -> Result<Self, TermIdError> {
        let text = text.trim();
        if text.chars().any(char::is_whitespace) {
            return Err(TermIdError::Whitespace(text.to_string()));
        }
        let (prefix, local) = text
            .split_once(':')
            .ok_or_else(|| TermIdError::MissingSeparator(text.to_string()))?;
        if prefix.is_empty() {
            return Err(TermIdError::EmptyPrefix(text.to_string()));
        }
        if local.is_empty() {
            return Err(TermIdError::EmptyLocalId(text.to_string()));
        }
        Ok(Self::new(prefix, local))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn local_id(&self) -> &str {
        &self.local
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn compare_local(a: &str, b: &str) -> Ordering {
    match (is_numeric(a), is_numeric(b)) {
        (true, true) => {
            let (ta, tb) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
            ta.len()
                .cmp(&tb.len())
                .then_with(|| ta.cmp(tb))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

impl Ord for TermId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then_with(|| compare_local(&self.local, &other.local))
    }
}

impl PartialOrd for TermId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local)
    }
}

impl fmt::Debug for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TermId({self})")
    }
}

impl FromStr for TermId {
    type Err = TermIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TermId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TermId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TermId {
        TermId::parse(s).unwrap()
    }

    #[test]
    fn parse_splits_at_first_colon() {
        let t = id("NCBITaxon:taxon:9606");
        assert_eq!(t.prefix(), "NCBITaxon");
        assert_eq!(t.local_id(), "taxon:9606");
        assert_eq!(t.to_string(), "NCBITaxon:taxon:9606");
    }

    #[test]
    fn parse_rejects_malformed_curies() {
        assert!(matches!(
            TermId::parse("HP0001"),
            Err(TermIdError::MissingSeparator(_))
        ));
        assert!(matches!(TermId::parse(":1"), Err(TermIdError::EmptyPrefix(_))));
        assert!(matches!(TermId::parse("HP:"), Err(TermIdError::EmptyLocalId(_))));
        assert!(matches!(TermId::parse("HP: 1"), Err(TermIdError::Whitespace(_))));
    }

    #[test]
    fn numeric_local_ids_order_numerically() {
        assert!(id("HP:9") < id("HP:10"));
        assert!(id("HP:0000009") < id("HP:10"));
        assert!(id("GO:99") < id("HP:1"));
        assert_ne!(id("HP:01"), id("HP:1"));
        assert_ne!(id("HP:01").cmp(&id("HP:1")), Ordering::Equal);
    }

    #[test]
    fn numeric_local_ids_sort_before_textual_ones() {
        let mut ids = vec![id("X:1a"), id("X:10"), id("X:9"), id("X:abc")];
        ids.sort();
        let rendered: Vec<_> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["X:9", "X:10", "X:1a", "X:abc"]);
    }

    #[test]
    fn serde_uses_curie_string() {
        let json = serde_json::to_string(&id("HP:0000118")).unwrap();
        assert_eq!(json, "\"HP:0000118\"");
        let back: TermId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id("HP:0000118"));
        assert!(serde_json::from_str::<TermId>("\"nocolon\"").is_err());
    }
}
