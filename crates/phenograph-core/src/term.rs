//! Term metadata and typed relationships.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use phenograph_obo::{Dbxref, SynonymScope};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::term_id::TermId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    pub text: String,
    pub scope: SynonymScope,
    pub type_name: Option<String>,
    pub xrefs: Vec<Dbxref>,
}

/// Metadata of one primary term id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    /// Empty when the stanza carries no `name`.
    pub name: String,
    pub definition: Option<String>,
    pub definition_xrefs: Vec<Dbxref>,
    pub comment: Option<String>,
    pub alt_ids: Vec<TermId>,
    pub subsets: Vec<String>,
    pub synonyms: Vec<Synonym>,
    pub obsolete: bool,
    pub created_by: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub xrefs: Vec<Dbxref>,
    pub namespace: Option<String>,
    pub replaced_by: Vec<TermId>,
    pub consider: Vec<TermId>,
}

impl Term {
    pub fn new(id: TermId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            definition: None,
            definition_xrefs: Vec::new(),
            comment: None,
            alt_ids: Vec::new(),
            subsets: Vec::new(),
            synonyms: Vec::new(),
            obsolete: false,
            created_by: None,
            creation_date: None,
            xrefs: Vec::new(),
            namespace: None,
            replaced_by: Vec::new(),
            consider: Vec::new(),
        }
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete
    }
}

/// Parse the date forms seen in OBO `creation_date` entries.
pub fn parse_creation_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S", "%d:%m:%Y %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

// ============================================================================
// Relationships
// ============================================================================

/// Edge type. Only `IsA` takes part in closures, cycle and root detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationQualifier {
    IsA,
    PartOf,
    HasPart,
    Regulates,
    PositivelyRegulates,
    NegativelyRegulates,
    OccursIn,
    Other(String),
}

impl RelationQualifier {
    pub fn from_name(name: &str) -> Self {
        match name {
            "is_a" => Self::IsA,
            "part_of" => Self::PartOf,
            "has_part" => Self::HasPart,
            "regulates" => Self::Regulates,
            "positively_regulates" => Self::PositivelyRegulates,
            "negatively_regulates" => Self::NegativelyRegulates,
            "occurs_in" => Self::OccursIn,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::IsA => "is_a",
            Self::PartOf => "part_of",
            Self::HasPart => "has_part",
            Self::Regulates => "regulates",
            Self::PositivelyRegulates => "positively_regulates",
            Self::NegativelyRegulates => "negatively_regulates",
            Self::OccursIn => "occurs_in",
            Self::Other(name) => name,
        }
    }

    pub fn is_is_a(&self) -> bool {
        matches!(self, Self::IsA)
    }
}

impl fmt::Display for RelationQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `source --qualifier--> dest`, numbered densely from 1 by the builder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source: TermId,
    pub dest: TermId,
    pub id: u32,
    pub qualifier: RelationQualifier,
}

impl Relationship {
    pub fn new(source: TermId, dest: TermId, id: u32, qualifier: RelationQualifier) -> Self {
        Self {
            source,
            dest,
            id,
            qualifier,
        }
    }

    pub fn is_a(source: TermId, dest: TermId, id: u32) -> Self {
        Self::new(source, dest, id, RelationQualifier::IsA)
    }
}
