//! Typed stanza entries produced by the grammar layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Entry types
// ============================================================================

/// The closed set of entry kinds the grammar distinguishes.
///
/// Tags the grammar has no dedicated rule for land in `Generic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StanzaEntryType {
    Id,
    Name,
    Def,
    Comment,
    Synonym,
    Xref,
    IsA,
    Relationship,
    AltId,
    ReplacedBy,
    Consider,
    UnionOf,
    IntersectionOf,
    DisjointFrom,
    Subset,
    Namespace,
    CreatedBy,
    CreationDate,
    IsObsolete,
    IsAnonymous,
    PropertyValue,
    Generic,
}

impl StanzaEntryType {
    /// Resolve an OBO tag. Legacy OBO 1.2 synonym tags map to `Synonym`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "id" => Self::Id,
            "name" => Self::Name,
            "def" => Self::Def,
            "comment" => Self::Comment,
            "synonym" | "exact_synonym" | "narrow_synonym" | "broad_synonym"
            | "related_synonym" => Self::Synonym,
            "xref" | "xref_analog" => Self::Xref,
            "is_a" => Self::IsA,
            "relationship" => Self::Relationship,
            "alt_id" => Self::AltId,
            "replaced_by" => Self::ReplacedBy,
            "consider" => Self::Consider,
            "union_of" => Self::UnionOf,
            "intersection_of" => Self::IntersectionOf,
            "disjoint_from" => Self::DisjointFrom,
            "subset" => Self::Subset,
            "namespace" => Self::Namespace,
            "created_by" => Self::CreatedBy,
            "creation_date" => Self::CreationDate,
            "is_obsolete" => Self::IsObsolete,
            "is_anonymous" => Self::IsAnonymous,
            "property_value" => Self::PropertyValue,
            _ => Self::Generic,
        }
    }

    /// Entries a single stanza may carry at most once.
    pub fn is_single_valued(self) -> bool {
        matches!(
            self,
            Self::Id
                | Self::Name
                | Self::Def
                | Self::Comment
                | Self::IsObsolete
                | Self::CreatedBy
                | Self::CreationDate
        )
    }
}

impl fmt::Display for StanzaEntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Def => "def",
            Self::Comment => "comment",
            Self::Synonym => "synonym",
            Self::Xref => "xref",
            Self::IsA => "is_a",
            Self::Relationship => "relationship",
            Self::AltId => "alt_id",
            Self::ReplacedBy => "replaced_by",
            Self::Consider => "consider",
            Self::UnionOf => "union_of",
            Self::IntersectionOf => "intersection_of",
            Self::DisjointFrom => "disjoint_from",
            Self::Subset => "subset",
            Self::Namespace => "namespace",
            Self::CreatedBy => "created_by",
            Self::CreationDate => "creation_date",
            Self::IsObsolete => "is_obsolete",
            Self::IsAnonymous => "is_anonymous",
            Self::PropertyValue => "property_value",
            Self::Generic => "generic",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Payload pieces
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynonymScope {
    Exact,
    Related,
    Broad,
    Narrow,
}

impl FromStr for SynonymScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXACT" => Ok(Self::Exact),
            "RELATED" => Ok(Self::Related),
            "BROAD" => Ok(Self::Broad),
            "NARROW" => Ok(Self::Narrow),
            other => Err(format!("unknown synonym scope `{other}`")),
        }
    }
}

impl fmt::Display for SynonymScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Exact => "EXACT",
            Self::Related => "RELATED",
            Self::Broad => "BROAD",
            Self::Narrow => "NARROW",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// `{key=value, ...}` block following an entry value. Order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrailingModifier {
    pub pairs: Vec<KeyValue>,
}

impl TrailingModifier {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Database cross-reference, e.g. `PMID:123 "some paper"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dbxref {
    pub name: String,
    pub description: Option<String>,
}

impl Dbxref {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryValue {
    Id {
        id: String,
    },
    Name {
        name: String,
    },
    Def {
        text: String,
        xrefs: Vec<Dbxref>,
    },
    Comment {
        text: String,
    },
    Synonym {
        text: String,
        scope: SynonymScope,
        type_name: Option<String>,
        xrefs: Vec<Dbxref>,
    },
    Xref {
        xref: Dbxref,
    },
    IsA {
        id: String,
    },
    Relationship {
        relation: String,
        target: String,
    },
    AltId {
        id: String,
    },
    ReplacedBy {
        id: String,
    },
    Consider {
        id: String,
    },
    UnionOf {
        id: String,
    },
    IntersectionOf {
        relation: Option<String>,
        id: String,
    },
    DisjointFrom {
        id: String,
    },
    Subset {
        name: String,
    },
    Namespace {
        name: String,
    },
    CreatedBy {
        name: String,
    },
    CreationDate {
        value: String,
    },
    IsObsolete {
        value: bool,
    },
    IsAnonymous {
        value: bool,
    },
    PropertyValue {
        relation: String,
        value: String,
        datatype: Option<String>,
    },
    Generic {
        tag: String,
        value: String,
    },
}

impl EntryValue {
    pub fn entry_type(&self) -> StanzaEntryType {
        match self {
            EntryValue::Id { .. } => StanzaEntryType::Id,
            EntryValue::Name { .. } => StanzaEntryType::Name,
            EntryValue::Def { .. } => StanzaEntryType::Def,
            EntryValue::Comment { .. } => StanzaEntryType::Comment,
            EntryValue::Synonym { .. } => StanzaEntryType::Synonym,
            EntryValue::Xref { .. } => StanzaEntryType::Xref,
            EntryValue::IsA { .. } => StanzaEntryType::IsA,
            EntryValue::Relationship { .. } => StanzaEntryType::Relationship,
            EntryValue::AltId { .. } => StanzaEntryType::AltId,
            EntryValue::ReplacedBy { .. } => StanzaEntryType::ReplacedBy,
            EntryValue::Consider { .. } => StanzaEntryType::Consider,
            EntryValue::UnionOf { .. } => StanzaEntryType::UnionOf,
            EntryValue::IntersectionOf { .. } => StanzaEntryType::IntersectionOf,
            EntryValue::DisjointFrom { .. } => StanzaEntryType::DisjointFrom,
            EntryValue::Subset { .. } => StanzaEntryType::Subset,
            EntryValue::Namespace { .. } => StanzaEntryType::Namespace,
            EntryValue::CreatedBy { .. } => StanzaEntryType::CreatedBy,
            EntryValue::CreationDate { .. } => StanzaEntryType::CreationDate,
            EntryValue::IsObsolete { .. } => StanzaEntryType::IsObsolete,
            EntryValue::IsAnonymous { .. } => StanzaEntryType::IsAnonymous,
            EntryValue::PropertyValue { .. } => StanzaEntryType::PropertyValue,
            EntryValue::Generic { .. } => StanzaEntryType::Generic,
        }
    }
}

/// One parsed `tag: value {modifier} ! comment` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StanzaEntry {
    pub value: EntryValue,
    pub modifier: Option<TrailingModifier>,
    pub comment: Option<String>,
    /// 1-based source line.
    pub line: usize,
}

impl StanzaEntry {
    pub fn entry_type(&self) -> StanzaEntryType {
        self.value.entry_type()
    }

    /// The identifier payload of id-valued entries.
    ///
    /// For `relationship` this is the target, for `intersection_of` the
    /// class operand.
    pub fn id(&self) -> Option<&str> {
        match &self.value {
            EntryValue::Id { id }
            | EntryValue::IsA { id }
            | EntryValue::AltId { id }
            | EntryValue::ReplacedBy { id }
            | EntryValue::Consider { id }
            | EntryValue::UnionOf { id }
            | EntryValue::DisjointFrom { id }
            | EntryValue::IntersectionOf { id, .. } => Some(id.as_str()),
            EntryValue::Relationship { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }
}
