//! Phenograph core: immutable ontology DAGs built from OBO stanzas.
//!
//! ```text
//! OBO text ──phenograph-obo──▶ Header + Stanzas
//!          ──OntologyBuilder + EntryFactory──▶ Ontology (frozen)
//! ```
//!
//! - `term_id` / `term`: value types (`TermId`, `Term`, `Relationship`)
//! - `config`: prefix registry and root policy, passed explicitly
//! - `factory`: per-flavour translation of stanzas into terms and edges
//! - `builder`: the accumulate-then-freeze state machine
//! - `graph` / `ontology`: arena graph and the query surface
//! - `loader`: stream entry points

pub mod builder;
pub mod config;
pub mod factory;
pub mod graph;
pub mod loader;
pub mod ontology;
pub mod term;
pub mod term_id;

pub use builder::{BuildReport, BuildWarning, OntologyBuilder};
pub use config::{OntologyConfig, PrefixRegistry, RootPolicy};
pub use factory::{
    EntryFactory, GenericEntryFactory, GoEntryFactory, HpoEntryFactory, UberphenoEntryFactory,
};
pub use graph::{Direction, TermGraph};
pub use loader::{load_ontology, load_ontology_str, load_ontology_with_report};
pub use ontology::{MetaInfo, Ontology, OntologyParts};
pub use term::{RelationQualifier, Relationship, Synonym, Term};
pub use term_id::{TermId, TermIdError};

use phenograph_obo::OboParseError;
use thiserror::Error;

fn join_ids(ids: &[TermId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fatal construction errors. No partially built ontology escapes.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("ontology contains no [Term] stanzas")]
    EmptyOntology,
    #[error("is_a cycle among: {}", join_ids(.members))]
    Cycle { members: Vec<TermId> },
    #[error("no root candidate: every term without an is_a parent is obsolete")]
    NoRoot,
    #[error("{} root candidates ({}) but the root policy rejects multiple roots", .candidates.len(), join_ids(.candidates))]
    MultipleRoots { candidates: Vec<TermId> },
    #[error("artificial root {root} is already a vertex of the ontology")]
    ArtificialRootCollision { root: TermId },
    #[error("invalid term id on line {line}: {source}")]
    InvalidTermId {
        line: usize,
        #[source]
        source: TermIdError,
    },
    #[error("inconsistent ontology parts: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Parse(#[from] OboParseError),
}

/// Lookup failures on a frozen ontology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("term id {0} is not part of the ontology")]
    NotFound(TermId),
    #[error("term id {0} is a vertex without term metadata")]
    NoMetadata(TermId),
    #[error("no relationship with id {0}")]
    UnknownRelationship(u32),
}
