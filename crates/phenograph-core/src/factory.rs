//! Entry factories: per-flavour translation of stanzas into domain values.
//!
//! The builder owns numbering and graph bookkeeping; a factory only decides
//! what a stanza means. `make_relationship` returning `Ok(None)` means the
//! entry is not an edge for this flavour and consumes no relationship id.

use phenograph_obo::{EntryValue, Stanza, StanzaEntry};

use crate::config::OntologyConfig;
use crate::ontology::{Ontology, OntologyParts};
use crate::term::{parse_creation_date, RelationQualifier, Relationship, Synonym, Term};
use crate::term_id::TermId;
use crate::BuildError;

pub trait EntryFactory {
    fn make_term(&self, stanza: &Stanza, config: &OntologyConfig) -> Result<Term, BuildError> {
        term_from_stanza(stanza, config)
    }

    fn make_relationship(
        &self,
        source: &TermId,
        entry: &StanzaEntry,
        id: u32,
        config: &OntologyConfig,
    ) -> Result<Option<Relationship>, BuildError>;

    fn make_ontology(&self, parts: OntologyParts) -> Result<Ontology, BuildError> {
        Ontology::from_parts(parts)
    }
}

/// Human Phenotype Ontology: is-a edges only.
#[derive(Debug, Clone, Copy, Default)]
pub struct HpoEntryFactory;

/// Gene Ontology: is-a plus the GO relation vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoEntryFactory;

/// Uberpheno cross-species phenotypes: is-a edges only.
#[derive(Debug, Clone, Copy, Default)]
pub struct UberphenoEntryFactory;

/// Any OBO ontology: is-a plus every `relationship:` entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericEntryFactory;

impl EntryFactory for HpoEntryFactory {
    fn make_relationship(
        &self,
        source: &TermId,
        entry: &StanzaEntry,
        id: u32,
        config: &OntologyConfig,
    ) -> Result<Option<Relationship>, BuildError> {
        edge_from_entry(source, entry, id, config, RelationQualifier::is_is_a)
    }
}

impl EntryFactory for UberphenoEntryFactory {
    fn make_relationship(
        &self,
        source: &TermId,
        entry: &StanzaEntry,
        id: u32,
        config: &OntologyConfig,
    ) -> Result<Option<Relationship>, BuildError> {
        edge_from_entry(source, entry, id, config, RelationQualifier::is_is_a)
    }
}

impl EntryFactory for GoEntryFactory {
    fn make_relationship(
        &self,
        source: &TermId,
        entry: &StanzaEntry,
        id: u32,
        config: &OntologyConfig,
    ) -> Result<Option<Relationship>, BuildError> {
        edge_from_entry(source, entry, id, config, |q| {
            !matches!(q, RelationQualifier::Other(_))
        })
    }
}

impl EntryFactory for GenericEntryFactory {
    fn make_relationship(
        &self,
        source: &TermId,
        entry: &StanzaEntry,
        id: u32,
        config: &OntologyConfig,
    ) -> Result<Option<Relationship>, BuildError> {
        edge_from_entry(source, entry, id, config, |_| true)
    }
}

fn parse_id(config: &OntologyConfig, text: &str, line: usize) -> Result<TermId, BuildError> {
    config
        .parse_term_id(text)
        .map_err(|source| BuildError::InvalidTermId { line, source })
}

/// Shared `is_a:` / `relationship:` translation, filtered by `accept`.
pub fn edge_from_entry(
    source: &TermId,
    entry: &StanzaEntry,
    id: u32,
    config: &OntologyConfig,
    accept: impl Fn(&RelationQualifier) -> bool,
) -> Result<Option<Relationship>, BuildError> {
    let (qualifier, target) = match &entry.value {
        EntryValue::IsA { id: target } => (RelationQualifier::IsA, target),
        EntryValue::Relationship { relation, target } => {
            (RelationQualifier::from_name(relation), target)
        }
        _ => return Ok(None),
    };
    if !accept(&qualifier) {
        return Ok(None);
    }
    let dest = parse_id(config, target, entry.line)?;
    Ok(Some(Relationship::new(source.clone(), dest, id, qualifier)))
}

/// Default stanza → `Term` translation shared by every flavour.
pub fn term_from_stanza(stanza: &Stanza, config: &OntologyConfig) -> Result<Term, BuildError> {
    let id = parse_id(config, &stanza.id, stanza.line)?;
    let mut term = Term::new(id, String::new());

    for entry in &stanza.entries {
        match &entry.value {
            EntryValue::Name { name } => term.name = name.clone(),
            EntryValue::Def { text, xrefs } => {
                term.definition = Some(text.clone());
                term.definition_xrefs = xrefs.clone();
            }
            EntryValue::Comment { text } => term.comment = Some(text.clone()),
            EntryValue::Synonym {
                text,
                scope,
                type_name,
                xrefs,
            } => term.synonyms.push(Synonym {
                text: text.clone(),
                scope: *scope,
                type_name: type_name.clone(),
                xrefs: xrefs.clone(),
            }),
            EntryValue::Xref { xref } => term.xrefs.push(xref.clone()),
            EntryValue::AltId { id } => term.alt_ids.push(parse_id(config, id, entry.line)?),
            EntryValue::ReplacedBy { id } => {
                term.replaced_by.push(parse_id(config, id, entry.line)?);
                term.obsolete = true;
            }
            EntryValue::Consider { id } => term.consider.push(parse_id(config, id, entry.line)?),
            EntryValue::Subset { name } => term.subsets.push(name.clone()),
            EntryValue::Namespace { name } => term.namespace = Some(name.clone()),
            EntryValue::IsObsolete { value } => term.obsolete |= *value,
            EntryValue::CreatedBy { name } => term.created_by = Some(name.clone()),
            EntryValue::CreationDate { value } => {
                term.creation_date = parse_creation_date(value);
                if term.creation_date.is_none() {
                    tracing::debug!(
                        term_id = %term.id,
                        line = entry.line,
                        value = %value,
                        "unparsable creation_date ignored"
                    );
                }
            }
            _ => {}
        }
    }

    Ok(term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenograph_obo::parse_stanza_entry;

    fn source() -> TermId {
        TermId::new("GO", "0000001")
    }

    fn rel(factory: &dyn EntryFactory, line: &str) -> Option<Relationship> {
        let entry = parse_stanza_entry(line).unwrap();
        factory
            .make_relationship(&source(), &entry, 7, &OntologyConfig::default())
            .unwrap()
    }

    #[test]
    fn hpo_accepts_only_is_a() {
        let r = rel(&HpoEntryFactory, "is_a: HP:0000001 ! All").unwrap();
        assert_eq!(r.id, 7);
        assert_eq!(r.dest, TermId::new("HP", "0000001"));
        assert!(rel(&HpoEntryFactory, "relationship: part_of HP:0000002").is_none());
        assert!(rel(&HpoEntryFactory, "name: not an edge").is_none());
    }

    #[test]
    fn go_accepts_known_relations_only() {
        let part_of = rel(&GoEntryFactory, "relationship: part_of GO:0005634").unwrap();
        assert_eq!(part_of.qualifier, RelationQualifier::PartOf);
        assert!(rel(&GoEntryFactory, "relationship: results_in GO:1").is_none());
    }

    #[test]
    fn generic_keeps_unknown_relations() {
        let r = rel(&GenericEntryFactory, "relationship: results_in GO:1").unwrap();
        assert_eq!(r.qualifier, RelationQualifier::Other("results_in".to_string()));
    }

    #[test]
    fn bad_target_is_an_invalid_term_id() {
        let entry = parse_stanza_entry("is_a: nocolon").unwrap();
        let err = HpoEntryFactory
            .make_relationship(&source(), &entry, 1, &OntologyConfig::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidTermId { line: 1, .. }));
    }
}
