//! Accumulate-then-freeze ontology construction.
//!
//! `OntologyBuilder` collects terms and relationships stanza by stanza.
//! `build` consumes it, so an ontology is frozen exactly once. At freeze
//! time alt ids are resolved, relationship endpoints naming an alt id are
//! redirected, is-a cycles are rejected and the root is selected.

use ahash::{AHashMap, AHashSet};
use phenograph_obo::{Header, OboFile, Stanza, StanzaKind};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{OntologyConfig, RootPolicy};
use crate::factory::EntryFactory;
use crate::graph::TermGraph;
use crate::ontology::{MetaInfo, Ontology, OntologyParts};
use crate::term::{Relationship, Term};
use crate::term_id::TermId;
use crate::BuildError;

/// Tolerated inconsistencies, reported alongside the built ontology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildWarning {
    #[error("{term_id} is referenced by a relationship but has no [Term] stanza")]
    DanglingVertex { term_id: TermId },
    #[error("alt id {alt_id} declared by {declared_by} is a primary id; dropped")]
    AltIdShadowsPrimary { alt_id: TermId, declared_by: TermId },
    #[error("alt id {alt_id} claimed by {kept} and {dropped_from}; keeping {kept}")]
    AltIdConflict {
        alt_id: TermId,
        kept: TermId,
        dropped_from: TermId,
    },
    #[error("second [Term] stanza for {term_id} on line {line} ignored")]
    DuplicateTerm { term_id: TermId, line: usize },
    #[error("{} parentless terms attached to artificial root {root}", .children.len())]
    ArtificialRoot { root: TermId, children: Vec<TermId> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub warnings: Vec<BuildWarning>,
    pub term_stanzas: usize,
    /// `[Typedef]` and `[Instance]` stanzas.
    pub skipped_stanzas: usize,
}

pub struct OntologyBuilder<'f, F: EntryFactory + ?Sized> {
    factory: &'f F,
    config: OntologyConfig,
    meta: MetaInfo,
    /// Stanza order.
    terms: Vec<Term>,
    term_index: AHashMap<TermId, usize>,
    relationships: Vec<Relationship>,
    next_relationship_id: u32,
    report: BuildReport,
}

impl<'f, F: EntryFactory + ?Sized> OntologyBuilder<'f, F> {
    pub fn new(factory: &'f F, config: OntologyConfig) -> Self {
        Self {
            factory,
            config,
            meta: MetaInfo::new(),
            terms: Vec::new(),
            term_index: AHashMap::new(),
            relationships: Vec::new(),
            next_relationship_id: 1,
            report: BuildReport::default(),
        }
    }

    pub fn config(&self) -> &OntologyConfig {
        &self.config
    }

    pub fn header(&mut self, header: &Header) {
        for entry in &header.entries {
            self.meta.push(entry.tag.clone(), entry.value.clone());
        }
    }

    pub fn add_stanza(&mut self, stanza: &Stanza) -> Result<(), BuildError> {
        if stanza.kind != StanzaKind::Term {
            tracing::debug!(
                kind = %stanza.kind,
                id = %stanza.id,
                line = stanza.line,
                "skipping non-term stanza"
            );
            self.report.skipped_stanzas += 1;
            return Ok(());
        }
        self.report.term_stanzas += 1;

        let term = self.factory.make_term(stanza, &self.config)?;
        if self.term_index.contains_key(&term.id) {
            tracing::warn!(term_id = %term.id, line = stanza.line, "duplicate [Term] stanza ignored");
            self.report.warnings.push(BuildWarning::DuplicateTerm {
                term_id: term.id,
                line: stanza.line,
            });
            return Ok(());
        }

        for entry in &stanza.entries {
            let made = self.factory.make_relationship(
                &term.id,
                entry,
                self.next_relationship_id,
                &self.config,
            )?;
            if let Some(rel) = made {
                self.next_relationship_id += 1;
                self.relationships.push(rel);
            }
        }

        self.term_index.insert(term.id.clone(), self.terms.len());
        self.terms.push(term);
        Ok(())
    }

    pub fn add_obo_file(&mut self, file: &OboFile) -> Result<(), BuildError> {
        self.header(&file.header);
        for stanza in &file.stanzas {
            self.add_stanza(stanza)?;
        }
        Ok(())
    }

    pub fn build(self) -> Result<Ontology, BuildError> {
        self.build_with_report().map(|(ontology, _)| ontology)
    }

    pub fn build_with_report(mut self) -> Result<(Ontology, BuildReport), BuildError> {
        if self.terms.is_empty() {
            return Err(BuildError::EmptyOntology);
        }

        let alt_ids = self.resolve_alt_ids();
        self.redirect_alt_endpoints(&alt_ids);
        self.report_dangling();

        let mut graph = TermGraph::new();
        for term in &self.terms {
            graph.add_vertex(term.id.clone());
        }
        for rel in &self.relationships {
            graph.add_edge(rel);
        }

        if let Some(members) = graph.find_is_a_cycle() {
            return Err(BuildError::Cycle { members });
        }

        let root = self.select_root(&mut graph, &alt_ids)?;

        let mut term_ids = BTreeSet::new();
        let mut obsolete_ids = BTreeSet::new();
        let mut terms = AHashMap::with_capacity(self.terms.len());
        for term in self.terms.drain(..) {
            if term.obsolete {
                obsolete_ids.insert(term.id.clone());
            } else {
                term_ids.insert(term.id.clone());
            }
            terms.insert(term.id.clone(), Arc::new(term));
        }
        let relationships: BTreeMap<u32, Arc<Relationship>> = self
            .relationships
            .drain(..)
            .map(|rel| (rel.id, Arc::new(rel)))
            .collect();

        tracing::info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            terms = terms.len(),
            obsolete = obsolete_ids.len(),
            root = %root,
            warnings = self.report.warnings.len(),
            "ontology frozen"
        );

        let ontology = self.factory.make_ontology(OntologyParts {
            meta: self.meta,
            graph,
            root,
            term_ids,
            obsolete_ids,
            terms,
            relationships,
            alt_ids,
        })?;
        Ok((ontology, self.report))
    }

    /// Primary ids win over alt ids; among alt ids the first stanza wins.
    fn resolve_alt_ids(&mut self) -> AHashMap<TermId, TermId> {
        let mut table: AHashMap<TermId, TermId> = AHashMap::new();

        for i in 0..self.terms.len() {
            let primary = self.terms[i].id.clone();
            let declared = std::mem::take(&mut self.terms[i].alt_ids);
            let mut kept = Vec::with_capacity(declared.len());

            for alt in declared {
                if self.term_index.contains_key(&alt) {
                    tracing::warn!(alt_id = %alt, term_id = %primary, "alt id shadows a primary id");
                    self.report.warnings.push(BuildWarning::AltIdShadowsPrimary {
                        alt_id: alt,
                        declared_by: primary.clone(),
                    });
                    continue;
                }
                match table.get(&alt) {
                    Some(owner) if *owner == primary => {}
                    Some(owner) => {
                        tracing::warn!(
                            alt_id = %alt,
                            kept = %owner,
                            term_id = %primary,
                            "alt id claimed by two terms"
                        );
                        self.report.warnings.push(BuildWarning::AltIdConflict {
                            alt_id: alt,
                            kept: owner.clone(),
                            dropped_from: primary.clone(),
                        });
                    }
                    None => {
                        table.insert(alt.clone(), primary.clone());
                        kept.push(alt);
                    }
                }
            }
            self.terms[i].alt_ids = kept;
        }
        table
    }

    fn redirect_alt_endpoints(&mut self, alt_ids: &AHashMap<TermId, TermId>) {
        for rel in &mut self.relationships {
            let relationship_id = rel.id;
            for endpoint in [&mut rel.source, &mut rel.dest] {
                if let Some(primary) = alt_ids.get(&*endpoint) {
                    tracing::debug!(
                        relationship_id,
                        alt_id = %endpoint,
                        term_id = %primary,
                        "redirecting relationship endpoint to primary id"
                    );
                    *endpoint = primary.clone();
                }
            }
        }
    }

    fn report_dangling(&mut self) {
        let mut seen = AHashSet::new();
        for rel in &self.relationships {
            for endpoint in [&rel.source, &rel.dest] {
                if !self.term_index.contains_key(endpoint) && seen.insert(endpoint.clone()) {
                    tracing::warn!(term_id = %endpoint, "relationship endpoint has no [Term] stanza");
                    self.report.warnings.push(BuildWarning::DanglingVertex {
                        term_id: endpoint.clone(),
                    });
                }
            }
        }
    }

    /// Candidates: is-a sinks, minus obsolete sinks nothing hangs below.
    fn select_root(
        &mut self,
        graph: &mut TermGraph,
        alt_ids: &AHashMap<TermId, TermId>,
    ) -> Result<TermId, BuildError> {
        let mut candidates: Vec<TermId> = graph
            .is_a_sinks()
            .into_iter()
            .filter(|&v| {
                let obsolete = self
                    .term_index
                    .get(graph.vertex(v))
                    .is_some_and(|&i| self.terms[i].obsolete);
                !obsolete || graph.has_is_a_children(v)
            })
            .map(|v| graph.vertex(v).clone())
            .collect();
        candidates.sort();

        if candidates.len() <= 1 {
            return candidates.pop().ok_or(BuildError::NoRoot);
        }
        if self.config.root_policy == RootPolicy::Reject {
            return Err(BuildError::MultipleRoots { candidates });
        }

        let root = self.config.artificial_root.clone();
        if graph.contains(&root) || alt_ids.contains_key(&root) {
            return Err(BuildError::ArtificialRootCollision { root });
        }

        graph.add_vertex(root.clone());
        for child in &candidates {
            let rel = Relationship::is_a(child.clone(), root.clone(), self.next_relationship_id);
            self.next_relationship_id += 1;
            graph.add_edge(&rel);
            self.relationships.push(rel);
        }
        self.term_index.insert(root.clone(), self.terms.len());
        self.terms
            .push(Term::new(root.clone(), self.config.artificial_root_name.clone()));

        tracing::warn!(
            root = %root,
            children = candidates.len(),
            "multiple root candidates; attached to artificial root"
        );
        self.report.warnings.push(BuildWarning::ArtificialRoot {
            root: root.clone(),
            children: candidates,
        });
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::HpoEntryFactory;
    use phenograph_obo::parse_obo;

    fn build(text: &str, config: OntologyConfig) -> Result<(Ontology, BuildReport), BuildError> {
        let file = parse_obo(text)?;
        let mut builder = OntologyBuilder::new(&HpoEntryFactory, config);
        builder.add_obo_file(&file)?;
        builder.build_with_report()
    }

    fn id(s: &str) -> TermId {
        TermId::parse(s).unwrap()
    }

    #[test]
    fn relationship_ids_are_dense_in_stanza_order() {
        let text = "[Term]\nid: HP:2\nis_a: HP:1\nrelationship: part_of HP:1\n\n[Term]\nid: HP:1\n\n[Term]\nid: HP:3\nis_a: HP:2\nis_a: HP:1\n";
        let (onto, report) = build(text, OntologyConfig::default()).unwrap();
        let pairs: Vec<(u32, String, String)> = onto
            .relationships()
            .map(|r| (r.id, r.source.to_string(), r.dest.to_string()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (1, "HP:2".into(), "HP:1".into()),
                (2, "HP:3".into(), "HP:2".into()),
                (3, "HP:3".into(), "HP:1".into()),
            ]
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn alt_id_endpoints_are_redirected() {
        let text = "[Term]\nid: HP:1\nalt_id: HP:100\n\n[Term]\nid: HP:2\nis_a: HP:100\n";
        let (onto, report) = build(text, OntologyConfig::default()).unwrap();
        assert_eq!(onto.parents(&id("HP:2")).unwrap(), vec![id("HP:1")]);
        assert!(!onto.graph().contains(&id("HP:100")));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn duplicate_term_stanza_is_ignored_with_warning() {
        let text = "[Term]\nid: HP:1\nname: first\n\n[Term]\nid: HP:1\nname: second\n";
        let (onto, report) = build(text, OntologyConfig::default()).unwrap();
        assert_eq!(onto.term(&id("HP:1")).unwrap().name, "first");
        assert_eq!(
            report.warnings,
            vec![BuildWarning::DuplicateTerm {
                term_id: id("HP:1"),
                line: 5
            }]
        );
    }

    #[test]
    fn artificial_root_collision_is_fatal() {
        let text = "[Term]\nid: owl:Thing\n\n[Term]\nid: HP:1\n\n[Term]\nid: HP:2\n";
        let err = build(text, OntologyConfig::default()).unwrap_err();
        assert!(matches!(err, BuildError::ArtificialRootCollision { .. }));
    }

    #[test]
    fn obsolete_sink_with_children_stays_a_candidate() {
        let text = "[Term]\nid: HP:1\nis_obsolete: true\n\n[Term]\nid: HP:2\nis_a: HP:1\n";
        let (onto, _) = build(text, OntologyConfig::default()).unwrap();
        assert_eq!(onto.root(), &id("HP:1"));
    }
}
