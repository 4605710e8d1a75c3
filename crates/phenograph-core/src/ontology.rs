//! The frozen ontology and its query surface.

use ahash::AHashMap;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::graph::{Direction, TermGraph};
use crate::term::{Relationship, Term};
use crate::term_id::TermId;
use crate::{BuildError, QueryError};

// ============================================================================
// Header metadata
// ============================================================================

/// Header key/value pairs in file order; keys may repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    entries: Vec<(String, String)>,
}

impl MetaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Ontology
// ============================================================================

/// Everything an `EntryFactory` needs to freeze an ontology.
#[derive(Debug, Clone)]
pub struct OntologyParts {
    pub meta: MetaInfo,
    pub graph: TermGraph,
    pub root: TermId,
    /// Non-obsolete primary ids.
    pub term_ids: BTreeSet<TermId>,
    pub obsolete_ids: BTreeSet<TermId>,
    pub terms: AHashMap<TermId, Arc<Term>>,
    pub relationships: BTreeMap<u32, Arc<Relationship>>,
    /// Alt id → primary id.
    pub alt_ids: AHashMap<TermId, TermId>,
}

/// Immutable ontology DAG. Cheap to share across threads.
#[derive(Debug, Clone)]
pub struct Ontology {
    meta: MetaInfo,
    graph: TermGraph,
    root: TermId,
    term_ids: BTreeSet<TermId>,
    obsolete_ids: BTreeSet<TermId>,
    terms: AHashMap<TermId, Arc<Term>>,
    relationships: BTreeMap<u32, Arc<Relationship>>,
    alt_ids: AHashMap<TermId, TermId>,
}

impl Ontology {
    /// Freeze `parts` after checking that they describe one consistent graph.
    pub fn from_parts(parts: OntologyParts) -> Result<Self, BuildError> {
        if !parts.graph.contains(&parts.root) {
            return Err(BuildError::Inconsistent(format!(
                "root {} is not a vertex",
                parts.root
            )));
        }
        if let Some(id) = parts.terms.keys().find(|id| !parts.graph.contains(id)) {
            return Err(BuildError::Inconsistent(format!(
                "term {id} is not a vertex"
            )));
        }
        let partitioned = parts.term_ids.len() + parts.obsolete_ids.len() == parts.terms.len()
            && parts
                .term_ids
                .iter()
                .chain(&parts.obsolete_ids)
                .all(|id| parts.terms.contains_key(id));
        if !partitioned {
            return Err(BuildError::Inconsistent(
                "term id partition does not match the term map".to_string(),
            ));
        }
        if let Some(rel) = parts.relationships.values().find(|r| {
            !parts.graph.contains(&r.source) || !parts.graph.contains(&r.dest)
        }) {
            return Err(BuildError::Inconsistent(format!(
                "relationship {} has an endpoint outside the graph",
                rel.id
            )));
        }
        if let Some((alt, primary)) = parts
            .alt_ids
            .iter()
            .find(|(alt, primary)| parts.terms.contains_key(*alt) || !parts.terms.contains_key(*primary))
        {
            return Err(BuildError::Inconsistent(format!(
                "alt id {alt} does not resolve to exactly one term (primary {primary})"
            )));
        }
        Ok(Self::assemble(parts))
    }

    fn assemble(parts: OntologyParts) -> Self {
        Self {
            meta: parts.meta,
            graph: parts.graph,
            root: parts.root,
            term_ids: parts.term_ids,
            obsolete_ids: parts.obsolete_ids,
            terms: parts.terms,
            relationships: parts.relationships,
            alt_ids: parts.alt_ids,
        }
    }

    pub fn meta(&self) -> &MetaInfo {
        &self.meta
    }

    pub fn graph(&self) -> &TermGraph {
        &self.graph
    }

    pub fn root(&self) -> &TermId {
        &self.root
    }

    pub fn is_root(&self, id: &TermId) -> bool {
        self.primary_id(id) == Some(&self.root)
    }

    /// Resolve `id` to the vertex it names; alt ids are redirected.
    pub fn primary_id(&self, id: &TermId) -> Option<&TermId> {
        self.graph.get(id).or_else(|| self.alt_ids.get(id))
    }

    pub fn contains(&self, id: &TermId) -> bool {
        self.primary_id(id).is_some()
    }

    pub fn alt_ids(&self) -> &AHashMap<TermId, TermId> {
        &self.alt_ids
    }

    pub fn term(&self, id: &TermId) -> Result<&Arc<Term>, QueryError> {
        let primary = self
            .primary_id(id)
            .ok_or_else(|| QueryError::NotFound(id.clone()))?;
        self.terms
            .get(primary)
            .ok_or_else(|| QueryError::NoMetadata(primary.clone()))
    }

    pub fn relationship(&self, id: u32) -> Result<&Arc<Relationship>, QueryError> {
        self.relationships
            .get(&id)
            .ok_or(QueryError::UnknownRelationship(id))
    }

    /// All relationships, ascending by numeric id.
    pub fn relationships(&self) -> impl Iterator<Item = &Arc<Relationship>> {
        self.relationships.values()
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn count_all_terms(&self) -> usize {
        self.terms.len()
    }

    pub fn all_term_ids(&self) -> BTreeSet<TermId> {
        self.term_ids
            .iter()
            .chain(&self.obsolete_ids)
            .cloned()
            .collect()
    }

    pub fn non_obsolete_term_ids(&self) -> &BTreeSet<TermId> {
        &self.term_ids
    }

    pub fn obsolete_term_ids(&self) -> &BTreeSet<TermId> {
        &self.obsolete_ids
    }

    fn index_of(&self, id: &TermId) -> Result<u32, QueryError> {
        self.primary_id(id)
            .and_then(|primary| self.graph.index_of(primary))
            .ok_or_else(|| QueryError::NotFound(id.clone()))
    }

    fn ids_of(&self, bitmap: &RoaringBitmap) -> BTreeSet<TermId> {
        bitmap.iter().map(|v| self.graph.vertex(v).clone()).collect()
    }

    fn relationships_on(&self, edges: impl Iterator<Item = u32>) -> Vec<&Arc<Relationship>> {
        edges
            .filter_map(|relation_id| self.relationships.get(&relation_id))
            .collect()
    }

    // --- Hierarchy ---------------------------------------------------------

    /// Direct is-a parents, by ascending relationship id.
    pub fn parents(&self, id: &TermId) -> Result<Vec<TermId>, QueryError> {
        let idx = self.index_of(id)?;
        Ok(self
            .graph
            .neighbours(idx, Direction::Up)
            .into_iter()
            .map(|v| self.graph.vertex(v).clone())
            .collect())
    }

    /// Direct is-a children, by ascending relationship id.
    pub fn children(&self, id: &TermId) -> Result<Vec<TermId>, QueryError> {
        let idx = self.index_of(id)?;
        Ok(self
            .graph
            .neighbours(idx, Direction::Down)
            .into_iter()
            .map(|v| self.graph.vertex(v).clone())
            .collect())
    }

    pub fn ancestors(&self, id: &TermId, include_self: bool) -> Result<BTreeSet<TermId>, QueryError> {
        let idx = self.index_of(id)?;
        Ok(self.ids_of(&self.graph.closure(idx, Direction::Up, include_self)))
    }

    pub fn descendants(
        &self,
        id: &TermId,
        include_self: bool,
    ) -> Result<BTreeSet<TermId>, QueryError> {
        let idx = self.index_of(id)?;
        Ok(self.ids_of(&self.graph.closure(idx, Direction::Down, include_self)))
    }

    /// Breadth-first over ancestors; `visit` returning `false` stops.
    pub fn visit_ancestors<F>(&self, id: &TermId, include_self: bool, mut visit: F) -> Result<(), QueryError>
    where
        F: FnMut(&TermId) -> bool,
    {
        let idx = self.index_of(id)?;
        self.graph
            .walk(idx, Direction::Up, include_self, |v| visit(self.graph.vertex(v)));
        Ok(())
    }

    /// Breadth-first over descendants; `visit` returning `false` stops.
    pub fn visit_descendants<F>(&self, id: &TermId, include_self: bool, mut visit: F) -> Result<(), QueryError>
    where
        F: FnMut(&TermId) -> bool,
    {
        let idx = self.index_of(id)?;
        self.graph
            .walk(idx, Direction::Down, include_self, |v| visit(self.graph.vertex(v)));
        Ok(())
    }

    /// Whether `to` is reachable from `from` along is-a edges (reflexive).
    pub fn exists_path(&self, from: &TermId, to: &TermId) -> Result<bool, QueryError> {
        let start = self.index_of(from)?;
        let goal = self.index_of(to)?;
        let mut found = false;
        self.graph.walk(start, Direction::Up, true, |v| {
            found = v == goal;
            !found
        });
        Ok(found)
    }

    /// Ancestors shared by `a` and `b`, each counted inclusively.
    pub fn common_ancestors(&self, a: &TermId, b: &TermId) -> Result<BTreeSet<TermId>, QueryError> {
        let left = self.graph.closure(self.index_of(a)?, Direction::Up, true);
        let right = self.graph.closure(self.index_of(b)?, Direction::Up, true);
        Ok(self.ids_of(&(left & right)))
    }

    /// Ancestor closure of every vertex, computed in parallel.
    pub fn ancestor_map(&self, include_self: bool) -> BTreeMap<TermId, BTreeSet<TermId>> {
        (0..self.graph.vertex_count() as u32)
            .into_par_iter()
            .map(|v| {
                let closure = self.graph.closure(v, Direction::Up, include_self);
                (self.graph.vertex(v).clone(), self.ids_of(&closure))
            })
            .collect()
    }

    pub fn outgoing_relationships(&self, id: &TermId) -> Result<Vec<&Arc<Relationship>>, QueryError> {
        let idx = self.index_of(id)?;
        Ok(self.relationships_on(self.graph.out_edges(idx).map(|e| e.relation_id)))
    }

    pub fn incoming_relationships(&self, id: &TermId) -> Result<Vec<&Arc<Relationship>>, QueryError> {
        let idx = self.index_of(id)?;
        Ok(self.relationships_on(self.graph.in_edges(idx).map(|e| e.relation_id)))
    }

    // --- Derivation --------------------------------------------------------

    /// The sub-hierarchy headed by `id`: `id` plus its is-a descendants,
    /// with every relationship whose endpoints both lie inside.
    ///
    /// The root is the original root when it is inside, otherwise `id`.
    /// Term and relationship values are shared with `self`.
    pub fn sub_ontology(&self, id: &TermId) -> Result<Ontology, QueryError> {
        let start = self.index_of(id)?;
        let members = self.graph.closure(start, Direction::Down, true);

        let mut graph = TermGraph::new();
        for v in &members {
            graph.add_vertex(self.graph.vertex(v).clone());
        }

        let mut relationships = BTreeMap::new();
        for edge in self.graph.edges() {
            if !(members.contains(edge.source) && members.contains(edge.dest)) {
                continue;
            }
            if let Some(rel) = self.relationships.get(&edge.relation_id) {
                relationships.insert(rel.id, Arc::clone(rel));
            }
        }
        for rel in relationships.values() {
            graph.add_edge(rel);
        }

        let terms: AHashMap<TermId, Arc<Term>> = self
            .terms
            .iter()
            .filter(|(tid, _)| graph.contains(tid))
            .map(|(tid, term)| (tid.clone(), Arc::clone(term)))
            .collect();
        let term_ids = self
            .term_ids
            .iter()
            .filter(|tid| terms.contains_key(*tid))
            .cloned()
            .collect();
        let obsolete_ids = self
            .obsolete_ids
            .iter()
            .filter(|tid| terms.contains_key(*tid))
            .cloned()
            .collect();
        let alt_ids = self
            .alt_ids
            .iter()
            .filter(|(_, primary)| terms.contains_key(*primary))
            .map(|(alt, primary)| (alt.clone(), primary.clone()))
            .collect();

        let root = if self
            .graph
            .index_of(&self.root)
            .is_some_and(|r| members.contains(r))
        {
            self.root.clone()
        } else {
            self.graph.vertex(start).clone()
        };

        Ok(Self::assemble(OntologyParts {
            meta: self.meta.clone(),
            graph,
            root,
            term_ids,
            obsolete_ids,
            terms,
            relationships,
            alt_ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(n: u32) -> TermId {
        TermId::new("T", n.to_string())
    }

    fn parts() -> OntologyParts {
        let mut graph = TermGraph::new();
        let mut relationships = BTreeMap::new();
        for (id, (s, d)) in [(1, 2), (2, 3)].into_iter().enumerate() {
            let rel = Arc::new(Relationship::is_a(t(s), t(d), id as u32 + 1));
            graph.add_edge(&rel);
            relationships.insert(rel.id, rel);
        }
        let terms: AHashMap<_, _> = (1..=3)
            .map(|n| (t(n), Arc::new(Term::new(t(n), format!("term {n}")))))
            .collect();
        OntologyParts {
            meta: MetaInfo::new(),
            graph,
            root: t(3),
            term_ids: (1..=3).map(t).collect(),
            obsolete_ids: BTreeSet::new(),
            terms,
            relationships,
            alt_ids: AHashMap::new(),
        }
    }

    #[test]
    fn from_parts_accepts_consistent_parts() {
        let onto = Ontology::from_parts(parts()).unwrap();
        assert_eq!(onto.root(), &t(3));
        assert_eq!(onto.count_all_terms(), 3);
    }

    #[test]
    fn from_parts_rejects_foreign_root() {
        let mut p = parts();
        p.root = t(9);
        assert!(matches!(
            Ontology::from_parts(p),
            Err(BuildError::Inconsistent(_))
        ));
    }

    #[test]
    fn from_parts_rejects_alt_id_shadowing_a_term() {
        let mut p = parts();
        p.alt_ids.insert(t(1), t(2));
        assert!(matches!(
            Ontology::from_parts(p),
            Err(BuildError::Inconsistent(_))
        ));
    }

    #[test]
    fn meta_info_keeps_repeated_keys() {
        let mut meta = MetaInfo::new();
        meta.push("subsetdef", "a");
        meta.push("format-version", "1.2");
        meta.push("subsetdef", "b");
        assert_eq!(meta.get("subsetdef"), Some("a"));
        assert_eq!(meta.get_all("subsetdef").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(meta.len(), 3);

        let value = {
            let key = String::from("format-version");
            meta.get(&key)
        };
        assert_eq!(value, Some("1.2"));
    }

    #[test]
    fn ontology_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Ontology>();
    }
}
