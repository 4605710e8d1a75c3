//! Arena-backed term graph.
//!
//! Vertices are dense `u32` indices into an arena of `TermId`s; edges keep
//! forward and backward adjacency sorted by relationship id. Closures are
//! breadth-first walks over is-a edges with a roaring bitmap visited set.

use ahash::AHashMap;
use roaring::RoaringBitmap;
use std::collections::VecDeque;

use crate::term::Relationship;
use crate::term_id::TermId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub source: u32,
    pub dest: u32,
    pub relation_id: u32,
    pub is_a: bool,
}

/// Walk direction along is-a edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards parents (follow `source is_a dest` forwards).
    Up,
    /// Towards children.
    Down,
}

#[derive(Debug, Clone, Default)]
pub struct TermGraph {
    vertices: Vec<TermId>,
    index: AHashMap<TermId, u32>,
    edges: Vec<Edge>,
    /// Per vertex: indices into `edges`, ascending by relation id.
    outgoing: Vec<Vec<u32>>,
    incoming: Vec<Vec<u32>>,
}

impl TermGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vertex if absent; returns its index either way.
    pub fn add_vertex(&mut self, id: TermId) -> u32 {
        if let Some(&idx) = self.index.get(&id) {
            return idx;
        }
        let idx = self.vertices.len() as u32;
        self.index.insert(id.clone(), idx);
        self.vertices.push(id);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        idx
    }

    /// Insert an edge for `rel`, adding missing endpoints as vertices.
    pub fn add_edge(&mut self, rel: &Relationship) -> u32 {
        let source = self.add_vertex(rel.source.clone());
        let dest = self.add_vertex(rel.dest.clone());
        let edge_idx = self.edges.len() as u32;
        self.edges.push(Edge {
            source,
            dest,
            relation_id: rel.id,
            is_a: rel.qualifier.is_is_a(),
        });

        let edges = &self.edges;
        for list in [
            &mut self.outgoing[source as usize],
            &mut self.incoming[dest as usize],
        ] {
            let pos = list.partition_point(|&e| edges[e as usize].relation_id <= rel.id);
            list.insert(pos, edge_idx);
        }
        edge_idx
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn index_of(&self, id: &TermId) -> Option<u32> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &TermId) -> bool {
        self.index.contains_key(id)
    }

    pub fn vertex(&self, idx: u32) -> &TermId {
        &self.vertices[idx as usize]
    }

    /// Stored copy of `id`, if it is a vertex.
    pub fn get(&self, id: &TermId) -> Option<&TermId> {
        self.index_of(id).map(|idx| self.vertex(idx))
    }

    pub fn vertices(&self) -> impl Iterator<Item = &TermId> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    pub fn out_edges(&self, idx: u32) -> impl Iterator<Item = &Edge> {
        self.outgoing[idx as usize]
            .iter()
            .map(move |&e| &self.edges[e as usize])
    }

    pub fn in_edges(&self, idx: u32) -> impl Iterator<Item = &Edge> {
        self.incoming[idx as usize]
            .iter()
            .map(move |&e| &self.edges[e as usize])
    }

    /// Direct is-a neighbours in relation-id order, duplicates removed.
    pub fn neighbours(&self, idx: u32, direction: Direction) -> Vec<u32> {
        let mut seen = RoaringBitmap::new();
        let next: Box<dyn Iterator<Item = u32> + '_> = match direction {
            Direction::Up => Box::new(self.out_edges(idx).filter(|e| e.is_a).map(|e| e.dest)),
            Direction::Down => Box::new(self.in_edges(idx).filter(|e| e.is_a).map(|e| e.source)),
        };
        next.filter(|&v| seen.insert(v)).collect()
    }

    /// Breadth-first is-a walk; `visit` returning `false` stops the walk.
    pub fn walk<F>(&self, start: u32, direction: Direction, include_self: bool, mut visit: F)
    where
        F: FnMut(u32) -> bool,
    {
        let mut visited = RoaringBitmap::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        if include_self && !visit(start) {
            return;
        }

        while let Some(current) = queue.pop_front() {
            for next in self.neighbours(current, direction) {
                if visited.insert(next) {
                    if !visit(next) {
                        return;
                    }
                    queue.push_back(next);
                }
            }
        }
    }

    /// Is-a closure of `start` as a vertex bitmap.
    pub fn closure(&self, start: u32, direction: Direction, include_self: bool) -> RoaringBitmap {
        let mut out = RoaringBitmap::new();
        self.walk(start, direction, include_self, |v| {
            out.insert(v);
            true
        });
        out
    }

    /// Vertices without an outgoing is-a edge.
    pub fn is_a_sinks(&self) -> Vec<u32> {
        (0..self.vertices.len() as u32)
            .filter(|&v| self.out_edges(v).all(|e| !e.is_a))
            .collect()
    }

    pub fn has_is_a_children(&self, idx: u32) -> bool {
        self.in_edges(idx).any(|e| e.is_a)
    }

    /// Kahn's algorithm over is-a edges. Returns the vertices left with
    /// non-zero in-degree (cycle members plus anything above them), sorted.
    pub fn find_is_a_cycle(&self) -> Option<Vec<TermId>> {
        let n = self.vertices.len();
        let mut in_degree = vec![0usize; n];
        for edge in self.edges.iter().filter(|e| e.is_a) {
            in_degree[edge.dest as usize] += 1;
        }

        let mut queue: VecDeque<u32> = (0..n as u32)
            .filter(|&v| in_degree[v as usize] == 0)
            .collect();
        let mut removed = 0usize;

        while let Some(v) = queue.pop_front() {
            removed += 1;
            for edge in self.out_edges(v).filter(|e| e.is_a) {
                let d = edge.dest as usize;
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    queue.push_back(edge.dest);
                }
            }
        }

        if removed == n {
            return None;
        }
        let mut stuck: Vec<TermId> = (0..n)
            .filter(|&v| in_degree[v] > 0)
            .map(|v| self.vertices[v].clone())
            .collect();
        stuck.sort();
        Some(stuck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::RelationQualifier;

    fn t(n: u32) -> TermId {
        TermId::new("T", n.to_string())
    }

    fn diamond() -> TermGraph {
        // 1 -> {2,3}, 2 -> 4, 3 -> 4, plus 1 part_of 4
        let mut g = TermGraph::new();
        g.add_edge(&Relationship::is_a(t(1), t(3), 2));
        g.add_edge(&Relationship::is_a(t(1), t(2), 1));
        g.add_edge(&Relationship::is_a(t(2), t(4), 3));
        g.add_edge(&Relationship::is_a(t(3), t(4), 4));
        g.add_edge(&Relationship::new(t(1), t(4), 5, RelationQualifier::PartOf));
        g
    }

    #[test]
    fn adjacency_is_sorted_by_relation_id() {
        let g = diamond();
        let one = g.index_of(&t(1)).unwrap();
        let ids: Vec<u32> = g.out_edges(one).map(|e| e.relation_id).collect();
        assert_eq!(ids, vec![1, 2, 5]);
        let parents: Vec<&TermId> = g
            .neighbours(one, Direction::Up)
            .into_iter()
            .map(|v| g.vertex(v))
            .collect();
        assert_eq!(parents, vec![&t(2), &t(3)]);
    }

    #[test]
    fn closure_follows_is_a_only() {
        let g = diamond();
        let one = g.index_of(&t(1)).unwrap();
        let four = g.index_of(&t(4)).unwrap();
        assert_eq!(g.closure(one, Direction::Up, false).len(), 3);
        assert_eq!(g.closure(four, Direction::Down, true).len(), 4);
        assert_eq!(g.is_a_sinks(), vec![four]);
    }

    #[test]
    fn walk_stops_when_visitor_declines() {
        let g = diamond();
        let one = g.index_of(&t(1)).unwrap();
        let mut seen = 0;
        g.walk(one, Direction::Up, true, |_| {
            seen += 1;
            seen < 2
        });
        assert_eq!(seen, 2);
    }

    #[test]
    fn kahn_reports_cycle_members() {
        let mut g = diamond();
        assert!(g.find_is_a_cycle().is_none());
        g.add_edge(&Relationship::is_a(t(4), t(1), 6));
        let stuck = g.find_is_a_cycle().unwrap();
        assert_eq!(stuck, vec![t(1), t(2), t(3), t(4)]);
    }

    #[test]
    fn part_of_loops_are_not_cycles() {
        let mut g = diamond();
        g.add_edge(&Relationship::new(t(4), t(1), 6, RelationQualifier::PartOf));
        assert!(g.find_is_a_cycle().is_none());
    }
}
