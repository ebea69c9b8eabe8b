//! Port-level directed graph of a scheme.

use crate::core::types::{ConnectionId, PortId};
use std::collections::{HashMap, HashSet};

/// Edge tag: inside one element, or between two elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Declared by an element's internal connection groups
    Internal,
    /// Registered connection, or `None` for a direct port link
    External(Option<ConnectionId>),
}

/// A directed edge between two ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortEdge {
    pub from: PortId,
    pub to: PortId,
    pub kind: EdgeKind,
}

impl PortEdge {
    pub fn internal(from: PortId, to: PortId) -> Self {
        Self {
            from,
            to,
            kind: EdgeKind::Internal,
        }
    }

    pub fn external(from: PortId, to: PortId, connection: Option<ConnectionId>) -> Self {
        Self {
            from,
            to,
            kind: EdgeKind::External(connection),
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, EdgeKind::External(_))
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        match self.kind {
            EdgeKind::External(connection) => connection,
            EdgeKind::Internal => None,
        }
    }
}

/// Ports as nodes; edges in insertion order with per-port indices.
#[derive(Debug, Clone, Default)]
pub struct PortGraph {
    nodes: HashSet<PortId>,
    edges: Vec<PortEdge>,
    edge_set: HashSet<PortEdge>,
    outgoing: HashMap<PortId, Vec<usize>>,
    incoming: HashMap<PortId, Vec<usize>>,
}

impl PortGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, port: PortId) {
        self.nodes.insert(port);
        self.outgoing.entry(port).or_default();
        self.incoming.entry(port).or_default();
    }

    pub fn contains_node(&self, port: PortId) -> bool {
        self.nodes.contains(&port)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Add an edge; an identical edge already present is not duplicated
    pub fn add_edge(&mut self, edge: PortEdge) {
        if !self.edge_set.insert(edge) {
            return;
        }
        self.add_node(edge.from);
        self.add_node(edge.to);
        let idx = self.edges.len();
        self.outgoing.entry(edge.from).or_default().push(idx);
        self.incoming.entry(edge.to).or_default().push(idx);
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[PortEdge] {
        &self.edges
    }

    pub fn external_edges(&self) -> impl Iterator<Item = &PortEdge> + '_ {
        self.edges.iter().filter(|edge| edge.is_external())
    }

    pub fn outgoing_edges(&self, port: PortId) -> impl Iterator<Item = &PortEdge> + '_ {
        self.outgoing
            .get(&port)
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&i| &self.edges[i]))
    }

    pub fn incoming_edges(&self, port: PortId) -> impl Iterator<Item = &PortEdge> + '_ {
        self.incoming
            .get(&port)
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&i| &self.edges[i]))
    }

    /// Keep only the edges matching `keep`, then rebuild the indices
    pub fn retain_edges<F>(&mut self, keep: F)
    where
        F: FnMut(&PortEdge) -> bool,
    {
        self.edges.retain(keep);
        self.edge_set = self.edges.iter().copied().collect();
        for indices in self.outgoing.values_mut() {
            indices.clear();
        }
        for indices in self.incoming.values_mut() {
            indices.clear();
        }
        for (idx, edge) in self.edges.iter().enumerate() {
            self.outgoing.entry(edge.from).or_default().push(idx);
            self.incoming.entry(edge.to).or_default().push(idx);
        }
    }

    /// Remove ports together with every edge touching them
    pub fn remove_nodes(&mut self, ports: &HashSet<PortId>) {
        self.retain_edges(|edge| !ports.contains(&edge.from) && !ports.contains(&edge.to));
        for port in ports {
            self.nodes.remove(port);
            self.outgoing.remove(port);
            self.incoming.remove(port);
        }
    }

    pub fn remove_connection(&mut self, connection: ConnectionId) {
        self.retain_edges(|edge| edge.connection() != Some(connection));
    }

    /// Replace every internal edge leaving one of `ports` with `edges`.
    /// Leaves the graph untouched when the edge set is unchanged.
    pub fn replace_internal_edges(&mut self, ports: &HashSet<PortId>, edges: Vec<PortEdge>) {
        let current: HashSet<PortEdge> = ports
            .iter()
            .flat_map(|port| self.outgoing_edges(*port))
            .filter(|edge| edge.kind == EdgeKind::Internal)
            .copied()
            .collect();
        let wanted: HashSet<PortEdge> = edges.iter().copied().collect();
        if current == wanted {
            return;
        }
        self.retain_edges(|edge| !(edge.kind == EdgeKind::Internal && ports.contains(&edge.from)));
        for edge in edges {
            self.add_edge(edge);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Handle;

    #[test]
    fn test_edges_are_indexed_both_ways() {
        let (a, b, c) = (PortId::generate(), PortId::generate(), PortId::generate());
        let mut graph = PortGraph::new();
        graph.add_edge(PortEdge::internal(a, b));
        graph.add_edge(PortEdge::external(b, c, None));
        graph.add_edge(PortEdge::external(b, c, None));

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.outgoing_edges(b).count(), 1);
        assert_eq!(graph.incoming_edges(b).count(), 1);
        assert_eq!(graph.external_edges().count(), 1);
    }

    #[test]
    fn test_remove_nodes_drops_touching_edges() {
        let (a, b, c) = (PortId::generate(), PortId::generate(), PortId::generate());
        let mut graph = PortGraph::new();
        graph.add_edge(PortEdge::external(a, b, None));
        graph.add_edge(PortEdge::external(b, c, None));

        graph.remove_nodes(&HashSet::from([b]));
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.contains_node(b));
        assert!(graph.contains_node(a));
        assert_eq!(graph.outgoing_edges(a).count(), 0);
    }

    #[test]
    fn test_remove_connection() {
        let (a, b) = (PortId::generate(), PortId::generate());
        let connection = ConnectionId::generate();
        let mut graph = PortGraph::new();
        graph.add_edge(PortEdge::external(a, b, Some(connection)));
        graph.add_edge(PortEdge::external(a, b, None));

        graph.remove_connection(connection);
        assert_eq!(graph.edges(), &[PortEdge::external(a, b, None)]);
        assert_eq!(graph.incoming_edges(b).count(), 1);
    }

    #[test]
    fn test_replace_internal_edges() {
        let (a, b, c) = (PortId::generate(), PortId::generate(), PortId::generate());
        let mut graph = PortGraph::new();
        graph.add_edge(PortEdge::internal(a, b));
        graph.add_edge(PortEdge::external(b, c, None));

        graph.replace_internal_edges(&HashSet::from([a, b]), vec![PortEdge::internal(a, c)]);
        assert!(graph.edges().contains(&PortEdge::internal(a, c)));
        assert!(!graph.edges().contains(&PortEdge::internal(a, b)));
        assert!(graph.edges().contains(&PortEdge::external(b, c, None)));
    }

    #[test]
    fn test_replace_with_same_internal_edges_keeps_order() {
        let (a, b, c) = (PortId::generate(), PortId::generate(), PortId::generate());
        let mut graph = PortGraph::new();
        graph.add_edge(PortEdge::internal(a, b));
        graph.add_edge(PortEdge::external(b, c, None));
        graph.add_edge(PortEdge::internal(a, c));
        let before = graph.edges().to_vec();

        graph.replace_internal_edges(
            &HashSet::from([a, b]),
            vec![PortEdge::internal(a, c), PortEdge::internal(a, b)],
        );
        assert_eq!(graph.edges(), before.as_slice());
    }

    #[test]
    fn test_duplicate_check_follows_removals() {
        let (a, b) = (PortId::generate(), PortId::generate());
        let mut graph = PortGraph::new();
        graph.add_edge(PortEdge::external(a, b, None));
        graph.retain_edges(|_| false);
        assert_eq!(graph.edge_count(), 0);

        // a removed edge can be added again, once
        graph.add_edge(PortEdge::external(a, b, None));
        graph.add_edge(PortEdge::external(a, b, None));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.outgoing_edges(a).count(), 1);
    }
}
