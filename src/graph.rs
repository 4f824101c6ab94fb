//! Dependency graph module.
//!
//! Provides the `StatGraph` type, which records which stats read which
//! other stats. The stat service builds one to reject circular definitions
//! and to find the dependents of a stat before removing it.

use crate::error::StatError;
use crate::stat_id::StatId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// A directed graph of stat dependencies.
///
/// An edge `A -> B` means stat A reads stat B (or one of its variables).
///
/// # Examples
///
/// ```rust
/// use statexpr::graph::StatGraph;
/// use statexpr::StatId;
///
/// let mut graph = StatGraph::new();
/// let str_id = StatId::new("STR").unwrap();
/// let atk_id = StatId::new("ATK").unwrap();
///
/// // ATK depends on STR
/// graph.add_edge(atk_id.clone(), str_id.clone());
///
/// assert_eq!(graph.dependents(&str_id), vec![atk_id.clone()]);
/// assert!(graph.find_cycle_from(&atk_id).is_ok());
/// ```
pub struct StatGraph {
    graph: DiGraph<StatId, ()>,
    node_map: HashMap<StatId, NodeIndex>,
}

impl StatGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Add a node to the graph if it doesn't exist.
    ///
    /// Returns the index of the new or existing node.
    pub fn add_node(&mut self, stat_id: StatId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&stat_id) {
            idx
        } else {
            let idx = self.graph.add_node(stat_id.clone());
            self.node_map.insert(stat_id, idx);
            idx
        }
    }

    /// Record that `from` depends on `to`.
    ///
    /// Both nodes are added to the graph if they don't exist.
    pub fn add_edge(&mut self, from: StatId, to: StatId) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        self.graph.update_edge(from_idx, to_idx, ());
    }

    /// Walk the dependencies of `start` depth-first.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if no cycle is reachable from `start`
    /// * `Err(StatError::Cycle)` with the full cycle path otherwise, closing
    ///   back on the repeated stat (`[A, D, F, A]`)
    pub fn find_cycle_from(&self, start: &StatId) -> Result<(), StatError> {
        let Some(&start_idx) = self.node_map.get(start) else {
            return Ok(());
        };
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        match self.dfs_cycle_detect(start_idx, &mut visited, &mut path) {
            Some(cycle) => Err(cycle),
            None => Ok(()),
        }
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> Option<StatError> {
        if let Some(cycle_start) = path.iter().position(|&idx| idx == node) {
            let mut cycle: Vec<StatId> = path[cycle_start..]
                .iter()
                .map(|&idx| self.graph[idx].clone())
                .collect();
            cycle.push(self.graph[node].clone());
            return Some(StatError::Cycle { path: cycle });
        }
        if !visited.insert(node) {
            return None;
        }

        path.push(node);
        let mut neighbors: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        neighbors.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        for neighbor in neighbors {
            if let Some(cycle) = self.dfs_cycle_detect(neighbor, visited, path) {
                return Some(cycle);
            }
        }
        path.pop();
        None
    }

    /// Stats that read `stat_id` directly, sorted.
    pub fn dependents(&self, stat_id: &StatId) -> Vec<StatId> {
        let Some(&idx) = self.node_map.get(stat_id) else {
            return Vec::new();
        };
        let mut dependents: Vec<StatId> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .filter(|&neighbor| neighbor != idx)
            .map(|neighbor| self.graph[neighbor].clone())
            .collect();
        dependents.sort();
        dependents.dedup();
        dependents
    }

    /// `stat_id` and everything that depends on it, transitively, ordered so
    /// that every stat comes after all of its dependents.
    pub fn removal_order(&self, stat_id: &StatId) -> Vec<StatId> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        self.collect_dependents(stat_id, &mut visited, &mut order);
        order
    }

    fn collect_dependents(
        &self,
        stat_id: &StatId,
        visited: &mut HashSet<StatId>,
        order: &mut Vec<StatId>,
    ) {
        if !visited.insert(stat_id.clone()) {
            return;
        }
        for dependent in self.dependents(stat_id) {
            self.collect_dependents(&dependent, visited, order);
        }
        order.push(stat_id.clone());
    }

    pub fn nodes(&self) -> Vec<StatId> {
        self.graph
            .node_indices()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    pub fn contains_node(&self, stat_id: &StatId) -> bool {
        self.node_map.contains_key(stat_id)
    }
}

impl Default for StatGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StatId {
        StatId::new(s).unwrap()
    }

    fn cycle_path(result: Result<(), StatError>) -> Vec<String> {
        match result {
            Err(StatError::Cycle { path }) => path.iter().map(|s| s.to_string()).collect(),
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_add_nodes() {
        let mut graph = StatGraph::new();
        graph.add_node(id("HP"));
        graph.add_node(id("ATK"));

        assert!(graph.contains_node(&id("hp")));
        assert!(graph.contains_node(&id("ATK")));
        assert_eq!(graph.nodes().len(), 2);
    }

    #[test]
    fn test_graph_duplicate_nodes() {
        let mut graph = StatGraph::new();
        let idx1 = graph.add_node(id("HP"));
        let idx2 = graph.add_node(id("hp"));

        assert_eq!(idx1, idx2);
        assert_eq!(graph.nodes().len(), 1);
    }

    #[test]
    fn test_graph_no_cycle() {
        let mut graph = StatGraph::new();
        // DPS -> ATK -> STR
        graph.add_edge(id("ATK"), id("STR"));
        graph.add_edge(id("DPS"), id("ATK"));

        assert!(graph.find_cycle_from(&id("DPS")).is_ok());
        assert!(graph.find_cycle_from(&id("UNKNOWN")).is_ok());
    }

    #[test]
    fn test_graph_self_cycle() {
        let mut graph = StatGraph::new();
        graph.add_edge(id("A"), id("A"));

        assert_eq!(cycle_path(graph.find_cycle_from(&id("A"))), vec!["A", "A"]);
    }

    #[test]
    fn test_graph_cycle_path() {
        let mut graph = StatGraph::new();
        // A reads B, C and D; C -> E -> B; D -> F -> A
        graph.add_edge(id("A"), id("B"));
        graph.add_edge(id("A"), id("C"));
        graph.add_edge(id("A"), id("D"));
        graph.add_edge(id("C"), id("E"));
        graph.add_edge(id("E"), id("B"));
        graph.add_edge(id("D"), id("F"));
        graph.add_edge(id("F"), id("A"));

        assert_eq!(
            cycle_path(graph.find_cycle_from(&id("A"))),
            vec!["A", "D", "F", "A"]
        );
    }

    #[test]
    fn test_graph_cycle_not_through_start() {
        let mut graph = StatGraph::new();
        graph.add_edge(id("A"), id("B"));
        graph.add_edge(id("B"), id("C"));
        graph.add_edge(id("C"), id("B"));

        assert_eq!(
            cycle_path(graph.find_cycle_from(&id("A"))),
            vec!["B", "C", "B"]
        );
    }

    #[test]
    fn test_graph_shared_dependency_is_not_a_cycle() {
        let mut graph = StatGraph::new();
        // diamond: TOP -> MID1 -> BASE, TOP -> MID2 -> BASE
        graph.add_edge(id("TOP"), id("MID1"));
        graph.add_edge(id("TOP"), id("MID2"));
        graph.add_edge(id("MID1"), id("BASE"));
        graph.add_edge(id("MID2"), id("BASE"));

        assert!(graph.find_cycle_from(&id("TOP")).is_ok());
    }

    #[test]
    fn test_dependents() {
        let mut graph = StatGraph::new();
        graph.add_edge(id("ATK"), id("STR"));
        graph.add_edge(id("CARRY"), id("STR"));
        graph.add_edge(id("CARRY"), id("STR"));

        assert_eq!(graph.dependents(&id("STR")), vec![id("ATK"), id("CARRY")]);
        assert!(graph.dependents(&id("ATK")).is_empty());
        assert!(graph.dependents(&id("MISSING")).is_empty());
    }

    #[test]
    fn test_removal_order() {
        let mut graph = StatGraph::new();
        // DPS -> ATK -> STR, CRIT -> STR
        graph.add_edge(id("ATK"), id("STR"));
        graph.add_edge(id("DPS"), id("ATK"));
        graph.add_edge(id("CRIT"), id("STR"));

        let order = graph.removal_order(&id("STR"));
        assert_eq!(order.len(), 4);
        let position = |name: &str| order.iter().position(|s| s == &id(name)).unwrap();
        assert!(position("DPS") < position("ATK"));
        assert!(position("ATK") < position("STR"));
        assert!(position("CRIT") < position("STR"));
        assert_eq!(order.last(), Some(&id("STR")));
    }
}
