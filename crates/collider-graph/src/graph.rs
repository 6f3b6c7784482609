use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::GraphError;
use crate::node::DependencyGraphNode;

/// Traversal view over a set of dependency graph nodes.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
  nodes: Vec<DependencyGraphNode>,
  positions: HashMap<String, usize>,
  /// Adjacency list: subtask_id -> list of child subtask_ids.
  adjacency: HashMap<String, Vec<String>>,
  /// Reverse adjacency: subtask_id -> list of parent subtask_ids.
  reverse_adjacency: HashMap<String, Vec<String>>,
  /// Nodes with no parents, in input order.
  roots: Vec<String>,
  /// Nodes with more than one parent.
  join_points: HashSet<String>,
}

impl DependencyGraph {
  /// Index the given nodes.
  ///
  /// Edges are the union of every node's `dependencies` and `dependents`, so
  /// a relation recorded on only one side still shows up in both directions.
  /// Ids that have no node of their own are kept in the lookups.
  pub fn new(nodes: &[DependencyGraphNode]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut positions = HashMap::with_capacity(nodes.len());

    for (position, node) in nodes.iter().enumerate() {
      positions.entry(node.subtask_id.clone()).or_insert(position);
      adjacency.entry(node.subtask_id.clone()).or_default();
      reverse_adjacency.entry(node.subtask_id.clone()).or_default();
    }

    let edges = nodes.iter().flat_map(|node| {
      let upstream = node
        .dependencies
        .iter()
        .map(move |parent| (parent.clone(), node.subtask_id.clone()));
      let downstream = node
        .dependents
        .iter()
        .map(move |child| (node.subtask_id.clone(), child.clone()));
      upstream.chain(downstream)
    });

    for (from, to) in edges {
      let children = adjacency.entry(from.clone()).or_default();
      if !children.contains(&to) {
        children.push(to.clone());
      }
      let parents = reverse_adjacency.entry(to).or_default();
      if !parents.contains(&from) {
        parents.push(from);
      }
    }

    let roots: Vec<String> = nodes
      .iter()
      .filter(|node| {
        reverse_adjacency
          .get(&node.subtask_id)
          .is_none_or(|v| v.is_empty())
      })
      .map(|node| node.subtask_id.clone())
      .collect();

    let join_points: HashSet<String> = reverse_adjacency
      .iter()
      .filter(|(_, incoming)| incoming.len() > 1)
      .map(|(id, _)| id.clone())
      .collect();

    Self {
      nodes: nodes.to_vec(),
      positions,
      adjacency,
      reverse_adjacency,
      roots,
      join_points,
    }
  }

  /// The indexed nodes in their original order.
  pub fn nodes(&self) -> &[DependencyGraphNode] {
    &self.nodes
  }

  /// Get a node by subtask id.
  pub fn node(&self, subtask_id: &str) -> Result<&DependencyGraphNode, GraphError> {
    self
      .positions
      .get(subtask_id)
      .map(|&position| &self.nodes[position])
      .ok_or_else(|| GraphError::NodeNotFound(subtask_id.to_string()))
  }

  /// Nodes with no parents.
  pub fn roots(&self) -> &[String] {
    &self.roots
  }

  /// Direct parents of a subtask.
  pub fn dependencies(&self, subtask_id: &str) -> &[String] {
    self
      .reverse_adjacency
      .get(subtask_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Direct children of a subtask.
  pub fn dependents(&self, subtask_id: &str) -> &[String] {
    self
      .adjacency
      .get(subtask_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Check if a subtask waits on more than one parent.
  pub fn is_join_point(&self, subtask_id: &str) -> bool {
    self.join_points.contains(subtask_id)
  }

  pub fn join_points(&self) -> &HashSet<String> {
    &self.join_points
  }

  /// Subtask ids grouped by execution level, each group in input order.
  pub fn levels(&self) -> BTreeMap<u32, Vec<String>> {
    let mut levels: BTreeMap<u32, Vec<String>> = BTreeMap::new();
    for node in &self.nodes {
      levels
        .entry(node.level)
        .or_default()
        .push(node.subtask_id.clone());
    }
    levels
  }
}
