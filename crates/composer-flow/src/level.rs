//! Topological leveling.
//!
//! Kahn's algorithm, batched: every node whose dependencies are all satisfied
//! lands in the same level, so the nodes of one level can run concurrently.

use std::collections::HashMap;

use crate::edge::Edge;
use crate::node::Node;

/// Group nodes into dependency levels.
///
/// In-degrees only count edges whose target is in `nodes`. The whole frontier
/// is drained into one level; nodes that reach zero in-degree while it drains
/// join the next level, so a node's level is its dependency depth. Within a
/// level nodes keep their order from `nodes`.
///
/// Nodes on a cycle never reach zero in-degree and are left out of the result.
/// No error is raised for them; use [`crate::Flow::validate`] to detect that
/// case up front. The same holds for repeated ids: only the first node with a
/// given id is leveled.
pub fn levels<'a>(nodes: &'a [Node], edges: &[Edge]) -> Vec<Vec<&'a Node>> {
  let mut position: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
  for (i, n) in nodes.iter().enumerate() {
    position.entry(n.id.as_str()).or_insert(i);
  }

  let mut in_degree = vec![0usize; nodes.len()];
  let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

  for edge in edges {
    let Some(&target) = position.get(edge.target.as_str()) else {
      continue;
    };
    // An unknown source still pins its target.
    in_degree[target] += 1;
    if let Some(&source) = position.get(edge.source.as_str()) {
      downstream[source].push(target);
    }
  }

  let mut frontier: Vec<usize> = (0..nodes.len())
    .filter(|&i| in_degree[i] == 0 && position[nodes[i].id.as_str()] == i)
    .collect();
  let mut result = Vec::new();

  while !frontier.is_empty() {
    frontier.sort_unstable();

    let mut next = Vec::new();
    for &index in &frontier {
      for &target in &downstream[index] {
        in_degree[target] -= 1;
        if in_degree[target] == 0 {
          next.push(target);
        }
      }
    }

    result.push(frontier.iter().map(|&i| &nodes[i]).collect());
    frontier = next;
  }

  result
}
