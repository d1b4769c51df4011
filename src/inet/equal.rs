// Equality on nets, up to the identity of their nodes.
//
// Each connected component is described by numbering its nodes in the order a breadth-first walk
// meets them, visiting ports in slot order, and listing every node as its agent plus the numbered
// ports it is wired to. Ports are ordered, so the walk from a given start node is deterministic:
// two components are isomorphic iff some choice of start gives both the same description. The
// component holding the root always starts at the root.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use super::core::*;

type Shape = Vec<(Agent, Vec<(usize, SlotId)>)>;

fn shape_from(inet: &INet, start: NodeId) -> (Shape, Vec<NodeId>) {
  let mut order = vec![start];
  let mut number = BTreeMap::new();
  number.insert(start, 0);
  let mut i = 0;
  while i < order.len() {
    for far in &node(inet, order[i]).ports {
      if !number.contains_key(&far.node) {
        number.insert(far.node, order.len());
        order.push(far.node);
      }
    }
    i += 1;
  }
  let shape = order
    .iter()
    .map(|&id| {
      let n = node(inet, id);
      (n.agent.clone(), n.ports.iter().map(|p| (number[&p.node], p.slot)).collect())
    })
    .collect();
  (shape, order)
}

fn shapes(inet: &INet) -> (Shape, Vec<Shape>) {
  let (main, members) = shape_from(inet, inet.root);
  let mut seen: BTreeSet<NodeId> = members.into_iter().collect();
  let mut rest = vec![];
  for id in inet.ids() {
    if seen.contains(&id) {
      continue;
    }
    let (_, members) = shape_from(inet, id);
    if let Some(best) = members.iter().map(|&m| shape_from(inet, m).0).min() {
      rest.push(best);
    }
    seen.extend(members);
  }
  (main, rest.into_iter().sorted().collect())
}

// True if both nets have the same agents wired the same way.
pub fn equal(a: &INet, b: &INet) -> bool {
  a.len() == b.len() && shapes(a) == shapes(b)
}
