// Rewrite rules. Each rule assumes the shape its redex was classified with and leaves every wire
// reciprocal. Far ends are always read fresh with `enter`, so a port of a node being rewritten can
// act as a relay when a wire loops back into the pair.

use tracing::trace;

use super::core::*;

// Links every auxiliary port of `a` to the matching auxiliary port of `b`, removing both.
pub fn annihilate(inet: &mut INet, a: NodeId, b: NodeId) {
  let n = arity(inet, a);
  assert_eq!(n, arity(inet, b), "annihilating {} and {} of different arity", a, b);
  trace!(a, b, "annihilate");
  for i in 1..=n {
    let x = enter(inet, port(a, i));
    let y = enter(inet, port(b, i));
    link(inet, x, y);
  }
  remove_node(inet, a);
  remove_node(inet, b);
}

// Plugs a fresh eraser onto the far end of each listed port of `node`.
fn erase_ports(inet: &mut INet, node: NodeId, slots: impl Iterator<Item = SlotId>) {
  for s in slots {
    let far = enter(inet, port(node, s));
    let era = new_node(inet, Agent::Eraser);
    link(inet, port(era, PRINCIPAL), far);
  }
}

// An eraser meets the principal port of `node`.
pub fn erase(inet: &mut INet, eraser: NodeId, node: NodeId) {
  trace!(eraser, node, "erase");
  let n = arity(inet, node);
  erase_ports(inet, node, 1..=n);
  remove_node(inet, node);
  remove_node(inet, eraser);
}

// An eraser sits on an auxiliary port of an abstraction or application whose value can no longer
// reach the root: the whole node is dropped and its other neighbours erased.
pub fn decay_node(inet: &mut INet, node: NodeId, eraser: NodeId) {
  let hit = enter(inet, port(eraser, PRINCIPAL));
  assert_eq!(hit.node, node);
  trace!(node, eraser, slot = hit.slot, "decay node");
  let others: Vec<SlotId> = (0..=arity(inet, node)).filter(|&s| s != hit.slot).collect();
  erase_ports(inet, node, others.into_iter());
  remove_node(inet, node);
  remove_node(inet, eraser);
}

// An eraser sits on an auxiliary port of an unpaired replicator: that copy is unused, so the port
// goes away.
pub fn decay_port(inet: &mut INet, rep: NodeId, eraser: NodeId) {
  let hit = enter(inet, port(eraser, PRINCIPAL));
  assert_eq!(hit.node, rep);
  trace!(rep, eraser, slot = hit.slot, "decay port");
  let entries: Vec<(Port, i32)> = aux_entries(inet, rep).into_iter().enumerate().filter(|&(i, _)| i + 1 != hit.slot).map(|(_, e)| e).collect();
  remove_node(inet, eraser);
  rebuild_aux(inet, rep, entries);
  settle(inet, rep, false);
}

// Auxiliary (far end, delta) pairs of a replicator, in slot order.
fn aux_entries(inet: &INet, rep: NodeId) -> Vec<(Port, i32)> {
  let deltas = match kind(inet, rep).replicator() {
    Some(r) => r.deltas.clone(),
    None => panic!("node {} is not a replicator", rep),
  };
  deltas.into_iter().enumerate().map(|(i, d)| (enter(inet, port(rep, i + 1)), d)).collect()
}

// Removes a replicator that no longer does anything: with no auxiliary port it becomes an eraser;
// with one port and no level offset (or any offset, when `splice_any`) it becomes a plain wire.
// Returns true if the replicator is gone.
pub fn settle(inet: &mut INet, rep: NodeId, splice_any: bool) -> bool {
  let deltas = match kind(inet, rep).replicator() {
    Some(r) => r.deltas.clone(),
    None => return false,
  };
  match deltas.as_slice() {
    [] => {
      let far = enter(inet, port(rep, PRINCIPAL));
      if far.node != rep {
        let era = new_node(inet, Agent::Eraser);
        link(inet, port(era, PRINCIPAL), far);
      }
      remove_node(inet, rep);
      trace!(rep, "replicator emptied");
      true
    }
    [d] if *d == 0 || splice_any => {
      let a = enter(inet, port(rep, PRINCIPAL));
      let b = enter(inet, port(rep, 1));
      if a.node != rep {
        link(inet, a, b);
      }
      remove_node(inet, rep);
      trace!(rep, "identity replicator spliced");
      true
    }
    _ => false,
  }
}

// Commutes two agents facing each other through their principal ports: each is copied once per
// auxiliary port of the other and the copies are wired as a complete bipartite graph.
pub fn commute(inet: &mut INet, a: NodeId, b: NodeId) {
  let a_slots: Vec<SlotId> = (0..=arity(inet, a)).collect();
  trace!(a, b, "commute");
  commute_through(inet, a, &a_slots, b);
}

// Replicates `node` across the replicator `rep` sitting on one of its auxiliary ports. The node's
// ports are viewed with `slot` in the principal position for the duration of one commutation.
pub fn aux_fan_replicate(inet: &mut INet, node: NodeId, rep: NodeId) {
  let hit = enter(inet, port(rep, PRINCIPAL));
  assert_eq!(hit.node, node);
  trace!(node, rep, slot = hit.slot, "auxiliary fan replication");
  let mut slots = vec![hit.slot];
  slots.extend((0..=arity(inet, node)).filter(|&s| s != hit.slot));
  commute_through(inet, node, &slots, rep);
}

// Copy of `agent` placed on a port of the given polarity. Replicator copies turn to face the
// value flowing through that port; the copy whose level sits above the other side's is shifted by
// the offset of the port it crossed.
fn clone_across(agent: &Agent, host: Option<Polarity>, shift: i32, status: Option<Status>) -> Agent {
  match agent.replicator() {
    Some(rep) => {
      let mut rep = rep.clone();
      rep.level += shift;
      if let Some(status) = status {
        rep.status = status;
      }
      match host {
        Some(p) => replicator_facing(p, rep),
        None => panic!("replicator cloned onto an eraser port"),
      }
    }
    None => agent.clone(),
  }
}

// `a_slots[0]` is the port of `a` that faces the principal port of `b`; the rest are the ports of
// `a` that get copies of `b`, in order.
fn commute_through(inet: &mut INet, a: NodeId, a_slots: &[SlotId], b: NodeId) {
  let a_agent = kind(inet, a).clone();
  let b_agent = kind(inet, b).clone();
  let a_aux = &a_slots[1..];
  let b_aux: Vec<SlotId> = (1..=arity(inet, b)).collect();

  // Between two replicators the higher level is the one inside the other's scope.
  let (a_shift, b_shift): (Vec<i32>, Vec<i32>) = match (a_agent.replicator(), b_agent.replicator()) {
    (Some(ra), Some(rb)) if ra.level < rb.level => (vec![0; b_aux.len()], ra.deltas.clone()),
    (Some(ra), Some(rb)) if ra.level > rb.level => (rb.deltas.clone(), vec![0; a_aux.len()]),
    _ => (vec![0; b_aux.len()], vec![0; a_aux.len()]),
  };

  // A replicator crossing an abstraction or application may come out facing both ways; the two
  // sides are then a matched pair and lose their unpaired status.
  let mixed = |rep: &Agent, host: &Agent, slots: &[SlotId]| -> Option<Status> {
    let mut facings = slots.iter().map(|&s| host.polarity(s));
    let first = facings.next().flatten();
    if rep.is_replicator() && !host.is_replicator() && facings.any(|p| p != first) {
      Some(Status::Unknown)
    } else {
      None
    }
  };
  let a_status = mixed(&a_agent, &b_agent, &b_aux);
  let b_status = mixed(&b_agent, &a_agent, a_aux);

  let b_clones: Vec<NodeId> = a_aux
    .iter()
    .zip(b_shift.iter())
    .map(|(&s, &shift)| {
      let agent = clone_across(&b_agent, a_agent.polarity(s), shift, b_status);
      new_node(inet, agent)
    })
    .collect();
  let a_clones: Vec<NodeId> = b_aux
    .iter()
    .zip(a_shift.iter())
    .map(|(&s, &shift)| {
      let agent = clone_across(&a_agent, b_agent.polarity(s), shift, a_status);
      new_node(inet, agent)
    })
    .collect();

  for (i, &s) in a_aux.iter().enumerate() {
    let far = enter(inet, port(a, s));
    link(inet, port(b_clones[i], PRINCIPAL), far);
  }
  for (j, &s) in b_aux.iter().enumerate() {
    let far = enter(inet, port(b, s));
    link(inet, port(a_clones[j], a_slots[0]), far);
  }
  for (i, &sa) in a_aux.iter().enumerate() {
    for (j, &sb) in b_aux.iter().enumerate() {
      link(inet, port(a_clones[j], sa), port(b_clones[i], sb));
    }
  }
  remove_node(inet, a);
  remove_node(inet, b);
}

// Folds the unpaired replicator `second`, hanging off an auxiliary port of `first`, into `first`.
// Its ports take the place of the connecting port, offset by that port's delta, and the merged
// ports are kept sorted by delta.
pub fn merge(inet: &mut INet, first: NodeId, second: NodeId) {
  let hit = enter(inet, port(second, PRINCIPAL));
  assert_eq!(hit.node, first);
  trace!(first, second, slot = hit.slot, "merge replicators");
  let outer = aux_entries(inet, first);
  let inner = aux_entries(inet, second);
  let offset = outer[hit.slot - 1].1;
  let mut entries: Vec<(Port, i32)> = vec![];
  for (i, entry) in outer.into_iter().enumerate() {
    if i + 1 == hit.slot {
      entries.extend(inner.iter().map(|&(far, d)| (far, d + offset)));
    } else {
      entries.push(entry);
    }
  }
  entries.sort_by_key(|&(_, d)| d);
  remove_node(inet, second);
  rebuild_aux(inet, first, entries);
}
