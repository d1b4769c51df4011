// Final garbage collection, run once no optimal redex is left.

use std::collections::BTreeSet;

use tracing::debug;

use super::core::*;
use super::redex::reachable;
use super::rules::settle;

// Deletes everything the normal-order walk cannot reach, capping the cut wires with erasers, then
// drops unused copies from the surviving duplicators. `splice_any` removes every one-port
// replicator, whatever its level offset. Returns true if the net changed.
pub fn collect_garbage(inet: &mut INet, splice_any: bool) -> bool {
  let reached = reachable(inet);
  let mut keep: BTreeSet<NodeId> = reached.clone();
  for (&id, node) in inet.nodes.iter() {
    if node.agent.is_eraser() && reached.contains(&node.ports[PRINCIPAL].node) {
      keep.insert(id);
    }
  }

  let doomed: Vec<NodeId> = inet.ids().into_iter().filter(|id| !keep.contains(id)).collect();
  let mut cut = vec![];
  for &id in &keep {
    for (s, far) in node(inet, id).ports.iter().enumerate() {
      if !keep.contains(&far.node) {
        cut.push(port(id, s));
      }
    }
  }
  for here in cut {
    let era = new_node(inet, Agent::Eraser);
    link(inet, port(era, PRINCIPAL), here);
  }
  for &id in &doomed {
    remove_node(inet, id);
  }

  let mut stripped = 0;
  let mut spliced = 0;
  let reps: Vec<NodeId> = inet.ids().into_iter().filter(|&id| matches!(kind(inet, id), Agent::ReplicatorIn(_))).collect();
  for rep in reps {
    let n = arity(inet, rep);
    let deltas = match kind(inet, rep).replicator() {
      Some(r) => r.deltas.clone(),
      None => continue,
    };
    let mut entries = vec![];
    let mut erasers = vec![];
    for (s, d) in (1..=n).zip(deltas) {
      let far = enter(inet, port(rep, s));
      if kind(inet, far.node).is_eraser() {
        erasers.push(far.node);
      } else {
        entries.push((far, d));
      }
    }
    if !erasers.is_empty() {
      stripped += erasers.len();
      for era in erasers {
        remove_node(inet, era);
      }
      rebuild_aux(inet, rep, entries);
    }
    if settle(inet, rep, splice_any) {
      spliced += 1;
    }
  }

  debug!(collected = doomed.len(), stripped, spliced, "final cleanup");
  !doomed.is_empty() || stripped > 0 || spliced > 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drops_unreachable_nodes() {
    let mut inet = new_inet();
    let fv = new_node(&mut inet, Agent::FreeVariable { name: "u".into() });
    let root = root_port(&inet);
    link(&mut inet, root, port(fv, 0));
    let app = new_node(&mut inet, Agent::Application);
    let f = new_node(&mut inet, Agent::Abstraction { name: "x".into() });
    link(&mut inet, port(app, PRINCIPAL), port(f, PRINCIPAL));
    link(&mut inet, port(f, BINDER), port(f, BODY));
    link(&mut inet, port(app, ARGUMENT), port(app, RESULT));
    assert!(collect_garbage(&mut inet, false));
    assert_eq!(inet.len(), 2);
    assert!(!collect_garbage(&mut inet, false));
  }

  #[test]
  fn keeps_erasers_on_unused_binders() {
    // λx u
    let mut inet = new_inet();
    let f = new_node(&mut inet, Agent::Abstraction { name: "x".into() });
    let era = new_node(&mut inet, Agent::Eraser);
    let fv = new_node(&mut inet, Agent::FreeVariable { name: "u".into() });
    let root = root_port(&inet);
    link(&mut inet, root, port(f, PRINCIPAL));
    link(&mut inet, port(f, BINDER), port(era, 0));
    link(&mut inet, port(f, BODY), port(fv, 0));
    assert!(!collect_garbage(&mut inet, false));
    assert_eq!(inet.len(), 4);
  }

  #[test]
  fn strips_unused_copies() {
    // A duplicator of u with one copy at the root and one feeding garbage.
    let mut inet = new_inet();
    let fv = new_node(&mut inet, Agent::FreeVariable { name: "u".into() });
    let rep = new_node(&mut inet, Agent::ReplicatorIn(Replicator::new(1, Status::Unknown, vec![0, 1])));
    let app = new_node(&mut inet, Agent::Application);
    let g = new_node(&mut inet, Agent::FreeVariable { name: "g".into() });
    link(&mut inet, port(fv, 0), port(rep, 0));
    let root = root_port(&inet);
    link(&mut inet, port(rep, 1), root);
    link(&mut inet, port(rep, 2), port(app, PRINCIPAL));
    link(&mut inet, port(app, ARGUMENT), port(g, 0));
    link(&mut inet, port(app, RESULT), port(app, RESULT));
    assert!(collect_garbage(&mut inet, false));
    assert_eq!(enter(&inet, root_port(&inet)), port(fv, 0));
    assert_eq!(inet.len(), 2);
    assert!(reciprocity_violations(&inet).is_empty());
  }
}
