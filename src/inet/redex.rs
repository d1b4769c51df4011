// Finding active pairs and deciding which of them are safe to fire.
//
// A scan looks at every live node once and collects candidate redexes. Under the sequential
// scheduler the net is then walked from the root in normal order, and the first pair met on the
// way is the one to reduce. Under the parallel scheduler every redex of the most urgent category
// present is fired at once.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, trace};

use super::core::*;
use super::rules;
use crate::config::{Config, Discipline, Scheduler};

/// Redex categories, most urgent first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
  Erasure = 1,
  Annihilation = 2,
  Decay = 3,
  Commutation = 4,
  Merge = 5,
  AuxFan = 6,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
  /// `a` is an eraser meeting the principal port of `b`.
  Erase,
  Annihilate,
  /// `a` is an abstraction or application, `b` an eraser on one of its auxiliary ports.
  DecayNode,
  /// `a` is an unpaired duplicator, `b` an eraser on one of its copies.
  DecayPort,
  Commute,
  /// `b` is an unpaired duplicator whose principal port sits on a copy of `a`.
  Merge,
  /// `a` is an abstraction or application, `b` a replicator on one of its auxiliary ports.
  AuxFan,
}

impl Rule {
  pub fn category(self) -> Category {
    match self {
      Rule::Erase => Category::Erasure,
      Rule::Annihilate => Category::Annihilation,
      Rule::DecayNode | Rule::DecayPort => Category::Decay,
      Rule::Commute => Category::Commutation,
      Rule::Merge => Category::Merge,
      Rule::AuxFan => Category::AuxFan,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Rule::Erase => "erase",
      Rule::Annihilate => "annihilate",
      Rule::DecayNode => "decay-node",
      Rule::DecayPort => "decay-port",
      Rule::Commute => "commute",
      Rule::Merge => "merge",
      Rule::AuxFan => "aux-fan",
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Redex {
  pub a: NodeId,
  pub b: NodeId,
  pub rule: Rule,
  pub optimal: bool,
}

impl Redex {
  pub fn category(&self) -> Category {
    self.rule.category()
  }

  // Identity of the unordered pair.
  pub fn key(&self) -> (NodeId, NodeId) {
    (self.a.min(self.b), self.a.max(self.b))
  }

  // True if both nodes are still alive and still in the shape this redex was found in.
  pub fn is_current(&self, inet: &INet) -> bool {
    if !is_alive(inet, self.a) || !is_alive(inet, self.b) {
      return false;
    }
    let found = match self.rule {
      Rule::Erase | Rule::Annihilate | Rule::Commute => {
        if is_active_pair(inet, self.a, self.b) {
          principal_rule(inet, self.a, self.b)
        } else {
          None
        }
      }
      Rule::DecayNode | Rule::DecayPort => decay_rule(inet, self.b),
      Rule::Merge => {
        let hit = enter(inet, port(self.b, PRINCIPAL));
        if hit.node == self.a {
          merge_rule(inet, self.a, hit.slot)
        } else {
          None
        }
      }
      Rule::AuxFan => aux_fan_rule(inet, self.b),
    };
    found == Some((self.a, self.b, self.rule))
  }

  // Fires the redex. A redex that went stale since the scan is skipped and reported as not fired.
  pub fn apply(&self, inet: &mut INet) -> bool {
    if !self.is_current(inet) {
      trace!(a = self.a, b = self.b, rule = self.rule.name(), "stale redex skipped");
      return false;
    }
    match self.rule {
      Rule::Erase => rules::erase(inet, self.a, self.b),
      Rule::Annihilate => rules::annihilate(inet, self.a, self.b),
      Rule::DecayNode => rules::decay_node(inet, self.a, self.b),
      Rule::DecayPort => rules::decay_port(inet, self.a, self.b),
      Rule::Commute => rules::commute(inet, self.a, self.b),
      Rule::Merge => rules::merge(inet, self.a, self.b),
      Rule::AuxFan => rules::aux_fan_replicate(inet, self.a, self.b),
    }
    inet.rules += 1;
    true
  }
}

// Rule for two nodes facing each other through their principal ports, with the nodes in the order
// the rule expects them.
pub fn principal_rule(inet: &INet, x: NodeId, y: NodeId) -> Option<(NodeId, NodeId, Rule)> {
  use Agent::*;
  match (kind(inet, x), kind(inet, y)) {
    (Root, _) | (_, Root) => None,
    (Eraser, _) => Some((x, y, Rule::Erase)),
    (_, Eraser) => Some((y, x, Rule::Erase)),
    (Abstraction { .. }, Application) => Some((x, y, Rule::Annihilate)),
    (Application, Abstraction { .. }) => Some((y, x, Rule::Annihilate)),
    (ReplicatorIn(p), ReplicatorOut(q)) | (ReplicatorOut(p), ReplicatorIn(q)) => {
      if p.level != q.level {
        Some((x, y, Rule::Commute))
      } else {
        // Replicators at one level always copy the same value the same number of times.
        assert_eq!(
          p.deltas.len(),
          q.deltas.len(),
          "replicators {} and {} meet at level {} with different arity",
          x,
          y,
          p.level
        );
        Some((x, y, Rule::Annihilate))
      }
    }
    (ReplicatorIn(_), Abstraction { .. }) | (ReplicatorOut(_), Application) => Some((x, y, Rule::Commute)),
    (Abstraction { .. }, ReplicatorIn(_)) | (Application, ReplicatorOut(_)) => Some((y, x, Rule::Commute)),
    _ => None,
  }
}

// Rule for an eraser parked on an auxiliary port.
fn decay_rule(inet: &INet, eraser: NodeId) -> Option<(NodeId, NodeId, Rule)> {
  if !kind(inet, eraser).is_eraser() {
    return None;
  }
  let hit = enter(inet, port(eraser, PRINCIPAL));
  if hit.slot == PRINCIPAL || hit.node == eraser {
    return None;
  }
  match kind(inet, hit.node) {
    Agent::Abstraction { .. } if hit.slot == BODY => Some((hit.node, eraser, Rule::DecayNode)),
    Agent::Application => Some((hit.node, eraser, Rule::DecayNode)),
    Agent::ReplicatorIn(rep) if rep.is_unpaired() => Some((hit.node, eraser, Rule::DecayPort)),
    _ => None,
  }
}

// Rule for an unpaired duplicator sitting on copy `slot` of another unpaired duplicator at the
// level of that copy.
fn merge_rule(inet: &INet, up: NodeId, slot: SlotId) -> Option<(NodeId, NodeId, Rule)> {
  let upper = match kind(inet, up) {
    Agent::ReplicatorIn(rep) if rep.is_unpaired() => rep,
    _ => return None,
  };
  if slot == PRINCIPAL || slot > upper.deltas.len() {
    return None;
  }
  let far = enter(inet, port(up, slot));
  if far.slot != PRINCIPAL || far.node == up {
    return None;
  }
  match kind(inet, far.node) {
    Agent::ReplicatorIn(lower) if lower.is_unpaired() && lower.level == upper.aux_level(slot) => {
      Some((up, far.node, Rule::Merge))
    }
    _ => None,
  }
}

// Rule for a replicator whose principal port sits on an auxiliary port it can be pushed through.
fn aux_fan_rule(inet: &INet, rep: NodeId) -> Option<(NodeId, NodeId, Rule)> {
  let hit = enter(inet, port(rep, PRINCIPAL));
  if hit.slot == PRINCIPAL || hit.node == rep {
    return None;
  }
  let fits = match (kind(inet, rep), kind(inet, hit.node)) {
    (Agent::ReplicatorIn(_), Agent::Application) => hit.slot == RESULT,
    (Agent::ReplicatorOut(_), Agent::Abstraction { .. }) => hit.slot == BODY,
    (Agent::ReplicatorOut(_), Agent::Application) => hit.slot == ARGUMENT,
    _ => false,
  };
  if fits {
    Some((hit.node, rep, Rule::AuxFan))
  } else {
    None
  }
}

// Deduplicated redex list, indexed by unordered pair. Tracks which pairs have been decided
// optimal or not during classification.
#[derive(Default)]
struct Candidates {
  redexes: Vec<Redex>,
  index: BTreeMap<(NodeId, NodeId), usize>,
  decided: BTreeMap<(NodeId, NodeId), bool>,
}

impl Candidates {
  fn add(&mut self, (a, b, rule): (NodeId, NodeId, Rule)) {
    let redex = Redex { a, b, rule, optimal: false };
    match self.index.get(&redex.key()) {
      Some(&i) => {
        let seen = self.redexes[i];
        if seen.rule != rule || seen.a != a {
          error!(a, b, first = seen.rule.name(), second = rule.name(), "pair classified twice; keeping the first");
        }
      }
      None => {
        self.index.insert(redex.key(), self.redexes.len());
        self.redexes.push(redex);
      }
    }
  }

  // Decides whether redex `i` may fire. The first decision about a pair stands.
  fn mark(&mut self, i: usize, optimal: bool) {
    let redex = &mut self.redexes[i];
    match self.decided.get(&redex.key()) {
      Some(&first) if first != optimal => {
        error!(a = redex.a, b = redex.b, first, second = optimal, "pair reclassified; keeping the first decision");
      }
      Some(_) => {}
      None => {
        self.decided.insert(redex.key(), optimal);
        redex.optimal = optimal;
      }
    }
  }

  fn find(&self, x: NodeId, y: NodeId, wanted: &[Rule]) -> Option<usize> {
    let i = *self.index.get(&(x.min(y), x.max(y)))?;
    if wanted.contains(&self.redexes[i].rule) {
      Some(i)
    } else {
      None
    }
  }
}

// Something the normal-order walk ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Encounter {
  Pair(NodeId, NodeId),
  Merge(NodeId, NodeId),
  AuxFan(NodeId, NodeId),
}

struct Walk {
  encounters: Vec<Encounter>,
  reached: BTreeSet<NodeId>,
}

// Walks the net from the root, always standing on a consuming port and looking at what feeds it.
// The function of an application is explored before its argument, and under `spine_only` the
// argument is not explored at all.
fn walk(inet: &INet, spine_only: bool) -> Walk {
  let mut encounters = vec![];
  let mut reached = BTreeSet::new();
  let mut expanded = BTreeSet::new();
  let mut stack = vec![root_port(inet)];
  reached.insert(inet.root);
  while let Some(q) = stack.pop() {
    let v = enter(inet, q);
    reached.insert(v.node);
    let here = kind(inet, q.node);
    let there = kind(inet, v.node);

    match (here, q.slot, there, v.slot) {
      (_, PRINCIPAL, _, PRINCIPAL) => encounters.push(Encounter::Pair(q.node, v.node)),
      (Agent::ReplicatorIn(_), PRINCIPAL, Agent::Application, RESULT) => {
        encounters.push(Encounter::AuxFan(v.node, q.node))
      }
      (Agent::ReplicatorIn(_), PRINCIPAL, Agent::ReplicatorIn(_), _) => encounters.push(Encounter::Merge(v.node, q.node)),
      (Agent::Abstraction { .. }, BODY, Agent::ReplicatorOut(_), PRINCIPAL)
      | (Agent::Application, ARGUMENT, Agent::ReplicatorOut(_), PRINCIPAL) => {
        encounters.push(Encounter::AuxFan(q.node, v.node))
      }
      _ => {}
    }

    let expands = match there {
      Agent::Abstraction { .. } | Agent::ReplicatorOut(_) => v.slot == PRINCIPAL,
      Agent::Application => v.slot == RESULT,
      Agent::ReplicatorIn(_) => v.slot != PRINCIPAL,
      _ => false,
    };
    if !expands || !expanded.insert(v.node) {
      continue;
    }
    match there {
      Agent::Abstraction { .. } => stack.push(port(v.node, BODY)),
      Agent::Application => {
        if !spine_only {
          stack.push(port(v.node, ARGUMENT));
        }
        stack.push(port(v.node, PRINCIPAL));
      }
      Agent::ReplicatorIn(_) => stack.push(port(v.node, PRINCIPAL)),
      Agent::ReplicatorOut(_) => {
        for s in (1..=there.arity()).rev() {
          stack.push(port(v.node, s));
        }
      }
      _ => {}
    }
  }
  Walk { encounters, reached }
}

// Every node the normal-order walk reaches from the root.
pub fn reachable(inet: &INet) -> BTreeSet<NodeId> {
  walk(inet, false).reached
}

// Lists every redex of the net, each flagged optimal or not.
pub fn scan(inet: &INet, config: &Config) -> Vec<Redex> {
  let mut found = Candidates::default();
  for (&id, node) in inet.nodes.iter() {
    let far = node.ports[PRINCIPAL];
    if far.slot == PRINCIPAL && id < far.node && is_alive(inet, far.node) {
      if let Some(redex) = principal_rule(inet, id, far.node) {
        found.add(redex);
      }
    }
    let extra: Vec<(NodeId, NodeId, Rule)> = match &node.agent {
      Agent::Eraser => decay_rule(inet, id).into_iter().collect(),
      Agent::ReplicatorIn(rep) => {
        let mut extra: Vec<_> = (1..=rep.deltas.len()).filter_map(|s| merge_rule(inet, id, s)).collect();
        extra.extend(aux_fan_rule(inet, id));
        extra
      }
      Agent::ReplicatorOut(_) => aux_fan_rule(inet, id).into_iter().collect(),
      _ => vec![],
    };
    for redex in extra {
      found.add(redex);
    }
  }

  if config.discipline == Discipline::Linear {
    found.redexes.retain(|r| r.rule == Rule::Annihilate);
    for r in found.redexes.iter_mut() {
      r.optimal = true;
    }
  } else {
    match config.scheduler {
      Scheduler::Parallel => classify_parallel(&mut found),
      Scheduler::LeftmostOutermost => classify_sequential(inet, &mut found),
    }
  }

  let optimal = found.redexes.iter().filter(|r| r.optimal).count();
  debug!(redexes = found.redexes.len(), optimal, "scanned");
  found.redexes
}

fn classify_parallel(found: &mut Candidates) {
  let first = found.redexes.iter().map(|r| r.category()).min();
  for i in 0..found.redexes.len() {
    let optimal = Some(found.redexes[i].category()) == first;
    found.mark(i, optimal);
  }
}

fn classify_sequential(inet: &INet, found: &mut Candidates) {
  const PAIRS: &[Rule] = &[Rule::Erase, Rule::Annihilate, Rule::Commute];

  // Garbage collection and merging never duplicate work.
  for i in 0..found.redexes.len() {
    if matches!(found.redexes[i].category(), Category::Erasure | Category::Decay | Category::Merge) {
      found.mark(i, true);
    }
  }

  let walk = walk(inet, false);
  let chosen = walk
    .encounters
    .iter()
    .find_map(|e| match *e {
      Encounter::Pair(x, y) => found.find(x, y, PAIRS),
      Encounter::Merge(x, y) => found.find(x, y, &[Rule::Merge]),
      Encounter::AuxFan(..) => None,
    })
    .or_else(|| {
      walk.encounters.iter().find_map(|e| match *e {
        Encounter::AuxFan(x, y) => found.find(x, y, &[Rule::AuxFan]),
        _ => None,
      })
    })
    .or_else(|| {
      found.redexes.iter().position(|r| walk.reached.contains(&r.a) || walk.reached.contains(&r.b))
    });
  if let Some(i) = chosen {
    found.mark(i, true);
  }

  // The spine-only walk marks replicator-replicator pairs and nothing else: an annihilation or
  // commutation of two replicators met on the spine. It runs only while no erasure or decay is
  // pending.
  let garbage = found.redexes.iter().any(|r| matches!(r.category(), Category::Erasure | Category::Decay));
  if garbage {
    return;
  }
  for e in walk_spine(inet) {
    if let Encounter::Pair(x, y) = e {
      if kind(inet, x).is_replicator() && kind(inet, y).is_replicator() {
        if let Some(i) = found.find(x, y, &[Rule::Annihilate, Rule::Commute]) {
          found.mark(i, true);
        }
      }
    }
  }
}

fn walk_spine(inet: &INet) -> Vec<Encounter> {
  walk(inet, true).encounters
}

// The redex a single step fires: the most urgent optimal one, in scan order.
pub fn pick(redexes: &[Redex]) -> Option<&Redex> {
  redexes.iter().filter(|r| r.optimal).min_by_key(|r| r.category())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn identity_pair() -> (INet, NodeId, NodeId, NodeId) {
    let mut inet = new_inet();
    let app = new_node(&mut inet, Agent::Application);
    let fx = new_node(&mut inet, Agent::Abstraction { name: "x".into() });
    let fy = new_node(&mut inet, Agent::Abstraction { name: "y".into() });
    let root = root_port(&inet);
    link(&mut inet, root, port(app, RESULT));
    link(&mut inet, port(app, PRINCIPAL), port(fx, PRINCIPAL));
    link(&mut inet, port(app, ARGUMENT), port(fy, PRINCIPAL));
    link(&mut inet, port(fx, BINDER), port(fx, BODY));
    link(&mut inet, port(fy, BINDER), port(fy, BODY));
    (inet, app, fx, fy)
  }

  #[test]
  fn finds_the_beta_pair() {
    let (inet, app, fx, _) = identity_pair();
    let redexes = scan(&inet, &Config::default());
    assert_eq!(redexes, vec![Redex { a: fx, b: app, rule: Rule::Annihilate, optimal: true }]);
  }

  #[test]
  fn stale_redex_is_a_no_op() {
    let (mut inet, ..) = identity_pair();
    let redex = scan(&inet, &Config::default())[0];
    assert!(redex.apply(&mut inet));
    assert_eq!(inet.rules, 1);
    assert!(!redex.apply(&mut inet));
    assert_eq!(inet.rules, 1);
    assert!(scan(&inet, &Config::default()).is_empty());
  }

  #[test]
  fn unused_copy_decays() {
    let mut inet = new_inet();
    let fv = new_node(&mut inet, Agent::FreeVariable { name: "u".into() });
    let rep = new_node(&mut inet, Agent::ReplicatorIn(Replicator::new(1, Status::Unpaired, vec![0, 1])));
    let era = new_node(&mut inet, Agent::Eraser);
    link(&mut inet, port(fv, 0), port(rep, 0));
    let root = root_port(&inet);
    link(&mut inet, port(rep, 1), root);
    link(&mut inet, port(rep, 2), port(era, 0));
    let redexes = scan(&inet, &Config::default());
    assert_eq!(redexes, vec![Redex { a: rep, b: era, rule: Rule::DecayPort, optimal: true }]);
    assert!(redexes[0].apply(&mut inet));
    assert_eq!(enter(&inet, root_port(&inet)), port(fv, 0));
  }

  #[test]
  fn parallel_keeps_only_the_most_urgent_category() {
    // An erasure next to a beta pair: only the erasure may fire.
    let (mut inet, ..) = identity_pair();
    let era = new_node(&mut inet, Agent::Eraser);
    let f = new_node(&mut inet, Agent::Abstraction { name: "z".into() });
    link(&mut inet, port(era, 0), port(f, 0));
    link(&mut inet, port(f, BINDER), port(f, BODY));
    let config = Config { scheduler: Scheduler::Parallel, ..Config::default() };
    let redexes = scan(&inet, &config);
    assert_eq!(redexes.len(), 2);
    for r in &redexes {
      assert_eq!(r.optimal, r.rule == Rule::Erase);
    }
    assert_eq!(pick(&redexes).map(|r| r.rule), Some(Rule::Erase));
  }

  #[test]
  fn garbage_beta_is_not_optimal() {
    // A beta pair cut off from the root is left for the collector.
    let mut inet = new_inet();
    let fv = new_node(&mut inet, Agent::FreeVariable { name: "u".into() });
    let root = root_port(&inet);
    link(&mut inet, root, port(fv, 0));
    let app = new_node(&mut inet, Agent::Application);
    let f = new_node(&mut inet, Agent::Abstraction { name: "x".into() });
    let g = new_node(&mut inet, Agent::FreeVariable { name: "g".into() });
    let e = new_node(&mut inet, Agent::Eraser);
    link(&mut inet, port(app, PRINCIPAL), port(f, PRINCIPAL));
    link(&mut inet, port(f, BINDER), port(f, BODY));
    link(&mut inet, port(app, ARGUMENT), port(g, 0));
    link(&mut inet, port(app, RESULT), port(e, 0));
    let redexes = scan(&inet, &Config::default());
    let beta = redexes.iter().find(|r| r.rule == Rule::Annihilate).map(|r| r.optimal);
    let decay = redexes.iter().find(|r| r.rule == Rule::DecayNode).map(|r| r.optimal);
    assert_eq!(beta, Some(false));
    assert_eq!(decay, Some(true));
    assert!(!reachable(&inet).contains(&app));
  }

  #[test]
  #[should_panic(expected = "meet at level 1 with different arity")]
  fn equal_level_replicators_must_agree_on_arity() {
    let mut inet = new_inet();
    let fan_in = new_node(&mut inet, Agent::ReplicatorIn(Replicator::new(1, Status::Unpaired, vec![0, 1])));
    let fan_out = new_node(&mut inet, Agent::ReplicatorOut(Replicator::new(1, Status::Unknown, vec![0])));
    let fv = new_node(&mut inet, Agent::FreeVariable { name: "u".into() });
    let era = new_node(&mut inet, Agent::Eraser);
    let root = root_port(&inet);
    link(&mut inet, port(fan_in, PRINCIPAL), port(fan_out, PRINCIPAL));
    link(&mut inet, port(fan_in, 1), root);
    link(&mut inet, port(fan_in, 2), port(era, PRINCIPAL));
    link(&mut inet, port(fan_out, 1), port(fv, PRINCIPAL));
    scan(&inet, &Config::default());
  }

  #[test]
  fn first_decision_about_a_pair_stands() {
    let (_, app, fx, _) = identity_pair();
    let mut found = Candidates::default();
    found.add((fx, app, Rule::Annihilate));
    found.mark(0, true);
    found.mark(0, false);
    assert!(found.redexes[0].optimal);

    let mut found = Candidates::default();
    found.add((fx, app, Rule::Annihilate));
    found.mark(0, false);
    found.mark(0, true);
    assert!(!found.redexes[0].optimal);
  }

  #[test]
  fn merge_and_garbage_stay_optimal_next_to_the_walk_choice() {
    // A detached erasure is optimal by its category; the walk still picks the beta pair.
    let (mut inet, app, fx, fy) = identity_pair();
    let era = new_node(&mut inet, Agent::Eraser);
    let g = new_node(&mut inet, Agent::Abstraction { name: "g".into() });
    link(&mut inet, port(era, PRINCIPAL), port(g, PRINCIPAL));
    link(&mut inet, port(g, BINDER), port(g, BODY));
    let redexes = scan(&inet, &Config::default());
    assert_eq!(redexes.len(), 2);
    assert!(redexes.iter().all(|r| r.optimal));
    assert!(redexes.iter().any(|r| r.key() == (fx.min(app), fx.max(app))));
    assert!(!redexes.iter().any(|r| r.a == fy || r.b == fy));
  }

  #[test]
  fn linear_reports_only_annihilations() {
    let (mut inet, ..) = identity_pair();
    let era = new_node(&mut inet, Agent::Eraser);
    let f = new_node(&mut inet, Agent::Abstraction { name: "z".into() });
    link(&mut inet, port(era, 0), port(f, 0));
    link(&mut inet, port(f, BINDER), port(f, BODY));
    let redexes = scan(&inet, &Config::with_discipline(Discipline::Linear));
    assert_eq!(redexes.len(), 1);
    assert_eq!(redexes[0].rule, Rule::Annihilate);
    assert!(redexes[0].optimal);
  }
}
