// The port graph. Nodes live in a persistent ordered map so that snapshotting a net for the
// history is a cheap structural copy; a node that is not in the map is gone.

use im::OrdMap;

pub type NodeId = u32;

pub type SlotId = usize;

// Slot 0 is the principal port of every agent.
pub const PRINCIPAL: SlotId = 0;

// Abstraction slots.
pub const BINDER: SlotId = 1;
pub const BODY: SlotId = 2;

// Application slots. The principal port faces the function.
pub const ARGUMENT: SlotId = 1;
pub const RESULT: SlotId = 2;

/// One port of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port {
  pub node: NodeId,
  pub slot: SlotId,
}

// Builds a port (an address / slot pair).
pub fn port(node: NodeId, slot: SlotId) -> Port {
  Port { node, slot }
}

// Returns the address of a port.
pub fn addr(port: Port) -> NodeId {
  port.node
}

// Returns the slot of a port.
pub fn slot(port: Port) -> SlotId {
  port.slot
}

/// Whether a replicator may still be merged with its neighbours or lose ports. Replicators built
/// for variable sharing start unpaired; replicators produced in matching pairs by commutation
/// have a partner somewhere and must keep their shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
  Unpaired,
  Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Replicator {
  pub level: i32,
  pub status: Status,
  /// One level offset per auxiliary port, relative to `level`.
  pub deltas: Vec<i32>,
}

impl Replicator {
  pub fn new(level: i32, status: Status, deltas: Vec<i32>) -> Self {
    Replicator { level, status, deltas }
  }

  pub fn is_unpaired(&self) -> bool {
    self.status == Status::Unpaired
  }

  // Level of the auxiliary port at `slot`.
  pub fn aux_level(&self, slot: SlotId) -> i32 {
    self.level + self.deltas[slot - 1]
  }
}

/// Direction of the value flowing through a port: positive ports produce a value, negative ports
/// consume one. Every wire joins a positive and a negative port unless an eraser is involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Polarity {
  Positive,
  Negative,
}

impl Polarity {
  pub fn flip(self) -> Polarity {
    match self {
      Polarity::Positive => Polarity::Negative,
      Polarity::Negative => Polarity::Positive,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agent {
  /// Ports: principal (where the lambda occurs), binder, body.
  Abstraction { name: String },
  /// Ports: principal (function), argument, result.
  Application,
  /// Duplicates the value on its principal port onto every auxiliary port.
  ReplicatorIn(Replicator),
  /// Superposes the values on its auxiliary ports onto its principal port.
  ReplicatorOut(Replicator),
  Eraser,
  FreeVariable { name: String },
  Root,
}

impl Agent {
  // Number of auxiliary ports.
  pub fn arity(&self) -> usize {
    match self {
      Agent::Abstraction { .. } | Agent::Application => 2,
      Agent::ReplicatorIn(rep) | Agent::ReplicatorOut(rep) => rep.deltas.len(),
      Agent::Eraser | Agent::FreeVariable { .. } | Agent::Root => 0,
    }
  }

  pub fn replicator(&self) -> Option<&Replicator> {
    match self {
      Agent::ReplicatorIn(rep) | Agent::ReplicatorOut(rep) => Some(rep),
      _ => None,
    }
  }

  pub fn replicator_mut(&mut self) -> Option<&mut Replicator> {
    match self {
      Agent::ReplicatorIn(rep) | Agent::ReplicatorOut(rep) => Some(rep),
      _ => None,
    }
  }

  pub fn is_replicator(&self) -> bool {
    self.replicator().is_some()
  }

  pub fn is_eraser(&self) -> bool {
    matches!(self, Agent::Eraser)
  }

  // Polarity of a port, or None for erasers, which accept anything.
  pub fn polarity(&self, slot: SlotId) -> Option<Polarity> {
    use Polarity::*;
    match self {
      Agent::Abstraction { .. } => Some(if slot == BODY { Negative } else { Positive }),
      Agent::Application => Some(if slot == RESULT { Positive } else { Negative }),
      Agent::ReplicatorIn(_) => Some(if slot == PRINCIPAL { Negative } else { Positive }),
      Agent::ReplicatorOut(_) => Some(if slot == PRINCIPAL { Positive } else { Negative }),
      Agent::FreeVariable { .. } => Some(Positive),
      Agent::Root => Some(Negative),
      Agent::Eraser => None,
    }
  }

  // Short name used by logs and the text dump.
  pub fn tag(&self) -> &'static str {
    match self {
      Agent::Abstraction { .. } => "abs",
      Agent::Application => "app",
      Agent::ReplicatorIn(_) => "rep-in",
      Agent::ReplicatorOut(_) => "rep-out",
      Agent::Eraser => "era",
      Agent::FreeVariable { .. } => "free",
      Agent::Root => "root",
    }
  }
}

// A replicator agent whose principal port has the given polarity.
pub fn replicator_facing(polarity: Polarity, rep: Replicator) -> Agent {
  match polarity {
    Polarity::Negative => Agent::ReplicatorIn(rep),
    Polarity::Positive => Agent::ReplicatorOut(rep),
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
  pub agent: Agent,
  pub ports: Vec<Port>,
}

#[derive(Clone, Debug)]
pub struct INet {
  pub nodes: OrdMap<NodeId, Node>,
  pub next: NodeId,
  pub root: NodeId,
  pub rules: u32,
}

impl INet {
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn ids(&self) -> Vec<NodeId> {
    self.nodes.keys().copied().collect()
  }
}

// Create a new net holding only its root, whose port is left dangling on itself.
pub fn new_inet() -> INet {
  let mut inet = INet { nodes: OrdMap::new(), next: 0, root: 0, rules: 0 };
  inet.root = new_node(&mut inet, Agent::Root);
  inet
}

// Allocates a new node with every port pointing to itself. Ids are never reused, so a stale id
// can always be recognised as gone.
pub fn new_node(inet: &mut INet, agent: Agent) -> NodeId {
  let node = inet.next;
  inet.next += 1;
  let ports = (0..=agent.arity()).map(|s| port(node, s)).collect();
  inet.nodes.insert(node, Node { agent, ports });
  node
}

pub fn is_alive(inet: &INet, node: NodeId) -> bool {
  inet.nodes.contains_key(&node)
}

pub fn node(inet: &INet, node: NodeId) -> &Node {
  match inet.nodes.get(&node) {
    Some(n) => n,
    None => panic!("dangling reference to node {}", node),
  }
}

pub fn node_mut(inet: &mut INet, node: NodeId) -> &mut Node {
  match inet.nodes.get_mut(&node) {
    Some(n) => n,
    None => panic!("dangling reference to node {}", node),
  }
}

// Agent of the node.
pub fn kind(inet: &INet, node: NodeId) -> &Agent {
  &self::node(inet, node).agent
}

pub fn arity(inet: &INet, node: NodeId) -> usize {
  self::node(inet, node).ports.len() - 1
}

// Enters a port, returning the port on the other side.
pub fn enter(inet: &INet, port: Port) -> Port {
  node(inet, port.node).ports[port.slot]
}

// Links two ports.
pub fn link(inet: &mut INet, a: Port, b: Port) {
  node_mut(inet, a.node).ports[a.slot] = b;
  node_mut(inet, b.node).ports[b.slot] = a;
}

pub fn remove_node(inet: &mut INet, node: NodeId) -> Node {
  match inet.nodes.remove(&node) {
    Some(n) => n,
    None => panic!("removing dead node {}", node),
  }
}

// True if both nodes face each other through their principal ports.
pub fn is_active_pair(inet: &INet, a: NodeId, b: NodeId) -> bool {
  a != b && is_alive(inet, a) && is_alive(inet, b) && enter(inet, port(a, PRINCIPAL)) == port(b, PRINCIPAL)
}

pub fn root_port(inet: &INet) -> Port {
  port(inet.root, PRINCIPAL)
}

// Appends an auxiliary port with the given level offset to a replicator; the new port points to
// itself until the caller links it.
pub fn push_aux(inet: &mut INet, rep: NodeId, delta: i32) -> Port {
  let node = node_mut(inet, rep);
  let slot = node.ports.len();
  match node.agent.replicator_mut() {
    Some(r) => r.deltas.push(delta),
    None => panic!("node {} is not a replicator", rep),
  }
  node.ports.push(port(rep, slot));
  port(rep, slot)
}

// Replaces every auxiliary port of a replicator with the given (far end, delta) entries, relinking
// each far end to its new slot.
pub fn rebuild_aux(inet: &mut INet, rep: NodeId, entries: Vec<(Port, i32)>) {
  {
    let node = node_mut(inet, rep);
    node.ports.truncate(1);
    let deltas = entries.iter().map(|&(_, d)| d).collect();
    match node.agent.replicator_mut() {
      Some(r) => r.deltas = deltas,
      None => panic!("node {} is not a replicator", rep),
    }
    for s in 1..=entries.len() {
      node.ports.push(port(rep, s));
    }
  }
  for (i, (far, _)) in entries.into_iter().enumerate() {
    assert_ne!(far.node, rep, "replicator {} wired to itself", rep);
    link(inet, port(rep, i + 1), far);
  }
}

// Lists every port whose partner does not point back to it, or points to a dead node.
pub fn reciprocity_violations(inet: &INet) -> Vec<Port> {
  let mut bad = vec![];
  for (&id, node) in inet.nodes.iter() {
    for (s, &far) in node.ports.iter().enumerate() {
      let here = port(id, s);
      let back = inet.nodes.get(&far.node).and_then(|n| n.ports.get(far.slot));
      if back != Some(&here) {
        bad.push(here);
      }
    }
  }
  bad
}

// Lists every wire joining two ports of the same polarity. Erasers are exempt.
pub fn polarity_violations(inet: &INet) -> Vec<(Port, Port)> {
  let mut bad = vec![];
  for (&id, node) in inet.nodes.iter() {
    for (s, &far) in node.ports.iter().enumerate() {
      let here = port(id, s);
      if here > far || !is_alive(inet, far.node) {
        continue;
      }
      let a = node.agent.polarity(s);
      let b = kind(inet, far.node).polarity(far.slot);
      if let (Some(a), Some(b)) = (a, b) {
        if a == b {
          bad.push((here, far));
        }
      }
    }
  }
  bad
}
