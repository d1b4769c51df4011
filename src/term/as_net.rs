// Converts Terms to Nets, and back.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::debug;

use super::*;
use crate::config::Config;
use crate::inet::*;

/// Why a net could not be read back as a term.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadbackError {
  #[error("reached an eraser (node {0}) in term position")]
  UnexpectedEraser(NodeId),
  #[error("superposition at node {0} has no matching duplication on the read path")]
  Superposition(NodeId),
  #[error("variable bound by node {0} occurs outside its abstraction")]
  Unbound(NodeId),
  #[error("term is deeper than {0}; the net loops")]
  Cyclic(usize),
  #[error("cannot read a term from port {slot} of node {node}")]
  UnexpectedPort { node: NodeId, slot: SlotId },
}

// A variable in scope while compiling: the abstraction binding it, the level it is bound at (one
// below the abstraction's own) and the duplicator fanning it out, once there is a first use.
struct Binding<'a> {
  name: &'a str,
  abs: NodeId,
  level: i32,
  rep: Option<NodeId>,
}

// Converts a term to a net. Every abstraction and application becomes one node; every variable
// with at least one use gets a duplicator on its binder, with one copy per use. A use at level
// `l` of a variable bound at level `b` copies at offset `l - b - 1`.
//
// Only arguments go one level deeper. The whole term sits at level 1, as the body of an
// outer binder of its free variables at level 0, and a body stays at its abstraction's level.
// Every duplicator then sits at the level of the abstraction binding it, so a direct use
// copies at offset 0.
pub fn to_net(term: &Term, config: &Config) -> Result<INet, CompileError> {
  term.check(config.discipline)?;

  fn encode_term<'a>(
    net: &mut INet,
    term: &'a Term,
    level: i32,
    scope: &mut Vec<Binding<'a>>,
    free: &mut BTreeMap<&'a str, NodeId>,
  ) -> Port {
    match term {
      // A lambda becomes an abstraction node. Ports:
      // - 0: points to where the lambda occurs.
      // - 1: points to the variable's duplicator, or to an eraser while unused.
      // - 2: points to the body.
      Lam { nam, bod } => {
        let abs = new_node(net, Agent::Abstraction { name: nam.clone() });
        let era = new_node(net, Agent::Eraser);
        link(net, port(abs, BINDER), port(era, PRINCIPAL));
        scope.push(Binding { name: nam.as_str(), abs, level: level - 1, rep: None });
        let bod = encode_term(net, bod, level, scope, free);
        scope.pop();
        link(net, port(abs, BODY), bod);
        port(abs, PRINCIPAL)
      }
      // An application becomes an application node. Ports:
      // - 0: points to the function being applied.
      // - 1: points to the function's argument.
      // - 2: points to where the application occurs.
      App { fun, arg } => {
        let app = new_node(net, Agent::Application);
        let fun = encode_term(net, fun, level, scope, free);
        link(net, port(app, PRINCIPAL), fun);
        let arg = encode_term(net, arg, level + 1, scope, free);
        link(net, port(app, ARGUMENT), arg);
        port(app, RESULT)
      }
      Var { nam } => match scope.iter_mut().rev().find(|b| b.name == nam.as_str()) {
        Some(binding) => {
          let delta = level - binding.level - 1;
          match binding.rep {
            Some(rep) => push_aux(net, rep, delta),
            None => {
              let era = enter(net, port(binding.abs, BINDER)).node;
              remove_node(net, era);
              let rep = new_node(net, Agent::ReplicatorIn(Replicator::new(binding.level + 1, Status::Unpaired, vec![])));
              link(net, port(binding.abs, BINDER), port(rep, PRINCIPAL));
              binding.rep = Some(rep);
              push_aux(net, rep, delta)
            }
          }
        }
        // A free variable is a node of its own, bound at level 0 and shared from level 1.
        None => {
          let rep = match free.get(nam.as_str()) {
            Some(&rep) => rep,
            None => {
              let fv = new_node(net, Agent::FreeVariable { name: nam.clone() });
              let rep = new_node(net, Agent::ReplicatorIn(Replicator::new(1, Status::Unpaired, vec![])));
              link(net, port(fv, PRINCIPAL), port(rep, PRINCIPAL));
              free.insert(nam.as_str(), rep);
              rep
            }
          };
          push_aux(net, rep, level - 1)
        }
      },
    }
  }

  let mut net = new_inet();
  let mut scope = vec![];
  let mut free = BTreeMap::new();
  let main = encode_term(&mut net, term, 1, &mut scope, &mut free);
  let root = root_port(&net);
  link(&mut net, root, main);

  // Single copies at no offset are plain wires. Without sharing every copy is single.
  let splice_any = !config.discipline.shares();
  let reps: Vec<NodeId> = net.ids().into_iter().filter(|&n| kind(&net, n).is_replicator()).collect();
  let mut spliced = 0;
  for rep in reps {
    if settle(&mut net, rep, splice_any) {
      spliced += 1;
    }
  }
  debug!(nodes = net.len(), spliced, "compiled");
  Ok(net)
}

struct Reader<'a> {
  net: &'a INet,
  // Names given to the abstractions whose bodies are being read.
  names: BTreeMap<NodeId, String>,
  // Names that must not be captured: those in scope and every free variable.
  taken: Vec<String>,
  free: BTreeSet<String>,
  // Copies taken through duplicators on the way here: (level, copy slot).
  exits: Vec<(i32, SlotId)>,
  limit: usize,
}

impl<'a> Reader<'a> {
  fn fresh(&self, name: &str) -> String {
    let clashes = |n: &str| self.taken.iter().any(|t| t == n) || self.free.contains(n);
    if !clashes(name) {
      return name.to_string();
    }
    (1..).map(|i| format!("{}{}", name, i)).find(|n| !clashes(n)).unwrap_or_else(|| name.to_string())
  }

  fn read(&mut self, next: Port, depth: usize) -> Result<Term, ReadbackError> {
    if depth > self.limit {
      return Err(ReadbackError::Cyclic(self.limit));
    }
    let node = next.node;
    match (kind(self.net, node), next.slot) {
      (Agent::Eraser, _) => Err(ReadbackError::UnexpectedEraser(node)),
      (Agent::FreeVariable { name }, PRINCIPAL) => Ok(Var { nam: name.clone() }),
      // If we're visiting a port 0, then it is a lambda.
      (Agent::Abstraction { name }, PRINCIPAL) => {
        let nam = self.fresh(name);
        let saved = self.names.insert(node, nam.clone());
        self.taken.push(nam.clone());
        let bod = self.read(enter(self.net, port(node, BODY)), depth + 1);
        self.taken.pop();
        match saved {
          Some(old) => self.names.insert(node, old),
          None => self.names.remove(&node),
        };
        Ok(Lam { nam, bod: Box::new(bod?) })
      }
      // If we're visiting a port 1, then it is a variable.
      (Agent::Abstraction { .. }, BINDER) => match self.names.get(&node) {
        Some(nam) => Ok(Var { nam: nam.clone() }),
        None => Err(ReadbackError::Unbound(node)),
      },
      // If we're visiting a port 2, then it is an application.
      (Agent::Application, RESULT) => {
        let fun = self.read(enter(self.net, port(node, PRINCIPAL)), depth + 1)?;
        let arg = self.read(enter(self.net, port(node, ARGUMENT)), depth + 1)?;
        Ok(App { fun: Box::new(fun), arg: Box::new(arg) })
      }
      // One copy of a duplicated value: read the value, remembering which copy this is.
      (Agent::ReplicatorIn(rep), slot) if slot != PRINCIPAL => {
        self.exits.push((rep.level, slot));
        let val = self.read(enter(self.net, port(node, PRINCIPAL)), depth + 1);
        self.exits.pop();
        val
      }
      // A superposition: take the branch matching the copy we came through at its level.
      (Agent::ReplicatorOut(rep), PRINCIPAL) => {
        let found = self.exits.iter().rposition(|&(level, _)| level == rep.level);
        let i = match found {
          Some(i) if self.exits[i].1 <= rep.deltas.len() => i,
          _ => return Err(ReadbackError::Superposition(node)),
        };
        let exit = self.exits.remove(i);
        let val = self.read(enter(self.net, port(node, exit.1)), depth + 1);
        self.exits.insert(i, exit);
        val
      }
      (_, slot) => Err(ReadbackError::UnexpectedPort { node, slot }),
    }
  }
}

// Converts a net back to a term, starting at its root.
pub fn from_net(net: &INet) -> Result<Term, ReadbackError> {
  let free = net
    .nodes
    .values()
    .filter_map(|n| match &n.agent {
      Agent::FreeVariable { name } => Some(name.clone()),
      _ => None,
    })
    .collect();
  let mut reader = Reader {
    net,
    names: BTreeMap::new(),
    taken: vec![],
    free,
    exits: vec![],
    limit: 8 * net.len() + 64,
  };
  reader.read(enter(net, root_port(net)), 0)
}
