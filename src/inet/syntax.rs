// Net stringifier. One line per live node:
// <Node>  ::= <id> ":" <label> "[" <wire>* "]"
// <label> ::= "root" | "era" | "#" <name> | "λ" <name> | "@" | <rep>
// <rep>   ::= ("in" | "out") <level> ["*"] "<" <delta> ("," <delta>)* ">"
// Both ends of a wire carry the same name. A trailing "*" marks an unpaired replicator.

use std::collections::BTreeMap;

use itertools::Itertools;

use super::core::*;
use super::redex::Redex;
use crate::config::{AgentMode, Config, LevelScheme};

// Generates the n-th wire name: a, b, ..., z, ba, bb, ...
fn wire_name(mut n: usize) -> String {
  let mut name = vec![];
  loop {
    name.push((n % 26) as u8 + b'a');
    n /= 26;
    if n == 0 {
      break;
    }
  }
  name.reverse();
  String::from_utf8_lossy(&name).to_string()
}

fn label(agent: &Agent, config: &Config, base: i32) -> String {
  match agent {
    Agent::Root => "root".to_string(),
    Agent::Eraser => "era".to_string(),
    Agent::FreeVariable { name } => format!("#{}", name),
    Agent::Abstraction { name } => match config.agents {
      AgentMode::Split => format!("λ{}", name),
      AgentMode::Unified => format!("con.{}", name),
    },
    Agent::Application => match config.agents {
      AgentMode::Split => "@".to_string(),
      AgentMode::Unified => "con".to_string(),
    },
    Agent::ReplicatorIn(rep) | Agent::ReplicatorOut(rep) => {
      let side = if matches!(agent, Agent::ReplicatorIn(_)) { "in" } else { "out" };
      let level = match config.levels {
        LevelScheme::Absolute => rep.level,
        LevelScheme::Relative => rep.level - base,
      };
      let mark = if rep.is_unpaired() { "*" } else { "" };
      format!("{}{}{}<{}>", side, level, mark, rep.deltas.iter().join(","))
    }
  }
}

// Renders every live node of the net.
pub fn show(inet: &INet, config: &Config) -> String {
  let base = inet.nodes.values().filter_map(|n| n.agent.replicator()).map(|r| r.level).min().unwrap_or(0);
  let mut names: BTreeMap<Port, String> = BTreeMap::new();
  let mut count = 0;
  let mut lines = vec![];
  for (&id, node) in inet.nodes.iter() {
    let mut wires = vec![];
    for (s, &far) in node.ports.iter().enumerate() {
      let here = port(id, s);
      if !names.contains_key(&here) {
        let name = wire_name(count);
        count += 1;
        names.insert(far, name.clone());
        names.insert(here, name);
      }
      wires.push(names[&here].clone());
    }
    lines.push(format!("{}: {} [{}]", id, label(&node.agent, config, base), wires.join(" ")));
  }
  lines.join("\n")
}

// Renders a redex list, one redex per line.
pub fn show_redexes(redexes: &[Redex]) -> String {
  redexes
    .iter()
    .map(|r| {
      let flag = if r.optimal { " optimal" } else { "" };
      format!("{} ~ {} {} ({}){}", r.a, r.b, r.rule.name(), r.category() as u8, flag)
    })
    .join("\n")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_names() {
    assert_eq!(wire_name(0), "a");
    assert_eq!(wire_name(25), "z");
    assert_eq!(wire_name(26), "ba");
  }

  #[test]
  fn shows_identity() {
    let mut inet = new_inet();
    let f = new_node(&mut inet, Agent::Abstraction { name: "x".into() });
    let root = root_port(&inet);
    link(&mut inet, root, port(f, PRINCIPAL));
    link(&mut inet, port(f, BINDER), port(f, BODY));
    assert_eq!(show(&inet, &Config::default()), "0: root [a]\n1: λx [a b b]");
    let unified = Config { agents: AgentMode::Unified, ..Config::default() };
    assert_eq!(show(&inet, &unified), "0: root [a]\n1: con.x [a b b]");
  }

  #[test]
  fn shows_relative_levels() {
    let mut inet = new_inet();
    let r = new_node(&mut inet, Agent::ReplicatorIn(Replicator::new(3, Status::Unpaired, vec![0, 2])));
    let s = new_node(&mut inet, Agent::ReplicatorOut(Replicator::new(5, Status::Unknown, vec![1])));
    let text = show(&inet, &Config { levels: LevelScheme::Relative, ..Config::default() });
    assert!(text.contains(&format!("{}: in0*<0,2>", r)));
    assert!(text.contains(&format!("{}: out2<1>", s)));
    assert!(show(&inet, &Config::default()).contains("in3*<0,2>"));
  }
}
