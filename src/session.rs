// A reduction session: the nets a reduction went through, and a cursor into them.
//
// Snapshots share structure through the persistent node map, so keeping one per step is cheap.
// Taking a step away from the latest snapshot drops everything after the cursor first.

use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::inet::*;
use crate::term::{from_net, to_net, CompileError, ReadbackError, Term};

/// Where the cursor is, and which way it can still move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Navigation {
  pub cursor: usize,
  pub len: usize,
  pub can_back: bool,
  pub can_forward: bool,
}

pub struct Session {
  config: Config,
  history: Vec<INet>,
  cursor: usize,
}

impl Session {
  pub fn new(net: INet, config: Config) -> Self {
    Session { config, history: vec![net], cursor: 0 }
  }

  pub fn from_term(term: &Term, config: Config) -> Result<Self, CompileError> {
    Ok(Session::new(to_net(term, &config)?, config))
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  // The net under the cursor.
  pub fn net(&self) -> &INet {
    &self.history[self.cursor]
  }

  pub fn redexes(&self) -> Vec<Redex> {
    scan(self.net(), &self.config)
  }

  pub fn readback(&self) -> Result<Term, ReadbackError> {
    from_net(self.net())
  }

  pub fn navigation(&self) -> Navigation {
    Navigation {
      cursor: self.cursor,
      len: self.history.len(),
      can_back: self.cursor > 0,
      can_forward: self.cursor + 1 < self.history.len(),
    }
  }

  // Fires one optimal redex, or runs the final cleanup if none is left. Returns None once the
  // net is in normal form.
  pub fn step(&mut self) -> Option<Navigation> {
    let mut net = self.net().clone();
    let redexes = scan(&net, &self.config);
    let changed = match pick(&redexes) {
      Some(redex) => redex.apply(&mut net),
      None => self.cleanup(&mut net),
    };
    if changed {
      Some(self.commit(net))
    } else {
      None
    }
  }

  // Fires every optimal redex of the current net as one step.
  pub fn step_parallel(&mut self) -> Option<Navigation> {
    let mut net = self.net().clone();
    let redexes = scan(&net, &self.config);
    let fired = redexes.iter().filter(|r| r.optimal).filter(|r| r.apply(&mut net)).count();
    debug!(fired, "parallel wave");
    if fired > 0 || self.cleanup(&mut net) {
      Some(self.commit(net))
    } else {
      None
    }
  }

  fn cleanup(&self, net: &mut INet) -> bool {
    let discipline = self.config.discipline;
    discipline.erases() && collect_garbage(net, !discipline.shares())
  }

  fn commit(&mut self, net: INet) -> Navigation {
    self.history.truncate(self.cursor + 1);
    self.history.push(net);
    self.cursor += 1;
    self.navigation()
  }

  pub fn back(&mut self) -> Navigation {
    self.cursor = self.cursor.saturating_sub(1);
    self.navigation()
  }

  pub fn forward(&mut self) -> Navigation {
    if self.cursor + 1 < self.history.len() {
      self.cursor += 1;
    }
    self.navigation()
  }

  pub fn reset_to_start(&mut self) -> Navigation {
    self.cursor = 0;
    self.navigation()
  }

  pub fn jump_to_latest(&mut self) -> Navigation {
    self.cursor = self.history.len() - 1;
    self.navigation()
  }

  // Steps until normal form or until `limit` steps were taken. Returns the number of steps.
  pub fn run(&mut self, limit: usize, parallel: bool) -> usize {
    let mut steps = 0;
    while steps < limit {
      let next = if parallel { self.step_parallel() } else { self.step() };
      if next.is_none() {
        break;
      }
      steps += 1;
    }
    steps
  }

  // True if no step can change the current net.
  pub fn is_normal(&self) -> bool {
    let mut net = self.net().clone();
    pick(&scan(&net, &self.config)).is_none() && !self.cleanup(&mut net)
  }
}

#[derive(Debug, Error)]
pub enum NormalizeError {
  #[error(transparent)]
  Compile(#[from] CompileError),
  #[error(transparent)]
  Readback(#[from] ReadbackError),
  #[error("no normal form within {0} steps")]
  Limit(usize),
}

// Reduces a term to normal form, returning it with the number of rules applied.
pub fn normalize(term: &Term, config: Config, limit: usize) -> Result<(Term, u32), NormalizeError> {
  let mut session = Session::from_term(term, config)?;
  session.run(limit, false);
  if !session.is_normal() {
    return Err(NormalizeError::Limit(limit));
  }
  let term = session.readback()?;
  Ok((term, session.net().rules))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn session(code: &str) -> Session {
    let term: Term = code.parse().unwrap();
    Session::from_term(&term, Config::default()).unwrap()
  }

  #[test]
  fn navigation_flags() {
    let mut s = session("(λx x λy y)");
    assert_eq!(s.navigation(), Navigation { cursor: 0, len: 1, can_back: false, can_forward: false });
    let nav = s.step().unwrap();
    assert_eq!(nav, Navigation { cursor: 1, len: 2, can_back: true, can_forward: false });
    assert_eq!(s.step(), None);
    assert_eq!(s.back(), Navigation { cursor: 0, len: 2, can_back: false, can_forward: true });
    assert_eq!(s.back().cursor, 0);
    assert_eq!(s.jump_to_latest().cursor, 1);
    assert_eq!(s.reset_to_start().cursor, 0);
    assert_eq!(s.forward().cursor, 1);
    assert_eq!(s.forward().cursor, 1);
  }

  #[test]
  fn back_restores_the_previous_net() {
    let mut s = session("(λx x λy y)");
    let before = s.net().clone();
    s.step().unwrap();
    assert!(!equal(&before, s.net()));
    s.back();
    assert!(equal(&before, s.net()));
  }

  #[test]
  fn stepping_from_the_past_drops_the_future() {
    let mut s = session("((λx x λy y) λz z)");
    s.run(10, false);
    let len = s.navigation().len;
    assert!(len > 2);
    s.reset_to_start();
    let nav = s.step().unwrap();
    assert_eq!(nav, Navigation { cursor: 1, len: 2, can_back: true, can_forward: false });
  }

  #[test]
  fn normalizes_identity_applications() {
    let term: Term = "((λx x λy y) λz z)".parse().unwrap();
    let (normal, rules) = normalize(&term, Config::default(), 100).unwrap();
    assert!(normal.alpha_eq(&"λz z".parse().unwrap()));
    assert_eq!(rules, 2);
  }

  #[test]
  fn reports_the_step_limit() {
    let term: Term = "((λx x λy y) λz z)".parse().unwrap();
    assert!(matches!(normalize(&term, Config::default(), 1), Err(NormalizeError::Limit(1))));
  }
}
