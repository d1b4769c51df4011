// Configuration inputs of the reducer. Only `discipline` and `scheduler` change what the engine
// does; `levels` and `agents` only change how a net is shown.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Which of erasure and sharing a term may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Discipline {
  /// Every bound variable is used exactly once. Only beta pairs ever occur.
  Linear,
  /// Variables may be dropped, never shared.
  Affine,
  /// Variables may be shared, never dropped.
  Relevant,
  /// Unrestricted lambda calculus.
  Full,
}

impl Discipline {
  pub fn erases(self) -> bool {
    matches!(self, Discipline::Affine | Discipline::Full)
  }

  pub fn shares(self) -> bool {
    matches!(self, Discipline::Relevant | Discipline::Full)
  }
}

/// How optimal redexes are picked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheduler {
  /// A single canonical redex found by a normal-order walk from the root.
  LeftmostOutermost,
  /// Every redex of the highest-priority category present in the net.
  Parallel,
}

/// How replicator levels are displayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LevelScheme {
  Absolute,
  /// Levels shown relative to the lowest replicator level in the net.
  Relative,
}

/// How abstractions and applications are displayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AgentMode {
  /// Distinct abstraction and application agents.
  Split,
  /// One constructor agent, as in symmetric interaction combinators.
  Unified,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
  pub discipline: Discipline,
  pub scheduler: Scheduler,
  pub levels: LevelScheme,
  pub agents: AgentMode,
}

impl Default for Config {
  fn default() -> Self {
    Config {
      discipline: Discipline::Full,
      scheduler: Scheduler::LeftmostOutermost,
      levels: LevelScheme::Absolute,
      agents: AgentMode::Split,
    }
  }
}

impl Config {
  pub fn with_discipline(discipline: Discipline) -> Self {
    Config { discipline, ..Config::default() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} '{found}', expected one of: {}", .expected.join(", "))]
pub struct UnknownOption {
  pub what: &'static str,
  pub found: String,
  pub expected: &'static [&'static str],
}

macro_rules! named_options {
  ($ty:ident, $what:literal, $($name:literal => $variant:ident),+) => {
    impl FromStr for $ty {
      type Err = UnknownOption;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
          $($name => Ok($ty::$variant),)+
          _ => Err(UnknownOption {
            what: $what,
            found: s.to_string(),
            expected: &[$($name),+],
          }),
        }
      }
    }

    impl fmt::Display for $ty {
      fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
          $($ty::$variant => f.write_str($name),)+
        }
      }
    }
  };
}

named_options!(Discipline, "discipline", "linear" => Linear, "affine" => Affine, "relevant" => Relevant, "full" => Full);
named_options!(Scheduler, "scheduler", "sequential" => LeftmostOutermost, "parallel" => Parallel);
named_options!(LevelScheme, "level scheme", "absolute" => Absolute, "relative" => Relative);
named_options!(AgentMode, "agent mode", "split" => Split, "unified" => Unified);
