mod as_net;
mod syntax;

pub use self::as_net::*;
pub use self::syntax::*;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::config::Discipline;

// Terms of the lambda calculus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
  // Abstractions
  Lam { nam: String, bod: Box<Term> },

  // Applications
  App { fun: Box<Term>, arg: Box<Term> },

  // Variables
  Var { nam: String },
}

use self::Term::*;

pub fn lam(nam: &str, bod: Term) -> Term {
  Lam { nam: nam.to_string(), bod: Box::new(bod) }
}

pub fn app(fun: Term, arg: Term) -> Term {
  App { fun: Box::new(fun), arg: Box::new(arg) }
}

pub fn var(nam: &str) -> Term {
  Var { nam: nam.to_string() }
}

/// A term that breaks the usage rules of a discipline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
  #[error("'{name}' is never used, which the {discipline} discipline forbids")]
  Unused { name: String, discipline: Discipline },
  #[error("'{name}' is used {uses} times, which the {discipline} discipline forbids")]
  Shared { name: String, uses: usize, discipline: Discipline },
}

// Nameless form, used to compare terms up to renaming of bound variables.
#[derive(PartialEq, Eq)]
enum Nameless<'a> {
  Lam(Box<Nameless<'a>>),
  App(Box<Nameless<'a>>, Box<Nameless<'a>>),
  Bound(usize),
  Free(&'a str),
}

impl Term {
  fn nameless<'a>(&'a self, ctx: &mut Vec<&'a str>) -> Nameless<'a> {
    match self {
      Lam { nam, bod } => {
        ctx.push(nam);
        let bod = bod.nameless(ctx);
        ctx.pop();
        Nameless::Lam(Box::new(bod))
      }
      App { fun, arg } => Nameless::App(Box::new(fun.nameless(ctx)), Box::new(arg.nameless(ctx))),
      Var { nam } => match ctx.iter().rev().position(|n| *n == nam.as_str()) {
        Some(idx) => Nameless::Bound(idx),
        None => Nameless::Free(nam.as_str()),
      },
    }
  }

  /// Equality up to the names of bound variables.
  pub fn alpha_eq(&self, other: &Term) -> bool {
    self.nameless(&mut vec![]) == other.nameless(&mut vec![])
  }

  // Number of abstractions, applications and variables.
  pub fn size(&self) -> usize {
    match self {
      Lam { bod, .. } => 1 + bod.size(),
      App { fun, arg } => 1 + fun.size() + arg.size(),
      Var { .. } => 1,
    }
  }

  // Free variable names with their number of occurrences.
  pub fn free_vars(&self) -> BTreeMap<String, usize> {
    fn go<'a>(term: &'a Term, ctx: &mut Vec<&'a str>, out: &mut BTreeMap<String, usize>) {
      match term {
        Lam { nam, bod } => {
          ctx.push(nam);
          go(bod, ctx, out);
          ctx.pop();
        }
        App { fun, arg } => {
          go(fun, ctx, out);
          go(arg, ctx, out);
        }
        Var { nam } => {
          if !ctx.contains(&nam.as_str()) {
            *out.entry(nam.clone()).or_insert(0) += 1;
          }
        }
      }
    }
    let mut out = BTreeMap::new();
    go(self, &mut vec![], &mut out);
    out
  }

  // Free occurrences of `name`.
  fn uses(&self, name: &str) -> usize {
    match self {
      Lam { nam, bod } => {
        if nam == name {
          0
        } else {
          bod.uses(name)
        }
      }
      App { fun, arg } => fun.uses(name) + arg.uses(name),
      Var { nam } => (nam == name) as usize,
    }
  }

  /// Checks that every variable is used as often as the discipline allows. Free variables may be
  /// shared only where sharing is allowed; they are never required to occur.
  pub fn check(&self, discipline: Discipline) -> Result<(), CompileError> {
    let allowed = |name: &str, uses: usize, bound: bool| -> Result<(), CompileError> {
      if bound && uses == 0 && !discipline.erases() {
        return Err(CompileError::Unused { name: name.to_string(), discipline });
      }
      if uses > 1 && !discipline.shares() {
        return Err(CompileError::Shared { name: name.to_string(), uses, discipline });
      }
      Ok(())
    };
    fn walk(term: &Term, allowed: &dyn Fn(&str, usize, bool) -> Result<(), CompileError>) -> Result<(), CompileError> {
      match term {
        Lam { nam, bod } => {
          allowed(nam.as_str(), bod.uses(nam), true)?;
          walk(bod, allowed)
        }
        App { fun, arg } => {
          walk(fun, allowed)?;
          walk(arg, allowed)
        }
        Var { .. } => Ok(()),
      }
    }
    walk(self, &allowed)?;
    for (name, uses) in self.free_vars() {
      allowed(name.as_str(), uses, false)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alpha_equivalence() {
    assert!(lam("x", var("x")).alpha_eq(&lam("y", var("y"))));
    assert!(!lam("x", var("x")).alpha_eq(&lam("y", var("x"))));
    assert!(lam("x", lam("y", app(var("x"), var("z")))).alpha_eq(&lam("a", lam("b", app(var("a"), var("z"))))));
  }

  #[test]
  fn shadowed_names_count_separately() {
    // λx λx x: the outer x is unused
    let term = lam("x", lam("x", var("x")));
    assert_eq!(
      term.check(Discipline::Linear),
      Err(CompileError::Unused { name: "x".into(), discipline: Discipline::Linear })
    );
    assert_eq!(term.check(Discipline::Affine), Ok(()));
  }

  #[test]
  fn disciplines() {
    let dup = lam("x", app(var("x"), var("x")));
    let drop = lam("x", lam("y", var("x")));
    assert!(dup.check(Discipline::Affine).is_err());
    assert!(dup.check(Discipline::Relevant).is_ok());
    assert!(drop.check(Discipline::Relevant).is_err());
    assert!(drop.check(Discipline::Affine).is_ok());
    assert!(dup.check(Discipline::Full).is_ok() && drop.check(Discipline::Full).is_ok());
    let free = app(var("u"), var("u"));
    assert_eq!(
      free.check(Discipline::Linear),
      Err(CompileError::Shared { name: "u".into(), uses: 2, discipline: Discipline::Linear })
    );
  }

  #[test]
  fn free_variables() {
    let term = app(lam("x", app(var("x"), var("y"))), var("y"));
    assert_eq!(term.free_vars().into_iter().collect::<Vec<_>>(), vec![("y".to_string(), 2)]);
    assert_eq!(term.size(), 6);
  }
}
