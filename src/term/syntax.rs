// Term parser and stringifier. Grammar:
// <Term> ::= <Lam> | <App> | <Var>
// <Lam>  ::= ("λ" | "\") <name> <Term>
// <App>  ::= "(" <Term> <Term>* ")"
// <Var>  ::= <name>
// <name> ::= [A-Za-z0-9_.']+
// Whitespace and `//` line comments may appear between tokens.

use std::fmt;

use thiserror::Error;

use super::*;

// Source code is UTF-8, read byte by byte.
pub type Str = [u8];
pub type Chr = u8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
  #[error("expected {expected} at byte {offset}, found {found}")]
  Expected { offset: usize, expected: &'static str, found: String },
  #[error("unexpected input after the term at byte {offset}: {found}")]
  Trailing { offset: usize, found: String },
}

// A short excerpt of the remaining input, for error messages.
fn excerpt(code: &Str) -> String {
  if code.is_empty() {
    "end of input".to_string()
  } else {
    let end = code.len().min(16);
    format!("'{}'", String::from_utf8_lossy(&code[..end]))
  }
}

fn expected(src: &Str, code: &Str, what: &'static str) -> ParseError {
  ParseError::Expected { offset: src.len() - code.len(), expected: what, found: excerpt(code) }
}

fn is_name_char(c: Chr) -> bool {
  c.is_ascii_alphanumeric() || c == b'_' || c == b'.' || c == b'\''
}

// Parses a name, returns the remaining code and the name.
fn parse_name(code: &Str) -> (&Str, &Str) {
  let code = skip_whitespace(code);
  let mut i: usize = 0;
  while i < code.len() && is_name_char(code[i]) {
    i += 1;
  }
  (&code[i..], &code[0..i])
}

fn skip_whitespace(code: &Str) -> &Str {
  let mut i: usize = 0;
  loop {
    while i < code.len() && code[i].is_ascii_whitespace() {
      i += 1;
    }
    // Comment: `// many words here ... <newline>`
    if code[i..].starts_with(b"//") {
      i += code[i..].iter().position(|&c| c == b'\n').unwrap_or(code.len() - i);
    } else {
      return &code[i..];
    }
  }
}

fn parse_text<'a>(src: &Str, code: &'a Str, text: &'static str) -> Result<&'a Str, ParseError> {
  let code = skip_whitespace(code);
  if code.starts_with(text.as_bytes()) {
    Ok(&code[text.len()..])
  } else {
    Err(expected(src, code, text))
  }
}

// Parses a term, returns the remaining code and the term.
fn parse_term<'a>(src: &Str, code: &'a Str) -> Result<(&'a Str, Term), ParseError> {
  let code = skip_whitespace(code);
  match code.first() {
    // Abstraction: `λvar body` or `\var body`
    Some(b'\\') | Some(b'\xce') if code.starts_with("λ".as_bytes()) || code[0] == b'\\' => {
      let skip = if code[0] == b'\\' { 1 } else { "λ".len() };
      let (code, nam) = parse_name(&code[skip..]);
      if nam.is_empty() {
        return Err(expected(src, skip_whitespace(code), "a variable name"));
      }
      let (code, bod) = parse_term(src, code)?;
      let nam = String::from_utf8_lossy(nam).to_string();
      Ok((code, Lam { nam, bod: Box::new(bod) }))
    }
    // Application: `(func argm1 argm2 ... argmN)`
    Some(b'(') => {
      let (mut code, mut fun) = parse_term(src, &code[1..])?;
      loop {
        code = skip_whitespace(code);
        if code.first() == Some(&b')') {
          break;
        }
        let (new_code, arg) = parse_term(src, code)?;
        code = new_code;
        fun = App { fun: Box::new(fun), arg: Box::new(arg) };
      }
      let code = parse_text(src, code, ")")?;
      Ok((code, fun))
    }
    // Variable: `<name>`
    _ => {
      let (rest, nam) = parse_name(code);
      if nam.is_empty() {
        return Err(expected(src, code, "a term"));
      }
      let nam = String::from_utf8_lossy(nam).to_string();
      Ok((rest, Var { nam }))
    }
  }
}

// Converts a source-code to a λ-term.
pub fn from_string(code: &Str) -> Result<Term, ParseError> {
  let (rest, term) = parse_term(code, code)?;
  let rest = skip_whitespace(rest);
  if rest.is_empty() {
    Ok(term)
  } else {
    Err(ParseError::Trailing { offset: code.len() - rest.len(), found: excerpt(rest) })
  }
}

// Converts a λ-term back to a source-code.
pub fn to_string(term: &Term) -> Vec<Chr> {
  fn stringify_term(code: &mut Vec<u8>, term: &Term) {
    match term {
      Lam { nam, bod } => {
        code.extend_from_slice("λ".as_bytes());
        code.extend_from_slice(nam.as_bytes());
        code.extend_from_slice(b" ");
        stringify_term(code, bod);
      }
      App { .. } => {
        // Left-nested applications print as one list.
        let mut args = vec![];
        let mut head = term;
        while let App { fun, arg } = head {
          args.push(arg);
          head = fun;
        }
        code.extend_from_slice(b"(");
        stringify_term(code, head);
        for arg in args.into_iter().rev() {
          code.extend_from_slice(b" ");
          stringify_term(code, arg);
        }
        code.extend_from_slice(b")");
      }
      Var { nam } => code.extend_from_slice(nam.as_bytes()),
    }
  }
  let mut code = Vec::new();
  stringify_term(&mut code, term);
  code
}

impl fmt::Display for Term {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", String::from_utf8_lossy(&to_string(self)))
  }
}

impl std::str::FromStr for Term {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    from_string(s.as_bytes())
  }
}
