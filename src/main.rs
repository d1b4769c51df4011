use std::fs;
use std::io;
use std::process;

use clap::{App, Arg, ArgMatches};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::filter::LevelFilter;

use oin::config::{AgentMode, Config, Discipline, LevelScheme, Scheduler, UnknownOption};
use oin::inet::{show, show_redexes};
use oin::session::Session;
use oin::term::{from_string, CompileError, ParseError, ReadbackError};

#[derive(Debug, Error)]
enum CliError {
  #[error("cannot read {path}: {source}")]
  Io { path: String, source: io::Error },
  #[error(transparent)]
  Parse(#[from] ParseError),
  #[error(transparent)]
  Option(#[from] UnknownOption),
  #[error(transparent)]
  Compile(#[from] CompileError),
  #[error("cannot read back the result: {0}")]
  Readback(#[from] ReadbackError),
  #[error("invalid step limit '{0}'")]
  Limit(String),
}

fn main() {
  let matches = App::new("oin")
    .version(env!("CARGO_PKG_VERSION"))
    .about("Reduces lambda terms on level-annotated interaction nets")
    .arg(Arg::with_name("TERM").help("The term to reduce, or a path with --file").required(true).index(1))
    .arg(Arg::with_name("file").short("f").long("file").help("Reads the term from the file TERM"))
    .arg(
      Arg::with_name("discipline")
        .short("d")
        .long("discipline")
        .takes_value(true)
        .default_value("full")
        .help("linear, affine, relevant or full"),
    )
    .arg(
      Arg::with_name("scheduler")
        .short("s")
        .long("scheduler")
        .takes_value(true)
        .default_value("sequential")
        .help("sequential or parallel redex selection"),
    )
    .arg(Arg::with_name("waves").short("w").long("waves").help("Fires every optimal redex at each step"))
    .arg(Arg::with_name("limit").short("n").long("limit").takes_value(true).default_value("10000").help("Maximum number of steps"))
    .arg(Arg::with_name("dump").long("dump").help("Prints the net and its redexes before every step"))
    .arg(Arg::with_name("levels").long("levels").takes_value(true).default_value("absolute").help("absolute or relative"))
    .arg(Arg::with_name("agents").long("agents").takes_value(true).default_value("split").help("split or unified"))
    .arg(Arg::with_name("log-level").long("log-level").takes_value(true).default_value("warn"))
    .get_matches();

  let level = matches.value_of("log-level").unwrap_or("warn").parse::<LevelFilter>().unwrap_or(LevelFilter::WARN);
  tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

  if let Err(err) = run(&matches) {
    error!("{}", err);
    process::exit(1);
  }
}

fn option<T>(matches: &ArgMatches, name: &str) -> Result<T, CliError>
where
  T: std::str::FromStr<Err = UnknownOption>,
{
  Ok(matches.value_of(name).unwrap_or_default().parse::<T>()?)
}

fn run(matches: &ArgMatches) -> Result<(), CliError> {
  let input = matches.value_of("TERM").unwrap_or_default();
  let code = if matches.is_present("file") {
    fs::read(input).map_err(|source| CliError::Io { path: input.to_string(), source })?
  } else {
    input.as_bytes().to_vec()
  };
  let term = from_string(&code)?;

  let config = Config {
    discipline: option::<Discipline>(matches, "discipline")?,
    scheduler: option::<Scheduler>(matches, "scheduler")?,
    levels: option::<LevelScheme>(matches, "levels")?,
    agents: option::<AgentMode>(matches, "agents")?,
  };
  let limit_text = matches.value_of("limit").unwrap_or_default();
  let limit: usize = limit_text.parse().map_err(|_| CliError::Limit(limit_text.to_string()))?;
  let waves = matches.is_present("waves");
  let dump = matches.is_present("dump");

  let mut session = Session::from_term(&term, config)?;
  info!(nodes = session.net().len(), "compiled {}", term);

  let mut steps = 0;
  while steps < limit {
    if dump {
      println!("-- step {}\n{}\n{}\n", steps, show(session.net(), &config), show_redexes(&session.redexes()));
    }
    let next = if waves { session.step_parallel() } else { session.step() };
    if next.is_none() {
      break;
    }
    steps += 1;
  }
  if steps == limit && !session.is_normal() {
    warn!(limit, "stopped before reaching a normal form");
  }

  let normal = session.readback()?;
  println!("{}", normal);
  println!("-- steps: {}, rules: {}, nodes: {}", steps, session.net().rules, session.net().len());
  Ok(())
}
