// extern crates
#[macro_use]
extern crate uncover;

// This defines two macros, `covers!` and `covered_by!`.
// They will be no-ops unless `cfg!(debug_assertions)` is true.
define_uncover_macros!(enable_if(cfg!(debug_assertions)));

use clap::{App, Arg};
use log::{info, LevelFilter};

// Rust stdlib
use std::error::Error;
use std::io::Read;

// modules
mod literal;
pub use self::literal::{Literal, Variable};

pub mod dimacs;
pub use self::dimacs::Dimacs;

mod formula;
pub use self::formula::{Formula, FormulaError};

pub mod parse;

pub mod solve;
pub use self::solve::{BackendError, SolveOutcome, Solver, SolverKind, WorkerError};

pub mod worker;
pub use self::worker::{ExternalSolver, InProcessWorker, InputMode, Job, MemberConfig, Worker};

pub mod portfolio;
pub use self::portfolio::{ConfigError, Portfolio, PortfolioConfig, PortfolioState, RacePolicy};

// Command line parsing

#[derive(Debug)]
pub struct CliConfig {
    /// None for stdin
    filename: Option<String>,
    verbosity: LevelFilter,
    portfolio: PortfolioConfig,
}

impl CliConfig {
    pub fn new(args: &[String]) -> Result<Self, Box<dyn Error>> {
        let matches = App::new("satfolio")
            .version(env!("CARGO_PKG_VERSION"))
            .author(env!("CARGO_PKG_AUTHORS"))
            .about("Races a portfolio of SAT solvers on a formula in DIMACS CNF format.")
            .arg(
                Arg::with_name("INPUT")
                    .help("Sets the input file to use, reads from stdin if absent")
                    .required(false)
                    .index(1),
            )
            .arg(
                Arg::with_name("config")
                    .long("config")
                    .takes_value(true)
                    .value_name("FILE")
                    .help("Loads the portfolio from a JSON configuration file"),
            )
            .arg(
                Arg::with_name("solver")
                    .long("solver")
                    .short("s")
                    .takes_value(true)
                    .multiple(true)
                    .number_of_values(1)
                    .possible_values(SolverKind::values())
                    .help("Adds a built-in engine to the portfolio"),
            )
            .arg(
                Arg::with_name("external")
                    .long("external")
                    .short("e")
                    .takes_value(true)
                    .multiple(true)
                    .number_of_values(1)
                    .value_name("CMD")
                    .help("Adds a solver executable to the portfolio, e.g., \"kissat -q\""),
            )
            .arg(
                Arg::with_name("pipe")
                    .long("pipe")
                    .help("Streams the formula to executables on stdin instead of a temporary file"),
            )
            .arg(
                Arg::with_name("policy")
                    .long("policy")
                    .takes_value(true)
                    .possible_values(RacePolicy::values())
                    .help("Decides whether a failing member can end the race"),
            )
            .arg(
                Arg::with_name("timeout")
                    .long("timeout")
                    .takes_value(true)
                    .value_name("SECS")
                    .help("Gives up after the given number of seconds"),
            )
            .arg(
                Arg::with_name("v")
                    .short("v")
                    .multiple(true)
                    .help("Sets the level of verbosity"),
            )
            .get_matches_from(args);

        let filename = matches.value_of("INPUT").map(|s| s.to_string());

        let verbosity = match matches.occurrences_of("v") {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        let mut portfolio = match matches.value_of("config") {
            Some(path) => PortfolioConfig::from_json_file(path)?,
            None => PortfolioConfig::default(),
        };
        if let Some(names) = matches.values_of("solver") {
            for name in names {
                portfolio
                    .members
                    .push(MemberConfig::Backend(name.parse::<SolverKind>()?));
            }
        }
        let input = if matches.is_present("pipe") {
            InputMode::Pipe
        } else {
            InputMode::File
        };
        if let Some(commands) = matches.values_of("external") {
            for command in commands {
                let mut words = command.split_whitespace();
                let program = words
                    .next()
                    .ok_or_else(|| format!("empty solver command `{}`", command))?;
                let solver = ExternalSolver::new(program).args(words).input(input);
                portfolio.members.push(MemberConfig::External(solver));
            }
        }
        if portfolio.members.is_empty() {
            portfolio.members = PortfolioConfig::builtin().members;
        }
        if let Some(policy) = matches.value_of("policy") {
            portfolio.policy = policy.parse()?;
        }
        if let Some(timeout) = matches.value_of("timeout") {
            let secs: f64 = timeout.parse()?;
            if !(secs > 0.0) {
                return Err(format!("timeout must be positive, found `{}`", timeout).into());
            }
            portfolio.timeout_ms = Some((secs * 1000.0).ceil() as u64);
        }

        Ok(CliConfig {
            filename,
            verbosity,
            portfolio,
        })
    }

    pub fn run(&self) -> Result<SolveOutcome, Box<dyn Error>> {
        env_logger::Builder::new()
            .filter_level(self.verbosity)
            .try_init()?;

        let formula = match &self.filename {
            Some(filename) => Formula::from_dimacs_file(filename)?,
            None => {
                let mut contents = String::new();
                std::io::stdin().read_to_string(&mut contents)?;
                contents.parse::<Formula>()?
            }
        };

        let mut portfolio = Portfolio::from_config(&self.portfolio)?;
        portfolio.append_formula(formula.clauses())?;
        info!(
            "racing {} member(s) on {} clauses over {} variables",
            portfolio.width(),
            portfolio.num_clauses(),
            portfolio.num_variables()
        );

        let outcome = portfolio.solve(&[]);
        if let Some(winner) = portfolio.winner() {
            println!("c decided by {}", winner);
        }
        if let SolveOutcome::Failed(err) = &outcome {
            println!("c {}", err);
        }
        print!("{}", outcome.dimacs());
        Ok(outcome)
    }
}
