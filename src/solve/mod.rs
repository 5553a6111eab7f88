use crate::dimacs::Dimacs;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[cfg(feature = "cryptominisat")]
pub mod cryptominisat;
pub mod dpll;

/// Shared cancellation flag, set by the coordinator when a member's answer is no longer needed.
pub type Interrupt = Arc<AtomicBool>;

/// The normalized answer of a single portfolio member, and of the portfolio itself.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SolveOutcome {
    /// One signed literal per assigned variable, the sign is the truth value.
    Satisfiable(Vec<i32>),
    Unsatisfiable,
    Failed(WorkerError),
}

impl SolveOutcome {
    pub fn is_failed(&self) -> bool {
        match self {
            SolveOutcome::Failed(_) => true,
            _ => false,
        }
    }

    pub fn is_definite(&self) -> bool {
        !self.is_failed()
    }

    pub fn model(&self) -> Option<&[i32]> {
        match self {
            SolveOutcome::Satisfiable(model) => Some(model.as_slice()),
            _ => None,
        }
    }

    /// Process exit status following the SAT competition convention.
    pub fn exit_code(&self) -> i32 {
        match self {
            SolveOutcome::Satisfiable(_) => 10,
            SolveOutcome::Unsatisfiable => 20,
            SolveOutcome::Failed(_) => 0,
        }
    }
}

impl Dimacs for SolveOutcome {
    fn dimacs(&self) -> String {
        match self {
            SolveOutcome::Satisfiable(model) => {
                let mut dimacs = String::from("s SATISFIABLE\n");
                for chunk in model.chunks(10) {
                    dimacs.push('v');
                    for literal in chunk {
                        dimacs.push_str(&format!(" {}", literal));
                    }
                    dimacs.push('\n');
                }
                dimacs.push_str("v 0\n");
                dimacs
            }
            SolveOutcome::Unsatisfiable => String::from("s UNSATISFIABLE\n"),
            SolveOutcome::Failed(_) => String::from("s UNKNOWN\n"),
        }
    }
}

/// Reason a portfolio member did not produce a definite answer.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum WorkerError {
    /// External solver output had no classification line or an unreadable assignment
    MalformedOutput(String),
    /// In-process engine failed or panicked
    BackendFailure(String),
    /// Executable could not be started
    ProcessLaunchFailure(String),
    /// Executable terminated with an unexpected status (`None` if killed by a signal)
    ProcessFailure { code: Option<i32>, stderr: String },
    /// Failure while handing the formula to an executable or collecting its output
    Io(String),
    TimeoutOrCancelled,
    /// The request was rejected before any member ran, e.g., an assumption `0`
    InvalidInput(String),
    /// The solver gave up without a verdict (`s UNKNOWN`)
    Indeterminate,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkerError::MalformedOutput(msg) => write!(f, "malformed solver output: {}", msg),
            WorkerError::BackendFailure(msg) => write!(f, "solver backend failed: {}", msg),
            WorkerError::ProcessLaunchFailure(msg) => {
                write!(f, "failed to launch solver process: {}", msg)
            }
            WorkerError::ProcessFailure { code: Some(code), stderr } => write!(
                f,
                "solver process exited with status {}: {}",
                code,
                stderr.trim()
            ),
            WorkerError::ProcessFailure { code: None, stderr } => write!(
                f,
                "solver process was terminated by a signal: {}",
                stderr.trim()
            ),
            WorkerError::Io(msg) => write!(f, "i/o error while talking to solver: {}", msg),
            WorkerError::TimeoutOrCancelled => write!(f, "solving timed out or was cancelled"),
            WorkerError::InvalidInput(msg) => write!(f, "invalid input: {}", msg),
            WorkerError::Indeterminate => write!(f, "solver could not determine the result"),
        }
    }
}

impl Error for WorkerError {}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum BackendError {
    /// The interrupt flag was raised during search
    Interrupted,
    /// The engine stopped without a verdict
    Undetermined,
    Failure(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BackendError::Interrupted => write!(f, "search was interrupted"),
            BackendError::Undetermined => write!(f, "search ended without a result"),
            BackendError::Failure(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for BackendError {}

impl From<BackendError> for WorkerError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Interrupted => WorkerError::TimeoutOrCancelled,
            BackendError::Undetermined => WorkerError::Indeterminate,
            BackendError::Failure(msg) => WorkerError::BackendFailure(msg),
        }
    }
}

/// Capability interface of an in-process SAT engine.
///
/// Literals are DIMACS integers; a `0` literal is never passed in.
pub trait Solver {
    fn add_clause(&mut self, clause: &[i32]) -> Result<(), BackendError>;

    /// Decides the clauses added so far under the given assumptions.
    fn solve(&mut self, assumptions: &[i32]) -> Result<bool, BackendError>;

    /// Model of the last satisfiable `solve` call, one literal per variable.
    fn model(&self) -> Vec<i32>;

    fn num_variables(&self) -> u32;

    /// Engines that cannot be interrupted ignore the flag.
    fn set_interrupt(&mut self, _interrupt: Interrupt) {}
}

#[cfg(not(feature = "cryptominisat"))]
const SOLVER_NAMES: &[&str] = &["dpll", "dpll-pos", "dpll-moms"];
#[cfg(feature = "cryptominisat")]
const SOLVER_NAMES: &[&str] = &["dpll", "dpll-pos", "dpll-moms", "cryptominisat"];

/// The closed set of in-process engines, selectable by name.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SolverKind {
    /// DPLL, negative polarity first
    Dpll,
    /// DPLL, positive polarity first
    DpllPos,
    /// DPLL branching on the most frequent literal in open clauses
    DpllMoms,
    #[cfg(feature = "cryptominisat")]
    Cryptominisat,
}

impl SolverKind {
    pub fn values() -> &'static [&'static str] {
        SOLVER_NAMES
    }

    pub fn name(self) -> &'static str {
        match self {
            SolverKind::Dpll => "dpll",
            SolverKind::DpllPos => "dpll-pos",
            SolverKind::DpllMoms => "dpll-moms",
            #[cfg(feature = "cryptominisat")]
            SolverKind::Cryptominisat => "cryptominisat",
        }
    }

    /// Creates a fresh engine instance.
    pub fn create(self) -> Box<dyn Solver + Send> {
        use self::dpll::{Branching, DpllOptions, DpllSolver};
        match self {
            SolverKind::Dpll => Box::new(DpllSolver::new(DpllOptions::default())),
            SolverKind::DpllPos => Box::new(DpllSolver::new(DpllOptions {
                positive_first: true,
                ..DpllOptions::default()
            })),
            SolverKind::DpllMoms => Box::new(DpllSolver::new(DpllOptions {
                branching: Branching::MostOccurrences,
                ..DpllOptions::default()
            })),
            #[cfg(feature = "cryptominisat")]
            SolverKind::Cryptominisat => Box::new(self::cryptominisat::CryptoMiniSat::new()),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UnknownSolverError(pub String);

impl fmt::Display for UnknownSolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "unknown solver backend `{}`, expected one of {}",
            self.0,
            SolverKind::values().join(", ")
        )
    }
}

impl Error for UnknownSolverError {}

impl FromStr for SolverKind {
    type Err = UnknownSolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dpll" => Ok(SolverKind::Dpll),
            "dpll-pos" => Ok(SolverKind::DpllPos),
            "dpll-moms" => Ok(SolverKind::DpllMoms),
            #[cfg(feature = "cryptominisat")]
            "cryptominisat" => Ok(SolverKind::Cryptominisat),
            _ => Err(UnknownSolverError(s.to_string())),
        }
    }
}
