//! Portfolio members.
//!
//! A member receives a read-only `Job` and reports exactly one `SolveOutcome`.
//! Failures never escape as errors or panics, they are returned as
//! `SolveOutcome::Failed`.

use crate::formula::Formula;
use crate::solve::{Interrupt, SolveOutcome, SolverKind};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

pub mod external;
pub mod in_process;

pub use self::external::{ExternalSolver, InputMode};
pub use self::in_process::InProcessWorker;

/// The input of one solve call, shared by all members of the portfolio.
#[derive(Debug, Clone)]
pub struct Job {
    pub formula: Arc<Formula>,
    pub assumptions: Arc<[i32]>,
}

impl Job {
    pub fn new(formula: Arc<Formula>, assumptions: &[i32]) -> Job {
        Job {
            formula,
            assumptions: assumptions.into(),
        }
    }
}

pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    /// Solves the job, or gives up early once `interrupt` is raised.
    ///
    /// Every process, file, or thread acquired here is released before returning.
    fn run(&self, job: &Job, interrupt: &Interrupt) -> SolveOutcome;
}

/// Serializable description of a portfolio member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberConfig {
    Backend(SolverKind),
    External(ExternalSolver),
}

impl MemberConfig {
    pub fn build(&self) -> Arc<dyn Worker> {
        match self {
            MemberConfig::Backend(kind) => Arc::new(InProcessWorker::new(*kind)),
            MemberConfig::External(solver) => Arc::new(solver.clone()),
        }
    }
}

/// Extracts the message of a caught panic.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
