use super::{panic_message, Job, Worker};
use crate::solve::{BackendError, Interrupt, SolveOutcome, Solver, SolverKind, WorkerError};
use log::{debug, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;

type SolverFactory = Box<dyn Fn() -> Box<dyn Solver + Send> + Send + Sync>;

/// Runs an in-process engine on a private instance per call.
pub struct InProcessWorker {
    name: String,
    factory: SolverFactory,
}

impl InProcessWorker {
    pub fn new(kind: SolverKind) -> InProcessWorker {
        InProcessWorker {
            name: kind.name().to_string(),
            factory: Box::new(move || kind.create()),
        }
    }

    /// Wraps any engine implementing the `Solver` capability.
    pub fn with_factory<F>(name: &str, factory: F) -> InProcessWorker
    where
        F: Fn() -> Box<dyn Solver + Send> + Send + Sync + 'static,
    {
        InProcessWorker {
            name: name.to_string(),
            factory: Box::new(factory),
        }
    }

    fn solve(&self, job: &Job, interrupt: &Interrupt) -> Result<SolveOutcome, BackendError> {
        let mut solver = (self.factory)();
        solver.set_interrupt(interrupt.clone());
        for clause in job.formula.clauses() {
            solver.add_clause(clause)?;
        }
        if interrupt.load(Ordering::Relaxed) {
            return Err(BackendError::Interrupted);
        }
        debug!(
            "{}: solving {} clauses over {} variables",
            self.name,
            job.formula.num_clauses(),
            solver.num_variables()
        );
        if solver.solve(&job.assumptions)? {
            Ok(SolveOutcome::Satisfiable(solver.model()))
        } else {
            Ok(SolveOutcome::Unsatisfiable)
        }
    }
}

impl Worker for InProcessWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, job: &Job, interrupt: &Interrupt) -> SolveOutcome {
        match panic::catch_unwind(AssertUnwindSafe(|| self.solve(job, interrupt))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                debug!("{}: {}", self.name, err);
                SolveOutcome::Failed(err.into())
            }
            Err(panic) => {
                let msg = panic_message(&*panic);
                warn!("{}: engine panicked: {}", self.name, msg);
                SolveOutcome::Failed(WorkerError::BackendFailure(format!(
                    "engine panicked: {}",
                    msg
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::formula::Formula;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    struct FailingSolver {
        panics: bool,
    }

    impl Solver for FailingSolver {
        fn add_clause(&mut self, _clause: &[i32]) -> Result<(), BackendError> {
            Ok(())
        }

        fn solve(&mut self, _assumptions: &[i32]) -> Result<bool, BackendError> {
            if self.panics {
                panic!("engine exploded");
            }
            Err(BackendError::Failure("out of memory".to_string()))
        }

        fn model(&self) -> Vec<i32> {
            Vec::new()
        }

        fn num_variables(&self) -> u32 {
            0
        }
    }

    fn job(clauses: &[&[i32]], assumptions: &[i32]) -> Job {
        let mut formula = Formula::new();
        formula.append_formula(clauses).unwrap();
        Job::new(formula.snapshot(), assumptions)
    }

    fn idle() -> Interrupt {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn test_satisfiable() {
        let worker = InProcessWorker::new(SolverKind::Dpll);
        let job = job(&[&[1, 2], &[-1, -2]], &[]);
        assert_eq!(
            worker.run(&job, &idle()),
            SolveOutcome::Satisfiable(vec![-1, 2])
        );
        // the snapshot is untouched
        assert_eq!(job.formula.num_clauses(), 2);
    }

    #[test]
    fn test_unsatisfiable() {
        let worker = InProcessWorker::new(SolverKind::DpllMoms);
        assert_eq!(
            worker.run(&job(&[&[1], &[-1]], &[]), &idle()),
            SolveOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_assumptions() {
        let worker = InProcessWorker::new(SolverKind::DpllPos);
        assert_eq!(
            worker.run(&job(&[&[1, 2]], &[-1]), &idle()),
            SolveOutcome::Satisfiable(vec![-1, 2])
        );
        assert_eq!(
            worker.run(&job(&[&[1, 2]], &[-1, -2]), &idle()),
            SolveOutcome::Unsatisfiable
        );
    }

    #[test]
    fn test_backend_failure() {
        let worker =
            InProcessWorker::with_factory("failing", || Box::new(FailingSolver { panics: false }));
        assert_eq!(
            worker.run(&job(&[&[1]], &[]), &idle()),
            SolveOutcome::Failed(WorkerError::BackendFailure("out of memory".to_string()))
        );
    }

    #[test]
    fn test_panic_is_contained() {
        let worker =
            InProcessWorker::with_factory("panicking", || Box::new(FailingSolver { panics: true }));
        match worker.run(&job(&[&[1]], &[]), &idle()) {
            SolveOutcome::Failed(WorkerError::BackendFailure(msg)) => {
                assert!(msg.contains("engine exploded"))
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_interrupted() {
        let worker = InProcessWorker::new(SolverKind::Dpll);
        let interrupt = Arc::new(AtomicBool::new(true));
        assert_eq!(
            worker.run(&job(&[&[1, 2]], &[]), &interrupt),
            SolveOutcome::Failed(WorkerError::TimeoutOrCancelled)
        );
    }
}
