//! Portfolio coordinator.
//!
//! Every solve call runs through `Idle -> Dispatching -> Racing -> Draining -> Idle`.
//! The formula snapshot is frozen at dispatch, the first report decides the call,
//! all other members are cancelled, and the worker pool is discarded.

use self::pool::{Race, WorkerPool};
use crate::formula::{Formula, FormulaError};
use crate::solve::{SolveOutcome, SolverKind, UnknownSolverError, WorkerError};
use crate::worker::{Job, MemberConfig, Worker};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod pool;

const DEFAULT_DRAIN_GRACE_MS: u64 = 2000;

/// Decides which report ends the race.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RacePolicy {
    /// The first member to report wins, even with a failure
    FirstReport,
    /// Failures only count once every member has failed
    FirstDefinite,
}

impl Default for RacePolicy {
    fn default() -> Self {
        RacePolicy::FirstReport
    }
}

impl RacePolicy {
    pub fn values() -> &'static [&'static str] {
        &["first-report", "first-definite"]
    }
}

impl FromStr for RacePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "first-report" => Ok(RacePolicy::FirstReport),
            "first-definite" => Ok(RacePolicy::FirstDefinite),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum PortfolioState {
    Idle,
    Dispatching,
    Racing,
    Draining,
}

#[derive(Debug)]
pub enum ConfigError {
    EmptyPortfolio,
    UnknownSolver(UnknownSolverError),
    UnknownPolicy(String),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::EmptyPortfolio => write!(f, "a portfolio needs at least one member"),
            ConfigError::UnknownSolver(err) => write!(f, "{}", err),
            ConfigError::UnknownPolicy(name) => write!(
                f,
                "unknown race policy `{}`, expected one of {}",
                name,
                RacePolicy::values().join(", ")
            ),
            ConfigError::Io(err) => write!(f, "could not read configuration: {}", err),
            ConfigError::Json(err) => write!(f, "invalid configuration: {}", err),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::UnknownSolver(err) => Some(err),
            ConfigError::Io(err) => Some(err),
            ConfigError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UnknownSolverError> for ConfigError {
    fn from(err: UnknownSolverError) -> Self {
        ConfigError::UnknownSolver(err)
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Json(err)
    }
}

fn default_drain_grace_ms() -> u64 {
    DEFAULT_DRAIN_GRACE_MS
}

/// Serializable portfolio description, e.g., loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortfolioConfig {
    pub members: Vec<MemberConfig>,
    #[serde(default)]
    pub policy: RacePolicy,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        PortfolioConfig {
            members: Vec::new(),
            policy: RacePolicy::default(),
            timeout_ms: None,
            drain_grace_ms: DEFAULT_DRAIN_GRACE_MS,
        }
    }
}

impl PortfolioConfig {
    /// One member per built-in engine.
    pub fn builtin() -> PortfolioConfig {
        let members = SolverKind::values()
            .iter()
            .filter_map(|name| name.parse().ok())
            .map(MemberConfig::Backend)
            .collect();
        PortfolioConfig {
            members,
            ..PortfolioConfig::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<PortfolioConfig, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<PortfolioConfig, ConfigError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Races a fixed set of members on an append-only formula.
///
/// ```
/// use satfolio::{Portfolio, SolveOutcome, SolverKind};
///
/// let mut portfolio = Portfolio::with_backends(&[SolverKind::Dpll, SolverKind::DpllMoms]).unwrap();
/// portfolio.append_formula(&[vec![1, 2], vec![-1]]).unwrap();
/// assert_eq!(portfolio.solve(&[]), SolveOutcome::Satisfiable(vec![-1, 2]));
/// assert_eq!(portfolio.model(), &[-1, 2]);
/// ```
pub struct Portfolio {
    members: Vec<Arc<dyn Worker>>,
    policy: RacePolicy,
    timeout: Option<Duration>,
    drain_grace: Duration,

    formula: Formula,
    /// frozen copy of `formula`, dropped on every mutation
    snapshot: Option<Arc<Formula>>,

    state: PortfolioState,
    generation: usize,
    model: Vec<i32>,
    winner: Option<String>,
}

impl Portfolio {
    pub fn new(members: Vec<Arc<dyn Worker>>) -> Result<Portfolio, ConfigError> {
        if members.is_empty() {
            return Err(ConfigError::EmptyPortfolio);
        }
        Ok(Portfolio {
            members,
            policy: RacePolicy::default(),
            timeout: None,
            drain_grace: Duration::from_millis(DEFAULT_DRAIN_GRACE_MS),
            formula: Formula::new(),
            snapshot: None,
            state: PortfolioState::Idle,
            generation: 0,
            model: Vec::new(),
            winner: None,
        })
    }

    pub fn with_backends(kinds: &[SolverKind]) -> Result<Portfolio, ConfigError> {
        let members = kinds
            .iter()
            .map(|&kind| MemberConfig::Backend(kind).build())
            .collect();
        Portfolio::new(members)
    }

    pub fn from_config(config: &PortfolioConfig) -> Result<Portfolio, ConfigError> {
        let members = config.members.iter().map(MemberConfig::build).collect();
        Ok(Portfolio::new(members)?
            .with_policy(config.policy)
            .with_timeout(config.timeout_ms.map(Duration::from_millis))
            .with_drain_grace(Duration::from_millis(config.drain_grace_ms)))
    }

    pub fn with_policy(mut self, policy: RacePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Expiry cancels all members and the call returns `TimeoutOrCancelled`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long cancelled members may take to stop before they are detached.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn width(&self) -> usize {
        self.members.len()
    }

    pub fn policy(&self) -> RacePolicy {
        self.policy
    }

    pub fn state(&self) -> PortfolioState {
        self.state
    }

    pub fn add_clause(&mut self, clause: &[i32]) -> Result<(), FormulaError> {
        self.snapshot = None;
        self.formula.add_clause(clause)
    }

    pub fn append_formula<I, C>(&mut self, clauses: I) -> Result<(), FormulaError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[i32]>,
    {
        self.snapshot = None;
        self.formula.append_formula(clauses)
    }

    pub fn num_variables(&self) -> u32 {
        self.formula.num_variables()
    }

    pub fn num_clauses(&self) -> usize {
        self.formula.num_clauses()
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Model of the last call if it was satisfiable, empty otherwise.
    pub fn model(&self) -> &[i32] {
        &self.model
    }

    /// Name of the member that decided the last call.
    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    fn snapshot(&mut self) -> Arc<Formula> {
        let formula = &self.formula;
        self.snapshot
            .get_or_insert_with(|| formula.snapshot())
            .clone()
    }

    fn transition(&mut self, state: PortfolioState) {
        debug!("portfolio: {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    /// Races all members on the current formula under `assumptions`.
    ///
    /// Worker failures are returned as `SolveOutcome::Failed`, never as errors.
    /// Returns only after every member was cancelled and joined or detached.
    pub fn solve(&mut self, assumptions: &[i32]) -> SolveOutcome {
        self.model.clear();
        self.winner = None;
        if let Some(position) = assumptions.iter().position(|&literal| literal == 0) {
            return SolveOutcome::Failed(WorkerError::InvalidInput(format!(
                "assumption {} is the literal 0",
                position
            )));
        }
        if let Some(position) = assumptions.iter().position(|&literal| literal == i32::MIN) {
            return SolveOutcome::Failed(WorkerError::InvalidInput(format!(
                "assumption {} is {}, which has no negation",
                position,
                i32::MIN
            )));
        }

        self.transition(PortfolioState::Dispatching);
        let start = Instant::now();
        let job = Job::new(self.snapshot(), assumptions);
        let (race, handle) = Race::new(self.members.len(), self.policy);
        let mut pool = WorkerPool::new(self.generation);
        self.generation += 1;
        pool.dispatch(&self.members, &job, &race);
        debug!(
            "dispatched {} clauses over {} variables to {} member(s)",
            job.formula.num_clauses(),
            job.formula.num_variables(),
            pool.len()
        );

        self.transition(PortfolioState::Racing);
        let report = handle.wait(self.timeout);

        self.transition(PortfolioState::Draining);
        let outcome = match report {
            Some(report) => {
                info!(
                    "member {} ({}) decided after {:?}: {}",
                    report.member,
                    report.name,
                    start.elapsed(),
                    describe(&report.outcome)
                );
                self.winner = Some(report.name);
                report.outcome
            }
            None => {
                info!("no result within {:?}", self.timeout.unwrap_or_default());
                SolveOutcome::Failed(WorkerError::TimeoutOrCancelled)
            }
        };
        let drained = pool.drain(self.drain_grace);
        debug!(
            "drained {} worker(s), {} detached",
            drained.joined, drained.detached
        );

        self.transition(PortfolioState::Idle);
        if let SolveOutcome::Satisfiable(model) = &outcome {
            self.model = model.clone();
        }
        outcome
    }
}

fn describe(outcome: &SolveOutcome) -> String {
    match outcome {
        SolveOutcome::Satisfiable(_) => "satisfiable".to_string(),
        SolveOutcome::Unsatisfiable => "unsatisfiable".to_string(),
        SolveOutcome::Failed(err) => format!("failed ({})", err),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::solve::Interrupt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;

    /// Sets its flag when dropped, i.e., when the worker released its resources.
    struct CleanupGuard(Arc<AtomicBool>);

    impl Drop for CleanupGuard {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    struct MockWorker {
        name: String,
        delay: Duration,
        outcome: SolveOutcome,
        interruptible: bool,
        cleaned: Arc<AtomicBool>,
        runs: Arc<AtomicUsize>,
    }

    impl MockWorker {
        fn new(name: &str, delay_ms: u64, outcome: SolveOutcome) -> MockWorker {
            MockWorker {
                name: name.to_string(),
                delay: Duration::from_millis(delay_ms),
                outcome,
                interruptible: true,
                cleaned: Arc::new(AtomicBool::new(false)),
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Worker for MockWorker {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&self, _job: &Job, interrupt: &Interrupt) -> SolveOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let _guard = CleanupGuard(self.cleaned.clone());
            let start = Instant::now();
            while start.elapsed() < self.delay {
                if self.interruptible && interrupt.load(Ordering::Relaxed) {
                    return SolveOutcome::Failed(WorkerError::TimeoutOrCancelled);
                }
                thread::sleep(Duration::from_millis(1));
            }
            self.outcome.clone()
        }
    }

    fn portfolio(members: Vec<MockWorker>) -> Portfolio {
        let members = members
            .into_iter()
            .map(|m| Arc::new(m) as Arc<dyn Worker>)
            .collect();
        Portfolio::new(members).unwrap()
    }

    #[test]
    fn test_empty_portfolio() {
        match Portfolio::new(Vec::new()) {
            Err(ConfigError::EmptyPortfolio) => {}
            _ => panic!("empty portfolio accepted"),
        }
    }

    #[test]
    fn test_either_model() {
        let mut portfolio = Portfolio::with_backends(&[SolverKind::Dpll, SolverKind::DpllPos]).unwrap();
        portfolio.append_formula(&[vec![1, 2], vec![-1, -2]]).unwrap();
        assert_eq!(portfolio.num_variables(), 2);
        assert_eq!(portfolio.num_clauses(), 2);

        let outcome = portfolio.solve(&[]);
        match &outcome {
            SolveOutcome::Satisfiable(model) => {
                assert!(model == &[-1, 2] || model == &[1, -2]);
                assert_eq!(portfolio.model(), model.as_slice());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let winner = portfolio.winner().unwrap();
        assert!(winner == "dpll" || winner == "dpll-pos");
        assert_eq!(portfolio.state(), PortfolioState::Idle);
    }

    #[test]
    fn test_unsatisfiable_clears_model() {
        let mut portfolio = Portfolio::with_backends(&[SolverKind::Dpll]).unwrap();
        portfolio.add_clause(&[1]).unwrap();
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Satisfiable(vec![1]));
        assert_eq!(portfolio.model(), &[1]);

        // the cached snapshot must not hide the new clause
        portfolio.add_clause(&[-1]).unwrap();
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Unsatisfiable);
        assert!(portfolio.model().is_empty());
    }

    #[test]
    fn test_members_agree() {
        let kinds = [SolverKind::Dpll, SolverKind::DpllPos, SolverKind::DpllMoms];
        let mut portfolio = Portfolio::with_backends(&kinds).unwrap();
        // pigeonhole: 3 pigeons, 2 holes
        portfolio
            .append_formula(&[
                vec![1, 2],
                vec![3, 4],
                vec![5, 6],
                vec![-1, -3],
                vec![-1, -5],
                vec![-3, -5],
                vec![-2, -4],
                vec![-2, -6],
                vec![-4, -6],
            ])
            .unwrap();
        for _ in 0..3 {
            assert_eq!(portfolio.solve(&[]), SolveOutcome::Unsatisfiable);
        }

        let mut portfolio = Portfolio::with_backends(&kinds).unwrap();
        portfolio.append_formula(&[vec![1, 2, 3], vec![-1, -2]]).unwrap();
        assert_eq!(
            portfolio.solve(&[-2, -3]),
            SolveOutcome::Satisfiable(vec![1, -2, -3])
        );
        // assumptions do not persist
        assert!(portfolio.solve(&[]).is_definite());
        assert_eq!(portfolio.num_clauses(), 2);
        assert_eq!(portfolio.solve(&[-1, -2, -3]), SolveOutcome::Unsatisfiable);
    }

    #[test]
    fn test_slow_loser_is_cleaned_up() {
        covers!("pool.late_report_dropped");
        let fast = MockWorker::new("fast", 0, SolveOutcome::Satisfiable(vec![1, -2]));
        let slow = MockWorker::new("slow", 30_000, SolveOutcome::Satisfiable(vec![-1, 2]));
        let cleaned = slow.cleaned.clone();
        let mut portfolio = portfolio(vec![fast, slow]);

        let start = Instant::now();
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Satisfiable(vec![1, -2]));
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(cleaned.load(Ordering::SeqCst));
        assert_eq!(portfolio.model(), &[1, -2]);
        assert_eq!(portfolio.winner(), Some("fast"));
    }

    #[test]
    fn test_fresh_workers_per_call() {
        let member = MockWorker::new("only", 0, SolveOutcome::Unsatisfiable);
        let runs = member.runs.clone();
        let mut portfolio = portfolio(vec![member]);
        for _ in 0..4 {
            assert_eq!(portfolio.solve(&[]), SolveOutcome::Unsatisfiable);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_first_report_accepts_failure() {
        let broken = MockWorker::new(
            "broken",
            0,
            SolveOutcome::Failed(WorkerError::BackendFailure("crashed".to_string())),
        );
        let good = MockWorker::new("good", 200, SolveOutcome::Unsatisfiable);
        let mut portfolio = portfolio(vec![broken, good]);
        assert_eq!(portfolio.policy(), RacePolicy::FirstReport);
        assert!(portfolio.solve(&[]).is_failed());
        assert!(portfolio.model().is_empty());
    }

    #[test]
    fn test_first_definite_skips_failure() {
        let broken = MockWorker::new(
            "broken",
            0,
            SolveOutcome::Failed(WorkerError::BackendFailure("crashed".to_string())),
        );
        let good = MockWorker::new("good", 200, SolveOutcome::Satisfiable(vec![3]));
        let mut portfolio = portfolio(vec![broken, good]).with_policy(RacePolicy::FirstDefinite);
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Satisfiable(vec![3]));
        assert_eq!(portfolio.winner(), Some("good"));
    }

    #[test]
    fn test_first_definite_all_failed() {
        let first = MockWorker::new("first", 0, SolveOutcome::Failed(WorkerError::Indeterminate));
        let second = MockWorker::new(
            "second",
            50,
            SolveOutcome::Failed(WorkerError::MalformedOutput("no s line".to_string())),
        );
        let mut portfolio = portfolio(vec![first, second]).with_policy(RacePolicy::FirstDefinite);
        assert_eq!(
            portfolio.solve(&[]),
            SolveOutcome::Failed(WorkerError::MalformedOutput("no s line".to_string()))
        );
    }

    #[test]
    fn test_timeout() {
        let slow = MockWorker::new("slow", 30_000, SolveOutcome::Unsatisfiable);
        let cleaned = slow.cleaned.clone();
        let mut portfolio = portfolio(vec![slow]).with_timeout(Some(Duration::from_millis(50)));
        let start = Instant::now();
        assert_eq!(
            portfolio.solve(&[]),
            SolveOutcome::Failed(WorkerError::TimeoutOrCancelled)
        );
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(cleaned.load(Ordering::SeqCst));
        assert_eq!(portfolio.winner(), None);
    }

    #[test]
    fn test_uninterruptible_loser_is_detached() {
        covers!("pool.worker_detached");
        let fast = MockWorker::new("fast", 0, SolveOutcome::Unsatisfiable);
        let mut stuck = MockWorker::new("stuck", 1_000, SolveOutcome::Unsatisfiable);
        stuck.interruptible = false;
        let mut portfolio =
            portfolio(vec![fast, stuck]).with_drain_grace(Duration::from_millis(20));
        let start = Instant::now();
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Unsatisfiable);
        assert!(start.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn test_zero_assumption_rejected() {
        let member = MockWorker::new("only", 0, SolveOutcome::Unsatisfiable);
        let runs = member.runs.clone();
        let mut portfolio = portfolio(vec![member]);
        match portfolio.solve(&[1, 0]) {
            SolveOutcome::Failed(WorkerError::InvalidInput(_)) => {}
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        match portfolio.solve(&[i32::min_value()]) {
            SolveOutcome::Failed(WorkerError::InvalidInput(_)) => {}
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejected_clause() {
        let mut portfolio = Portfolio::with_backends(&[SolverKind::Dpll]).unwrap();
        assert!(portfolio.add_clause(&[1, 0]).is_err());
        assert!(portfolio.add_clause(&[i32::min_value()]).is_err());
        assert_eq!(portfolio.num_clauses(), 0);
        assert_eq!(portfolio.num_variables(), 0);
        // empty formula is satisfiable with an empty model
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Satisfiable(vec![]));
    }

    #[test]
    fn test_config_json() {
        let config = PortfolioConfig::from_json_str(
            r#"{"members": [{"backend": "dpll"}, {"backend": "dpll-moms"}], "policy": "first-definite", "timeout_ms": 60000}"#,
        )
        .unwrap();
        assert_eq!(config.policy, RacePolicy::FirstDefinite);
        assert_eq!(config.timeout_ms, Some(60000));
        assert_eq!(config.drain_grace_ms, DEFAULT_DRAIN_GRACE_MS);

        let portfolio = Portfolio::from_config(&config).unwrap();
        assert_eq!(portfolio.width(), 2);
        assert_eq!(portfolio.policy(), RacePolicy::FirstDefinite);

        assert!(PortfolioConfig::from_json_str(r#"{"members": [], "speed": 11}"#).is_err());
        match Portfolio::from_config(&PortfolioConfig::default()) {
            Err(ConfigError::EmptyPortfolio) => {}
            _ => panic!("empty portfolio accepted"),
        }
    }

    #[test]
    fn test_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portfolio.json");
        let config = PortfolioConfig::builtin();
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(PortfolioConfig::from_json_file(&path).unwrap(), config);
        assert_eq!(config.members.len(), SolverKind::values().len());
        assert!(PortfolioConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_policy_names() {
        for name in RacePolicy::values() {
            let policy: RacePolicy = name.parse().unwrap();
            assert_eq!(serde_json::to_string(&policy).unwrap(), format!("\"{}\"", name));
        }
        assert!("fastest".parse::<RacePolicy>().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_external_model_over_several_lines() {
        covers!("decode.concatenates_value_lines");
        use crate::worker::ExternalSolver;

        let external = ExternalSolver::new("sh")
            .arg("-c")
            .arg("printf 's SATISFIABLE\\nv 1 -2 0\\nv 3 0\\n'");
        let members: Vec<Arc<dyn Worker>> = vec![Arc::new(external)];
        let mut portfolio = Portfolio::new(members).unwrap();
        portfolio.append_formula(&[&[1], &[-2], &[3]]).unwrap();

        assert_eq!(
            portfolio.solve(&[]),
            SolveOutcome::Satisfiable(vec![1, -2, 3])
        );
        assert_eq!(portfolio.model(), &[1, -2, 3]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_external_loser_is_killed() {
        use crate::worker::ExternalSolver;
        use std::path::Path;

        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let external = ExternalSolver::new("sh")
            .arg("-c")
            .arg(format!("echo $$ > '{}'; exec sleep 30", pid_file.display()))
            .named("sleeper");
        let fast = MockWorker::new("fast", 300, SolveOutcome::Unsatisfiable);
        let members: Vec<Arc<dyn Worker>> = vec![Arc::new(external), Arc::new(fast)];
        let mut portfolio = Portfolio::new(members).unwrap();
        portfolio.add_clause(&[1]).unwrap();

        let start = Instant::now();
        assert_eq!(portfolio.solve(&[]), SolveOutcome::Unsatisfiable);
        assert!(start.elapsed() < Duration::from_secs(20));
        let pid = std::fs::read_to_string(&pid_file).unwrap();
        assert!(!Path::new(&format!("/proc/{}", pid.trim())).exists());
    }
}
