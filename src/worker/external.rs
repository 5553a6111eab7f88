use super::{Job, Worker};
use crate::dimacs;
use crate::solve::{Interrupt, SolveOutcome, WorkerError};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Exit statuses of a regular termination; SAT solvers commonly report 10 (sat) and 20 (unsat).
const ACCEPTED_EXIT_CODES: &[i32] = &[0, 10, 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// The CNF is written to a temporary file whose path is appended to the arguments
    File,
    /// The CNF is streamed to the standard input of the process
    Pipe,
}

impl Default for InputMode {
    fn default() -> Self {
        InputMode::File
    }
}

/// An external SAT solver executable.
///
/// The formula and the call's assumptions (as unit clauses) are handed over as
/// DIMACS CNF, the standard output is read as competition-style solver output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalSolver {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub input: InputMode,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Used in log messages and reports, defaults to `program`
    #[serde(default)]
    pub name: Option<String>,
}

struct ProcessOutput {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Owns a child process and guarantees it is killed and reaped when dropped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> ChildGuard {
        ChildGuard {
            child,
            reaped: false,
        }
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    /// Kills all processes of the child's group, i.e., also those started by wrapper scripts.
    #[cfg(unix)]
    fn kill_group(&self) {
        let group = self.child.id() as libc::pid_t;
        // SAFETY: plain system call, the group was created for this child by `process_group(0)`
        if unsafe { libc::killpg(group, libc::SIGKILL) } != 0 {
            trace!(
                "kill of process group {} failed: {}",
                group,
                io::Error::last_os_error()
            );
        }
    }

    #[cfg(not(unix))]
    fn kill_group(&self) {}

    fn kill_and_reap(&mut self) {
        if self.reaped {
            return;
        }
        // the leader is not reaped yet, so the group id cannot have been reused
        self.kill_group();
        // kill fails if the process already exited, it still needs to be waited on
        if let Err(err) = self.child.kill() {
            trace!("kill of process {} failed: {}", self.child.id(), err);
        }
        match self.child.wait() {
            Ok(status) => debug!("process {} terminated with {}", self.child.id(), status),
            Err(err) => warn!("could not reap process {}: {}", self.child.id(), err),
        }
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill_and_reap();
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    source: Option<R>,
) -> io::Result<JoinHandle<io::Result<String>>> {
    thread::Builder::new()
        .name("satfolio-reader".to_string())
        .spawn(move || {
            let mut buffer = Vec::new();
            if let Some(mut source) = source {
                source.read_to_end(&mut buffer)?;
            }
            Ok(String::from_utf8_lossy(&buffer).into_owned())
        })
}

fn spawn_writer(stdin: Option<ChildStdin>, input: String) -> io::Result<JoinHandle<io::Result<()>>> {
    thread::Builder::new()
        .name("satfolio-writer".to_string())
        .spawn(move || {
            if let Some(stdin) = stdin {
                let mut writer = BufWriter::new(stdin);
                writer.write_all(input.as_bytes())?;
                writer.flush()?;
            }
            // dropping stdin signals end of input
            Ok(())
        })
}

fn join<T>(handle: JoinHandle<io::Result<T>>, what: &str) -> Result<T, WorkerError> {
    match handle.join() {
        Ok(result) => result.map_err(|err| WorkerError::Io(format!("{}: {}", what, err))),
        Err(_) => Err(WorkerError::Io(format!("{} thread panicked", what))),
    }
}

impl ExternalSolver {
    pub fn new<S: Into<String>>(program: S) -> ExternalSolver {
        ExternalSolver {
            program: program.into(),
            args: Vec::new(),
            input: InputMode::default(),
            working_dir: None,
            name: None,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(mut self, input: InputMode) -> Self {
        self.input = input;
        self
    }

    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    fn spawn(&self, command: &mut Command) -> Result<ChildGuard, WorkerError> {
        let child = command.spawn().map_err(|err| {
            WorkerError::ProcessLaunchFailure(format!("`{}`: {}", self.program, err))
        })?;
        debug!("{}: started process {}", self.name(), child.id());
        Ok(ChildGuard::new(child))
    }

    fn execute(&self, job: &Job, interrupt: &Interrupt) -> Result<SolveOutcome, WorkerError> {
        let formula = &job.formula;
        let output = match self.input {
            InputMode::File => {
                // removed when dropped, i.e., on every exit path of this arm
                let mut file = tempfile::Builder::new()
                    .prefix("satfolio-")
                    .suffix(".cnf")
                    .tempfile()
                    .map_err(|err| WorkerError::Io(format!("temporary file: {}", err)))?;
                dimacs::write_cnf(
                    &mut BufWriter::new(file.as_file_mut()),
                    formula.clauses(),
                    formula.num_variables(),
                    &job.assumptions,
                )
                .map_err(|err| WorkerError::Io(format!("writing CNF: {}", err)))?;
                trace!("{}: formula written to {:?}", self.name(), file.path());

                let mut command = self.command();
                command.arg(file.path()).stdin(Stdio::null());
                let child = self.spawn(&mut command)?;
                self.supervise(child, None, interrupt)?
            }
            InputMode::Pipe => {
                let mut command = self.command();
                command.stdin(Stdio::piped());
                let child = self.spawn(&mut command)?;
                let input = dimacs::encode_with_assumptions(
                    formula.clauses(),
                    formula.num_variables(),
                    &job.assumptions,
                );
                self.supervise(child, Some(input), interrupt)?
            }
        };

        match output.status.code() {
            Some(code) if ACCEPTED_EXIT_CODES.contains(&code) => {}
            code => {
                warn!("{}: process failed with {}", self.name(), output.status);
                return Err(WorkerError::ProcessFailure {
                    code,
                    stderr: output.stderr,
                });
            }
        }
        Ok(dimacs::decode(output.stdout.lines())?)
    }

    /// Waits for the process while collecting its output, kills it once `interrupt` is raised.
    fn supervise(
        &self,
        mut child: ChildGuard,
        input: Option<String>,
        interrupt: &Interrupt,
    ) -> Result<ProcessOutput, WorkerError> {
        let io_err = |what: &str, err: io::Error| WorkerError::Io(format!("{}: {}", what, err));

        let writer = match input {
            Some(input) => Some(
                spawn_writer(child.child.stdin.take(), input)
                    .map_err(|err| io_err("writer thread", err))?,
            ),
            None => None,
        };
        let stdout = spawn_reader(child.child.stdout.take())
            .map_err(|err| io_err("reader thread", err))?;
        let stderr = spawn_reader(child.child.stderr.take())
            .map_err(|err| io_err("reader thread", err))?;

        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|err| io_err("waiting for process", err))?
            {
                break status;
            }
            if interrupt.load(Ordering::Relaxed) {
                debug!("{}: cancelled, killing process {}", self.name(), child.child.id());
                child.kill_and_reap();
                // the helper threads end once the pipes close
                return Err(WorkerError::TimeoutOrCancelled);
            }
            thread::sleep(POLL_INTERVAL);
        };
        debug!("{}: process exited with {}", self.name(), status);
        // descendants that outlive the solver would keep the output pipes open
        child.kill_group();

        if let Some(writer) = writer {
            // solvers may exit before consuming all input
            if let Err(err) = join(writer, "writing CNF") {
                debug!("{}: {}", self.name(), err);
            }
        }
        Ok(ProcessOutput {
            status,
            stdout: join(stdout, "reading stdout")?,
            stderr: join(stderr, "reading stderr")?,
        })
    }
}

impl Worker for ExternalSolver {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.program)
    }

    fn run(&self, job: &Job, interrupt: &Interrupt) -> SolveOutcome {
        match self.execute(job, interrupt) {
            Ok(outcome) => outcome,
            Err(err) => {
                debug!("{}: {}", self.name(), err);
                SolveOutcome::Failed(err)
            }
        }
    }
}
