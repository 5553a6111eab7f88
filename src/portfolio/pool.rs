use super::RacePolicy;
use crate::solve::{Interrupt, SolveOutcome, WorkerError};
use crate::worker::{panic_message, Job, Worker};
use log::{debug, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A completion signal that can be filled at most once.
///
/// Every publish after the first one, or after the slot was closed, is dropped.
pub(crate) struct ResultSlot<T> {
    claimed: AtomicBool,
    sender: Mutex<Option<Sender<T>>>,
}

impl<T> ResultSlot<T> {
    pub(crate) fn new() -> (Arc<ResultSlot<T>>, Receiver<T>) {
        let (tx, rx) = channel();
        let slot = ResultSlot {
            claimed: AtomicBool::new(false),
            sender: Mutex::new(Some(tx)),
        };
        (Arc::new(slot), rx)
    }

    fn claim(&self) -> Option<Sender<T>> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        // a poisoned lock still holds a valid sender
        let mut sender = match self.sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sender.take()
    }

    /// Returns whether `value` became the result.
    pub(crate) fn publish(&self, value: T) -> bool {
        match self.claim() {
            Some(sender) => sender.send(value).is_ok(),
            None => false,
        }
    }

    /// Prevents any further publish, returns `false` if a publisher came first.
    pub(crate) fn close(&self) -> bool {
        self.claim().is_some()
    }
}

/// Outcome of one member, tagged with its position in the portfolio.
#[derive(Debug)]
pub(crate) struct Report {
    pub member: usize,
    pub name: String,
    pub outcome: SolveOutcome,
}

/// Shared by all workers of one solve call.
pub(crate) struct Race {
    slot: Arc<ResultSlot<Report>>,
    pending: AtomicUsize,
    policy: RacePolicy,
}

impl Race {
    pub(crate) fn new(width: usize, policy: RacePolicy) -> (Arc<Race>, RaceHandle) {
        let (slot, receiver) = ResultSlot::new();
        let race = Race {
            slot: slot.clone(),
            pending: AtomicUsize::new(width),
            policy,
        };
        (Arc::new(race), RaceHandle { slot, receiver })
    }

    pub(crate) fn report(&self, report: Report) {
        let remaining = self.pending.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
        if self.policy == RacePolicy::FirstDefinite && report.outcome.is_failed() && remaining > 0 {
            debug!(
                "member {} ({}) failed, {} member(s) still running",
                report.member, report.name, remaining
            );
            return;
        }
        let member = report.member;
        let name = report.name.clone();
        if self.slot.publish(report) {
            trace!("member {} ({}) reported first", member, name);
        } else {
            covered_by!("pool.late_report_dropped");
            debug!("discarding late report of member {} ({})", member, name);
        }
    }
}

/// The coordinator's end of a race.
pub(crate) struct RaceHandle {
    slot: Arc<ResultSlot<Report>>,
    receiver: Receiver<Report>,
}

impl RaceHandle {
    /// Blocks until the first report, or until `timeout` expired (`None`).
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Option<Report> {
        let timeout = match timeout {
            None => return self.receiver.recv().ok(),
            Some(timeout) => timeout,
        };
        match self.receiver.recv_timeout(timeout) {
            Ok(report) => Some(report),
            Err(RecvTimeoutError::Timeout) => {
                if self.slot.close() {
                    None
                } else {
                    // a report was claimed concurrently and is about to be sent
                    self.receiver.recv().ok()
                }
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// One in-flight unit of work, consumed when the pool is drained.
struct WorkerHandle {
    member: usize,
    name: String,
    thread: JoinHandle<()>,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub(crate) struct DrainReport {
    pub joined: usize,
    pub detached: usize,
}

/// Threads of exactly one solve call.
///
/// A pool is never reused: `drain` consumes it, the next call builds a fresh one.
pub(crate) struct WorkerPool {
    generation: usize,
    interrupt: Interrupt,
    handles: Vec<WorkerHandle>,
}

impl WorkerPool {
    pub(crate) fn new(generation: usize) -> WorkerPool {
        WorkerPool {
            generation,
            interrupt: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Starts one thread per member, every member reports exactly once to `race`.
    pub(crate) fn dispatch(&mut self, members: &[Arc<dyn Worker>], job: &Job, race: &Arc<Race>) {
        for (member, worker) in members.iter().enumerate() {
            let name = worker.name().to_string();
            let worker = worker.clone();
            let job = job.clone();
            let race_ref = race.clone();
            let interrupt = self.interrupt.clone();
            let thread_name = name.clone();

            let spawned = thread::Builder::new()
                .name(format!("satfolio-{}-{}", self.generation, member))
                .spawn(move || {
                    let outcome =
                        match panic::catch_unwind(AssertUnwindSafe(|| worker.run(&job, &interrupt)))
                        {
                            Ok(outcome) => outcome,
                            Err(panic) => {
                                let msg = panic_message(&*panic);
                                warn!("{}: worker panicked: {}", thread_name, msg);
                                SolveOutcome::Failed(WorkerError::BackendFailure(format!(
                                    "worker panicked: {}",
                                    msg
                                )))
                            }
                        };
                    race_ref.report(Report {
                        member,
                        name: thread_name,
                        outcome,
                    });
                });

            match spawned {
                Ok(thread) => {
                    debug!("dispatched member {} ({})", member, name);
                    self.handles.push(WorkerHandle {
                        member,
                        name,
                        thread,
                    });
                }
                Err(err) => {
                    warn!("could not start thread for member {} ({}): {}", member, name, err);
                    race.report(Report {
                        member,
                        name,
                        outcome: SolveOutcome::Failed(WorkerError::Io(format!(
                            "could not start worker thread: {}",
                            err
                        ))),
                    });
                }
            }
        }
    }

    /// Cancels all workers and waits up to `grace` for their threads.
    ///
    /// Threads still running afterwards are detached; they can only report into
    /// the already decided race.
    pub(crate) fn drain(self, grace: Duration) -> DrainReport {
        self.interrupt.store(true, Ordering::Relaxed);
        let deadline = Instant::now() + grace;
        let mut report = DrainReport::default();
        for handle in self.handles {
            while !handle.thread.is_finished() && Instant::now() < deadline {
                thread::sleep(POLL_INTERVAL);
            }
            if handle.thread.is_finished() {
                if handle.thread.join().is_err() {
                    warn!("thread of member {} ({}) panicked", handle.member, handle.name);
                }
                report.joined += 1;
            } else {
                covered_by!("pool.worker_detached");
                warn!(
                    "member {} ({}) did not stop within {:?}, detaching",
                    handle.member, handle.name, grace
                );
                report.detached += 1;
            }
        }
        report
    }
}
