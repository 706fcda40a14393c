//! Orchestrator
//!
//! Creates one channel per pair, starts a producer on the write end and a
//! consumer on the read end, and reaps every worker it started.
//!
//! ```text
//!  for each pair:  open_channel ─▶ spawn producer(write) ─▶ spawn consumer(read)
//!                        (both endpoints released as they are handed over)
//!  then:           wait every handle, in spawn order
//! ```
//!
//! Setup failures stop further pairs, but workers already started are still
//! reaped before the error is returned.

use crate::config::WaitPolicy;
use crate::launcher::{Launcher, Worker, WorkerExit, WorkerKind};
use pairpipe_core::{MAX_PAIRS, Pair, Role};
use pairpipe_ipc::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{pair}: channel creation failed: {source}")]
    Channel { pair: Pair, source: ChannelError },

    #[error("{pair}: spawning {role} failed: {source}")]
    Spawn {
        pair: Pair,
        role: Role,
        source: std::io::Error,
    },

    #[error("{failed} of {waited} worker wait(s) failed")]
    WaitFailed { failed: usize, waited: usize },

    #[error("{requested} pairs requested, at most {max} supported")]
    TooManyPairs { requested: i64, max: u32 },
}

/// Termination of one worker, as seen by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    /// Pair the worker belonged to
    pub pair: Pair,
    /// Role it ran
    pub role: Role,
    /// Process id, or launcher-assigned id for thread workers
    pub id: u32,
    /// Exit status, or why it could not be collected
    pub result: Result<WorkerExit, String>,
}

impl WorkerOutcome {
    /// Worker was reaped and exited with status 0
    pub fn succeeded(&self) -> bool {
        matches!(self.result, Ok(exit) if exit.success())
    }
}

/// Everything a run spawned and collected
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pairs set up
    pub pairs: u32,
    /// Workers started
    pub spawned: usize,
    /// Wait operations performed
    pub waited: usize,
    /// One entry per waited worker, in spawn order
    pub outcomes: Vec<WorkerOutcome>,
}

impl RunSummary {
    /// Every worker was reaped and exited with status 0
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(WorkerOutcome::succeeded)
    }

    /// Number of handles whose wait failed
    pub fn wait_failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

struct Spawned<W> {
    pair: Pair,
    role: Role,
    worker: W,
}

/// Drives producer/consumer pairs through spawn and wait
pub struct Orchestrator<L: Launcher> {
    launcher: L,
    wait_policy: WaitPolicy,
}

impl<L: Launcher> Orchestrator<L> {
    /// Create an orchestrator on top of `launcher`
    pub fn new(launcher: L, wait_policy: WaitPolicy) -> Self {
        Self {
            launcher,
            wait_policy,
        }
    }

    /// Run one pair with start value 1
    pub fn run_basic_demo(&mut self) -> Result<RunSummary, OrchestratorError> {
        println!(
            "\nParent process (PID: {}) creating children...",
            std::process::id()
        );
        let summary = self.run_pairs(1, false)?;
        println!("\nSUCCESS: Basic producer-consumer completed!");
        Ok(summary)
    }

    /// Run `num_pairs` concurrent pairs. Zero or fewer is a no-op.
    pub fn run_multiple_pairs(&mut self, num_pairs: i64) -> Result<RunSummary, OrchestratorError> {
        if num_pairs <= 0 {
            println!("No pairs to run.");
            return Ok(RunSummary::default());
        }
        if num_pairs > i64::from(MAX_PAIRS) {
            return Err(OrchestratorError::TooManyPairs {
                requested: num_pairs,
                max: MAX_PAIRS,
            });
        }

        println!("\nParent creating {} producer-consumer pairs...", num_pairs);
        let summary = self.run_pairs(num_pairs as u32, true)?;

        println!("\nAll pairs completed successfully!");
        println!("SUCCESS: Multiple pairs completed!");
        Ok(summary)
    }

    fn run_pairs(&mut self, count: u32, banner: bool) -> Result<RunSummary, OrchestratorError> {
        let Some(pairs) = Pair::first(count) else {
            return Err(OrchestratorError::TooManyPairs {
                requested: count.into(),
                max: MAX_PAIRS,
            });
        };
        tracing::info!(pairs = count, "starting pairs");

        // Grows as workers start; nothing is reserved up front for `count`.
        let mut spawned = Vec::new();

        for pair in pairs {
            if banner {
                println!("\n=== Pair {} ===", pair.label());
            }

            if let Err(e) = self.spawn_pair(pair, &mut spawned) {
                tracing::error!(%pair, error = %e, reaping = spawned.len(), "pair setup failed");
                self.wait_all(pair.index(), spawned);
                return Err(e);
            }
        }

        let summary = self.wait_all(count, spawned);
        tracing::info!(
            spawned = summary.spawned,
            waited = summary.waited,
            ok = summary.all_succeeded(),
            "all workers reaped"
        );

        let failed = summary.wait_failures();
        if failed > 0 && self.wait_policy == WaitPolicy::Fail {
            return Err(OrchestratorError::WaitFailed {
                failed,
                waited: summary.waited,
            });
        }
        Ok(summary)
    }

    /// Set up one pair. Every handle started is pushed to `spawned`, even if
    /// a later step fails, so the caller can still reap it.
    fn spawn_pair(
        &mut self,
        pair: Pair,
        spawned: &mut Vec<Spawned<L::Worker>>,
    ) -> Result<(), OrchestratorError> {
        let (read, write) = self
            .launcher
            .open_channel()
            .map_err(|source| OrchestratorError::Channel { pair, source })?;
        tracing::debug!(%pair, start = pair.start(), "channel created");

        // On error `read` is dropped on return, the write end inside spawn.
        let producer = self
            .launcher
            .spawn(Role::Producer, write.into(), pair)
            .map_err(|source| OrchestratorError::Spawn {
                pair,
                role: Role::Producer,
                source,
            })?;
        println!("Created {}", child_label(Role::Producer, &producer));
        spawned.push(Spawned {
            pair,
            role: Role::Producer,
            worker: producer,
        });

        let consumer = self
            .launcher
            .spawn(Role::Consumer, read.into(), pair)
            .map_err(|source| OrchestratorError::Spawn {
                pair,
                role: Role::Consumer,
                source,
            })?;
        println!("Created {}", child_label(Role::Consumer, &consumer));
        spawned.push(Spawned {
            pair,
            role: Role::Consumer,
            worker: consumer,
        });

        Ok(())
    }

    /// Wait on every handle in spawn order. A failed wait is reported and
    /// the remaining handles are still waited on.
    fn wait_all(&self, pairs: u32, spawned: Vec<Spawned<L::Worker>>) -> RunSummary {
        let mut summary = RunSummary {
            pairs,
            spawned: spawned.len(),
            waited: 0,
            outcomes: Vec::with_capacity(spawned.len()),
        };

        for Spawned { pair, role, worker } in spawned {
            let id = worker.id();
            let label = child_label(role, &worker);
            let result = worker.wait();
            summary.waited += 1;

            let result = match result {
                Ok(exit) => {
                    println!("{} {}", label, exit);
                    if exit.success() {
                        tracing::debug!(%pair, %role, pid = id, %exit, "worker reaped");
                    } else {
                        tracing::warn!(%pair, %role, pid = id, %exit, "worker failed");
                    }
                    Ok(exit)
                }
                Err(e) => {
                    eprintln!("wait for {} failed: {}", label, e);
                    tracing::error!(%pair, %role, pid = id, error = %e, "wait failed");
                    Err(e.to_string())
                }
            };

            summary.outcomes.push(WorkerOutcome {
                pair,
                role,
                id,
                result,
            });
        }

        summary
    }
}

/// `Producer child (PID: 42)`, or `Consumer child (thread 3)` for workers
/// that are not processes
fn child_label<W: Worker>(role: Role, worker: &W) -> String {
    let title = match role {
        Role::Producer => "Producer",
        Role::Consumer => "Consumer",
    };
    match worker.kind() {
        WorkerKind::Process => format!("{} child (PID: {})", title, worker.id()),
        WorkerKind::Thread => format!("{} child (thread {})", title, worker.id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{ThreadLauncher, ThreadWorker};
    use pairpipe_ipc::{Endpoint, ReadEnd, WriteEnd};
    use std::io;

    fn thread_orchestrator(policy: WaitPolicy) -> Orchestrator<ThreadLauncher> {
        Orchestrator::new(ThreadLauncher::new().quiet(), policy)
    }

    /// Thread launcher that can be told to fail at a given step.
    #[derive(Default)]
    struct FlakyLauncher {
        inner: ThreadLauncher,
        fail_channel_at: Option<u32>,
        fail_spawn: Option<(u32, Role)>,
        fail_wait: bool,
        channels_opened: u32,
        spawned: Vec<(u32, Role)>,
    }

    impl FlakyLauncher {
        fn new() -> Self {
            Self {
                inner: ThreadLauncher::new().quiet(),
                ..Default::default()
            }
        }
    }

    struct FlakyWorker {
        inner: ThreadWorker,
        fail_wait: bool,
    }

    impl Worker for FlakyWorker {
        fn id(&self) -> u32 {
            self.inner.id()
        }

        fn kind(&self) -> WorkerKind {
            self.inner.kind()
        }

        fn wait(self) -> io::Result<WorkerExit> {
            let exit = self.inner.wait()?;
            if self.fail_wait {
                return Err(io::Error::new(io::ErrorKind::Other, "no such child"));
            }
            Ok(exit)
        }
    }

    impl Launcher for FlakyLauncher {
        type Worker = FlakyWorker;

        fn open_channel(&mut self) -> Result<(ReadEnd, WriteEnd), ChannelError> {
            let pair = self.channels_opened;
            self.channels_opened += 1;
            if self.fail_channel_at == Some(pair) {
                return Err(ChannelError::Create(io::Error::from_raw_os_error(
                    libc::EMFILE,
                )));
            }
            self.inner.open_channel()
        }

        fn spawn(&mut self, role: Role, endpoint: Endpoint, pair: Pair) -> io::Result<FlakyWorker> {
            if self.fail_spawn == Some((pair.index(), role)) {
                drop(endpoint);
                return Err(io::Error::from_raw_os_error(libc::EAGAIN));
            }
            self.spawned.push((pair.index(), role));
            Ok(FlakyWorker {
                inner: self.inner.spawn(role, endpoint, pair)?,
                fail_wait: self.fail_wait,
            })
        }
    }

    #[test]
    fn test_basic_demo_runs_one_pair() {
        let summary = thread_orchestrator(WaitPolicy::Report)
            .run_basic_demo()
            .unwrap();
        assert_eq!(summary.pairs, 1);
        assert_eq!((summary.spawned, summary.waited), (2, 2));
        assert!(summary.all_succeeded());

        let order: Vec<_> = summary.outcomes.iter().map(|o| o.role).collect();
        assert_eq!(order, vec![Role::Producer, Role::Consumer]);
        assert_eq!(summary.outcomes[0].pair.start(), 1);
    }

    #[test]
    fn test_multiple_pairs_spawn_and_wait_twice_per_pair() {
        for n in [1, 2, 5, 16] {
            let summary = thread_orchestrator(WaitPolicy::Report)
                .run_multiple_pairs(n)
                .unwrap();
            assert_eq!(summary.pairs, n as u32);
            assert_eq!(summary.spawned, 2 * n as usize);
            assert_eq!(summary.waited, 2 * n as usize);
            assert!(summary.all_succeeded());
        }
    }

    #[test]
    fn test_outcomes_follow_spawn_order() {
        let summary = thread_orchestrator(WaitPolicy::Report)
            .run_multiple_pairs(3)
            .unwrap();
        let order: Vec<_> = summary
            .outcomes
            .iter()
            .map(|o| (o.pair.index(), o.role))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, Role::Producer),
                (0, Role::Consumer),
                (1, Role::Producer),
                (1, Role::Consumer),
                (2, Role::Producer),
                (2, Role::Consumer),
            ]
        );
    }

    #[test]
    fn test_non_positive_pair_count_is_noop() {
        for n in [0, -1, -100] {
            let summary = thread_orchestrator(WaitPolicy::Fail)
                .run_multiple_pairs(n)
                .unwrap();
            assert_eq!(summary, RunSummary::default());
        }
    }

    #[test]
    fn test_too_many_pairs_rejected_before_spawning() {
        let mut orchestrator = Orchestrator::new(FlakyLauncher::new(), WaitPolicy::Report);
        let err = orchestrator
            .run_multiple_pairs(i64::from(MAX_PAIRS) + 1)
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TooManyPairs { .. }));
        assert_eq!(orchestrator.launcher.channels_opened, 0);
    }

    #[test]
    fn test_largest_pair_count_fails_on_first_channel() {
        let mut launcher = FlakyLauncher::new();
        launcher.fail_channel_at = Some(0);
        let mut orchestrator = Orchestrator::new(launcher, WaitPolicy::Report);

        let err = orchestrator
            .run_multiple_pairs(i64::from(MAX_PAIRS))
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Channel { pair, .. } if pair.index() == 0
        ));
        assert_eq!(orchestrator.launcher.channels_opened, 1);
        assert!(orchestrator.launcher.spawned.is_empty());
    }

    #[test]
    fn test_thread_workers_not_labelled_as_processes() {
        let mut launcher = ThreadLauncher::new().quiet();
        let (read, write) = launcher.open_channel().unwrap();
        let pair = Pair::new(0).unwrap();

        let producer = launcher.spawn(Role::Producer, write.into(), pair).unwrap();
        let consumer = launcher.spawn(Role::Consumer, read.into(), pair).unwrap();
        assert_eq!(
            child_label(Role::Producer, &producer),
            "Producer child (thread 1)"
        );
        assert_eq!(
            child_label(Role::Consumer, &consumer),
            "Consumer child (thread 2)"
        );
        assert!(!child_label(Role::Producer, &producer).contains("PID"));

        producer.wait().unwrap();
        consumer.wait().unwrap();
    }

    #[test]
    fn test_channel_failure_stops_later_pairs() {
        let mut launcher = FlakyLauncher::new();
        launcher.fail_channel_at = Some(2);
        let mut orchestrator = Orchestrator::new(launcher, WaitPolicy::Report);

        let err = orchestrator.run_multiple_pairs(5).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Channel { pair, .. } if pair.index() == 2
        ));

        // Pairs 0 and 1 were started (and reaped, or this test would hang on
        // their threads); nothing for pair 2 or later.
        let launcher = &orchestrator.launcher;
        assert_eq!(launcher.channels_opened, 3);
        assert_eq!(
            launcher.spawned,
            vec![
                (0, Role::Producer),
                (0, Role::Consumer),
                (1, Role::Producer),
                (1, Role::Consumer),
            ]
        );
    }

    #[test]
    fn test_consumer_spawn_failure_releases_read_end() {
        let mut launcher = FlakyLauncher::new();
        launcher.fail_spawn = Some((0, Role::Consumer));
        let mut orchestrator = Orchestrator::new(launcher, WaitPolicy::Report);

        let err = orchestrator.run_basic_demo().unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Spawn {
                role: Role::Consumer,
                ..
            }
        ));
        // The producer was spawned and then reaped: with the read end
        // released it hit a broken pipe instead of blocking forever.
        assert_eq!(orchestrator.launcher.spawned, vec![(0, Role::Producer)]);
    }

    #[test]
    fn test_producer_spawn_failure_spawns_nothing_for_pair() {
        let mut launcher = FlakyLauncher::new();
        launcher.fail_spawn = Some((1, Role::Producer));
        let mut orchestrator = Orchestrator::new(launcher, WaitPolicy::Report);

        let err = orchestrator.run_multiple_pairs(3).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Spawn { pair, role: Role::Producer, .. } if pair.index() == 1
        ));
        assert_eq!(orchestrator.launcher.channels_opened, 2);
        assert_eq!(orchestrator.launcher.spawned.len(), 2);
    }

    #[test]
    fn test_wait_failures_reported_under_report_policy() {
        let mut launcher = FlakyLauncher::new();
        launcher.fail_wait = true;
        let summary = Orchestrator::new(launcher, WaitPolicy::Report)
            .run_multiple_pairs(2)
            .unwrap();

        assert_eq!(summary.waited, 4);
        assert_eq!(summary.wait_failures(), 4);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_wait_failures_fail_run_under_fail_policy() {
        let mut launcher = FlakyLauncher::new();
        launcher.fail_wait = true;
        let err = Orchestrator::new(launcher, WaitPolicy::Fail)
            .run_basic_demo()
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::WaitFailed {
                failed: 2,
                waited: 2
            }
        ));
    }
}
