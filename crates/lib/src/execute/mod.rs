//! Bounded-parallel process execution.
//!
//! All coordination happens on the calling thread. The [`BuildScheduler`]
//! holds a slot counter and a FIFO of continuations. Launching with no free
//! slot runs queued continuations (waiting on the oldest process first) until
//! one frees up; the batch ends with [`BuildScheduler::drain`], which runs
//! everything still queued.
//!
//! A process exiting non-zero never stops the batch. Every failure is
//! collected in the [`BatchOutcome`] and the caller decides what to skip.

pub mod compile;
pub mod process;
pub mod runner;
pub mod types;

use std::collections::VecDeque;
use std::rc::Rc;

use tempfile::TempPath;
use tracing::{debug, error, info};

use crate::project::{ProjectNode, ProjectRegistry, SourceGroup};

pub use process::{LaunchSpec, ProcessLauncher, RunningProcess, SystemLauncher};
pub use types::{BatchOutcome, ExecuteConfig, ExecuteError, Phase};

/// Deferred work run strictly in FIFO order.
enum Continuation {
  /// Wait for a launched process, then give its slot back.
  Exit {
    label: String,
    process: Box<dyn RunningProcess>,
    _response_file: Option<TempPath>,
  },
  /// Arbitrary follow-up work, e.g. copying resources after a compile.
  Task {
    label: String,
    run: Box<dyn FnOnce() -> Result<(), ExecuteError>>,
  },
}

/// Launches processes with at most `parallelism` running at once.
pub struct BuildScheduler<'l> {
  launcher: &'l dyn ProcessLauncher,
  free_slots: usize,
  queue: VecDeque<Continuation>,
  outcome: BatchOutcome,
}

impl<'l> BuildScheduler<'l> {
  pub fn new(launcher: &'l dyn ProcessLauncher, config: &ExecuteConfig) -> Self {
    Self {
      launcher,
      free_slots: config.parallelism.max(1),
      queue: VecDeque::new(),
      outcome: BatchOutcome::default(),
    }
  }

  /// Starts a process, first waiting for a slot if none is free.
  ///
  /// A process that cannot be spawned counts as a failed process.
  pub fn launch(&mut self, mut spec: LaunchSpec) -> Result<(), ExecuteError> {
    while self.free_slots == 0 {
      let next = self.queue.pop_front().ok_or(ExecuteError::NoFreeSlot)?;
      self.run(next);
    }

    self.free_slots -= 1;
    self.outcome.launched += 1;
    info!(label = %spec.label, "starting");

    match self.launcher.launch(&spec) {
      Ok(process) => {
        self.queue.push_back(Continuation::Exit {
          label: spec.label,
          process,
          _response_file: spec.response_file.take(),
        });
      }
      Err(e) => {
        error!(label = %spec.label, program = %spec.program, error = %e, "failed to start process");
        self.free_slots += 1;
        self.outcome.failed.push(spec.label);
      }
    }
    Ok(())
  }

  /// Queues `task` behind everything launched so far.
  pub fn defer(&mut self, label: impl Into<String>, task: impl FnOnce() -> Result<(), ExecuteError> + 'static) {
    self.queue.push_back(Continuation::Task {
      label: label.into(),
      run: Box::new(task),
    });
  }

  /// Runs every queued continuation and returns the batch result.
  pub fn drain(&mut self) -> BatchOutcome {
    while let Some(next) = self.queue.pop_front() {
      self.run(next);
    }
    std::mem::take(&mut self.outcome)
  }

  fn run(&mut self, continuation: Continuation) {
    match continuation {
      Continuation::Exit { label, process, .. } => {
        let status = process.wait();
        self.free_slots += 1;
        match status {
          Ok(0) => debug!(label = %label, "finished"),
          Ok(code) => {
            error!(label = %label, code, "process failed");
            self.outcome.failed.push(label);
          }
          Err(e) => {
            error!(label = %label, error = %e, "failed to wait for process");
            self.outcome.failed.push(label);
          }
        }
      }
      Continuation::Task { label, run } => {
        if let Err(e) = run() {
          error!(label = %label, error = %e, "deferred task failed");
          self.outcome.failed.push(label);
        }
      }
    }
  }
}

/// Runs `phase` for every buildable node in `nodes` and waits for all of it.
///
/// Aggregators and repository nodes are skipped. If issuing a launch fails,
/// whatever was already started is still waited for before the error is returned.
pub fn run_phase(
  registry: &mut ProjectRegistry,
  nodes: &[Rc<ProjectNode>],
  phase: Phase,
  launcher: &dyn ProcessLauncher,
  config: &ExecuteConfig,
) -> Result<BatchOutcome, ExecuteError> {
  info!(phase = %phase, projects = nodes.len(), parallelism = config.parallelism, "running phase");
  let mut scheduler = BuildScheduler::new(launcher, config);

  let issued = nodes
    .iter()
    .filter(|node| node.is_source() && !node.is_aggregator())
    .try_for_each(|node| match phase {
      Phase::CompileMain => compile::begin_compile(&mut scheduler, registry, node, SourceGroup::Main),
      Phase::CompileTest => compile::begin_compile(&mut scheduler, registry, node, SourceGroup::Test),
      Phase::Test => runner::begin_test(&mut scheduler, registry, node),
    });

  let outcome = scheduler.drain();
  issued.map(|()| outcome)
}


#[cfg(test)]
mod tests {
  use super::fake::FakeLauncher;
  use super::*;

  fn spec(label: &str) -> LaunchSpec {
    LaunchSpec::new(label, "javac")
  }

  #[test]
  fn never_exceeds_parallelism_and_reports_failure() {
    let launcher = FakeLauncher {
      exit_code: |label| if label == "p2" { 1 } else { 0 },
      ..Default::default()
    };
    let mut scheduler = BuildScheduler::new(&launcher, &ExecuteConfig::with_parallelism(2));
    for label in ["p0", "p1", "p2", "p3", "p4"] {
      scheduler.launch(spec(label)).unwrap();
    }
    let outcome = scheduler.drain();

    let state = launcher.state.borrow();
    assert_eq!(state.max_live, 2);
    assert_eq!(state.live, 0);
    assert_eq!(outcome.launched, 5);
    assert_eq!(outcome.failed, vec!["p2".to_string()]);
    assert!(!outcome.is_success());
  }

  #[test]
  fn oldest_process_is_waited_for_first() {
    let launcher = FakeLauncher::default();
    let mut scheduler = BuildScheduler::new(&launcher, &ExecuteConfig::with_parallelism(1));
    scheduler.launch(spec("a")).unwrap();
    scheduler.launch(spec("b")).unwrap();
    scheduler.drain();

    let state = launcher.state.borrow();
    assert_eq!(state.events, vec!["start a", "exit a", "start b", "exit b"]);
  }

  #[test]
  fn deferred_tasks_run_in_order_before_a_later_launch() {
    let launcher = FakeLauncher::default();
    let mut scheduler = BuildScheduler::new(&launcher, &ExecuteConfig::with_parallelism(1));
    let log = Rc::clone(&launcher.state);
    scheduler.launch(spec("a")).unwrap();
    scheduler.defer("copy a", move || {
      log.borrow_mut().events.push("copy a".to_string());
      Ok(())
    });
    scheduler.launch(spec("b")).unwrap();
    scheduler.drain();

    let state = launcher.state.borrow();
    assert_eq!(state.events, vec!["start a", "exit a", "start b", "copy a", "exit b"]);
  }

  #[test]
  fn failed_task_is_recorded() {
    let launcher = FakeLauncher::default();
    let mut scheduler = BuildScheduler::new(&launcher, &ExecuteConfig::default());
    scheduler.defer("resources", || Err(ExecuteError::Io(std::io::Error::other("disk full"))));
    let outcome = scheduler.drain();
    assert_eq!(outcome.failed, vec!["resources".to_string()]);
  }

  #[test]
  fn spawn_failure_counts_as_failure_and_frees_the_slot() {
    let launcher = FakeLauncher {
      refuse: |label| label == "broken",
      ..Default::default()
    };
    let mut scheduler = BuildScheduler::new(&launcher, &ExecuteConfig::with_parallelism(1));
    scheduler.launch(spec("broken")).unwrap();
    scheduler.launch(spec("fine")).unwrap();
    let outcome = scheduler.drain();

    assert_eq!(outcome.launched, 2);
    assert_eq!(outcome.failed, vec!["broken".to_string()]);
    assert_eq!(launcher.state.borrow().events, vec!["start fine", "exit fine"]);
  }

  #[test]
  fn drain_resets_the_outcome() {
    let launcher = FakeLauncher::default();
    let mut scheduler = BuildScheduler::new(&launcher, &ExecuteConfig::default());
    scheduler.launch(spec("a")).unwrap();
    assert_eq!(scheduler.drain().launched, 1);
    assert_eq!(scheduler.drain(), BatchOutcome::default());
  }
}
