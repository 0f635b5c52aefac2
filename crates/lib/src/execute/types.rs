//! Types for compile and test execution.
//!
//! This module defines the error types, batch outcomes and configuration
//! used when running external compiler and test processes.

use std::fmt;

use thiserror::Error;

use crate::project::properties::PropertyError;
use crate::resolve::ResolveError;
use crate::store::StoreError;

/// A batch step applied to every buildable project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  /// Compile `src/main/java` into `target/classes`.
  CompileMain,
  /// Compile `src/test/java` into `target/test-classes`.
  CompileTest,
  /// Run the discovered test classes.
  Test,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Phase::CompileMain => write!(f, "compile-main"),
      Phase::CompileTest => write!(f, "compile-test"),
      Phase::Test => write!(f, "test"),
    }
  }
}

/// Errors that stop a batch from being issued.
///
/// A process exiting non-zero is not an error here; it is recorded in the
/// [`BatchOutcome`] instead.
#[derive(Debug, Error)]
pub enum ExecuteError {
  /// No slot is free and nothing is queued that could free one.
  #[error("no process slot available and nothing left to wait for")]
  NoFreeSlot,

  /// Building a search path failed to resolve dependencies.
  #[error(transparent)]
  Resolve(#[from] ResolveError),

  /// A dependency archive could not be materialized.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// A build property could not be expanded.
  #[error("property error: {0}")]
  Property(#[from] PropertyError),

  /// I/O error while preparing a launch.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Aggregate result of one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
  /// Number of processes the batch attempted to start.
  pub launched: usize,
  /// Labels of processes and deferred tasks that failed, in completion order.
  pub failed: Vec<String>,
}

impl BatchOutcome {
  /// Returns true if nothing in the batch failed.
  pub fn is_success(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Configuration for process execution.
#[derive(Debug, Clone)]
pub struct ExecuteConfig {
  /// Maximum number of processes running at once. Never below 1.
  pub parallelism: usize,
}

impl ExecuteConfig {
  pub fn with_parallelism(parallelism: usize) -> Self {
    Self {
      parallelism: parallelism.max(1),
    }
  }
}

impl Default for ExecuteConfig {
  fn default() -> Self {
    Self::with_parallelism(num_cpus())
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}
