//! OS process launching.
//!
//! The scheduler talks to processes through [`ProcessLauncher`] so that
//! batches can be exercised without a JDK installed.

use std::io;
use std::path::PathBuf;
use std::process::{Child, Command};

use tempfile::TempPath;
use tracing::debug;

/// Everything needed to start one process.
#[derive(Debug)]
pub struct LaunchSpec {
  /// Human-readable name used in logs and failure reports.
  pub label: String,
  pub program: String,
  pub args: Vec<String>,
  pub current_dir: Option<PathBuf>,
  /// Deleted once the process has exited.
  pub response_file: Option<TempPath>,
}

impl LaunchSpec {
  pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      program: program.into(),
      args: Vec::new(),
      current_dir: None,
      response_file: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
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

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.current_dir = Some(dir.into());
    self
  }
}

/// Starts processes.
pub trait ProcessLauncher {
  fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn RunningProcess>>;
}

/// A started process that can be waited on exactly once.
pub trait RunningProcess {
  /// Blocks until exit. Termination by signal reports `-1`.
  fn wait(self: Box<Self>) -> io::Result<i32>;
}

/// Launches real processes with inherited standard streams.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
  fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn RunningProcess>> {
    let mut command = Command::new(&spec.program);
    command.args(&spec.args);
    if let Some(dir) = &spec.current_dir {
      command.current_dir(dir);
    }
    debug!(program = %spec.program, args = ?spec.args, working_dir = ?spec.current_dir, "spawning process");
    Ok(Box::new(command.spawn()?))
  }
}

impl RunningProcess for Child {
  fn wait(mut self: Box<Self>) -> io::Result<i32> {
    let status = Child::wait(&mut self)?;
    Ok(status.code().unwrap_or(-1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::shell_cmd;

  fn run(script: &str) -> i32 {
    let (shell, args) = shell_cmd(script);
    let spec = LaunchSpec::new("test", shell).args(args);
    SystemLauncher.launch(&spec).unwrap().wait().unwrap()
  }

  #[test]
  fn reports_exit_codes() {
    assert_eq!(run("exit 0"), 0);
    assert_eq!(run("exit 3"), 3);
  }

  #[test]
  fn missing_program_fails_to_launch() {
    let spec = LaunchSpec::new("missing", "/nonexistent/lmvn-no-such-program");
    assert!(SystemLauncher.launch(&spec).is_err());
  }
}
