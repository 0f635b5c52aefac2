//! Implementation of goal execution.
//!
//! Loads the property context, opens a session on the root descriptor and
//! runs the goal with real processes. The final `[OK]` line is printed here;
//! failures bubble up to `main`, which prints `[ERR]`.

use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use lmvn_lib::execute::{ExecuteConfig, SystemLauncher};
use lmvn_lib::goals::{Goal, GoalOutcome, Session, SessionConfig};

use crate::cmd::version::{print_version, property_context};
use crate::output::{format_elapsed, print_ok};

/// Options for a goal run, straight from the command line.
pub struct GoalOptions<'a> {
  pub goal: Option<&'a str>,
  pub args: &'a [String],
  pub define: &'a [String],
  pub threads: Option<usize>,
  pub file: &'a Path,
  pub show_version: bool,
  pub quiet: bool,
  pub offline: bool,
}

/// Runs one goal.
///
/// Returns `None` when usage should be printed instead.
pub fn cmd_goal(options: GoalOptions<'_>) -> Result<Option<ExitCode>> {
  let started = Instant::now();
  let ctx = property_context(options.define)?;
  if options.show_version {
    print_version(&ctx)?;
  }

  let goal = match options.goal {
    None => return Ok(None),
    Some(arg) => Goal::parse(arg)?,
  };
  if goal == Goal::Help {
    return Ok(None);
  }

  let execute = options
    .threads
    .map(ExecuteConfig::with_parallelism)
    .unwrap_or_default();
  let mut session = Session::new(SessionConfig {
    descriptor: options.file.to_path_buf(),
    execute,
    offline: options.offline,
    properties: ctx,
  })
  .context("failed to set up build session")?;

  let outcome = session.run(goal, &SystemLauncher, options.args)?;
  info!(goal = %goal, elapsed = %format_elapsed(started.elapsed()), "goal finished");

  Ok(Some(match outcome {
    GoalOutcome::Finished(message) => {
      if !options.quiet {
        print_ok(&message);
      }
      ExitCode::SUCCESS
    }
    GoalOutcome::Classpath(classpath) => {
      println!("{}", classpath);
      ExitCode::SUCCESS
    }
    GoalOutcome::Exited(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
    GoalOutcome::Usage => return Ok(None),
  }))
}
