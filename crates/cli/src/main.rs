mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cmd::{GoalOptions, cmd_goal, cmd_version};
use crate::output::print_err;

/// A Maven-ish builder for small Java projects.
///
/// Goals: clean, compile, test-compile, test, test-only, package, package-only,
/// install, install-only, test-install, get, install-file, test-classpath, run,
/// new-project, help. Anything up to the last ':' of the goal is ignored.
#[derive(Parser, Debug)]
#[command(name = "lmvn", about, long_about, disable_version_flag = true)]
struct Cli {
  /// Goal to run (e.g. `package` or `dependency:get`)
  goal: Option<String>,

  /// Arguments passed to the program started by `run`
  #[arg(trailing_var_arg = true)]
  args: Vec<String>,

  /// Define a property (`key=value`, or `key` for `true`)
  #[arg(short = 'D', long = "define", value_name = "KEY[=VALUE]")]
  define: Vec<String>,

  /// Maximum number of compiler or test processes running at once
  #[arg(short = 'T', long = "threads", value_name = "N")]
  threads: Option<usize>,

  /// Root project descriptor
  #[arg(short = 'f', long = "file", value_name = "POM", default_value = "pom.xml")]
  file: PathBuf,

  /// Print version and tool information, then exit
  #[arg(short = 'v', long = "version")]
  version: bool,

  /// Print version and tool information, then continue
  #[arg(short = 'V', long = "show-version")]
  show_version: bool,

  /// Only log warnings and omit the final status line
  #[arg(short, long)]
  quiet: bool,

  /// Log debug output
  #[arg(short = 'X', long)]
  debug: bool,

  /// Never contact remote repositories
  #[arg(short, long)]
  offline: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let level = if cli.debug {
    "debug"
  } else if cli.quiet {
    "warn"
  } else {
    "info"
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .without_time()
    .with_writer(std::io::stderr)
    .init();

  let result = if cli.version {
    cmd_version(&cli.define).map(|()| Some(ExitCode::SUCCESS))
  } else {
    cmd_goal(GoalOptions {
      goal: cli.goal.as_deref(),
      args: &cli.args,
      define: &cli.define,
      threads: cli.threads,
      file: &cli.file,
      show_version: cli.show_version,
      quiet: cli.quiet,
      offline: cli.offline,
    })
  };

  match result {
    Ok(Some(code)) => code,
    Ok(None) => match Cli::command().print_long_help() {
      Ok(()) => ExitCode::SUCCESS,
      Err(_) => ExitCode::FAILURE,
    },
    Err(err) => {
      if !cli.quiet {
        print_err(&format!("{:#}", err));
      }
      ExitCode::FAILURE
    }
  }
}
