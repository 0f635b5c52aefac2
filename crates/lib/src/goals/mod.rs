//! Goals: the batch driver behind the command line.
//!
//! A project goal loads the aggregate of the root descriptor and runs a fixed
//! pipeline over it (clean, gather, compile, test, package, install). The
//! remaining goals work on a single coordinate or on the local repository.

mod install;
mod scaffold;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

use crate::archive::{ArchiveAssembler, ArchiveError};
use crate::consts::DEFAULT_REPOSITORY;
use crate::execute::runner::test_runtime_classpath;
use crate::execute::{BatchOutcome, ExecuteConfig, ExecuteError, LaunchSpec, Phase, ProcessLauncher, run_phase};
use crate::project::properties::{PropertyContext, PropertyError};
use crate::project::{Coordinate, DepSet, ProjectError, ProjectNode, ProjectRegistry};
use crate::resolve::{ClosureResolver, ProjectSource, ResolveError};
use crate::store::{ArtifactKind, ArtifactStore, FetchError, HttpFetcher, StoreError};
use crate::util::fs::{join_search_path, remove_dir_guarded};

pub use install::{dummy_descriptor, install_file, install_node};
pub use scaffold::{new_project, starter_descriptor};

/// Errors that end a goal. The CLI prints these after `[ERR]`.
#[derive(Debug, Error)]
pub enum GoalError {
  #[error("Unsupported goal/phase: {0}")]
  UnknownGoal(String),

  /// At least one compiler process or resource copy failed.
  #[error("Compile failed")]
  CompileFailed { failed: Vec<String> },

  /// At least one test runner exited non-zero.
  #[error("Tests failed")]
  TestFailed { failed: Vec<String> },

  /// A goal needs a `-D` property that was not given.
  #[error("{goal} requires -D{property}=...")]
  MissingProperty { goal: &'static str, property: &'static str },

  /// `install` found no packaged archive to copy.
  #[error("{coordinate}: {} is missing; package the project first", path.display())]
  NotPackaged { coordinate: Coordinate, path: PathBuf },

  /// Refusing to overwrite an existing file.
  #[error("{} already exists", .0.display())]
  AlreadyExists(PathBuf),

  /// Removing an output directory failed or was refused.
  #[error("failed to clean {}: {source}", path.display())]
  Clean {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Project(#[from] ProjectError),

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error(transparent)]
  Execute(#[from] ExecuteError),

  #[error(transparent)]
  Archive(#[from] ArchiveError),

  #[error(transparent)]
  Property(#[from] PropertyError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Every goal the command line understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
  Clean,
  Compile,
  TestCompile,
  Test,
  TestOnly,
  Package,
  PackageOnly,
  Install,
  InstallOnly,
  TestInstall,
  Get,
  InstallFile,
  TestClasspath,
  Run,
  NewProject,
  Help,
}

impl Goal {
  const ALL: [(&'static str, Goal); 16] = [
    ("clean", Goal::Clean),
    ("compile", Goal::Compile),
    ("test-compile", Goal::TestCompile),
    ("test", Goal::Test),
    ("test-only", Goal::TestOnly),
    ("package", Goal::Package),
    ("package-only", Goal::PackageOnly),
    ("install", Goal::Install),
    ("install-only", Goal::InstallOnly),
    ("test-install", Goal::TestInstall),
    ("get", Goal::Get),
    ("install-file", Goal::InstallFile),
    ("test-classpath", Goal::TestClasspath),
    ("run", Goal::Run),
    ("new-project", Goal::NewProject),
    ("help", Goal::Help),
  ];

  /// Parses a goal argument. Only the text after the last `:` counts,
  /// so `dependency:get` and `install:install-file` work as in Maven.
  pub fn parse(arg: &str) -> Result<Goal, GoalError> {
    let name = arg.rsplit(':').next().unwrap_or(arg);
    Self::ALL
      .iter()
      .find(|(n, _)| *n == name)
      .map(|(_, goal)| *goal)
      .ok_or_else(|| GoalError::UnknownGoal(name.to_string()))
  }

  pub fn name(self) -> &'static str {
    Self::ALL
      .iter()
      .find(|(_, goal)| *goal == self)
      .map_or("help", |(name, _)| name)
  }

  /// The phases of a project goal, `None` for the others.
  pub fn pipeline(self) -> Option<Pipeline> {
    use DepSet::{RootMainCompile as MC, RootMainPackage as MP, RootTest as TEST};

    let p = Pipeline::default();
    Some(match self {
      Goal::Clean => Pipeline {
        clean: true,
        verb: "cleaned",
        ..p
      },
      Goal::Compile => Pipeline {
        clean: true,
        gather: &[MC],
        compile_main: true,
        verb: "compiled",
        ..p
      },
      Goal::TestCompile => Pipeline {
        clean: true,
        gather: &[MC, TEST],
        compile_main: true,
        compile_test: true,
        verb: "compiled with tests",
        ..p
      },
      Goal::Test => Pipeline {
        clean: true,
        gather: &[MC, TEST],
        compile_main: true,
        compile_test: true,
        test: true,
        verb: "tested",
        ..p
      },
      Goal::TestOnly => Pipeline {
        gather: &[TEST],
        test: true,
        verb: "tested",
        ..p
      },
      Goal::Package => Pipeline {
        clean: true,
        gather: &[MC, MP],
        compile_main: true,
        package: true,
        verb: "packaged",
        ..p
      },
      Goal::PackageOnly => Pipeline {
        gather: &[MP],
        package: true,
        verb: "packaged",
        ..p
      },
      Goal::Install => Pipeline {
        clean: true,
        gather: &[MC, MP],
        compile_main: true,
        package: true,
        install: true,
        verb: "installed to local repo",
        ..p
      },
      Goal::InstallOnly => Pipeline {
        gather: &[MP],
        install: true,
        verb: "installed to local repo",
        ..p
      },
      Goal::TestInstall => Pipeline {
        clean: true,
        gather: &[MC, MP, TEST],
        compile_main: true,
        compile_test: true,
        test: true,
        package: true,
        install: true,
        verb: "installed to local repo",
      },
      _ => return None,
    })
  }
}

impl fmt::Display for Goal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Phases run by a project goal, in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pipeline {
  pub clean: bool,
  /// Closures whose repository members are fetched up front.
  pub gather: &'static [DepSet],
  pub compile_main: bool,
  pub compile_test: bool,
  pub test: bool,
  pub package: bool,
  pub install: bool,
  /// Past tense used in the final status line.
  pub verb: &'static str,
}

impl Default for Pipeline {
  fn default() -> Self {
    Self {
      clean: false,
      gather: &[],
      compile_main: false,
      compile_test: false,
      test: false,
      package: false,
      install: false,
      verb: "processed",
    }
  }
}

/// What a successful goal hands back to the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalOutcome {
  /// Status text for the `[OK]` line.
  Finished(String),
  /// A classpath to print on stdout.
  Classpath(String),
  /// Exit code of a foreground process.
  Exited(i32),
  /// Usage text was requested.
  Usage,
}

/// Settings for one invocation.
#[derive(Debug, Clone)]
pub struct SessionConfig {
  /// Root descriptor, `pom.xml` unless `-f` is given.
  pub descriptor: PathBuf,
  pub execute: ExecuteConfig,
  pub offline: bool,
  pub properties: PropertyContext,
}

/// A registry plus the settings goals run with.
pub struct Session {
  descriptor: PathBuf,
  execute: ExecuteConfig,
  registry: ProjectRegistry,
}

impl Session {
  /// Builds the artifact store and registry for `config`.
  ///
  /// The first remote repository is `repoUrl` if defined, else the central repository.
  pub fn new(config: SessionConfig) -> Result<Self, GoalError> {
    let ctx = config.properties;
    let local_repo = PathBuf::from(ctx.lookup(None, "maven.repo.local")?);
    let mut store = ArtifactStore::new(local_repo, Box::new(HttpFetcher::new()?));
    store.set_offline(config.offline);
    store.add_repository(ctx.cmdline("repoUrl").unwrap_or(DEFAULT_REPOSITORY));

    Ok(Self::with_registry(
      ProjectRegistry::new(store, ctx),
      config.descriptor,
      config.execute,
    ))
  }

  pub fn with_registry(registry: ProjectRegistry, descriptor: PathBuf, execute: ExecuteConfig) -> Self {
    Self {
      descriptor,
      execute,
      registry,
    }
  }

  pub fn registry(&mut self) -> &mut ProjectRegistry {
    &mut self.registry
  }

  pub fn descriptor(&self) -> &Path {
    &self.descriptor
  }

  /// Runs `goal`. `args` are passed through to the program started by `run`.
  pub fn run(&mut self, goal: Goal, launcher: &dyn ProcessLauncher, args: &[String]) -> Result<GoalOutcome, GoalError> {
    info!(goal = %goal, descriptor = %self.descriptor.display(), "starting goal");
    if let Some(pipeline) = goal.pipeline() {
      let count = self.run_pipeline(&pipeline, launcher)?;
      return Ok(GoalOutcome::Finished(format!("{} projects {}.", count, pipeline.verb)));
    }

    match goal {
      Goal::Get => self.get(),
      Goal::InstallFile => {
        install_file(&mut self.registry)?;
        Ok(GoalOutcome::Finished("Installed.".to_string()))
      }
      Goal::TestClasspath => Ok(GoalOutcome::Classpath(self.root_test_classpath()?)),
      Goal::Run => self.run_foreground(launcher, args),
      Goal::NewProject => {
        let path = new_project(self.registry.properties(), &self.descriptor)?;
        Ok(GoalOutcome::Finished(format!("Created {}.", path.display())))
      }
      _ => Ok(GoalOutcome::Usage),
    }
  }

  /// Runs the phases of a project goal and returns the aggregate size.
  pub fn run_pipeline(&mut self, pipeline: &Pipeline, launcher: &dyn ProcessLauncher) -> Result<usize, GoalError> {
    let nodes = self.registry.load_aggregate(&self.descriptor)?;
    debug!(projects = nodes.len(), "aggregate loaded");

    if pipeline.clean {
      clean(&nodes)?;
    }
    if !pipeline.gather.is_empty() {
      gather(&mut self.registry, &nodes, pipeline.gather)?;
    }
    if pipeline.compile_main {
      self.phase(&nodes, Phase::CompileMain, launcher, compile_failed)?;
    }
    if pipeline.compile_test {
      self.phase(&nodes, Phase::CompileTest, launcher, compile_failed)?;
    }
    if pipeline.test {
      self.phase(&nodes, Phase::Test, launcher, |failed| GoalError::TestFailed { failed })?;
    }
    if pipeline.package {
      let mut assembler = ArchiveAssembler::new(&mut self.registry);
      for node in nodes.iter().filter(|n| n.is_source()) {
        assembler.package(node)?;
      }
    }
    if pipeline.install {
      for node in nodes.iter().filter(|n| n.is_source()) {
        install_node(self.registry.store(), node)?;
      }
    }
    Ok(nodes.len())
  }

  fn phase(
    &mut self,
    nodes: &[Rc<ProjectNode>],
    phase: Phase,
    launcher: &dyn ProcessLauncher,
    on_failure: fn(Vec<String>) -> GoalError,
  ) -> Result<BatchOutcome, GoalError> {
    let outcome = run_phase(&mut self.registry, nodes, phase, launcher, &self.execute)?;
    if outcome.is_success() {
      Ok(outcome)
    } else {
      Err(on_failure(outcome.failed))
    }
  }

  fn get(&mut self) -> Result<GoalOutcome, GoalError> {
    let artifact = self.registry.properties().cmdline("artifact").ok_or(GoalError::MissingProperty {
      goal: "get",
      property: "artifact",
    })?;
    let coordinate: Coordinate = artifact.parse()?;
    let node = self.registry.project(&coordinate)?;
    if !node.is_aggregator() {
      self.registry.store_mut().materialize(&coordinate, ArtifactKind::Archive)?;
    }
    Ok(GoalOutcome::Finished("Installed.".to_string()))
  }

  fn root_test_classpath(&mut self) -> Result<String, GoalError> {
    let root = self.registry.load_source(&self.descriptor)?;
    let nodes = [root];
    gather(&mut self.registry, &nodes, &[DepSet::RootTest])?;
    let classpath = test_runtime_classpath(&mut self.registry, &nodes[0])?;
    Ok(join_search_path(&classpath))
  }

  fn run_foreground(&mut self, launcher: &dyn ProcessLauncher, args: &[String]) -> Result<GoalOutcome, GoalError> {
    let classpath = self.root_test_classpath()?;
    let java = self.registry.properties().lookup(None, "lmvn.java")?;
    let mut spec = LaunchSpec::new("run", java);
    if !classpath.is_empty() {
      spec = spec.arg("-classpath").arg(classpath);
    }
    let spec = spec.args(args.iter().cloned());
    let code = launcher.launch(&spec)?.wait()?;
    Ok(GoalOutcome::Exited(code))
  }
}

fn compile_failed(failed: Vec<String>) -> GoalError {
  GoalError::CompileFailed { failed }
}

/// Deletes the `target` directory of every source node.
pub fn clean(nodes: &[Rc<ProjectNode>]) -> Result<(), GoalError> {
  for target in nodes.iter().filter_map(|node| node.target_dir()) {
    debug!(path = %target.display(), "cleaning");
    remove_dir_guarded(&target).map_err(|source| GoalError::Clean { path: target, source })?;
  }
  Ok(())
}

/// Resolves `sets` for every node and fetches the archive of every repository member.
///
/// Returns the coordinates that were fetched or found locally.
pub fn gather(
  registry: &mut ProjectRegistry,
  nodes: &[Rc<ProjectNode>],
  sets: &[DepSet],
) -> Result<BTreeSet<Coordinate>, GoalError> {
  let mut needed = BTreeSet::new();
  for node in nodes {
    for &set in sets {
      let closure = ClosureResolver::new(&mut *registry).resolve(node, set)?;
      needed.extend(
        closure
          .nodes()
          .filter(|member| !member.is_source() && !member.is_aggregator())
          .map(|member| member.coordinate.clone()),
      );
    }
  }
  for coordinate in &needed {
    registry.store_mut().materialize(coordinate, ArtifactKind::Archive)?;
  }
  debug!(artifacts = needed.len(), "gather complete");
  Ok(needed)
}
