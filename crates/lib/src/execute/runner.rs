//! Test discovery and runner invocation.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info};

use crate::execute::{BuildScheduler, ExecuteError, LaunchSpec};
use crate::project::{DepSet, ProjectNode, ProjectRegistry, SourceGroup};
use crate::resolve::ClosureResolver;
use crate::store::ArtifactKind;
use crate::util::fs::{join_relative, join_search_path, list_relative_files};

/// Class names under `classes_dir` whose bytes contain `marker`.
///
/// Nested classes (`$` in the path) are never tests. An empty marker matches every class.
pub fn discover_tests(classes_dir: &Path, marker: &str) -> Result<Vec<String>, ExecuteError> {
  let marker = marker.as_bytes();
  let mut tests = Vec::new();
  for relative in list_relative_files(classes_dir)? {
    let Some(stem) = relative.strip_suffix(".class") else {
      continue;
    };
    if relative.contains('$') {
      continue;
    }
    let bytes = fs::read(join_relative(classes_dir, &relative))?;
    if marker.is_empty() || bytes.windows(marker.len()).any(|w| w == marker) {
      tests.push(stem.replace('/', "."));
    }
  }
  Ok(tests)
}

/// Classpath entries needed to run the tests of `node`.
///
/// Source members contribute both output directories, repository members
/// their archive. Aggregators contribute nothing. Entries are sorted by path.
pub fn test_runtime_classpath(
  registry: &mut ProjectRegistry,
  node: &Rc<ProjectNode>,
) -> Result<Vec<PathBuf>, ExecuteError> {
  let closure = ClosureResolver::new(&mut *registry).resolve(node, DepSet::RootTest)?;
  let mut classpath = BTreeSet::new();
  for member in closure.nodes() {
    if member.is_aggregator() {
      continue;
    }
    if member.is_source() {
      classpath.extend(member.output_dir(SourceGroup::Main));
      classpath.extend(member.output_dir(SourceGroup::Test));
    } else {
      classpath.insert(registry.store_mut().materialize(&member.coordinate, ArtifactKind::Archive)?);
    }
  }
  Ok(classpath.into_iter().collect())
}

/// Starts one test runner for `node` if it has any test classes.
pub fn begin_test(
  scheduler: &mut BuildScheduler<'_>,
  registry: &mut ProjectRegistry,
  node: &Rc<ProjectNode>,
) -> Result<(), ExecuteError> {
  let ctx = registry.properties().clone();
  let (Some(source_dir), Some(classes)) = (node.source_dir(), node.output_dir(SourceGroup::Test)) else {
    return Ok(());
  };

  let tests = discover_tests(&classes, &node.property(&ctx, "lmvn.testMarker")?)?;
  if tests.is_empty() {
    debug!(project = %node.coordinate, "no tests found");
    return Ok(());
  }
  info!(project = %node.coordinate, count = tests.len(), "running tests");

  let classpath = test_runtime_classpath(registry, node)?;
  let mut spec = LaunchSpec::new(format!("{} tests", node.coordinate), node.property(&ctx, "lmvn.java")?)
    .current_dir(source_dir);
  if !classpath.is_empty() {
    spec = spec.arg("-classpath").arg(join_search_path(&classpath));
  }
  spec = spec.arg(node.property(&ctx, "lmvn.testMainClass")?).args(tests);
  scheduler.launch(spec)
}
