//! Compiler invocation.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::Builder;
use tracing::{debug, info};

use crate::execute::{BuildScheduler, ExecuteError, LaunchSpec};
use crate::project::properties::PropertyContext;
use crate::project::{DepSet, ProjectNode, ProjectRegistry, SourceGroup};
use crate::resolve::ClosureResolver;
use crate::store::ArtifactKind;
use crate::util::fs::{copy_tree, join_relative, join_search_path, list_relative_files};

/// Where the compiler looks for code a project depends on.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SearchPaths {
  /// Pre-built archives of repository dependencies.
  pub binary: BTreeSet<PathBuf>,
  /// Source trees of source dependencies, compiled alongside.
  pub source: BTreeSet<PathBuf>,
}

/// Dependency set whose closure a compile of `group` needs.
pub fn compile_set(group: SourceGroup) -> DepSet {
  match group {
    SourceGroup::Main => DepSet::RootMainCompile,
    SourceGroup::Test => DepSet::RootTest,
  }
}

/// Splits the compile closure of `node` into binary and source search paths.
///
/// The node's own source tree for `group` is always on the source path.
pub fn search_paths(
  registry: &mut ProjectRegistry,
  node: &Rc<ProjectNode>,
  group: SourceGroup,
) -> Result<SearchPaths, ExecuteError> {
  let closure = ClosureResolver::new(&mut *registry).resolve(node, compile_set(group))?;
  let mut paths = SearchPaths::default();

  for member in closure.nodes() {
    if member.is_aggregator() {
      continue;
    }
    if member.is_source() {
      paths
        .source
        .insert(member.source_path(registry.properties(), SourceGroup::Main)?);
    } else {
      let archive = registry.store_mut().materialize(&member.coordinate, ArtifactKind::Archive)?;
      paths.binary.insert(archive);
    }
  }
  paths.source.insert(node.source_path(registry.properties(), group)?);
  Ok(paths)
}

/// Builds the response-file lines for compiling `sources` into `out`.
pub fn compiler_arguments(
  ctx: &PropertyContext,
  node: &ProjectNode,
  out: &Path,
  paths: &SearchPaths,
  sources: &[PathBuf],
) -> Result<Vec<String>, ExecuteError> {
  let property = |key: &str| node.property(ctx, key);
  let mut args = vec!["-d".to_string(), out.display().to_string(), "-implicit:none".to_string()];

  if !paths.source.is_empty() {
    args.push("-sourcepath".to_string());
    args.push(join_search_path(&paths.source));
  }
  if !paths.binary.is_empty() {
    args.push("-classpath".to_string());
    args.push(join_search_path(&paths.binary));
  }

  for (flag, key) in [
    ("-encoding", "project.build.sourceEncoding"),
    ("-source", "maven.compiler.source"),
    ("-target", "maven.compiler.target"),
    ("-release", "maven.compiler.release"),
  ] {
    let value = property(key)?;
    if !value.is_empty() {
      args.push(flag.to_string());
      args.push(value);
    }
  }

  if property("maven.compiler.showWarnings")? != "true" {
    args.push("-nowarn".to_string());
  }
  args.push(if property("maven.compiler.debug")? == "true" { "-g" } else { "-g:none" }.to_string());
  for (flag, key) in [
    ("-parameters", "maven.compiler.parameters"),
    ("-verbose", "maven.compiler.verbose"),
    ("-deprecation", "maven.compiler.showDeprecation"),
  ] {
    if property(key)? == "true" {
      args.push(flag.to_string());
    }
  }

  args.extend(node.compiler_args.iter().cloned());
  args.extend(sources.iter().map(|s| s.display().to_string()));
  Ok(args)
}

/// `.java` files under `dir`, sorted.
pub fn java_sources(dir: &Path) -> Result<Vec<PathBuf>, ExecuteError> {
  Ok(
    list_relative_files(dir)?
      .into_iter()
      .filter(|f| f.ends_with(".java"))
      .map(|f| join_relative(dir, &f))
      .collect(),
  )
}

/// Writes one argument per line, quoting anything the compiler would split.
fn write_response_file(args: &[String]) -> Result<tempfile::TempPath, ExecuteError> {
  let mut file = Builder::new().prefix("javac").suffix(".rsp").tempfile()?;
  for arg in args {
    if arg.contains([' ', '\t', '"', '\'', '\\', '#']) {
      writeln!(file, "\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))?;
    } else {
      writeln!(file, "{}", arg)?;
    }
  }
  file.flush()?;
  Ok(file.into_temp_path())
}

/// Starts compiling `group` of `node` and queues the resource copy behind it.
///
/// Nothing is launched when the group has no sources; resources are still copied.
pub fn begin_compile(
  scheduler: &mut BuildScheduler<'_>,
  registry: &mut ProjectRegistry,
  node: &Rc<ProjectNode>,
  group: SourceGroup,
) -> Result<(), ExecuteError> {
  let ctx = registry.properties().clone();
  let Some(out) = node.output_dir(group) else {
    return Ok(());
  };
  fs::create_dir_all(&out)?;
  let label = format!("{} {}", node.coordinate, group);

  let sources = java_sources(&node.source_path(&ctx, group)?)?;
  if sources.is_empty() {
    debug!(label = %label, "no sources to compile");
  } else {
    let paths = search_paths(registry, node, group)?;
    let args = compiler_arguments(&ctx, node, &out, &paths, &sources)?;
    let response_file = write_response_file(&args)?;
    let compiler = node.property(&ctx, "maven.compiler.executable")?;
    info!(project = %node.coordinate, group = %group, files = sources.len(), "compiling");

    let mut spec = LaunchSpec::new(label.clone(), compiler).arg(format!("@{}", response_file.display()));
    spec.response_file = Some(response_file);
    scheduler.launch(spec)?;
  }

  let resources = node.resource_path(&ctx, group)?;
  scheduler.defer(format!("{} resources", label), move || {
    let copied = copy_tree(&resources, &out)?;
    debug!(from = %resources.display(), copied, "resources copied");
    Ok(())
  });
  Ok(())
}
