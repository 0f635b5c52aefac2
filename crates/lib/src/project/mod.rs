//! In-memory project model.
//!
//! A [`ProjectNode`] is created once per coordinate by the
//! [`ProjectRegistry`](registry::ProjectRegistry) and shared through `Rc`
//! afterwards. Nodes with a source directory are built from local files;
//! nodes without one are fetched as pre-built archives.

pub mod depset;
pub mod descriptor;
pub mod properties;
pub mod registry;
mod types;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub use depset::{DepSet, DependencySets, Scope};
pub use registry::ProjectRegistry;
pub use types::{Coordinate, DescriptorError, Ga, Packaging, ProjectError, SourceGroup};

use crate::consts::TARGET_DIR_NAME;
use crate::project::properties::{PropertyContext, PropertyError, PropertyScope};
use crate::resolve::CoordinateResolver;

/// One resolved project.
pub struct ProjectNode {
  pub coordinate: Coordinate,
  /// Properties after parent inheritance and defaults, before templating.
  pub properties: BTreeMap<String, String>,
  /// Present for source nodes only.
  pub source_dir: Option<PathBuf>,
  pub parent: Option<Rc<ProjectNode>>,
  pub packaging: Packaging,
  pub dependencies: DependencySets,
  /// This project's total contribution to version knowledge.
  pub resolvers: BTreeMap<Ga, Rc<dyn CoordinateResolver>>,
  /// Module descriptors aggregated by this project.
  pub modules: Vec<PathBuf>,
  pub main_class: Option<String>,
  pub compiler_args: Vec<String>,
  /// Verbatim descriptor bytes, embedded into archives and installed as-is.
  pub descriptor: Vec<u8>,
}

impl ProjectNode {
  /// A bare node with no dependencies, used as a starting point by loaders and tests.
  pub fn new(coordinate: Coordinate) -> Self {
    Self {
      coordinate,
      properties: BTreeMap::new(),
      source_dir: None,
      parent: None,
      packaging: Packaging::Jar,
      dependencies: DependencySets::new(),
      resolvers: BTreeMap::new(),
      modules: Vec::new(),
      main_class: None,
      compiler_args: Vec::new(),
      descriptor: Vec::new(),
    }
  }

  pub fn ga(&self) -> Ga {
    self.coordinate.ga()
  }

  pub fn is_source(&self) -> bool {
    self.source_dir.is_some()
  }

  /// Aggregators (`pom` packaging) produce no code and no archive.
  pub fn is_aggregator(&self) -> bool {
    self.packaging == Packaging::Pom
  }

  pub fn scope(&self) -> PropertyScope<'_> {
    PropertyScope {
      properties: &self.properties,
      basedir: self.source_dir.as_deref(),
    }
  }

  pub fn property(&self, ctx: &PropertyContext, key: &str) -> Result<String, PropertyError> {
    ctx.lookup(Some(&self.scope()), key)
  }

  pub fn target_dir(&self) -> Option<PathBuf> {
    self.source_dir.as_ref().map(|d| d.join(TARGET_DIR_NAME))
  }

  /// `target/classes` or `target/test-classes`.
  pub fn output_dir(&self, group: SourceGroup) -> Option<PathBuf> {
    self.target_dir().map(|t| t.join(group.output_dir_name()))
  }

  /// `target/<artifact>-<version><suffix>`.
  pub fn target_artifact(&self, suffix: &str) -> Option<PathBuf> {
    self
      .target_dir()
      .map(|t| t.join(format!("{}{}", self.coordinate.file_stem(), suffix)))
  }

  /// Resolves a path-valued property against the source directory.
  pub fn path_property(&self, ctx: &PropertyContext, key: &str) -> Result<PathBuf, PropertyError> {
    let value = PathBuf::from(self.property(ctx, key)?);
    Ok(match &self.source_dir {
      Some(dir) if value.is_relative() => dir.join(value),
      _ => value,
    })
  }

  pub fn source_path(&self, ctx: &PropertyContext, group: SourceGroup) -> Result<PathBuf, PropertyError> {
    self.path_property(ctx, group.source_dir_property())
  }

  pub fn resource_path(&self, ctx: &PropertyContext, group: SourceGroup) -> Result<PathBuf, PropertyError> {
    self.path_property(ctx, group.resource_dir_property())
  }

  pub fn source_dir(&self) -> Option<&Path> {
    self.source_dir.as_deref()
  }
}

impl fmt::Debug for ProjectNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ProjectNode")
      .field("coordinate", &self.coordinate.to_string())
      .field("source_dir", &self.source_dir)
      .field("packaging", &self.packaging)
      .finish_non_exhaustive()
  }
}

impl fmt::Display for ProjectNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.coordinate)
  }
}
