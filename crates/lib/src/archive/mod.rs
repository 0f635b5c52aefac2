//! Archive assembly.
//!
//! A project's single archive holds its generated manifest, a copy of its
//! descriptor and everything under `target/classes`. The merged archive
//! layers the single archives of the whole `ROOT_MAIN_PACKAGE` closure:
//! dependencies first in coordinate order, the project itself last, and
//! finally a manifest without `Class-Path`.

mod manifest;

use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info};

pub use manifest::{ArchiveManifest, EntrySource, MANIFEST_PATH};

use crate::consts::{APP_NAME, VERSION};
use crate::project::{Coordinate, DepSet, ProjectNode, ProjectRegistry, SourceGroup};
use crate::resolve::{ClosureResolver, ResolveError, ResolvedClosure};
use crate::store::{ArtifactKind, StoreError};
use crate::util::fs::{join_relative, list_relative_files};

/// Maximum manifest line length in bytes, excluding the line break.
const MANIFEST_LINE_LIMIT: usize = 72;

/// Errors from archive assembly. Nothing is committed when one occurs.
#[derive(Debug, Error)]
pub enum ArchiveError {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("zip error: {0}")]
  Zip(#[from] zip::result::ZipError),

  /// A source project has not been compiled.
  #[error("{coordinate}: compiled output {path} is missing")]
  MissingOutput { coordinate: Coordinate, path: PathBuf },

  #[error(transparent)]
  Resolve(#[from] ResolveError),

  #[error(transparent)]
  Store(#[from] StoreError),
}

/// Paths written by [`ArchiveAssembler::package`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutput {
  pub archive: PathBuf,
  pub assembly: PathBuf,
}

/// Builds archives for the projects of one registry.
pub struct ArchiveAssembler<'r> {
  registry: &'r mut ProjectRegistry,
}

impl<'r> ArchiveAssembler<'r> {
  pub fn new(registry: &'r mut ProjectRegistry) -> Self {
    Self { registry }
  }

  /// Manifest text for `node`. The merged-archive form (`assembly`) has no `Class-Path`.
  pub fn manifest_header(&mut self, node: &Rc<ProjectNode>, assembly: bool) -> Result<String, ArchiveError> {
    let mut lines = vec![
      "Manifest-Version: 1.0".to_string(),
      format!("Created-By: {} {}", APP_NAME, VERSION),
    ];

    if !assembly {
      let closure = ClosureResolver::new(&mut *self.registry).resolve(node, DepSet::RootMainRuntime)?;
      let jars: Vec<String> = closure
        .nodes()
        .filter(|member| member.coordinate != node.coordinate && !member.is_aggregator())
        .map(|member| format!("{}{}", member.coordinate.file_stem(), ArtifactKind::Archive.suffix()))
        .collect();
      if !jars.is_empty() {
        lines.push(format!("Class-Path: {}", jars.join(" ")));
      }
    }

    if let Some(main_class) = &node.main_class {
      lines.push(format!("Main-Class: {}", main_class));
    }

    let mut text = String::new();
    for line in lines {
      text.push_str(&wrap_manifest_line(&line));
    }
    Ok(text)
  }

  /// Entries of the single archive of `node`.
  ///
  /// Aggregators have none. Repository nodes contribute the entries of their fetched archive.
  pub fn build_archive(&mut self, node: &Rc<ProjectNode>) -> Result<ArchiveManifest, ArchiveError> {
    let mut manifest = ArchiveManifest::new();
    if node.is_aggregator() {
      return Ok(manifest);
    }

    let Some(classes) = node.output_dir(SourceGroup::Main) else {
      let jar = self
        .registry
        .store_mut()
        .materialize(&node.coordinate, ArtifactKind::Archive)?;
      return ArchiveManifest::from_archive(&jar);
    };
    if !classes.is_dir() {
      return Err(ArchiveError::MissingOutput {
        coordinate: node.coordinate.clone(),
        path: classes,
      });
    }

    let coordinate = &node.coordinate;
    let meta = format!("META-INF/maven/{}/{}", coordinate.group, coordinate.artifact);
    manifest.insert_bytes(MANIFEST_PATH, self.manifest_header(node, false)?);
    manifest.insert_bytes(format!("{}/pom.xml", meta), node.descriptor.clone());
    manifest.insert_bytes(
      format!("{}/pom.properties", meta),
      format!(
        "groupId={}\nartifactId={}\nversion={}\n",
        coordinate.group, coordinate.artifact, coordinate.version
      ),
    );
    for relative in list_relative_files(&classes)? {
      let source = EntrySource::File(join_relative(&classes, &relative));
      manifest.insert(relative, source);
    }
    Ok(manifest)
  }

  /// Entries of the merged archive of `node` over its package `closure`.
  pub fn build_package_with_dependencies(
    &mut self,
    node: &Rc<ProjectNode>,
    closure: &ResolvedClosure,
  ) -> Result<ArchiveManifest, ArchiveError> {
    let mut manifest = ArchiveManifest::new();
    for member in closure.by_coordinate() {
      if member.coordinate == node.coordinate {
        continue;
      }
      debug!(project = %node.coordinate, member = %member.coordinate, "merging");
      manifest.merge(self.build_archive(&member)?);
    }
    manifest.merge(self.build_archive(node)?);
    manifest.insert_bytes(MANIFEST_PATH, self.manifest_header(node, true)?);
    Ok(manifest)
  }

  /// Writes the single and merged archives of a source project into its `target` directory.
  ///
  /// Returns `None` for aggregators and repository nodes.
  pub fn package(&mut self, node: &Rc<ProjectNode>) -> Result<Option<PackageOutput>, ArchiveError> {
    let (Some(archive), Some(assembly)) = (
      node.target_artifact(ArtifactKind::Archive.suffix()),
      node.target_artifact(ArtifactKind::Assembly.suffix()),
    ) else {
      return Ok(None);
    };
    if node.is_aggregator() {
      return Ok(None);
    }

    info!(project = %node.coordinate, "packaging");
    self.build_archive(node)?.write_to(&archive)?;

    let closure = ClosureResolver::new(&mut *self.registry).resolve(node, DepSet::RootMainPackage)?;
    self
      .build_package_with_dependencies(node, &closure)?
      .write_to(&assembly)?;

    Ok(Some(PackageOutput { archive, assembly }))
  }
}

/// Splits a header line into 72-byte lines with single-space continuations, CRLF-terminated.
fn wrap_manifest_line(line: &str) -> String {
  let mut out = String::new();
  let mut rest = line;
  let mut limit = MANIFEST_LINE_LIMIT;
  while rest.len() > limit {
    let mut cut = limit;
    while !rest.is_char_boundary(cut) {
      cut -= 1;
    }
    out.push_str(&rest[..cut]);
    out.push_str("\r\n ");
    rest = &rest[cut..];
    limit = MANIFEST_LINE_LIMIT - 1;
  }
  out.push_str(rest);
  out.push_str("\r\n");
  out
}
