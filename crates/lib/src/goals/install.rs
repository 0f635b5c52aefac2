//! Copying build output and loose files into the local repository.
//!
//! Every file is staged next to its destination and renamed into place. The
//! descriptor goes last, so an interrupted install never leaves a descriptor
//! without its archives.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::consts::POM_PACKAGING;
use crate::goals::GoalError;
use crate::project::{Coordinate, ProjectNode, ProjectRegistry};
use crate::store::{ArtifactKind, ArtifactStore};

/// Installs the descriptor of `node` and, unless it is an aggregator, both packaged archives.
///
/// Nothing is written unless every packaged archive exists.
pub fn install_node(store: &ArtifactStore, node: &ProjectNode) -> Result<(), GoalError> {
  let coordinate = &node.coordinate;
  let mut built = Vec::new();
  if !node.is_aggregator() {
    for kind in [ArtifactKind::Archive, ArtifactKind::Assembly] {
      let path = node
        .target_artifact(kind.suffix())
        .unwrap_or_else(|| PathBuf::from(kind.suffix()));
      if !path.is_file() {
        return Err(GoalError::NotPackaged {
          coordinate: coordinate.clone(),
          path,
        });
      }
      built.push((kind, path));
    }
  }

  let mut staged = Vec::new();
  for (kind, path) in built {
    let dest = store.local_path(coordinate, kind);
    staged.push((stage_copy(&path, &dest)?, dest));
  }
  let dest = store.local_path(coordinate, ArtifactKind::Descriptor);
  staged.push((stage_bytes(&dest, &node.descriptor)?, dest));

  info!(project = %coordinate, repo = %store.local_repo().display(), "installing");
  commit(staged)
}

/// The `install-file` goal.
///
/// Takes `-Dfile` plus either `-DpomFile` or the four coordinate properties
/// `groupId`, `artifactId`, `version` and `packaging`.
pub fn install_file(registry: &mut ProjectRegistry) -> Result<(), GoalError> {
  let ctx = registry.properties();
  let require = |property: &'static str| {
    ctx.cmdline(property).map(str::to_string).ok_or(GoalError::MissingProperty {
      goal: "install-file",
      property,
    })
  };
  let file = PathBuf::from(require("file")?);
  let pom_file = ctx.cmdline("pomFile").map(PathBuf::from);

  let (coordinate, packaging) = if let Some(pom) = &pom_file {
    let node = registry.load_repository(pom)?;
    (node.coordinate.clone(), node.packaging.as_str().to_string())
  } else {
    (
      Coordinate::new(require("groupId")?, require("artifactId")?, require("version")?),
      require("packaging")?,
    )
  };

  let store = registry.store();
  let mut staged = Vec::new();
  if packaging != POM_PACKAGING {
    let dest = store.local_path(&coordinate, ArtifactKind::Archive);
    staged.push((stage_copy(&file, &dest)?, dest));
  }
  let dest = store.local_path(&coordinate, ArtifactKind::Descriptor);
  let descriptor = match pom_file {
    Some(pom) => stage_copy(&pom, &dest)?,
    None => stage_bytes(&dest, dummy_descriptor(&coordinate, &packaging).as_bytes())?,
  };
  staged.push((descriptor, dest));
  commit(staged)?;
  info!(artifact = %coordinate, "installed file");
  Ok(())
}

/// Minimal descriptor for a file installed without one.
pub fn dummy_descriptor(coordinate: &Coordinate, packaging: &str) -> String {
  format!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
     <project xmlns=\"http://maven.apache.org/POM/4.0.0\" \
     xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" \
     xsi:schemaLocation=\"http://maven.apache.org/POM/4.0.0 https://maven.apache.org/xsd/maven-4.0.0.xsd\">\n\
     <modelVersion>4.0.0</modelVersion>\n\
     <groupId>{}</groupId>\n\
     <artifactId>{}</artifactId>\n\
     <version>{}</version>\n\
     <packaging>{}</packaging>\n\
     </project>\n",
    coordinate.group, coordinate.artifact, coordinate.version, packaging
  )
}

fn staging_file(dest: &Path) -> io::Result<NamedTempFile> {
  let dir = dest.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir)?;
  NamedTempFile::new_in(dir)
}

fn stage_bytes(dest: &Path, bytes: &[u8]) -> io::Result<NamedTempFile> {
  let mut staging = staging_file(dest)?;
  staging.write_all(bytes)?;
  Ok(staging)
}

fn stage_copy(from: &Path, dest: &Path) -> io::Result<NamedTempFile> {
  let mut source = File::open(from)?;
  let mut staging = staging_file(dest)?;
  io::copy(&mut source, &mut staging)?;
  Ok(staging)
}

/// Renames staged files into place in order.
fn commit(staged: Vec<(NamedTempFile, PathBuf)>) -> Result<(), GoalError> {
  for (staging, dest) in staged {
    staging.persist(&dest).map_err(io::Error::from)?;
    debug!(path = %dest.display(), "installed");
  }
  Ok(())
}
