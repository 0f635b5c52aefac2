use std::fmt;
use std::path::{Path, PathBuf};

use crate::project::Coordinate;

/// What is being fetched or installed for a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
  /// The project descriptor (`.pom`).
  Descriptor,
  /// The compiled archive (`.jar`).
  Archive,
  /// The merged archive with dependencies (`-jar-with-dependencies.jar`).
  Assembly,
}

impl ArtifactKind {
  pub fn suffix(&self) -> &'static str {
    match self {
      ArtifactKind::Descriptor => ".pom",
      ArtifactKind::Archive => ".jar",
      ArtifactKind::Assembly => "-jar-with-dependencies.jar",
    }
  }
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ArtifactKind::Descriptor => write!(f, "descriptor"),
      ArtifactKind::Archive => write!(f, "archive"),
      ArtifactKind::Assembly => write!(f, "assembly"),
    }
  }
}

/// Repository-relative path: `<group/with/slashes>/<artifact>/<version>/<artifact>-<version><suffix>`.
///
/// Always uses forward slashes; it doubles as the remote URL path.
pub fn artifact_path(coordinate: &Coordinate, kind: ArtifactKind) -> String {
  format!(
    "{}/{}/{}/{}{}",
    coordinate.group.replace('.', "/"),
    coordinate.artifact,
    coordinate.version,
    coordinate.file_stem(),
    kind.suffix()
  )
}

/// Location of an artifact inside a local repository.
pub fn local_artifact_path(local_repo: &Path, coordinate: &Coordinate, kind: ArtifactKind) -> PathBuf {
  artifact_path(coordinate, kind)
    .split('/')
    .fold(local_repo.to_path_buf(), |path, part| path.join(part))
}

/// Normalizes a repository base URL to end with `/`.
pub fn normalize_repository_url(url: &str) -> String {
  let url = url.trim();
  if url.ends_with('/') {
    url.to_string()
  } else {
    format!("{}/", url)
  }
}
