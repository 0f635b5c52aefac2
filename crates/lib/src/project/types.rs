//! Coordinate types and project-level errors.

use std::cmp::Ordering;
use std::fmt;
use std::iter::once;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::project::properties::PropertyError;
use crate::store::StoreError;

/// Version-independent `group:artifact` key.
///
/// Stored in its joined form so that ordering is plain lexicographic order of
/// the `group:artifact` string, which is what dependency sets iterate by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ga(String);

impl Ga {
  pub fn new(group: &str, artifact: &str) -> Self {
    Self(format!("{}:{}", group, artifact))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn group(&self) -> &str {
    self.0.split_once(':').map_or(self.0.as_str(), |(group, _)| group)
  }

  pub fn artifact(&self) -> &str {
    self.0.split_once(':').map_or("", |(_, artifact)| artifact)
  }
}

impl fmt::Display for Ga {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// A `(group, artifact, version)` triple identifying one buildable or fetchable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
  pub group: String,
  pub artifact: String,
  pub version: String,
}

impl Coordinate {
  pub fn new(group: impl Into<String>, artifact: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      group: group.into(),
      artifact: artifact.into(),
      version: version.into(),
    }
  }

  pub fn ga(&self) -> Ga {
    Ga::new(&self.group, &self.artifact)
  }

  /// `artifact-version`, the stem of every file this coordinate produces.
  pub fn file_stem(&self) -> String {
    format!("{}-{}", self.artifact, self.version)
  }

  fn sort_key(&self) -> impl Iterator<Item = u8> + '_ {
    self
      .group
      .bytes()
      .chain(once(b':'))
      .chain(self.artifact.bytes())
      .chain(once(b':'))
      .chain(self.version.bytes())
  }
}

impl fmt::Display for Coordinate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
  }
}

// Ordered as the `g:a:v` string, matching the order archives are merged in.
impl Ord for Coordinate {
  fn cmp(&self, other: &Self) -> Ordering {
    self.sort_key().cmp(other.sort_key())
  }
}

impl PartialOrd for Coordinate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl FromStr for Coordinate {
  type Err = ProjectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
      [group, artifact, version] if !group.is_empty() && !artifact.is_empty() && !version.is_empty() => {
        Ok(Coordinate::new(*group, *artifact, *version))
      }
      _ => Err(ProjectError::InvalidCoordinate(s.to_string())),
    }
  }
}

/// Whether a project produces an archive or only aggregates other projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
  Jar,
  Pom,
}

impl Packaging {
  /// Anything other than `pom` builds a plain archive.
  pub fn parse(value: &str) -> Self {
    if value == crate::consts::POM_PACKAGING {
      Packaging::Pom
    } else {
      Packaging::Jar
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Packaging::Jar => "jar",
      Packaging::Pom => "pom",
    }
  }
}

/// The two source trees of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceGroup {
  Main,
  Test,
}

impl SourceGroup {
  pub fn name(&self) -> &'static str {
    match self {
      SourceGroup::Main => "main",
      SourceGroup::Test => "test",
    }
  }

  /// Directory under `target/` receiving compiled output.
  pub fn output_dir_name(&self) -> &'static str {
    match self {
      SourceGroup::Main => "classes",
      SourceGroup::Test => "test-classes",
    }
  }

  pub fn source_dir_property(&self) -> &'static str {
    match self {
      SourceGroup::Main => "project.build.sourceDirectory",
      SourceGroup::Test => "project.build.testSourceDirectory",
    }
  }

  pub fn resource_dir_property(&self) -> &'static str {
    match self {
      SourceGroup::Main => "project.build.resources.resource.directory",
      SourceGroup::Test => "project.build.testResources.testResource.directory",
    }
  }
}

impl fmt::Display for SourceGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())
  }
}

/// Errors raised while turning a descriptor into a [`ProjectNode`](super::ProjectNode).
#[derive(Debug, Error)]
pub enum DescriptorError {
  /// The descriptor file could not be read.
  #[error("cannot read descriptor {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The document is not well-formed XML or has no `<project>` root.
  #[error("malformed descriptor {origin}: {message}")]
  Malformed { origin: String, message: String },

  /// A required element is absent.
  #[error("{origin}: unable to find element <{element}>")]
  MissingElement { origin: String, element: String },

  /// Group, artifact or version templated to an empty string.
  #[error("{origin}: missing key property in {triple}")]
  MissingCoordinate { origin: String, triple: String },

  /// A `<parent>` reference carries no usable version.
  #[error("{origin}: parent project {ga} has no version")]
  UnversionedParent { origin: String, ga: String },

  /// An `import`-scoped dependency carries no usable version.
  #[error("{origin}: imported project {ga} has no version")]
  UnversionedImport { origin: String, ga: String },

  /// The descriptor is reached again while it is still being loaded.
  #[error("descriptor {path} refers back to itself while loading")]
  Cycle { path: PathBuf },

  /// A `${...}` expression inside the descriptor could not be expanded.
  #[error("{origin}: {source}")]
  Property {
    origin: String,
    #[source]
    source: PropertyError,
  },
}

/// Errors produced while obtaining a project node.
#[derive(Debug, Error)]
pub enum ProjectError {
  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  /// The descriptor of a referenced coordinate could not be materialized.
  #[error(transparent)]
  Store(#[from] StoreError),

  /// Text that should have been `group:artifact:version`.
  #[error("invalid coordinate: {0}")]
  InvalidCoordinate(String),
}
