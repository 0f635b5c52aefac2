//! Local artifact repository backed by remote repositories.
//!
//! # Layout
//!
//! ```text
//! <local repo>/
//! └── org/example/                # group, dots become directories
//!     └── widget/                 # artifact
//!         └── 1.0/                # version
//!             ├── widget-1.0.pom
//!             ├── widget-1.0.jar
//!             └── widget-1.0-jar-with-dependencies.jar
//! ```
//!
//! Remote repositories mirror the same layout below their base URL. A file
//! present locally is never fetched again.

mod fetch;
pub mod paths;

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use paths::{ArtifactKind, artifact_path, local_artifact_path, normalize_repository_url};

use crate::project::{Coordinate, Ga};

/// Errors from [`ArtifactStore`].
#[derive(Debug, Error)]
pub enum StoreError {
  /// The file is not in the local repository and the store is offline.
  #[error("{coordinate}: {path} not found in the local repository (offline)")]
  NotFoundOffline { coordinate: Coordinate, path: PathBuf },

  /// No configured repository could supply the file.
  #[error("{coordinate}: unable to download {path} from any repository")]
  ArtifactUnavailable { coordinate: Coordinate, path: PathBuf },

  #[error("I/O error: {0}")]
  Io(#[from] io::Error),
}

/// Resolves coordinates to files in the local repository, downloading on demand.
pub struct ArtifactStore {
  local_repo: PathBuf,
  repositories: Vec<String>,
  offline: bool,
  /// Repository that last served each GA; tried first next time.
  origins: HashMap<Ga, String>,
  fetcher: Box<dyn Fetcher>,
}

impl ArtifactStore {
  pub fn new(local_repo: impl Into<PathBuf>, fetcher: Box<dyn Fetcher>) -> Self {
    Self {
      local_repo: local_repo.into(),
      repositories: Vec::new(),
      offline: false,
      origins: HashMap::new(),
      fetcher,
    }
  }

  pub fn local_repo(&self) -> &Path {
    &self.local_repo
  }

  pub fn repositories(&self) -> &[String] {
    &self.repositories
  }

  pub fn is_offline(&self) -> bool {
    self.offline
  }

  pub fn set_offline(&mut self, offline: bool) {
    self.offline = offline;
  }

  /// Appends a repository base URL unless it is already known.
  pub fn add_repository(&mut self, url: &str) {
    let url = normalize_repository_url(url);
    if !self.repositories.contains(&url) {
      debug!(url = %url, "repository added");
      self.repositories.push(url);
    }
  }

  /// Where `coordinate`'s artifact of `kind` lives (or will live) locally.
  pub fn local_path(&self, coordinate: &Coordinate, kind: ArtifactKind) -> PathBuf {
    local_artifact_path(&self.local_repo, coordinate, kind)
  }

  /// Returns the local path of the artifact, downloading it first if needed.
  ///
  /// Repositories are tried in order, starting with the one that last served
  /// this GA. Individual transfer failures are logged and skipped; only when
  /// every repository failed is an error returned.
  pub fn materialize(&mut self, coordinate: &Coordinate, kind: ArtifactKind) -> Result<PathBuf, StoreError> {
    let local = self.local_path(coordinate, kind);
    if local.is_file() {
      return Ok(local);
    }
    if self.offline {
      return Err(StoreError::NotFoundOffline {
        coordinate: coordinate.clone(),
        path: local,
      });
    }

    let relative = artifact_path(coordinate, kind);
    let ga = coordinate.ga();
    let cached = self.origins.get(&ga).cloned();
    let candidates = cached
      .iter()
      .chain(self.repositories.iter().filter(|repo| Some(*repo) != cached.as_ref()));

    for repo in candidates {
      let url = format!("{}{}", repo, relative);
      info!(url = %url, "downloading");
      match self.fetcher.fetch(&url, &local) {
        Ok(()) => {
          let repo = repo.clone();
          self.origins.insert(ga, repo);
          return Ok(local);
        }
        Err(e) => warn!(url = %url, error = %e, "download failed"),
      }
    }

    warn!(coordinate = %coordinate, kind = %kind, "artifact unavailable");
    Err(StoreError::ArtifactUnavailable {
      coordinate: coordinate.clone(),
      path: local,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;

  use mockito::Server;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn store(dir: &TempDir) -> ArtifactStore {
    ArtifactStore::new(dir.path(), Box::new(HttpFetcher::new().unwrap()))
  }

  fn coord() -> Coordinate {
    Coordinate::new("org.example", "widget", "1.0")
  }

  const POM_PATH: &str = "/org/example/widget/1.0/widget-1.0.pom";

  #[test]
  fn local_hit_needs_no_repository() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    let path = store.local_path(&coord(), ArtifactKind::Descriptor);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "<project/>").unwrap();

    store.set_offline(true);
    assert_eq!(store.materialize(&coord(), ArtifactKind::Descriptor).unwrap(), path);
  }

  #[test]
  fn offline_miss_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    store.set_offline(true);
    let err = store.materialize(&coord(), ArtifactKind::Archive).unwrap_err();
    assert!(matches!(err, StoreError::NotFoundOffline { .. }));
  }

  #[test]
  fn downloads_from_first_repository_that_has_it() {
    let mut missing = Server::new();
    let miss = missing.mock("GET", POM_PATH).with_status(404).create();
    let mut present = Server::new();
    let hit = present
      .mock("GET", POM_PATH)
      .with_status(200)
      .with_body("<project/>")
      .create();

    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    store.add_repository(&missing.url());
    store.add_repository(&present.url());

    let path = store.materialize(&coord(), ArtifactKind::Descriptor).unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "<project/>");
    miss.assert();
    hit.assert();
  }

  #[test]
  fn origin_repository_is_tried_first() {
    let mut first = Server::new();
    let mut second = Server::new();
    let jar_path = "/org/example/widget/1.0/widget-1.0.jar";
    second.mock("GET", POM_PATH).with_status(200).with_body("<project/>").create();
    let skipped = first.mock("GET", jar_path).expect(0).create();
    let served = second.mock("GET", jar_path).with_status(200).with_body("PK").create();
    first.mock("GET", POM_PATH).with_status(404).create();

    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    store.add_repository(&first.url());
    store.add_repository(&second.url());

    store.materialize(&coord(), ArtifactKind::Descriptor).unwrap();
    store.materialize(&coord(), ArtifactKind::Archive).unwrap();
    skipped.assert();
    served.assert();
  }

  #[test]
  fn failure_names_the_coordinate() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    let err = store.materialize(&coord(), ArtifactKind::Descriptor).unwrap_err();
    assert!(matches!(err, StoreError::ArtifactUnavailable { .. }));
    assert!(err.to_string().contains("org.example:widget:1.0"));
    assert!(!store.local_path(&coord(), ArtifactKind::Descriptor).exists());
  }

  #[test]
  fn failed_download_leaves_no_file() {
    let mut server = Server::new();
    server.mock("GET", POM_PATH).with_status(500).create();
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    store.add_repository(&server.url());

    assert!(store.materialize(&coord(), ArtifactKind::Descriptor).is_err());
    assert!(!store.local_path(&coord(), ArtifactKind::Descriptor).exists());
  }

  #[test]
  #[traced_test]
  fn each_failed_download_is_a_warning() {
    let mut server = Server::new();
    server.mock("GET", POM_PATH).with_status(404).create();
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    store.add_repository(&server.url());

    store.materialize(&coord(), ArtifactKind::Descriptor).unwrap_err();
    assert!(logs_contain("WARN"));
    assert!(logs_contain("download failed"));
    assert!(logs_contain(POM_PATH));
  }

  #[test]
  fn repositories_are_deduplicated() {
    let dir = TempDir::new().unwrap();
    let mut store = store(&dir);
    store.add_repository("https://r.example/m2");
    store.add_repository("https://r.example/m2/");
    assert_eq!(store.repositories(), &["https://r.example/m2/".to_string()]);
  }
}
