//! Test utilities for lmvn-lib.
//!
//! Helpers for writing throwaway projects to disk, building an offline
//! registry over them, and running shell commands portably.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};

use crate::platform::paths::JavaTools;
use crate::project::ProjectRegistry;
use crate::project::properties::PropertyContext;
use crate::store::{ArtifactStore, HttpFetcher};

/// Writes `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: impl AsRef<[u8]>) {
  fs::create_dir_all(path.parent().unwrap()).unwrap();
  fs::write(path, contents).unwrap();
}

/// Wraps `body` in a `<project>` element and writes it as `dir/pom.xml`.
pub fn write_pom(dir: &Path, body: &str) -> PathBuf {
  let path = dir.join("pom.xml");
  write_file(
    &path,
    format!(
      "<?xml version=\"1.0\"?>\n<project xmlns=\"http://maven.apache.org/POM/4.0.0\">\n{}\n</project>\n",
      body
    ),
  );
  path
}

/// `<groupId>`, `<artifactId>` and `<version>` elements for a triple.
pub fn gav(group: &str, artifact: &str, version: &str) -> String {
  format!("<groupId>{group}</groupId><artifactId>{artifact}</artifactId><version>{version}</version>")
}

/// A property context with a fixed clock and the built-in defaults for `java`/`javac` on `PATH`.
pub fn test_context() -> PropertyContext {
  let mut ctx = PropertyContext::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
  ctx.apply_builtin_defaults(&JavaTools {
    java: "java".to_string(),
    javac: "javac".to_string(),
  });
  ctx
}

/// An offline registry whose local repository is `local_repo`.
pub fn offline_registry(local_repo: &Path) -> ProjectRegistry {
  let mut store = ArtifactStore::new(local_repo, Box::new(HttpFetcher::new().unwrap()));
  store.set_offline(true);
  ProjectRegistry::new(store, test_context())
}

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}
