//! Shared test helpers for CLI integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory holding the project tree and a
/// private local repository. Every command runs offline.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  pub fn root(&self) -> &Path {
    self.temp.path()
  }

  pub fn repo(&self) -> PathBuf {
    self.temp.path().join("repo")
  }

  /// An offline `lmvn` running in the environment root with its own local repository.
  pub fn lmvn_cmd(&self) -> Command {
    let mut cmd = cargo_bin_cmd!("lmvn");
    cmd
      .current_dir(self.root())
      .env_remove("RUST_LOG")
      .arg("-o")
      .arg(format!("-Dmaven.repo.local={}", self.repo().display()));
    cmd
  }

  pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = self.root().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
  }

  /// Writes `<dir>/pom.xml` with `body` inside `<project>`.
  pub fn write_pom(&self, dir: &str, body: &str) -> PathBuf {
    let relative = if dir.is_empty() {
      "pom.xml".to_string()
    } else {
      format!("{}/pom.xml", dir)
    };
    self.write(&relative, format!("<project>{}</project>", body))
  }

  /// A two-module build: aggregator `g:parent:1` with `lib` and `app`,
  /// where `app` depends on `lib`. Both already have compiled classes.
  pub fn compiled_workspace() -> Self {
    let env = Self::new();
    env.write_pom(
      "",
      &format!(
        "{}<packaging>pom</packaging><modules><module>lib</module><module>app</module></modules>",
        gav("g", "parent", "1")
      ),
    );
    env.write_pom("lib", &gav("g", "lib", "1"));
    env.write_pom(
      "app",
      &format!(
        "{}<dependencies><dependency>{}</dependency></dependencies>",
        gav("g", "app", "1"),
        gav("g", "lib", "1")
      ),
    );
    env.write("lib/target/classes/lib/Lib.class", "lib");
    env.write("app/target/classes/app/Main.class", "app");
    env
  }
}

pub fn gav(group: &str, artifact: &str, version: &str) -> String {
  format!("<groupId>{group}</groupId><artifactId>{artifact}</artifactId><version>{version}</version>")
}

/// Names of the entries in a zip archive, in stored order.
pub fn archive_entries(path: &Path) -> Vec<String> {
  let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
  (0..archive.len())
    .map(|i| archive.by_index(i).unwrap().name().to_string())
    .collect()
}
