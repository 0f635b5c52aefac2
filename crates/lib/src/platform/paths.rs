use std::path::PathBuf;

use crate::consts::JAVA_HOME_ENV;
use crate::platform::exe_suffix;

/// Returns the user's home directory
#[cfg(windows)]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("USERPROFILE").map(PathBuf::from)
}

/// Returns the user's home directory
#[cfg(not(windows))]
pub fn home_dir() -> Option<PathBuf> {
  std::env::var_os("HOME").map(PathBuf::from)
}

/// Default location of the local package cache (`~/.m2/repository`).
pub fn default_local_repo() -> PathBuf {
  home_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join(".m2")
    .join("repository")
}

/// Executables used to compile and run code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaTools {
  pub java: String,
  pub javac: String,
}

impl JavaTools {
  /// Locates the JDK through `LMVN_JAVA_HOME`, then `JAVA_HOME`.
  ///
  /// Without either, the bare tool names are returned and resolved through `PATH`.
  pub fn detect() -> Self {
    let home = [JAVA_HOME_ENV, "JAVA_HOME"]
      .iter()
      .filter_map(|var| std::env::var_os(var))
      .find(|value| !value.is_empty())
      .map(PathBuf::from);

    match home {
      Some(home) => {
        let bin = home.join("bin");
        Self {
          java: bin.join(format!("java{}", exe_suffix())).display().to_string(),
          javac: bin.join(format!("javac{}", exe_suffix())).display().to_string(),
        }
      }
      None => Self {
        java: "java".to_string(),
        javac: "javac".to_string(),
      },
    }
  }
}
