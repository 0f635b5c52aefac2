//! Filesystem helpers shared by the build phases.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Relative paths of every file below `dir`, using `/` separators, in sorted order.
///
/// A missing directory yields an empty list.
pub fn list_relative_files(dir: &Path) -> io::Result<Vec<String>> {
  if !dir.is_dir() {
    return Ok(Vec::new());
  }
  let mut files = Vec::new();
  for entry in WalkDir::new(dir).sort_by_file_name() {
    let entry = entry.map_err(io::Error::from)?;
    if !entry.file_type().is_file() {
      continue;
    }
    if let Ok(relative) = entry.path().strip_prefix(dir) {
      let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
      files.push(parts.join("/"));
    }
  }
  files.sort();
  Ok(files)
}

/// Joins a `/`-separated relative path onto `base`.
pub fn join_relative(base: &Path, relative: &str) -> PathBuf {
  relative.split('/').fold(base.to_path_buf(), |path, part| path.join(part))
}

/// Copies every file below `from` into `to`, replacing existing files.
///
/// A missing source directory copies nothing.
pub fn copy_tree(from: &Path, to: &Path) -> io::Result<usize> {
  let files = list_relative_files(from)?;
  for relative in &files {
    let dest = join_relative(to, relative);
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::copy(join_relative(from, relative), &dest)?;
  }
  Ok(files.len())
}

/// Recursively deletes `dir` if it exists.
///
/// Refuses filesystem roots and symlinks, so a crafted `target` cannot
/// redirect the deletion elsewhere.
pub fn remove_dir_guarded(dir: &Path) -> io::Result<()> {
  let meta = match fs::symlink_metadata(dir) {
    Ok(meta) => meta,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
    Err(e) => return Err(e),
  };
  if meta.file_type().is_symlink() {
    return Err(io::Error::other(format!("refusing to delete symlink {}", dir.display())));
  }
  if dir.parent().is_none() || dunce::canonicalize(dir)?.parent().is_none() {
    return Err(io::Error::other(format!("refusing to delete root {}", dir.display())));
  }
  debug!(path = %dir.display(), "removing directory");
  fs::remove_dir_all(dir)
}

/// Joins paths with the platform's search-path separator.
pub fn join_search_path<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) -> String {
  let separator = if cfg!(windows) { ";" } else { ":" };
  paths
    .into_iter()
    .map(|p| p.display().to_string())
    .collect::<Vec<_>>()
    .join(separator)
}
