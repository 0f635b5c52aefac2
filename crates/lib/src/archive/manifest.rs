//! In-memory archive contents and the zip writer.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::archive::ArchiveError;

/// Archive path of the manifest, always written first.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Upper bound on the buffer reserved up front for one entry read from an archive.
const PREALLOC_LIMIT: u64 = 1 << 20;

/// Where the bytes of an entry come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntrySource {
  Bytes(Vec<u8>),
  File(PathBuf),
}

impl EntrySource {
  fn copy_into(&self, out: &mut impl Write) -> io::Result<()> {
    match self {
      EntrySource::Bytes(bytes) => out.write_all(bytes),
      EntrySource::File(path) => {
        let mut file = BufReader::new(File::open(path)?);
        io::copy(&mut file, out).map(|_| ())
      }
    }
  }
}

/// Archive entries keyed by internal path, kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
  entries: BTreeMap<String, EntrySource>,
}

impl ArchiveManifest {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds or replaces an entry.
  pub fn insert(&mut self, path: impl Into<String>, source: EntrySource) {
    self.entries.insert(path.into(), source);
  }

  pub fn insert_bytes(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
    self.insert(path, EntrySource::Bytes(bytes.into()));
  }

  /// Copies every entry of `other` in, replacing entries at the same path.
  pub fn merge(&mut self, other: ArchiveManifest) {
    self.entries.extend(other.entries);
  }

  pub fn get(&self, path: &str) -> Option<&EntrySource> {
    self.entries.get(path)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn paths(&self) -> impl Iterator<Item = &str> {
    self.entries.keys().map(String::as_str)
  }

  /// Reads every file entry of an existing archive into memory.
  pub fn from_archive(path: &Path) -> Result<Self, ArchiveError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut manifest = Self::new();
    for i in 0..archive.len() {
      let mut entry = archive.by_index(i)?;
      if entry.is_dir() {
        continue;
      }
      // The size header comes from a downloaded file; only use it as a hint.
      let mut bytes = Vec::with_capacity(entry.size().min(PREALLOC_LIMIT) as usize);
      entry.read_to_end(&mut bytes)?;
      manifest.insert_bytes(entry.name().to_string(), bytes);
    }
    debug!(path = %path.display(), entries = manifest.len(), "archive read");
    Ok(manifest)
  }

  /// Writes the archive to `dest` atomically.
  ///
  /// Entries are deflated and carry the 1980-01-01 timestamp, so identical
  /// manifests produce identical bytes. The manifest entry comes first, the
  /// rest follow in path order.
  pub fn write_to(&self, dest: &Path) -> Result<(), ArchiveError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut staging = NamedTempFile::new_in(dir)?;

    let options = SimpleFileOptions::default()
      .compression_method(CompressionMethod::Deflated)
      .last_modified_time(zip::DateTime::default());

    {
      let mut writer = ZipWriter::new(staging.as_file_mut());
      let ordered = self
        .entries
        .get_key_value(MANIFEST_PATH)
        .into_iter()
        .chain(self.entries.iter().filter(|(path, _)| path.as_str() != MANIFEST_PATH));
      for (path, source) in ordered {
        writer.start_file(path.as_str(), options)?;
        source.copy_into(&mut writer)?;
      }
      writer.finish()?;
    }

    staging.persist(dest).map_err(|e| ArchiveError::Io(e.error))?;
    debug!(path = %dest.display(), entries = self.len(), "archive written");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn merge_replaces_colliding_paths() {
    let mut base = ArchiveManifest::new();
    base.insert_bytes("a.txt", "dep");
    base.insert_bytes("b.txt", "dep");
    let mut top = ArchiveManifest::new();
    top.insert_bytes("a.txt", "self");

    base.merge(top);
    assert_eq!(base.get("a.txt"), Some(&EntrySource::Bytes(b"self".to_vec())));
    assert_eq!(base.len(), 2);
  }

  #[test]
  fn written_archive_reads_back_with_manifest_first() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.jar");
    let mut manifest = ArchiveManifest::new();
    manifest.insert_bytes("A.class", "a");
    manifest.insert_bytes(MANIFEST_PATH, "Manifest-Version: 1.0\r\n");
    manifest.insert_bytes("z/Z.class", "z");
    manifest.write_to(&dest).unwrap();

    let mut archive = ZipArchive::new(File::open(&dest).unwrap()).unwrap();
    assert_eq!(archive.by_index(0).unwrap().name(), MANIFEST_PATH);
    assert_eq!(archive.by_index(1).unwrap().name(), "A.class");
    assert_eq!(archive.by_index(0).unwrap().last_modified(), Some(zip::DateTime::default()));

    let read = ArchiveManifest::from_archive(&dest).unwrap();
    assert_eq!(read, manifest);
  }

  #[test]
  fn entries_larger_than_the_reservation_read_back_whole() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("big.jar");
    let payload: Vec<u8> = (0..PREALLOC_LIMIT + 17).map(|i| (i % 251) as u8).collect();
    let mut manifest = ArchiveManifest::new();
    manifest.insert_bytes("big.bin", payload.clone());
    manifest.write_to(&dest).unwrap();

    let read = ArchiveManifest::from_archive(&dest).unwrap();
    assert_eq!(read.get("big.bin"), Some(&EntrySource::Bytes(payload)));
  }

  #[test]
  fn identical_manifests_give_identical_bytes() {
    let temp = TempDir::new().unwrap();
    let source = temp.path().join("Data.class");
    fs::write(&source, "payload").unwrap();
    let mut manifest = ArchiveManifest::new();
    manifest.insert("Data.class", EntrySource::File(source));

    let first = temp.path().join("first.jar");
    let second = temp.path().join("second.jar");
    manifest.write_to(&first).unwrap();
    manifest.write_to(&second).unwrap();
    assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
  }

  #[test]
  fn missing_file_entry_leaves_no_archive() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out.jar");
    let mut manifest = ArchiveManifest::new();
    manifest.insert("gone.class", EntrySource::File(temp.path().join("gone.class")));

    assert!(manifest.write_to(&dest).is_err());
    assert!(!dest.exists());
  }
}
