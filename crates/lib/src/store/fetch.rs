//! Remote byte-stream transport.

use std::fs;
use std::io;
use std::path::Path;

use reqwest::blocking::Client;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::consts::{APP_NAME, VERSION};

/// A failed transfer. Always soft: the store moves on to the next repository.
#[derive(Debug, Error)]
#[error("fetch failed for {url}: {message}")]
pub struct FetchError {
  pub url: String,
  pub message: String,
}

impl FetchError {
  fn new(url: &str, message: impl ToString) -> Self {
    Self {
      url: url.to_string(),
      message: message.to_string(),
    }
  }
}

/// Copies the bytes behind a URL to a local file.
pub trait Fetcher {
  /// Writes the body of `url` to `dest`. On failure `dest` is left untouched.
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// HTTP(S) GET using a blocking `reqwest` client.
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self, FetchError> {
    let client = Client::builder()
      .user_agent(format!("{}/{}", APP_NAME, VERSION))
      .build()
      .map_err(|e| FetchError::new("<client>", e))?;
    Ok(Self { client })
  }
}

impl Fetcher for HttpFetcher {
  fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
    let mut response = self.client.get(url).send().map_err(|e| FetchError::new(url, e))?;

    if !response.status().is_success() {
      return Err(FetchError::new(url, format!("HTTP {}", response.status())));
    }

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| FetchError::new(url, e))?;
    let mut staging = NamedTempFile::new_in(dir).map_err(|e| FetchError::new(url, e))?;
    let size = response.copy_to(&mut staging).map_err(|e| FetchError::new(url, e))?;
    staging
      .persist(dest)
      .map_err(|e| FetchError::new(url, io::Error::from(e)))?;

    debug!(url = %url, size, "download complete");
    Ok(())
  }
}
