//! Host platform helpers.

pub mod paths;

/// Suffix appended to executables on this host.
pub fn exe_suffix() -> &'static str {
  if cfg!(windows) { ".exe" } else { "" }
}
