//! Shared utilities.
//!
//! Filesystem helpers used across the build phases, plus test helpers.

pub mod fs;

#[cfg(test)]
pub mod testutil;
