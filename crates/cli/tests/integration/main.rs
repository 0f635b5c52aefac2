//! CLI integration tests that build small projects on disk.
//!
//! None of these need a JDK: compiled output is written by the tests and
//! only the `-only` goals are run against it.

mod build_tests;
mod common;
mod repo_tests;
