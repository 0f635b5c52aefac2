//! lmvn-lib: the build engine behind `lmvn`.
//!
//! This crate holds everything except argument parsing and console output:
//! - `project`: descriptors, properties and the `ProjectRegistry` node cache
//! - `resolve`: dependency closures over incrementally discovered versions
//! - `store`: the local artifact repository and remote fetching
//! - `execute`: bounded-parallel compiler and test runner processes
//! - `archive`: deterministic archive assembly
//! - `goals`: the phase pipelines the command line runs

pub mod archive;
pub mod consts;
pub mod execute;
pub mod goals;
pub mod platform;
pub mod project;
pub mod resolve;
pub mod store;
pub mod util;
