//! Crate-wide constants.

pub const APP_NAME: &str = "lmvn";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Remote repository used when no `repoUrl` property is given.
pub const DEFAULT_REPOSITORY: &str = "https://repo1.maven.org/maven2/";

/// Descriptor file name inside a project directory.
pub const DESCRIPTOR_FILE_NAME: &str = "pom.xml";

/// Name of the per-project build output directory.
pub const TARGET_DIR_NAME: &str = "target";

/// Environment variable preferred over `JAVA_HOME` when locating the JDK.
pub const JAVA_HOME_ENV: &str = "LMVN_JAVA_HOME";

/// Maximum nesting of `${...}` expansion before giving up.
pub const MAX_TEMPLATE_DEPTH: usize = 32;

/// Packaging value that marks an aggregator (non-buildable) project.
pub const POM_PACKAGING: &str = "pom";
