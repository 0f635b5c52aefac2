//! The `new-project` goal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::consts::POM_PACKAGING;
use crate::goals::GoalError;
use crate::project::properties::PropertyContext;

/// Starter descriptor text. Coordinates come from `-DgroupId`, `-DartifactId`,
/// `-Dversion` and `-Dpackaging`, falling back to `com.example`, the directory
/// name, `1.0-SNAPSHOT` and `jar`.
///
/// Jar projects get an assembly plugin with a placeholder main class; `pom`
/// projects get an empty module list instead.
pub fn starter_descriptor(ctx: &PropertyContext, dir: &Path) -> String {
  let artifact_default = dir
    .file_name()
    .and_then(|name| name.to_str())
    .filter(|name| !name.is_empty())
    .unwrap_or("app");
  let group = ctx.cmdline("groupId").unwrap_or("com.example");
  let artifact = ctx.cmdline("artifactId").unwrap_or(artifact_default);
  let version = ctx.cmdline("version").unwrap_or("1.0-SNAPSHOT");
  let packaging = ctx.cmdline("packaging").unwrap_or("jar");
  let compiler = |key: &str| ctx.lookup(None, key).unwrap_or_else(|_| "1.8".to_string());
  let source = compiler("maven.compiler.source");
  let target = compiler("maven.compiler.target");

  let body = if packaging == POM_PACKAGING {
    "  <modules>\n    <!-- <module></module> -->\n  </modules>\n".to_string()
  } else {
    r#"  <dependencies>
    <!-- <dependency><groupId></groupId><artifactId></artifactId><version></version><scope></scope></dependency> -->
  </dependencies>
  <build>
    <plugins>
      <plugin>
        <artifactId>maven-assembly-plugin</artifactId>
        <executions><execution>
          <phase>package</phase>
          <goals><goal>single</goal></goals>
          <configuration>
            <archive><manifest><mainClass>com.example.Main</mainClass></manifest></archive>
            <descriptorRefs><descriptorRef>jar-with-dependencies</descriptorRef></descriptorRefs>
          </configuration>
        </execution></executions>
      </plugin>
    </plugins>
  </build>
"#
    .to_string()
  };

  format!(
    r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 https://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>
  <groupId>{group}</groupId>
  <artifactId>{artifact}</artifactId>
  <version>{version}</version>
  <packaging>{packaging}</packaging>
  <!-- <parent><groupId></groupId><artifactId></artifactId><version></version><relativePath></relativePath></parent> -->
  <properties>
    <project.build.sourceEncoding>UTF-8</project.build.sourceEncoding>
    <maven.compiler.source>{source}</maven.compiler.source>
    <maven.compiler.target>{target}</maven.compiler.target>
    <!-- <maven.compiler.executable>${{env.JAVA_1_8_HOME}}/bin/javac</maven.compiler.executable> -->
    <maven.compiler.fork>true</maven.compiler.fork>
  </properties>
{body}</project>
"#
  )
}

/// Writes a starter descriptor at `descriptor` and creates the conventional source directories.
///
/// Never overwrites an existing descriptor.
pub fn new_project(ctx: &PropertyContext, descriptor: &Path) -> Result<PathBuf, GoalError> {
  if descriptor.exists() {
    return Err(GoalError::AlreadyExists(descriptor.to_path_buf()));
  }
  let dir = match descriptor.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => std::env::current_dir()?,
  };
  let dir = dunce::canonicalize(&dir).unwrap_or(dir);

  fs::create_dir_all(dir.join("src/main/java"))?;
  fs::create_dir_all(dir.join("src/main/resources"))?;
  fs::write(descriptor, starter_descriptor(ctx, &dir))?;
  info!(path = %descriptor.display(), "created project");
  Ok(descriptor.to_path_buf())
}
