//! Repository goal integration tests: install-file, get and new-project.

use std::fs;

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn install_file_then_get_offline() {
  let env = TestEnv::new();
  env.write("thing.jar", "not really a jar");

  env
    .lmvn_cmd()
    .args([
      "-Dfile=thing.jar",
      "-DgroupId=x",
      "-DartifactId=thing",
      "-Dversion=3",
      "-Dpackaging=jar",
      "install:install-file",
    ])
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK] Installed."));

  assert_eq!(
    fs::read_to_string(env.repo().join("x/thing/3/thing-3.jar")).unwrap(),
    "not really a jar"
  );

  env
    .lmvn_cmd()
    .args(["-Dartifact=x:thing:3", "dependency:get"])
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK] Installed."));
}

#[test]
fn get_of_a_missing_artifact_fails_offline() {
  let env = TestEnv::new();

  env
    .lmvn_cmd()
    .args(["-Dartifact=x:none:1", "get"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("x:none:1"))
    .stderr(predicate::str::contains("offline"));
}

#[test]
fn get_rejects_a_malformed_coordinate() {
  let env = TestEnv::new();

  env
    .lmvn_cmd()
    .args(["-Dartifact=just-a-name", "get"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("invalid coordinate: just-a-name"));
}

#[test]
fn new_project_creates_a_starter_and_refuses_to_overwrite() {
  let env = TestEnv::new();

  env
    .lmvn_cmd()
    .args(["-DgroupId=org.acme", "new-project"])
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK] Created"));

  let pom = fs::read_to_string(env.root().join("pom.xml")).unwrap();
  assert!(pom.contains("<groupId>org.acme</groupId>"));
  assert!(env.root().join("src/main/java").is_dir());

  env
    .lmvn_cmd()
    .arg("new-project")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("already exists"));
}
