//! Project goal integration tests: clean, package-only, install-only, test-classpath.

use std::fs;

use predicates::prelude::*;

use super::common::{TestEnv, archive_entries, gav};

#[test]
fn clean_removes_every_target_directory() {
  let env = TestEnv::compiled_workspace();

  env
    .lmvn_cmd()
    .arg("clean")
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK] 3 projects cleaned."));

  assert!(!env.root().join("lib/target").exists());
  assert!(!env.root().join("app/target").exists());
  assert!(env.root().join("app/pom.xml").exists());
}

#[test]
fn quiet_clean_prints_no_footer() {
  let env = TestEnv::compiled_workspace();

  env
    .lmvn_cmd()
    .args(["-q", "clean"])
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK]").not());
}

#[test]
fn package_only_writes_thin_and_merged_archives() {
  let env = TestEnv::compiled_workspace();

  env
    .lmvn_cmd()
    .arg("package-only")
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK] 3 projects packaged."));

  let thin = archive_entries(&env.root().join("app/target/app-1.jar"));
  assert_eq!(thin[0], "META-INF/MANIFEST.MF");
  assert!(thin.contains(&"app/Main.class".to_string()));
  assert!(!thin.contains(&"lib/Lib.class".to_string()));

  let merged = archive_entries(&env.root().join("app/target/app-1-jar-with-dependencies.jar"));
  assert_eq!(merged[0], "META-INF/MANIFEST.MF");
  assert!(merged.contains(&"app/Main.class".to_string()));
  assert!(merged.contains(&"lib/Lib.class".to_string()));
  assert!(merged.contains(&"META-INF/maven/g/lib/pom.properties".to_string()));

  assert!(!env.root().join("target").exists());
}

#[test]
fn packaging_is_reproducible() {
  let env = TestEnv::compiled_workspace();
  let merged = env.root().join("app/target/app-1-jar-with-dependencies.jar");

  env.lmvn_cmd().arg("package-only").assert().success();
  let first = fs::read(&merged).unwrap();
  env.lmvn_cmd().arg("package-only").assert().success();
  assert_eq!(first, fs::read(&merged).unwrap());
}

#[test]
fn package_only_without_compiled_output_fails() {
  let env = TestEnv::compiled_workspace();
  fs::remove_dir_all(env.root().join("lib/target")).unwrap();

  env
    .lmvn_cmd()
    .arg("package-only")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("[ERR]"))
    .stderr(predicate::str::contains("compiled output"));
}

#[test]
fn install_only_copies_into_the_local_repository() {
  let env = TestEnv::compiled_workspace();

  env.lmvn_cmd().arg("package-only").assert().success();
  env
    .lmvn_cmd()
    .arg("install-only")
    .assert()
    .success()
    .stderr(predicate::str::contains("[OK] 3 projects installed to local repo."));

  let repo = env.repo();
  assert!(repo.join("g/parent/1/parent-1.pom").is_file());
  assert!(!repo.join("g/parent/1/parent-1.jar").exists());
  assert!(repo.join("g/lib/1/lib-1.jar").is_file());
  assert!(repo.join("g/app/1/app-1-jar-with-dependencies.jar").is_file());
  assert_eq!(
    fs::read(repo.join("g/app/1/app-1.pom")).unwrap(),
    fs::read(env.root().join("app/pom.xml")).unwrap()
  );
}

#[test]
fn install_only_before_packaging_installs_no_descriptor() {
  let env = TestEnv::compiled_workspace();

  env
    .lmvn_cmd()
    .arg("install-only")
    .assert()
    .code(1)
    .stderr(predicate::str::contains("package the project first"));

  let repo = env.repo();
  assert!(!repo.join("g/lib/1/lib-1.pom").exists());
  assert!(!repo.join("g/app/1/app-1.pom").exists());
}

#[test]
fn installed_projects_serve_later_builds() {
  let env = TestEnv::compiled_workspace();
  env.lmvn_cmd().arg("package-only").assert().success();
  env.lmvn_cmd().arg("install-only").assert().success();

  env.write_pom(
    "consumer",
    &format!(
      "{}<dependencies><dependency>{}</dependency></dependencies>",
      gav("h", "consumer", "1"),
      gav("g", "lib", "1")
    ),
  );

  env
    .lmvn_cmd()
    .args(["-f", "consumer/pom.xml", "test-classpath"])
    .assert()
    .success()
    .stdout(predicate::str::contains("lib-1.jar"))
    .stdout(predicate::str::contains("test-classes"));
}

#[test]
fn test_classpath_of_a_single_project() {
  let env = TestEnv::compiled_workspace();

  env
    .lmvn_cmd()
    .args(["-f", "lib/pom.xml", "test-classpath"])
    .assert()
    .success()
    .stdout(predicate::str::contains("classes"))
    .stdout(predicate::str::contains("test-classes"));
}
