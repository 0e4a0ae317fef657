//! End-to-end runs of the lifecycle for the header-only variant, which needs no toolchain.
//!
//! The source comes from a local tarball of the fixture release, so nothing is downloaded.
use crate::utils::CliRecipe;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::path::PathBuf;

const HEADER_ONLY: [&str; 2] = ["-o", "use_boost=False"];

fn stdout_path(output: &std::process::Output) -> PathBuf {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    PathBuf::from(String::from_utf8(output.stdout.clone()).unwrap().trim())
}

#[test]
fn header_only_create_packages_headers() {
    let mut recipe = CliRecipe::with_local_source();

    let output = recipe
        .cmd
        .args(HEADER_ONLY)
        .arg("create")
        .output()
        .unwrap();
    let package = stdout_path(&output);

    assert!(package.starts_with(recipe.test_fs_app_root().path().join("packages").join("cli-1.2.1")));

    let package = assert_fs::fixture::ChildPath::new(package);
    package.child("include/cli/cli.h").assert(predicate::path::is_file());
    package.child("include/cli/clilocalsession.h").assert(predicate::path::is_file());
    package.child("include/cli/detail/history.h").assert(predicate::path::is_file());
    package.child("samples/sub/sample.h").assert(predicate::path::is_file());

    package.child("samples/sub/sample.hpp").assert(predicate::path::missing());
    package.child("CMakeLists.txt").assert(predicate::path::missing());
    package.child("README.md").assert(predicate::path::missing());
    package.child("examples").assert(predicate::path::missing());
    package.child("bin").assert(predicate::path::missing());

    // Only the package survives; the work directory is cleaned up
    let build_root = recipe.test_fs_app_root().child("build");
    assert_eq!(std::fs::read_dir(build_root.path()).unwrap().count(), 0);
}

#[test]
fn second_create_reuses_package() {
    let mut recipe = CliRecipe::with_local_source();

    let first = recipe
        .cmd
        .args(HEADER_ONLY)
        .arg("create")
        .output()
        .unwrap();
    let first = stdout_path(&first);

    let mut recipe = recipe.reset();
    let second = recipe
        .cmd
        .args(HEADER_ONLY)
        .arg("create")
        .output()
        .unwrap();

    assert!(String::from_utf8_lossy(&second.stderr).contains("already exists"));
    assert_eq!(stdout_path(&second), first);
}

#[test]
fn create_then_deploy() {
    let mut recipe = CliRecipe::with_local_source();
    let deploy_dir = recipe.test_fs().cwd.child("deploy");

    // Header-only packages have no binaries, so the deploy is empty but still succeeds
    recipe
        .cmd
        .args(HEADER_ONLY)
        .arg("create")
        .arg("--deploy-to")
        .arg(deploy_dir.path())
        .assert()
        .success();
    deploy_dir.child("bin").assert(predicate::path::missing());

    let mut recipe = recipe.reset();
    recipe
        .cmd
        .args(HEADER_ONLY)
        .arg("deploy")
        .arg(deploy_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn deploy_without_package_fails() {
    let mut recipe = CliRecipe::with_local_source();

    recipe
        .cmd
        .args(HEADER_ONLY)
        .args(["deploy", "somewhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No package"));
}

#[test]
fn source_extracts_and_patches() {
    let mut recipe = CliRecipe::with_local_source();
    let dest = recipe.test_fs().cwd.child("src");

    let output = recipe
        .cmd
        .arg("source")
        .arg(dest.path())
        .output()
        .unwrap();
    assert_eq!(stdout_path(&output), dest.path().join("cli-1.2.1"));

    dest.child("cli-1.2.1/CMakeLists.txt").assert(
        predicate::str::contains(
            "project(cli VERSION 1.2.1 LANGUAGES CXX)\ninclude(${CMAKE_BINARY_DIR}/conanbuildinfo.cmake)\nconan_basic_setup()",
        ),
    );
    dest.child("cli-1.2.1/test/CMakeLists.txt")
        .assert(predicate::str::contains("#target_compile_definitions").not());
}

#[test]
fn offline_without_cached_tarball_fails() {
    let mut recipe = CliRecipe::with_test_fs();

    recipe
        .cmd
        .env("CLI_RECIPE_SOURCE_URL", "https://example.invalid/cli.tar.gz")
        .args(HEADER_ONLY)
        .args(["--offline", "create"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("offline"));
}

#[test]
fn checksum_mismatch_fails() {
    let mut recipe = CliRecipe::with_local_source();

    recipe
        .cmd
        .env("CLI_RECIPE_SOURCE_SHA256", "0".repeat(64))
        .args(HEADER_ONLY)
        .arg("create")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Checksum mismatch"));
}
