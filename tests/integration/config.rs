//! Integration tests for config file handling: the file hierarchy, the environment, and the
//! `CONAN_RUN_TESTS` toggle.
use crate::utils::CliRecipe;
use assert_fs::prelude::*;
use predicates::prelude::*;

fn run_tests_flag(recipe: &mut CliRecipe) -> bool {
    let output = recipe.cmd.arg("info").output().unwrap();
    assert!(
        output.status.success(),
        "info failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    info["run_tests"].as_bool().unwrap()
}

#[test]
fn conan_run_tests_env_disables_tests() {
    let mut recipe = CliRecipe::with_test_fs();
    recipe.cmd.env("CONAN_RUN_TESTS", "False");

    assert!(!run_tests_flag(&mut recipe));

    let mut recipe = recipe.reset();
    recipe.cmd.env("CONAN_RUN_TESTS", "1");
    assert!(run_tests_flag(&mut recipe));
}

#[test]
fn cwd_config_file_is_honored() {
    let mut recipe = CliRecipe::with_test_fs();
    recipe
        .test_fs()
        .cwd
        .child("cli-recipe.toml")
        .write_str("run_tests = false\n")
        .unwrap();

    assert!(!run_tests_flag(&mut recipe));
}

#[test]
fn cwd_config_overrides_user_config() {
    let mut recipe = CliRecipe::with_test_fs();
    recipe
        .test_fs_app_root()
        .child("config/cli-recipe.toml")
        .write_str("run_tests = false\n")
        .unwrap();
    recipe
        .test_fs()
        .cwd
        .child("cli-recipe.toml")
        .write_str("run_tests = true\n")
        .unwrap();

    assert!(run_tests_flag(&mut recipe));
}

#[test]
fn system_config_is_lowest_priority_file() {
    let mut recipe = CliRecipe::with_test_fs();
    recipe
        .test_fs()
        .system_root
        .child("cli-recipe.toml")
        .write_str("run_tests = false\n")
        .unwrap();

    assert!(!run_tests_flag(&mut recipe));

    let mut recipe = recipe.reset();
    recipe.cmd.env("CONAN_RUN_TESTS", "true");
    assert!(run_tests_flag(&mut recipe));
}

#[test]
fn explicit_config_file_must_exist() {
    let mut recipe = CliRecipe::find();
    let cwd = assert_fs::TempDir::new().unwrap();

    recipe
        .cmd
        .current_dir(cwd.path())
        .args(["--config-file", "missing.toml", "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn invalid_config_value_is_reported() {
    let mut recipe = CliRecipe::with_test_fs();
    recipe
        .test_fs()
        .cwd
        .child("cli-recipe.toml")
        .write_str("http_timeout = \"soon\"\n")
        .unwrap();

    recipe
        .cmd
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("http_timeout"));
}
