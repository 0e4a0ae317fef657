//! Very basic smoke tests that just confirm that the `cli-recipe` binary is able to run at all
use crate::utils::CliRecipe;

/// `--help` at least looks vaguely right and lists the subcommands.
#[test]
fn test_help_output() {
    let mut recipe = CliRecipe::find();

    recipe
        .cmd
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("cli-recipe"))
        .stdout(predicates::str::contains("create"))
        .stdout(predicates::str::contains("deploy"))
        .stderr(predicates::str::is_empty());
}

/// Version goes to stderr.  The git sha and date are present when built from a git checkout.
///
/// ```text
/// cli-recipe 0.1.0 (40d26c9 2025-10-26)
/// ```
#[test]
fn test_version_output() {
    let mut recipe = CliRecipe::find();

    recipe
        .cmd
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::is_empty())
        .stderr(
            predicates::str::is_match(r"^cli-recipe \d+\.\d+\.\d+( \([0-9a-f]{7,40} \d{4}-\d{2}-\d{2}\))?\n$").unwrap(),
        );
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let mut recipe = CliRecipe::with_test_fs();

    recipe
        .cmd
        .assert()
        .failure()
        .code(2)
        .stderr(predicates::str::contains("subcommand"));
}
