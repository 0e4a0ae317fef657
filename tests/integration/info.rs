//! `info` prints the effective recipe state as JSON, which makes it a convenient probe for option
//! and setting handling.
use crate::utils::CliRecipe;

fn info_json(args: &[&str]) -> serde_json::Value {
    let mut recipe = CliRecipe::with_test_fs();

    let output = recipe.cmd.args(args).arg("info").output().unwrap();
    assert!(
        output.status.success(),
        "info failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn defaults_use_boost() {
    let info = info_json(&[]);

    assert_eq!(info["name"], "cli");
    assert_eq!(info["version"], "v1.2.1");
    assert_eq!(info["license"], "BSL-1.0");
    assert_eq!(info["options"]["use_boost"], true);
    assert_eq!(info["options"]["boost_shared"], false);
    assert_eq!(info["header_only"], false);
    assert_eq!(info["requires"], serde_json::json!(["boost/[>1.55.0]"]));
    assert_eq!(info["run_tests"], true);

    let definitions = info["definitions"].as_array().unwrap();
    for expected in ["-DCLI_UseBoostAsio=ON", "-DCLI_BuildExamples=ON", "-DCLI_BuildTests=ON"] {
        assert!(
            definitions.iter().any(|d| d == expected),
            "{expected} missing from {definitions:?}"
        );
    }
}

#[test]
fn header_only_has_no_requirements_or_definitions() {
    let info = info_json(&["-o", "use_boost=False"]);

    assert_eq!(info["header_only"], true);
    assert_eq!(info["requires"], serde_json::json!([]));
    assert_eq!(info["definitions"], serde_json::json!([]));
}

#[test]
fn header_only_id_ignores_settings() {
    let native = info_json(&["-o", "use_boost=False"]);
    let cross = info_json(&[
        "-o",
        "use_boost=False",
        "-s",
        "arch=armv8",
        "-s",
        "compiler=clang",
    ]);

    assert_eq!(native["package_id"], cross["package_id"]);
    assert_ne!(native["settings"], cross["settings"]);
}

#[test]
fn boost_id_depends_on_settings_and_options() {
    let release = info_json(&[]);
    let debug = info_json(&["-s", "build_type=Debug"]);
    let shared = info_json(&["-o", "boost:shared=True"]);

    assert_ne!(release["package_id"], debug["package_id"]);
    assert_ne!(release["package_id"], shared["package_id"]);
    assert!(
        debug["definitions"]
            .as_array()
            .unwrap()
            .iter()
            .any(|d| d == "-DCMAKE_BUILD_TYPE=Debug")
    );
}

#[test]
fn invalid_option_fails() {
    let mut recipe = CliRecipe::with_test_fs();

    recipe
        .cmd
        .args(["-o", "use_asio=True", "info"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("Invalid option"));
}
