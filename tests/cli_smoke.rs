//! CLI surface smoke tests.

use assert_cmd::Command;

#[test]
fn help_lists_the_subcommands() {
    let mut cmd = Command::cargo_bin("gaia").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("serve"))
        .stdout(predicates::str::contains("run-goal"))
        .stdout(predicates::str::contains("explore"));
}

#[test]
fn version_prints() {
    let mut cmd = Command::cargo_bin("gaia").unwrap();
    cmd.arg("--version").assert().success();
}

#[test]
fn run_goal_requires_a_goal_file() {
    let mut cmd = Command::cargo_bin("gaia").unwrap();
    cmd.arg("run-goal").assert().failure();
}
