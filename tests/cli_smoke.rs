//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

/// Command isolated from the caller's configuration and token.
fn isolated_cmd(home: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("nubes-lifecycle");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env("NUBES_TOKEN_FILE", home.path().join("absent-token"))
        .env_remove("NUBES_API_TOKEN")
        .env_remove("NUBES_CONFIG_PATH")
        .env_remove("NUBES_API_ENDPOINT");
    cmd
}

fn temp_home() -> TempDir {
    TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"))
}

#[test]
fn help_lists_lifecycle_commands() {
    let mut cmd = cargo_bin_cmd!("nubes-lifecycle");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("create"))
        .stdout(contains("resume"))
        .stdout(contains("delete"));
}

#[test]
fn missing_subcommand_is_a_usage_error() {
    let mut cmd = cargo_bin_cmd!("nubes-lifecycle");
    cmd.assert().failure().code(2);
}

#[test]
fn malformed_param_is_rejected_before_any_work() {
    let home = temp_home();
    isolated_cmd(&home)
        .args(["create", "--service-id", "1", "--name", "web", "--param", "size"])
        .assert()
        .failure()
        .code(2)
        .stderr(contains("ID=VALUE"));
}

#[test]
fn missing_token_reports_how_to_provide_one() {
    let home = temp_home();
    isolated_cmd(&home)
        .args(["show", "--instance", "7c9e6679-7425-40de-944b-e07fc1f90ae7"])
        .assert()
        .failure()
        .code(1)
        .stdout("")
        .stderr(contains("NUBES_API_TOKEN"));
}

#[test]
fn unknown_retire_mode_is_rejected() {
    let home = temp_home();
    isolated_cmd(&home)
        .args(["delete", "--instance", "abc", "--mode", "shred"])
        .assert()
        .failure()
        .code(1)
        .stderr(contains("unknown retire mode"));
}

#[test]
fn state_only_retire_succeeds_without_contacting_the_api() {
    let home = temp_home();
    isolated_cmd(&home)
        .env("NUBES_API_TOKEN", "dummy-token")
        .env("NUBES_API_ENDPOINT", "http://127.0.0.1:9")
        .args(["delete", "--instance", "abc", "--mode", "state_only"])
        .assert()
        .success()
        .stdout("");
}
