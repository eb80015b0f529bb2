//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn help_describes_the_agent_options_flag() {
    let mut cmd = cargo_bin_cmd!("softlayer-cpi");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--agent-options"));
}

#[test]
fn malformed_request_fails_without_writing_a_response() {
    let mut cmd = cargo_bin_cmd!("softlayer-cpi");
    cmd.env("RUST_LOG", "off")
        .write_stdin("{not json")
        .assert()
        .failure()
        .stdout("")
        .stderr(predicate::str::contains("invalid request"));
}
