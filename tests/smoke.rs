//! Smoke tests -- verify the binary runs and rejects bad configuration.

use assert_cmd::Command;
use predicates::prelude::*;

fn simpleperf() -> Command {
    let mut cmd = Command::cargo_bin("simpleperf").unwrap();
    cmd.env("RUST_LOG", "off");
    cmd
}

#[test]
fn test_cli_help() {
    simpleperf()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Simpleperf network throughput measurement tool"));
}

#[test]
fn test_cli_version() {
    simpleperf()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("simpleperf"));
}

#[test]
fn test_mode_required() {
    simpleperf()
        .assert()
        .failure()
        .stderr(predicate::str::contains("either in server or client mode"));
}

#[test]
fn test_server_and_client_conflict() {
    simpleperf().args(["-s", "-c"]).assert().failure();
}

#[test]
fn test_zero_duration_rejected() {
    simpleperf()
        .args(["-c", "-I", "127.0.0.1", "-t", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than 0"));
}

#[test]
fn test_negative_duration_rejected() {
    simpleperf()
        .args(["-c", "-I", "127.0.0.1", "-t", "-3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be greater than 0"));
}

#[test]
fn test_parallel_out_of_range_rejected() {
    simpleperf()
        .args(["-c", "-I", "127.0.0.1", "-P", "6"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_byte_cap_unit_rejected() {
    simpleperf()
        .args(["-c", "-I", "127.0.0.1", "-n", "5 XB"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid unit 'XB'"));
}

#[test]
fn test_invalid_format_rejected() {
    simpleperf()
        .args(["-c", "-f", "GB"])
        .assert()
        .failure();
}

#[test]
fn test_zero_connect_timeout_rejected() {
    simpleperf()
        .args(["-c", "-I", "127.0.0.1", "--connect-timeout", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--connect-timeout"));
}

#[test]
fn test_log_json_emits_json_lines() {
    // Nothing listens on a port we just released.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    simpleperf()
        .env("RUST_LOG", "error")
        .args(["-c", "-I", "127.0.0.1", "-t", "1", "-n", "1 B", "--log-json"])
        .args(["-p", &port.to_string()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"level\":\"ERROR\""))
        .stderr(predicate::str::contains("client session failed"));
}
