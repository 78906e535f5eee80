//! CLI integration tests for org-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for startup error conditions.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the org-migrate binary with a clean environment.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("org-migrate").unwrap();
    cmd.env_remove("SOURCE_ORG")
        .env_remove("SOURCE_TOKEN")
        .env_remove("TARGET_ORG")
        .env_remove("TARGET_TOKEN");
    cmd
}

/// A command with the required environment present.
fn cmd_with_env() -> Command {
    let mut cmd = cmd();
    cmd.env("SOURCE_ORG", "acme")
        .env("SOURCE_TOKEN", "t-src")
        .env("TARGET_ORG", "acme-new")
        .env("TARGET_TOKEN", "t-dst");
    cmd
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_migrate_command() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_migrate_subcommand_help() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--source-org"))
        .stdout(predicate::str::contains("--target-org"))
        .stdout(predicate::str::contains("--package-type"))
        .stdout(predicate::str::contains("--concurrency"));
}

#[test]
fn test_dry_run_defaults_to_true() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: true]"));
}

#[test]
fn test_concurrency_defaults_to_five() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: 5]"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("org-migrate"));
}

// =============================================================================
// Exit Code Tests - Startup Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_environment_exits_with_code_1() {
    cmd()
        .args(["migrate", "teams"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SOURCE_ORG"));
}

#[test]
fn test_missing_token_exits_with_code_1() {
    cmd()
        .env("SOURCE_ORG", "acme")
        .env("TARGET_ORG", "acme-new")
        .env("TARGET_TOKEN", "t-dst")
        .args(["migrate", "teams"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("SOURCE_TOKEN"));
}

#[test]
fn test_unknown_component_exits_with_code_1() {
    cmd_with_env()
        .args(["migrate", "issues"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown component"));
}

#[test]
fn test_unknown_package_type_rejected_by_parser() {
    cmd_with_env()
        .args(["migrate", "packages", "--package-type", "cargo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_zero_concurrency_exits_with_code_1() {
    cmd_with_env()
        .args(["migrate", "teams", "--concurrency", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("concurrency"));
}

// =============================================================================
// Flag Parsing Tests
// =============================================================================

#[test]
fn test_package_type_accepts_known_ecosystems() {
    for ecosystem in ["npm", "container", "maven", "nuget", "rubygems"] {
        // Parsing succeeds; the run then fails on missing environment (code 1),
        // not on argument validation (code 2).
        cmd()
            .args(["migrate", "packages", "--package-type", ecosystem])
            .assert()
            .code(1);
    }
}

#[test]
fn test_no_subcommand_shows_usage() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
