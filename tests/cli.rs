use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("video-analyzer").unwrap()
}

#[test]
fn help_lists_subcommands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn version_is_reported() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn analyze_requires_url() {
    cli()
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn analyze_rejects_unknown_format() {
    cli()
        .args(["analyze", "https://youtu.be/JzLtDZL7Nak", "--format", "srt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("srt"));
}
