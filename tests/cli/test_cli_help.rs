use std::process::Command;

#[test]
fn help_lists_every_command() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("cadence"))
        .arg("--help")
        .output()
        .expect("should run successfully");

    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    for command in ["serve", "migrate", "execute", "execute-all", "logs"] {
        assert!(stdout.contains(command), "missing command: {}", command);
    }
}

#[test]
fn version_reports_the_crate_version() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("cadence"))
        .arg("--version")
        .output()
        .expect("should run successfully");

    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    assert!(stdout.contains("cadence"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn execute_help_documents_required_identifiers() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("cadence"))
        .arg("execute")
        .arg("--help")
        .output()
        .expect("should run successfully");

    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    assert!(stdout.contains("--rule"));
    assert!(stdout.contains("--organization"));
    assert!(stdout.contains("--source"));
}

#[test]
fn serve_help_mentions_bind_override() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("cadence"))
        .arg("serve")
        .arg("--help")
        .output()
        .expect("should run successfully");

    let stdout = std::str::from_utf8(&output.stdout).unwrap();
    assert!(stdout.contains("--bind"));
}

#[test]
fn unknown_subcommand_fails() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("cadence"))
        .arg("definitely-not-a-command")
        .output()
        .expect("should run");
    assert!(!output.status.success());
}
