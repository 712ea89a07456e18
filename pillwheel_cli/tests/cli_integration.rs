use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Two hoppers, simulated hardware; every delay is replayed on a manual clock with --instant.
fn write_config(dir: &tempfile::TempDir, hoppers: &str) -> PathBuf {
    let toml = format!(
        r#"
[patient]
id = "042"
name = "Ada"

[retry]
max_attempts = 5

{hoppers}
"#
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

const TWO_HOPPERS: &str = r#"
[[hoppers]]
label = "Vitamin D"
channel = 0
required = 2

[[hoppers]]
label = "Vitamin C"
channel = 1
required = 1
"#;

const ZERO_REQUIRED: &str = r#"
[[hoppers]]
label = "Vitamin D"
channel = 0
required = 0
"#;

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["dispense", "--yes", "--instant"], 0, "Pill Has Been Dispensed", "stdout")]
#[case(&["dispense", "--reject", "--instant"], 2, "Calling for Assistance", "stdout")]
#[case(&["dispense", "--reject", "--instant"], 2, "rejected", "stderr")]
#[case(&["self-check"], 0, "Config: OK (2 hoppers)", "stdout")]
#[case(&["health"], 0, "Health: OK", "stdout")]
#[case(&["test-servo", "--hopper", "vitamin c"], 0, "Vitamin C Test Complete!", "stdout")]
#[case(&["test-servo", "--hopper", "7"], 1, "unknown hopper", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--log-level").arg("error");
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn jammed_hopper_escalates_after_max_attempts() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["--log-level", "error", "dispense", "--yes", "--instant"])
        .env("PILLWHEEL_SIM_JAM", "1");

    cmd.assert()
        .code(3)
        .stdout(predicate::str::contains("Calling for Assistance"))
        .stdout(predicate::str::contains("Attempt 5/5"))
        .stdout(predicate::str::contains("Attempt 6/5").not())
        .stderr(predicate::str::contains("Vitamin D after 5 attempts"));
}

#[test]
fn max_attempts_flag_overrides_config() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["--log-level", "error"])
        .args(["dispense", "--yes", "--instant", "--max-attempts", "2"])
        .env("PILLWHEEL_SIM_JAM", "true");

    cmd.assert()
        .code(3)
        .stdout(predicate::str::contains("Attempt 2/2"))
        .stdout(predicate::str::contains("Attempt 3/2").not());
}

#[test]
fn zero_required_count_is_an_invalid_prescription() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, ZERO_REQUIRED);

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["--log-level", "error", "dispense", "--yes", "--instant"]);

    cmd.assert()
        .code(5)
        .stdout(predicate::str::contains("Dispensing").not())
        .stderr(predicate::str::contains("required count of at least 1"));
}

#[test]
fn yes_and_reject_conflict() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["dispense", "--yes", "--reject"]);

    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config").arg(&missing).arg("self-check");

    cmd.assert().code(1).stderr(predicate::str::contains("nope.toml"));
}

#[rstest]
fn cli_reports_bad_prescription_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let bad_csv = dir.path().join("rx.csv");
    let mut f = fs::File::create(&bad_csv).unwrap();
    writeln!(f, "name,slot,count").unwrap();
    writeln!(f, "Vitamin D,0,2").unwrap();

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--prescription")
        .arg(&bad_csv)
        .arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn prescription_csv_replaces_configured_hoppers() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let csv = dir.path().join("rx.csv");
    let mut f = fs::File::create(&csv).unwrap();
    writeln!(f, "label,channel,required").unwrap();
    writeln!(f, "Zinc,3,1").unwrap();

    let mut cmd = Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--prescription")
        .arg(&csv)
        .args(["--log-level", "error", "dispense", "--yes", "--instant"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Zinc: 1 pill"))
        .stdout(predicate::str::contains("Vitamin D").not());
}

#[rstest]
#[case("y\n", 0)]
#[case("no\n", 2)]
#[case("", 2)]
fn verification_prompt_reads_stdin(#[case] input: &str, #[case] exit_code: i32) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, TWO_HOPPERS);

    let mut cmd = assert_cmd::Command::cargo_bin("pillwheel").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .args(["--log-level", "error", "dispense", "--instant"])
        .write_stdin(input);

    cmd.assert()
        .code(exit_code)
        .stdout(predicate::str::contains("[y/N]"));
}
