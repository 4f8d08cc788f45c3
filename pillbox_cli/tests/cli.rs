use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const START: &str = "2026-03-14 07:58:00";

// Defaults everywhere except a short splash so traces stay small
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[timing]
splash_ms = 100

[consumption]
low_stock_floor = 5.0
consumed_delta = 2.0

[hardware]
sensor_read_timeout_ms = 100
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn write_file(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

fn eight_oclock_schedule(dir: &tempfile::TempDir) -> PathBuf {
    write_file(
        dir,
        "schedule.csv",
        "container,hour,minute,max_temp\n\
         1,08,00,30\n\
         2,,,30\n\
         3,,,30\n\
         4,,,30\n\
         5,,,30\n",
    )
}

fn pillbox() -> Command {
    Command::cargo_bin("pillbox").unwrap()
}

fn summary(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .find(|l| l.contains("\"final_phase\""))
        .unwrap_or_else(|| panic!("no summary line; stdout was: {text}"));
    serde_json::from_str(line).unwrap()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["health"], 0, "\"status\":\"ok\"", "stdout")]
#[case(&["self-check"], 0, "self-check ok", "stdout")]
#[case(&["run", "--bogus"], 2, "unexpected argument", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = pillbox();
    cmd.arg("--config").arg(&cfg);
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
fn preset_run_dispenses_once_in_virtual_time() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let schedule = eight_oclock_schedule(&dir);
    let keys = write_file(&dir, "keys.txt", "A\n");

    let out = pillbox()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("run")
        .arg("--virtual-time")
        .args(["--start", START, "--run-for-mins", "120"])
        .arg("--schedule")
        .arg(&schedule)
        .arg("--keys")
        .arg(&keys)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v = summary(&out);
    assert_eq!(v["reason"], "run_limit");
    assert_eq!(v["final_phase"], "monitoring");
    assert_eq!(v["stats"]["doses_triggered"], 1);
    assert_eq!(v["stats"]["safety_alerts"], 0);
}

#[test]
fn keypad_configuration_run_reaches_monitoring() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let keys = write_file(
        &dir,
        "keys.txt",
        "A 2 08 00 20 00 30  0 30  0 30  0 30  0 30\n",
    );

    let out = pillbox()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("run")
        .arg("--virtual-time")
        .args(["--start", START, "--run-for-mins", "60"])
        .arg("--keys")
        .arg(&keys)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v = summary(&out);
    assert_eq!(v["final_phase"], "monitoring");
    assert_eq!(v["stats"]["doses_triggered"], 1);
}

#[test]
fn hot_room_raises_a_temperature_alert() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let schedule = eight_oclock_schedule(&dir);
    let keys = write_file(&dir, "keys.txt", "A");

    let out = pillbox()
        .args(["--json", "--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("run")
        .arg("--virtual-time")
        .args(["--start", START, "--run-for-mins", "5", "--ambient", "35"])
        .arg("--schedule")
        .arg(&schedule)
        .arg("--keys")
        .arg(&keys)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let v = summary(&out);
    assert_eq!(v["stats"]["safety_alerts"], 1);
}

#[test]
fn missing_clock_exits_with_code_3() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    pillbox()
        .arg("--config")
        .arg(&cfg)
        .args(["run", "--virtual-time", "--no-rtc", "--start", START])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("real-time clock"));
}

#[test]
fn missing_clock_json_error_names_the_reason() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let out = pillbox()
        .args(["--json", "--log-level", "off", "--config"])
        .arg(&cfg)
        .args(["run", "--virtual-time", "--no-rtc", "--start", START])
        .assert()
        .code(3)
        .get_output()
        .stderr
        .clone();
    let text = String::from_utf8_lossy(&out);
    let line = text
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or_else(|| panic!("no JSON error; stderr was: {text}"));
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "ClockUnavailable");
    assert_eq!(v["exit_code"], 3);
}

#[rstest]
#[case("[[containers]]\nopen_angle = 0\nclose_angle = 100\n", "exactly 5")]
#[case("[timing]\npoll_interval_ms = 0\n", "poll_interval_ms")]
#[case("[logging]\nrotation = \"weekly\"\n", "rotation")]
fn invalid_config_exits_with_code_4(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_file(&dir, "bad.toml", body);

    pillbox()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(4)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn self_check_reports_bad_schedule_header() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let bad = write_file(&dir, "bad.csv", "container,time,max_temp\n1,0800,30\n");

    pillbox()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .arg("--schedule")
        .arg(&bad)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[test]
fn self_check_counts_scheduled_doses() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let schedule = eight_oclock_schedule(&dir);

    pillbox()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .arg("--schedule")
        .arg(&schedule)
        .assert()
        .success()
        .stdout(predicate::str::contains("(1 doses)"));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempdir().unwrap();
    pillbox()
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("health")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config"));
}

#[test]
fn human_run_echoes_display_frames_and_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let schedule = eight_oclock_schedule(&dir);
    let keys = write_file(&dir, "keys.txt", "A");

    pillbox()
        .args(["--log-level", "error", "--config"])
        .arg(&cfg)
        .arg("run")
        .arg("--virtual-time")
        .args(["--start", START, "--run-for-mins", "10"])
        .arg("--schedule")
        .arg(&schedule)
        .arg("--keys")
        .arg(&keys)
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome!"))
        .stdout(predicate::str::contains("Your medicine"))
        .stdout(predicate::str::contains("Doses triggered: 1"));
}
