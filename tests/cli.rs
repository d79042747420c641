use std::io::Write;

use assert_cmd::Command;

fn dozewatch(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("dozewatch").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local").join("share"));
    cmd
}

fn capture(rows: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "kind,value,delay_ms").unwrap();
    file.write_all(rows.as_bytes()).unwrap();
    file
}

const BASELINE_ROWS: &str = "hr,70,0\nhr,70,0\nhr,70,0\nhr,70,0\nhr,70,0\n\
                             hr,70,0\nhr,70,0\nhr,70,0\nhr,70,0\nhr,70,0\n";

#[test]
fn help_lists_flags() {
    let home = tempfile::tempdir().unwrap();
    let output = dozewatch(home.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--sensitivity"));
    assert!(stdout.contains("--replay"));
    assert!(stdout.contains("--headless"));
}

#[test]
fn refuses_to_start_tui_without_tty() {
    let home = tempfile::tempdir().unwrap();
    dozewatch(home.path()).write_stdin("").assert().failure();
}

#[test]
fn headless_replay_reports_drowsiness() {
    let home = tempfile::tempdir().unwrap();
    let file = capture(&format!("{}hr,66,0\nhr,64,0\n", BASELINE_ROWS));

    let output = dozewatch(home.path())
        .arg("--headless")
        .arg("--replay")
        .arg(file.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("collecting 1/10"));
    assert!(stdout.contains("baseline 70.0"));
    assert!(stdout.contains("awake drop=4.0"));
    assert!(stdout.contains("drowsy drop=6.0 threshold=5.0"));
    assert!(stdout.contains("alerts: 1"));
}

#[test]
fn headless_motion_suppresses_alerts() {
    let home = tempfile::tempdir().unwrap();
    let file = capture(&format!("{}motion,true,0\nhr,40,0\nhr,40,0\n", BASELINE_ROWS));

    let output = dozewatch(home.path())
        .args(["--headless", "--replay"])
        .arg(file.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("motion     moving"));
    assert!(!stdout.contains("drowsy"));
    assert!(stdout.contains("alerts: 0"));
}

#[test]
fn headless_sensitivity_flag_is_used_and_persisted() {
    let home = tempfile::tempdir().unwrap();
    let file = capture(&format!("{}hr,66,0\n", BASELINE_ROWS));

    let output = dozewatch(home.path())
        .args(["--headless", "--sensitivity", "high", "--replay"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("drowsy drop=4.0 threshold=3.0"));

    // the next run picks the stored preference up without the flag
    let output = dozewatch(home.path())
        .args(["--headless", "--replay"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&output.stdout).contains("alerts: 1"));
}

#[test]
fn headless_rejects_malformed_capture() {
    let home = tempfile::tempdir().unwrap();
    let file = capture("hr,not-a-number,0\n");

    dozewatch(home.path())
        .args(["--headless", "--replay"])
        .arg(file.path())
        .assert()
        .failure();
}
