//! End-to-end tests for trials and campaigns
//!
//! The "kernel" here is a small shell script, which is enough to exercise the
//! real spawn, stream, timeout and termination paths.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use boot_harness::{Campaign, PatternSet, TrialOutcome, TrialRunner};

fn shell_runner(script: String, timeout: Duration) -> TrialRunner {
    let patterns = PatternSet::new(["ready", "done"]).expect("valid patterns");
    TrialRunner::new("sh", vec!["-c".to_string(), script], patterns, timeout)
        .with_grace_period(Duration::from_millis(200))
}

fn is_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

fn read_pid(path: &Path) -> i32 {
    fs::read_to_string(path)
        .expect("pid file written")
        .trim()
        .parse()
        .expect("numeric pid")
}

#[tokio::test]
async fn timed_out_child_is_terminated() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!("echo $$ > {}; echo starting; sleep 30", pid_file.display());

    let runner = shell_runner(script, Duration::from_millis(300));
    let outcome = runner.run().await;

    assert!(matches!(outcome, TrialOutcome::TimedOut { output_closed: false, .. }));
    assert!(!is_alive(read_pid(&pid_file)), "child outlived its trial");
}

#[tokio::test]
async fn matched_child_is_terminated() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!(
        "echo $$ > {}; echo ready; echo done; sleep 30",
        pid_file.display()
    );

    let runner = shell_runner(script, Duration::from_secs(5));
    let outcome = runner.run().await;

    assert!(outcome.is_pass(), "got {outcome:?}");
    assert!(!is_alive(read_pid(&pid_file)), "child outlived its trial");
}

#[tokio::test]
async fn child_ignoring_sigterm_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = format!(
        "trap '' TERM; echo $$ > {}; echo starting; while :; do sleep 0.05; done",
        pid_file.display()
    );

    let runner = shell_runner(script, Duration::from_millis(300));
    let outcome = runner.run().await;

    assert!(matches!(outcome, TrialOutcome::TimedOut { .. }));
    assert!(!is_alive(read_pid(&pid_file)), "child survived forced kill");
}

#[tokio::test]
async fn campaign_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("count");
    fs::write(&counter, "0").unwrap();

    // Trial 3 forgets to print "done"
    let script = format!(
        r#"n=$(( $(cat {c}) + 1 )); echo $n > {c}; echo "trial $n ready"; if [ $n -ne 3 ]; then echo done; fi"#,
        c = counter.display()
    );
    let campaign = Campaign::new(5, shell_runner(script, Duration::from_secs(5))).unwrap();
    let result = campaign.run().await;

    assert_eq!(result.executed(), 3);
    assert_eq!(result.passed, 2);
    assert_eq!(result.failed(), 1);
    assert!(!result.all_passed());

    let failure = result.failure.expect("failure recorded");
    assert_eq!(failure.trial, 3);
    assert_eq!(failure.missing, vec!["done".to_string()]);
    assert_eq!(failure.output.text(), "trial 3 ready\n");

    // Trials 4 and 5 never ran
    assert_eq!(fs::read_to_string(&counter).unwrap().trim(), "3");
}

#[tokio::test]
async fn spawn_failure_fails_campaign() {
    let patterns = PatternSet::new(["ready"]).unwrap();
    let runner = TrialRunner::new(
        "/nonexistent/make",
        vec!["qemu".to_string()],
        patterns,
        Duration::from_secs(1),
    );
    let result = Campaign::new(3, runner).unwrap().run().await;

    assert_eq!(result.executed(), 1);
    assert_eq!(result.passed, 0);
    let failure = result.failure.expect("failure recorded");
    assert_eq!(failure.missing, vec!["ready".to_string()]);
    assert!(failure.error.unwrap_or_default().contains("/nonexistent/make"));
}

fn harness() -> Command {
    Command::new(env!("CARGO_BIN_EXE_boot-harness"))
}

#[test]
fn binary_exits_zero_when_all_trials_pass() {
    let output = harness()
        .args(["-n", "2", "-e", "ready", "-e", "done", "--", "sh", "-c"])
        .arg("echo ready; echo done")
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "stdout:\n{stdout}");
    assert!(stdout.contains("trials run: 2, passed: 2, failed: 0"));
}

#[test]
fn binary_exits_one_and_dumps_output_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");

    let output = harness()
        .args(["-n", "4", "-t", "2000", "-e", "ready", "-e", "done"])
        .arg("--report-json")
        .arg(&report)
        .args(["--", "sh", "-c", "echo booting; echo ready"])
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
    assert!(stdout.contains("trials run: 1, passed: 0, failed: 1"));
    assert!(stdout.contains("booting\nready\n"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["failure"]["trial"], 1);
    assert_eq!(json["failure"]["missing"][0], "done");
}

#[test]
fn binary_dumps_spawn_error_on_failure() {
    let output = harness()
        .args(["-n", "3", "-e", "ready", "--", "/nonexistent/boot-command"])
        .output()
        .unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(1), "stdout:\n{stdout}");
    assert!(stdout.contains("trials run: 1, passed: 0, failed: 1"));
    assert!(stdout.contains("error: Failed to spawn '/nonexistent/boot-command'"));
}

#[test]
fn binary_rejects_invalid_pattern_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");

    let output = harness()
        .args(["-e", "unclosed(", "--", "touch"])
        .arg(&marker)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unclosed("));
    assert!(!marker.exists());
}

#[test]
fn binary_reads_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("harness.toml");
    fs::write(
        &config,
        r#"
patterns = ["fs_name:\\w+"]

[command]
program = "sh"
args = ["-c", "echo fs_name:tsunami"]

[campaign]
trials = 3
timeout_ms = 2000
"#,
    )
    .unwrap();

    let output = harness().arg("--config").arg(&config).output().unwrap();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(0), "stdout:\n{stdout}");
    assert!(stdout.contains("  - fs_name:\\w+"));
    assert!(stdout.contains("trials run: 3, passed: 3, failed: 0"));
}
