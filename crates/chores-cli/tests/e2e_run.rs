//! E2E tests for `ch run` and `ch completions`.
//!
//! Each test runs the `ch` binary as a subprocess in an isolated temp
//! directory so project config from the developer's checkout never leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the `ch` binary, rooted in `dir`.
fn ch_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ch"));
    cmd.current_dir(dir);
    // Keep tracing output off stderr
    cmd.env("CHORES_LOG", "error");
    cmd.env_remove("FORMAT");
    cmd
}

/// Run `script` from stdin in text mode and return stdout.
fn run_text(dir: &Path, script: &str) -> String {
    let output = ch_cmd(dir)
        .args(["run", "--quiet", "--format", "text"])
        .write_stdin(script)
        .output()
        .expect("run should not crash");
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout is utf-8")
}

/// Run `script` in JSON mode and parse every stdout line.
fn run_json(dir: &Path, args: &[&str], script: &str) -> Vec<Value> {
    let output = ch_cmd(dir)
        .args(["run", "--json"])
        .args(args)
        .write_stdin(script)
        .output()
        .expect("run should not crash");
    assert!(
        output.status.success(),
        "run failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout)
        .expect("stdout is utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a JSON object"))
        .collect()
}

fn row_names(list: &Value) -> Vec<String> {
    list["rows"]
        .as_array()
        .expect("rows array")
        .iter()
        .map(|row| row["name"].as_str().expect("row name").to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn priority_sort_complete_hide_delete() {
    let dir = TempDir::new().unwrap();
    let script = "\
add A low
add B high
add C low
show-completed
sort priority asc
check 2
hide-completed
delete 0
";
    let events = run_json(dir.path(), &["--quiet"], script);
    assert_eq!(events.len(), 1);
    let last = &events[0];
    assert_eq!(last["event"], "list");
    assert_eq!(row_names(last), ["C"]);
    assert_eq!(last["completed"], 1);
    assert_eq!(last["hide_completed"], true);
    assert_eq!(last["sort"], "priority");
}

#[test]
fn every_mutation_prints_the_list_unless_quiet() {
    let dir = TempDir::new().unwrap();
    let events = run_json(dir.path(), &[], "add one\nadd two\nlist\n");
    // initial state is not printed; two adds, one list, one final
    assert_eq!(events.len(), 4);
    assert_eq!(row_names(&events[0]), ["one"]);
    assert_eq!(row_names(&events[3]), ["one", "two"]);
}

#[test]
fn checked_rows_reappear_after_show_completed() {
    let dir = TempDir::new().unwrap();
    let out = run_text(
        dir.path(),
        "add \"Water plants\" normal\nadd Laundry\ncheck 0\nlist\nshow-completed\n",
    );
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("0  [ ]  -  Laundry  td-"));
    assert!(lines[1].starts_with("0  [ ]  -  Laundry  td-"));
    assert!(lines[2].starts_with("1  [x]  =  Water plants  td-"));
}

#[test]
fn delete_then_undo_restores_the_row() {
    let dir = TempDir::new().unwrap();
    let out = run_text(dir.path(), "add keep\nadd oops high\ndelete 1\nundo\n");
    let names: Vec<&str> = out
        .lines()
        .map(|line| line.split("  ").nth(3).expect("name column"))
        .collect();
    assert_eq!(names, ["keep", "oops"]);
}

#[test]
fn open_reports_the_row() {
    let dir = TempDir::new().unwrap();
    let events = run_json(dir.path(), &["--quiet"], "add \"Call back\" high\nopen 0\n");
    assert_eq!(events[0]["event"], "opened");
    assert_eq!(events[0]["name"], "Call back");
    assert_eq!(events[0]["priority"], "high");
    assert_eq!(events[0]["marker"], "!");
}

// ---------------------------------------------------------------------------
// Store behaviour
// ---------------------------------------------------------------------------

#[test]
fn injected_failure_keeps_local_state() {
    let dir = TempDir::new().unwrap();
    let events = run_json(
        dir.path(),
        &["--quiet"],
        "add first\nfail delete\ndelete 0\nreload\n",
    );
    assert_eq!(events[0]["event"], "failed");
    assert_eq!(events[0]["operation"], "delete");
    assert_eq!(events[0]["code"], "E5003");
    // the store still has the row, so a reload brings it back
    assert_eq!(row_names(&events[1]), ["first"]);
}

#[test]
fn seed_file_is_loaded_with_latency() {
    let dir = TempDir::new().unwrap();
    let seed = dir.path().join("todos.json");
    fs::write(
        &seed,
        r#"[
  {"id":"td-b","name":"banana","priority":"low","created_at":"2024-01-01T09:00:00+00:00"},
  {"id":"td-a","name":"apple","priority":"high","created_at":"2024-01-01T10:00:00+00:00"},
  {"id":"td-c","name":"cherry","priority":"normal","created_at":"2024-01-01T08:00:00+00:00",
   "completed_at":"2024-01-02T08:00:00+00:00"}
]"#,
    )
    .unwrap();

    let events = run_json(
        dir.path(),
        &["--quiet", "--latency-ms", "5", "--seed", "todos.json"],
        "sort name desc\nshow-completed\n",
    );
    assert_eq!(events.len(), 1);
    assert_eq!(row_names(&events[0]), ["banana", "apple", "cherry"]);
    assert_eq!(events[0]["rows"][2]["done"], true);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn project_config_sets_initial_sort_and_visibility() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".chores")).unwrap();
    fs::write(
        dir.path().join(".chores/config.toml"),
        "[list]\nhide_completed = false\nsort = \"priority\"\ndirection = \"desc\"\n\n[output]\nformat = \"json\"\n",
    )
    .unwrap();

    let output = ch_cmd(dir.path())
        .args(["run", "--quiet"])
        .write_stdin("add low\ncheck 0\n")
        .output()
        .unwrap();
    assert!(output.status.success());
    let last: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(last["hide_completed"], false);
    assert_eq!(last["sort"], "priority");
    assert_eq!(last["direction"], "desc");
    assert_eq!(last["rows"][0]["done"], true);
}

#[test]
fn malformed_config_fails_with_code() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".chores")).unwrap();
    fs::write(dir.path().join(".chores/config.toml"), "[list\n").unwrap();

    ch_cmd(dir.path())
        .args(["run", "--format", "text"])
        .write_stdin("list\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1002]"))
        .stderr(predicate::str::contains("config.toml"));
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn out_of_range_position_fails_with_line_number() {
    let dir = TempDir::new().unwrap();
    ch_cmd(dir.path())
        .args(["run", "--quiet", "--format", "text"])
        .write_stdin("add a\ncheck 3\nadd b\n")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("error[E2003]: line 2:"))
        .stderr(predicate::str::contains("suggestion:"));
}

#[test]
fn keep_going_reports_and_continues() {
    let dir = TempDir::new().unwrap();
    let output = ch_cmd(dir.path())
        .args(["run", "--quiet", "--keep-going", "--json"])
        .write_stdin("add \"   \"\nadd real\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["error_code"], "E2004");
    let last: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(row_names(&last), ["real"]);
}

#[test]
fn syntax_errors_stop_before_anything_runs() {
    let dir = TempDir::new().unwrap();
    ch_cmd(dir.path())
        .args(["run", "--format", "text"])
        .write_stdin("add fine\nsort sideways\n")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("error[E2005]: line 2: invalid sort key"));
}

#[test]
fn script_file_argument_is_read() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("today.chores"), "# chores\nadd \"From file\"\n").unwrap();
    ch_cmd(dir.path())
        .args(["run", "--quiet", "--format", "text", "today.chores"])
        .assert()
        .success()
        .stdout(predicate::str::contains("From file"));
}

#[test]
fn verbose_flag_turns_on_debug_logging() {
    let dir = TempDir::new().unwrap();
    let run = |verbose: bool| {
        let mut cmd = ch_cmd(dir.path());
        cmd.env_remove("CHORES_LOG").env_remove("DEBUG");
        if verbose {
            cmd.arg("--verbose");
        }
        cmd.args(["run", "--quiet", "--format", "text"])
            .write_stdin("add a\n")
            .output()
            .unwrap()
    };

    let loud = run(true);
    assert!(loud.status.success());
    assert!(String::from_utf8_lossy(&loud.stderr).contains("DEBUG"));

    let quiet = run(false);
    assert!(quiet.status.success());
    assert!(!String::from_utf8_lossy(&quiet.stderr).contains("DEBUG"));
}

// ---------------------------------------------------------------------------
// Completions
// ---------------------------------------------------------------------------

#[test]
fn completions_emit_a_script() {
    let dir = TempDir::new().unwrap();
    ch_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_ch()"));
}
